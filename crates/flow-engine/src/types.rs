//! Core identifier and geometry types
//!
//! These types are shared by the live editor model and the serialized
//! snapshot format.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Unique identifier for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canvas position (x, y)
pub type Position = (f64, f64);

/// Free-form per-node payload owned by the node's kind
pub type DataMap = serde_json::Map<String, serde_json::Value>;

/// Address of an input or output slot: owning node plus slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IoRef {
    pub node: NodeId,
    pub index: usize,
}

impl IoRef {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// Monotonic id allocator
///
/// Each editor owns one counter for nodes and one for groups.
#[derive(Debug)]
pub struct IdCounter {
    next: AtomicU64,
}

impl IdCounter {
    /// Create a counter whose first id is 1
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Make sure future allocations never return `id` or anything below it
    pub fn advance_past(&self, id: u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }

    /// Peek at the id the next allocation will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// True if `other` lies strictly inside this rectangle
    pub fn strictly_contains(&self, other: &Rect) -> bool {
        other.x > self.x
            && other.y > self.y
            && other.x + other.width < self.x + self.width
            && other.y + other.height < self.y + self.height
    }
}

/// Canvas zoom and pan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Zoom factor
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            k: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Behaviour shared by spatial graph items (nodes and groups)
pub trait Block {
    fn position(&self) -> Position;

    fn set_position(&mut self, position: Position);

    /// (width, height)
    fn size(&self) -> (f64, f64);

    fn bounds(&self) -> Rect {
        let (x, y) = self.position();
        let (width, height) = self.size();
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        let (x, y) = self.position();
        self.set_position((x + dx, y + dy));
    }
}
