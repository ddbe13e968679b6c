//! Groups - rectangular containers that cluster nodes
//!
//! A group covers a node when the node's rectangle lies strictly inside the
//! group's rectangle. Membership is not tracked continuously: the editor
//! recomputes it at the end of a drag gesture (see `GraphEditor::end_drag`).
//!
//! The node side of the relation (`Node::group`) is maintained by the editor;
//! a group on its own only records member ids.

use crate::constants::defaults;
use crate::node::Node;
use crate::snapshot::GroupJson;
use crate::types::{Block, GroupId, NodeId, Position};

/// A group of nodes on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    pub position: Position,
    width: f64,
    height: f64,
    min_width: f64,
    min_height: f64,
    nodes: Vec<NodeId>,
}

impl Group {
    /// Create an empty group at the minimum size
    pub fn new(id: GroupId, title: impl Into<String>) -> Self {
        Self::with_min_size(
            id,
            title,
            defaults::GROUP_MIN_WIDTH,
            defaults::GROUP_MIN_HEIGHT,
        )
    }

    /// Create an empty group with custom minimum dimensions
    pub fn with_min_size(
        id: GroupId,
        title: impl Into<String>,
        min_width: f64,
        min_height: f64,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            position: (0.0, 0.0),
            width: min_width,
            height: min_height,
            min_width,
            min_height,
            nodes: Vec::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn min_width(&self) -> f64 {
        self.min_width
    }

    pub fn min_height(&self) -> f64 {
        self.min_height
    }

    /// Set the width, never below the minimum
    pub fn set_width(&mut self, width: f64) {
        self.width = width.max(self.min_width);
    }

    /// Set the height, never below the minimum
    pub fn set_height(&mut self, height: f64) {
        self.height = height.max(self.min_height);
    }

    /// Member node ids, in insertion order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Strict containment test
    pub fn is_cover_node(&self, node: &Node) -> bool {
        self.bounds().strictly_contains(&node.bounds())
    }

    /// Fit the rectangle around `nodes` and record them as members
    ///
    /// The box gets `margin` on the left and right, twice that on top (room
    /// for the title) and once more below. Does nothing for an empty slice.
    pub fn cover_nodes(&mut self, nodes: &[&Node], margin: f64) {
        if nodes.is_empty() {
            return;
        }

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;

        for node in nodes {
            let rect = node.bounds();
            min_x = min_x.min(rect.x);
            min_y = min_y.min(rect.y);
            max_x = max_x.max(rect.x + rect.width);
            max_y = max_y.max(rect.y + rect.height);
        }

        self.position = (min_x - margin, min_y - 2.0 * margin);
        self.set_width(max_x - min_x + 2.0 * margin);
        self.set_height(max_y - min_y + 3.0 * margin);

        for node in nodes {
            self.push_member(node.id);
        }
    }

    pub(crate) fn push_member(&mut self, id: NodeId) {
        if !self.nodes.contains(&id) {
            self.nodes.push(id);
        }
    }

    pub(crate) fn remove_member(&mut self, id: NodeId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| *n != id);
        before != self.nodes.len()
    }

    pub(crate) fn clear_members(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.nodes)
    }

    pub fn to_json(&self) -> GroupJson {
        GroupJson {
            id: self.id,
            title: self.title.clone(),
            nodes: self.nodes.clone(),
            min_width: self.min_width,
            min_height: self.min_height,
            position: self.position,
            width: self.width,
            height: self.height,
        }
    }

    /// Restore a group, including its member list
    pub fn from_json(json: &GroupJson) -> Self {
        let mut group = Self::with_min_size(json.id, json.title.clone(), json.min_width, json.min_height);
        group.position = json.position;
        group.set_width(json.width);
        group.set_height(json.height);
        for id in &json.nodes {
            group.push_member(*id);
        }
        group
    }
}

impl Block for Group {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}
