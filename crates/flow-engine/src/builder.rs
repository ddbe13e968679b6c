//! Fluent builder for snapshots
//!
//! Provides a compact API for assembling snapshots programmatically, mostly
//! for feeding the engine without going through an editor.

use crate::constants::defaults;
use crate::snapshot::{
    GroupJson, InputJson, InputLink, NodeJson, OutputJson, OutputLink, Snapshot,
};
use crate::types::{GroupId, NodeId};

/// Fluent builder for [`Snapshot`]s
///
/// # Example
///
/// ```ignore
/// let snapshot = SnapshotBuilder::new("demo@0.1.0")
///     .node(1, "Number", 0, 1)
///     .with_data("num", json!(2))
///     .node(2, "Add", 2, 1)
///     .at(200.0, 0.0)
///     .link(1, 0, 2, 0)
///     .build();
/// ```
pub struct SnapshotBuilder {
    snapshot: Snapshot,
    last: Option<NodeId>,
}

impl SnapshotBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            snapshot: Snapshot::new(id),
            last: None,
        }
    }

    /// Add a node with `inputs` input slots and `outputs` output slots
    pub fn node(mut self, id: u64, kind: impl Into<String>, inputs: usize, outputs: usize) -> Self {
        let id = NodeId(id);
        self.snapshot.nodes.insert(
            id,
            NodeJson {
                id,
                data: Default::default(),
                group: None,
                inputs: vec![InputJson::default(); inputs],
                outputs: vec![OutputJson::default(); outputs],
                position: (0.0, 0.0),
                title: kind.into(),
            },
        );
        self.last = Some(id);
        self
    }

    /// Set a data entry on the most recently added node
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let Some(node) = self.last_mut() {
            node.data.insert(key.into(), value);
        }
        self
    }

    /// Position the most recently added node
    pub fn at(mut self, x: f64, y: f64) -> Self {
        if let Some(node) = self.last_mut() {
            node.position = (x, y);
        }
        self
    }

    /// Link output slot `output` of `from` to input slot `input` of `to`
    ///
    /// Both sides are recorded. Missing nodes or slots are skipped; use
    /// validation to catch them.
    pub fn link(mut self, from: u64, output: usize, to: u64, input: usize) -> Self {
        let (from, to) = (NodeId(from), NodeId(to));
        if let Some(slot) = self
            .snapshot
            .nodes
            .get_mut(&from)
            .and_then(|n| n.outputs.get_mut(output))
        {
            slot.connections.push(OutputLink { node: to, input });
        }
        if let Some(slot) = self
            .snapshot
            .nodes
            .get_mut(&to)
            .and_then(|n| n.inputs.get_mut(input))
        {
            slot.connections.push(InputLink { node: from, output });
        }
        self
    }

    /// Add a group holding `nodes`
    pub fn group(mut self, id: u64, title: impl Into<String>, nodes: &[u64]) -> Self {
        let id = GroupId(id);
        let members: Vec<NodeId> = nodes.iter().copied().map(NodeId).collect();
        for member in &members {
            if let Some(node) = self.snapshot.nodes.get_mut(member) {
                node.group = Some(id);
            }
        }
        self.snapshot.groups.insert(
            id,
            GroupJson {
                id,
                title: title.into(),
                nodes: members,
                min_width: defaults::GROUP_MIN_WIDTH,
                min_height: defaults::GROUP_MIN_HEIGHT,
                position: (0.0, 0.0),
                width: defaults::GROUP_MIN_WIDTH,
                height: defaults::GROUP_MIN_HEIGHT,
            },
        );
        self
    }

    /// Build the snapshot without validation
    pub fn build(self) -> Snapshot {
        self.snapshot
    }

    fn last_mut(&mut self) -> Option<&mut NodeJson> {
        let id = self.last?;
        self.snapshot.nodes.get_mut(&id)
    }
}
