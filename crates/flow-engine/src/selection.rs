//! Current selection of nodes and groups

use crate::types::{GroupId, NodeId};

/// A selectable graph item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selected {
    Node(NodeId),
    Group(GroupId),
}

impl From<NodeId> for Selected {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<GroupId> for Selected {
    fn from(id: GroupId) -> Self {
        Self::Group(id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    items: Vec<Selected>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `item`
    ///
    /// Without `accumulate` the selection becomes exactly `[item]`. With it,
    /// membership of `item` is toggled.
    pub fn add(&mut self, item: impl Into<Selected>, accumulate: bool) {
        let item = item.into();
        if !accumulate {
            self.items.clear();
            self.items.push(item);
        } else if !self.remove(item) {
            self.items.push(item);
        }
    }

    /// Returns false if `item` was not selected
    pub fn remove(&mut self, item: impl Into<Selected>) -> bool {
        let item = item.into();
        let before = self.items.len();
        self.items.retain(|s| *s != item);
        before != self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn contains(&self, item: impl Into<Selected>) -> bool {
        self.items.contains(&item.into())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Selected] {
        &self.items
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.items
            .iter()
            .filter_map(|s| match s {
                Selected::Node(id) => Some(*id),
                Selected::Group(_) => None,
            })
            .collect()
    }

    pub fn groups(&self) -> Vec<GroupId> {
        self.items
            .iter()
            .filter_map(|s| match s {
                Selected::Group(id) => Some(*id),
                Selected::Node(_) => None,
            })
            .collect()
    }
}
