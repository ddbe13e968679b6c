//! Structural comparison of two snapshots
//!
//! Used to spot conflicts between a locally held graph and another copy of
//! it. Edges are matched by the input they feed: the same output feeding a
//! different input, or a different output feeding the same input, counts as
//! one removal plus one addition.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::snapshot::{NodeJson, OutputLink, Snapshot};
use crate::types::NodeId;

/// Link changes on one output slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotChanges {
    pub output: usize,
    pub added: Vec<OutputLink>,
    pub removed: Vec<OutputLink>,
}

/// Result of [`compare`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    /// In `a` only
    pub removed: Vec<NodeId>,
    /// In `b` only
    pub added: Vec<NodeId>,
    /// In both
    pub stayed: Vec<NodeId>,
    /// Stayed, with a different position
    pub moved: Vec<NodeId>,
    /// Stayed, with a different data payload
    pub datachanged: Vec<NodeId>,
    /// Stayed nodes whose output links changed; only changed slots are listed
    pub connects: BTreeMap<NodeId, Vec<SlotChanges>>,
}

impl Diff {
    /// True if nothing was added, removed, moved or changed
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
            && self.added.is_empty()
            && self.moved.is_empty()
            && self.datachanged.is_empty()
            && self.connects.is_empty()
    }
}

/// Compare two node maps
pub fn compare(a: &BTreeMap<NodeId, NodeJson>, b: &BTreeMap<NodeId, NodeJson>) -> Diff {
    let mut diff = Diff {
        removed: a.keys().filter(|id| !b.contains_key(id)).copied().collect(),
        added: b.keys().filter(|id| !a.contains_key(id)).copied().collect(),
        ..Diff::default()
    };

    for (id, before) in a {
        let Some(after) = b.get(id) else {
            continue;
        };
        diff.stayed.push(*id);

        if before.position != after.position {
            diff.moved.push(*id);
        }
        // serde_json::Value equality is structural
        if before.data != after.data {
            diff.datachanged.push(*id);
        }

        let changes = compare_outputs(before, after);
        if !changes.is_empty() {
            diff.connects.insert(*id, changes);
        }
    }

    diff
}

/// Compare the node maps of two snapshots
pub fn compare_snapshots(a: &Snapshot, b: &Snapshot) -> Diff {
    compare(&a.nodes, &b.nodes)
}

fn compare_outputs(before: &NodeJson, after: &NodeJson) -> Vec<SlotChanges> {
    let slots = before.outputs.len().max(after.outputs.len());
    let empty = Vec::new();

    (0..slots)
        .filter_map(|output| {
            let old = before
                .outputs
                .get(output)
                .map_or(&empty, |o| &o.connections);
            let new = after
                .outputs
                .get(output)
                .map_or(&empty, |o| &o.connections);

            let old_set: HashSet<&OutputLink> = old.iter().collect();
            let new_set: HashSet<&OutputLink> = new.iter().collect();

            let added: Vec<OutputLink> = new.iter().filter(|l| !old_set.contains(l)).copied().collect();
            let removed: Vec<OutputLink> = old.iter().filter(|l| !new_set.contains(l)).copied().collect();

            if added.is_empty() && removed.is_empty() {
                None
            } else {
                Some(SlotChanges {
                    output,
                    added,
                    removed,
                })
            }
        })
        .collect()
}
