//! Snapshot validation
//!
//! Checks link integrity (both ends of every link are recorded), node
//! kinds and cycles. Every problem found is
//! reported, not just the first. Identifier checks live on
//! [`SnapshotId`](crate::snapshot::SnapshotId).

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::{FlowError, Result, ValidationError};
use crate::registry::ComponentRegistry;
use crate::snapshot::{InputLink, OutputLink, Snapshot};
use crate::types::NodeId;

/// Validate a snapshot's structure
///
/// Pass a registry to also check that every node kind is known.
pub fn validate_snapshot(
    snapshot: &Snapshot,
    registry: Option<&ComponentRegistry>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_links(snapshot, &mut errors);
    validate_link_pairs(snapshot, &mut errors);
    detect_cycles(snapshot, &mut errors);

    if let Some(registry) = registry {
        validate_kinds(snapshot, registry, &mut errors);
    }

    errors
}

/// Validate and turn the first problem into an error
pub fn ensure_valid(snapshot: &Snapshot, registry: Option<&ComponentRegistry>) -> Result<()> {
    first_error(validate_snapshot(snapshot, registry))
}

/// Check only that every link is recorded on both of its ends
///
/// Editors may hold cycles, so loading into one uses this instead of
/// [`ensure_valid`].
pub fn ensure_links_matched(snapshot: &Snapshot) -> Result<()> {
    let mut errors = Vec::new();
    validate_link_pairs(snapshot, &mut errors);
    first_error(errors)
}

fn first_error(errors: Vec<ValidationError>) -> Result<()> {
    match errors.into_iter().next() {
        Some(error) => Err(FlowError::Validation(error)),
        None => Ok(()),
    }
}

/// Check that every link points at an existing node and slot
fn validate_links(snapshot: &Snapshot, errors: &mut Vec<ValidationError>) {
    for (id, node) in &snapshot.nodes {
        for input in &node.inputs {
            for link in &input.connections {
                let exists = snapshot
                    .nodes
                    .get(&link.node)
                    .is_some_and(|remote| link.output < remote.outputs.len());
                if !exists {
                    errors.push(ValidationError::DanglingLink {
                        node: *id,
                        remote: link.node,
                        slot: link.output,
                    });
                }
            }
        }
        for output in &node.outputs {
            for link in &output.connections {
                let exists = snapshot
                    .nodes
                    .get(&link.node)
                    .is_some_and(|remote| link.input < remote.inputs.len());
                if !exists {
                    errors.push(ValidationError::DanglingLink {
                        node: *id,
                        remote: link.node,
                        slot: link.input,
                    });
                }
            }
        }
    }
}

/// Check that each link between existing slots appears on both nodes
///
/// Dangling links are reported by [`validate_links`] and skipped here.
fn validate_link_pairs(snapshot: &Snapshot, errors: &mut Vec<ValidationError>) {
    for (&from, node) in &snapshot.nodes {
        for (output, slot) in node.outputs.iter().enumerate() {
            for link in &slot.connections {
                let Some(target) = snapshot
                    .nodes
                    .get(&link.node)
                    .and_then(|remote| remote.inputs.get(link.input))
                else {
                    continue;
                };
                let mirrored = InputLink { node: from, output };
                if !target.connections.contains(&mirrored) {
                    errors.push(ValidationError::UnmatchedLink {
                        from,
                        output,
                        to: link.node,
                        input: link.input,
                    });
                }
            }
        }
    }

    for (&to, node) in &snapshot.nodes {
        for (input, slot) in node.inputs.iter().enumerate() {
            for link in &slot.connections {
                let Some(source) = snapshot
                    .nodes
                    .get(&link.node)
                    .and_then(|remote| remote.outputs.get(link.output))
                else {
                    continue;
                };
                let mirrored = OutputLink { node: to, input };
                if !source.connections.contains(&mirrored) {
                    errors.push(ValidationError::UnmatchedLink {
                        from: link.node,
                        output: link.output,
                        to,
                        input,
                    });
                }
            }
        }
    }
}

/// Detect cycles using Kahn's algorithm over the input links
fn detect_cycles(snapshot: &Snapshot, errors: &mut Vec<ValidationError>) {
    let mut in_degree: BTreeMap<NodeId, usize> =
        snapshot.nodes.keys().map(|id| (*id, 0)).collect();
    let mut downstream: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    for (id, node) in &snapshot.nodes {
        for upstream in node.dependencies() {
            if !snapshot.nodes.contains_key(&upstream) {
                continue;
            }
            *in_degree.entry(*id).or_insert(0) += 1;
            downstream.entry(upstream).or_default().push(*id);
        }
    }

    let mut queue: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        for next in downstream.get(&id).into_iter().flatten() {
            if let Some(deg) = in_degree.get_mut(next) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }

    if visited < snapshot.nodes.len() {
        errors.push(ValidationError::CycleDetected);
    }
}

/// Check that all nodes have known kinds in the registry
fn validate_kinds(
    snapshot: &Snapshot,
    registry: &ComponentRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for (id, node) in &snapshot.nodes {
        if !registry.has(&node.title) {
            errors.push(ValidationError::UnknownKind {
                node: *id,
                kind: node.title.clone(),
            });
        }
    }
}
