//! Serialized graph snapshots
//!
//! A snapshot is a versioned, self-contained copy of a graph:
//!
//! ```json
//! { "id": "demo@0.1.0",
//!   "nodes": { "1": { "id": 1, "title": "Number", "data": {}, "group": null,
//!                     "position": [0, 0], "inputs": [],
//!                     "outputs": [{ "connections": [{ "node": 2, "input": 0 }] }] } },
//!   "groups": {} }
//! ```
//!
//! Connections are not stored as separate edges: each input lists the
//! outputs feeding it and each output mirrors the inputs it feeds.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IdMismatch, ValidationError};
use crate::types::{DataMap, GroupId, NodeId, Position};

/// Link stored on an input: the upstream node and its output slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputLink {
    pub node: NodeId,
    pub output: usize,
}

/// Link stored on an output: the downstream node and its input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputLink {
    pub node: NodeId,
    pub input: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputJson {
    pub connections: Vec<InputLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputJson {
    pub connections: Vec<OutputLink>,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: NodeId,
    #[serde(default)]
    pub data: DataMap,
    #[serde(default)]
    pub group: Option<GroupId>,
    #[serde(default)]
    pub inputs: Vec<InputJson>,
    #[serde(default)]
    pub outputs: Vec<OutputJson>,
    pub position: Position,
    pub title: String,
}

impl NodeJson {
    /// All upstream node ids, in slot order
    pub fn dependencies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs
            .iter()
            .flat_map(|i| i.connections.iter().map(|l| l.node))
    }

    /// All downstream node ids, in slot order
    pub fn dependents(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outputs
            .iter()
            .flat_map(|o| o.connections.iter().map(|l| l.node))
    }
}

/// Serialized group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupJson {
    pub id: GroupId,
    pub title: String,
    pub nodes: Vec<NodeId>,
    pub min_width: f64,
    pub min_height: f64,
    pub position: Position,
    pub width: f64,
    pub height: f64,
}

/// Complete, versioned graph snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// `name@MAJOR.MINOR.PATCH`
    pub id: String,
    pub nodes: BTreeMap<NodeId, NodeJson>,
    #[serde(default)]
    pub groups: BTreeMap<GroupId, GroupJson>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    pub fn from_json_str(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_string(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parsed `name@MAJOR.MINOR.PATCH` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotId {
    name: String,
    version: String,
}

impl SnapshotId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        raw.parse()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Check a snapshot identifier against this one
    ///
    /// Every mismatch is reported, not just the first.
    pub fn check(&self, found: &str) -> Result<(), ValidationError> {
        let mut mismatches = Vec::new();
        if !is_valid_id(found) {
            mismatches.push(IdMismatch::Malformed(found.to_string()));
        }

        let (name, version) = found.split_once('@').unwrap_or((found, ""));
        if name != self.name {
            mismatches.push(IdMismatch::Name {
                expected: self.name.clone(),
                found: name.to_string(),
            });
        }
        if version != self.version {
            mismatches.push(IdMismatch::Version {
                expected: self.version.clone(),
                found: version.to_string(),
            });
        }

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::SnapshotId(mismatches))
        }
    }
}

impl FromStr for SnapshotId {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if !is_valid_id(raw) {
            return Err(ValidationError::MalformedId(raw.to_string()));
        }
        let (name, version) = raw
            .split_once('@')
            .ok_or_else(|| ValidationError::MalformedId(raw.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Name: at least 3 word characters or dashes; version: three numeric parts
fn is_valid_id(raw: &str) -> bool {
    let Some((name, version)) = raw.split_once('@') else {
        return false;
    };
    let name_ok = name.chars().count() >= 3
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    let parts: Vec<&str> = version.split('.').collect();
    let version_ok = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    name_ok && version_ok
}
