//! Configuration types for the editor core

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::Result;

/// Layout and history settings for a [`GraphEditor`](crate::GraphEditor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Width of newly created nodes
    pub node_width: f64,
    /// Height of newly created nodes
    pub node_height: f64,
    /// Margin added around covered nodes when fitting a group
    pub group_margin: f64,
    /// Minimum group width
    pub group_min_width: f64,
    /// Minimum group height
    pub group_min_height: f64,
    /// Maximum number of undo entries (0 = unlimited)
    pub history_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            node_width: defaults::NODE_WIDTH,
            node_height: defaults::NODE_HEIGHT,
            group_margin: defaults::GROUP_MARGIN,
            group_min_width: defaults::GROUP_MIN_WIDTH,
            group_min_height: defaults::GROUP_MIN_HEIGHT,
            history_limit: defaults::HISTORY_LIMIT,
        }
    }
}

impl EditorConfig {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
