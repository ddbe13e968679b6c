//! Shared constants

/// Default values used when no configuration is provided
pub mod defaults {
    /// Width given to freshly created nodes
    pub const NODE_WIDTH: f64 = 180.0;
    /// Height given to freshly created nodes
    pub const NODE_HEIGHT: f64 = 100.0;
    /// Padding between a group's border and the nodes it covers
    pub const GROUP_MARGIN: f64 = 30.0;
    /// Groups never shrink below this width
    pub const GROUP_MIN_WIDTH: f64 = 600.0;
    /// Groups never shrink below this height
    pub const GROUP_MIN_HEIGHT: f64 = 250.0;
    /// Maximum number of history entries (0 = unlimited)
    pub const HISTORY_LIMIT: usize = 0;
    /// Title given to groups created from the selection
    pub const GROUP_TITLE: &str = "Group";
}
