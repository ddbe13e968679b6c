//! Control nodes
//!
//! Nodes that shape how values flow rather than computing new ones.

mod delay;
mod join;

pub use delay::DelayComponent;
pub use join::{JoinComponent, JoinConfig};
