//! Flow Nodes
//!
//! Built-in components for the flow engine. Each component pairs a builder
//! (which slots and controls a node of its kind gets) with a worker (how
//! the engine computes its outputs).
//!
//! # Categories
//!
//! - **Input**: Nodes that emit values stored in their data
//! - **Math**: Nodes that compute numbers
//! - **Control**: Nodes that shape how values flow (joining, delaying)

pub mod control;
pub mod input;
pub mod math;
pub mod setup;
pub mod sockets;

pub use control::*;
pub use input::*;
pub use math::*;
pub use setup::{builtin_registry, builtin_registry_with_options};
pub use sockets::Sockets;
