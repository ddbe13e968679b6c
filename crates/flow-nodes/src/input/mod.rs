//! Input nodes
//!
//! Nodes that emit values stored in their own data.

mod number;
mod select;
mod text;

pub use number::NumberComponent;
pub use select::{OptionsSource, SelectComponent, StaticOptions};
pub use text::TextComponent;
