//! Registry setup for host applications.
//!
//! Hosts call [`builtin_registry`] at startup and hand the result to both
//! the editor and the engine, so the two resolve kinds identically.
//!
//! # Example
//!
//! ```ignore
//! let sockets = flow_nodes::Sockets::new();
//! let registry = Arc::new(flow_nodes::builtin_registry(&sockets));
//! let editor = GraphEditor::new("demo@0.1.0", Arc::clone(&registry))?;
//! let engine = Engine::new("demo@0.1.0", registry)?;
//! ```

use std::sync::Arc;

use flow_engine::ComponentRegistry;

use crate::control::{DelayComponent, JoinComponent};
use crate::input::{NumberComponent, OptionsSource, SelectComponent, TextComponent};
use crate::math::AddComponent;
use crate::sockets::Sockets;

/// Registry with every built-in component except `Select`
///
/// `Select` needs somewhere to fetch its options from; use
/// [`builtin_registry_with_options`] to include it.
pub fn builtin_registry(sockets: &Sockets) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register(Arc::new(NumberComponent::new(sockets.number.clone())));
    registry.register(Arc::new(TextComponent::new(sockets.text.clone())));
    registry.register(Arc::new(AddComponent::new(sockets.number.clone())));
    registry.register(Arc::new(JoinComponent::new(
        sockets.text.clone(),
        sockets.number.clone(),
    )));
    registry.register(Arc::new(DelayComponent::new(sockets.any.clone())));
    log::debug!("Built-in registry: {:?}", registry.kinds());
    registry
}

/// Every built-in component, with `Select` reading from `options`
pub fn builtin_registry_with_options(
    sockets: &Sockets,
    options: Arc<dyn OptionsSource>,
) -> ComponentRegistry {
    let mut registry = builtin_registry(sockets);
    registry.register(Arc::new(SelectComponent::new(sockets.text.clone(), options)));
    registry
}
