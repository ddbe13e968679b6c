//! Component registry for kind resolution
//!
//! A component is the per-kind pair of a builder (creates a node's slots
//! and controls) and a worker (computes the node's outputs during
//! evaluation). Nodes name their kind through `title`; the registry maps
//! that name to the component.
//!
//! # Usage
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new();
//! registry.register(Arc::new(AddComponent::new(&sockets)));
//! registry.register_callback("Echo", |_node, inputs, _args| async move {
//!     Ok(vec![inputs[0].first().cloned().unwrap_or_default()])
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ContractViolation, Result};
use crate::node::Node;
use crate::snapshot::NodeJson;

/// Values arriving at each input slot, one list per slot
pub type InputData = Vec<Vec<Value>>;

/// Values produced for each output slot
pub type OutputData = Vec<Value>;

/// Per-kind builder and worker
#[async_trait]
pub trait Component: Send + Sync {
    /// Kind name, matched against `Node::title`
    fn name(&self) -> &str;

    /// Add the kind's inputs, outputs and controls to a fresh node
    ///
    /// May suspend, e.g. to fetch the options of a dropdown control.
    async fn build(&self, node: &mut Node) -> Result<()>;

    /// Compute outputs from resolved inputs
    ///
    /// `outputs` arrives with one `Null` per declared output slot. A worker
    /// must not change its length.
    async fn worker(
        &self,
        node: &NodeJson,
        inputs: &InputData,
        outputs: &mut OutputData,
        args: &[Value],
    ) -> Result<()>;
}

/// Store `value` in output slot `index`
///
/// Fails instead of panicking when the node has no such slot.
pub fn set_output(outputs: &mut OutputData, index: usize, value: Value) -> Result<()> {
    let len = outputs.len();
    let slot = outputs
        .get_mut(index)
        .ok_or(ContractViolation::SlotIndexOutOfRange { index, len })?;
    *slot = value;
    Ok(())
}

type WorkerFuture = Pin<Box<dyn Future<Output = Result<OutputData>> + Send>>;
type WorkerCallback = Box<dyn Fn(NodeJson, InputData, Vec<Value>) -> WorkerFuture + Send + Sync>;
type BuilderCallback = Box<dyn Fn(&mut Node) -> Result<()> + Send + Sync>;

/// Closure-backed component
///
/// The worker's returned vector replaces the output slots wholesale, so a
/// callback returning the wrong number of values is caught by the engine.
pub struct CallbackComponent {
    name: String,
    builder: Option<BuilderCallback>,
    worker: WorkerCallback,
}

impl CallbackComponent {
    pub fn new<F, Fut>(name: impl Into<String>, worker: F) -> Self
    where
        F: Fn(NodeJson, InputData, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OutputData>> + Send + 'static,
    {
        Self {
            name: name.into(),
            builder: None,
            worker: Box::new(move |node, inputs, args| Box::pin(worker(node, inputs, args))),
        }
    }

    /// Set a synchronous builder
    pub fn with_builder(
        mut self,
        builder: impl Fn(&mut Node) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.builder = Some(Box::new(builder));
        self
    }
}

#[async_trait]
impl Component for CallbackComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn build(&self, node: &mut Node) -> Result<()> {
        match &self.builder {
            Some(builder) => builder(node),
            None => Ok(()),
        }
    }

    async fn worker(
        &self,
        node: &NodeJson,
        inputs: &InputData,
        outputs: &mut OutputData,
        args: &[Value],
    ) -> Result<()> {
        *outputs = (self.worker)(node.clone(), inputs.clone(), args.to_vec()).await?;
        Ok(())
    }
}

/// Registry of components by kind name
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = builtin_registry(&sockets);
/// registry.merge(plugin_registry);
/// ```
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component under its own name, replacing any previous one
    pub fn register(&mut self, component: Arc<dyn Component>) {
        self.components
            .insert(component.name().to_string(), component);
    }

    /// Register a closure-backed worker with no builder
    pub fn register_callback<F, Fut>(&mut self, name: impl Into<String>, worker: F)
    where
        F: Fn(NodeJson, InputData, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OutputData>> + Send + 'static,
    {
        self.register(Arc::new(CallbackComponent::new(name, worker)));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Component>> {
        self.components.get(kind).cloned()
    }

    pub fn has(&self, kind: &str) -> bool {
        self.components.contains_key(kind)
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.components.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Merge another registry into this one
    ///
    /// Components from `other` override same-named ones.
    pub fn merge(&mut self, other: ComponentRegistry) {
        self.components.extend(other.components);
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
