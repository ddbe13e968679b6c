//! Select input
//!
//! A dropdown whose choices come from an [`OptionsSource`] when the node is
//! built. Because building is async, a source may be slow (a file, a
//! service); the editor awaits it before the node can be added.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    set_output, Component, Control, FlowError, InputData, Node, NodeJson, Output, OutputData,
    Result, Socket,
};
use serde_json::Value;

/// Provides the choices of a select node
#[async_trait]
pub trait OptionsSource: Send + Sync {
    async fn options(&self) -> Result<Vec<String>>;
}

/// A fixed list of choices
#[derive(Debug, Clone, Default)]
pub struct StaticOptions(pub Vec<String>);

#[async_trait]
impl OptionsSource for StaticOptions {
    async fn options(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Select input component
///
/// # Data
/// - `selected` - the chosen option; set to the first option when the node
///   is built without one
///
/// # Outputs
/// - `selected` - the chosen option as text
pub struct SelectComponent {
    socket: Socket,
    source: Arc<dyn OptionsSource>,
}

impl SelectComponent {
    pub const KIND: &'static str = "Select";
    pub const KEY: &'static str = "selected";

    pub fn new(socket: Socket, source: Arc<dyn OptionsSource>) -> Self {
        Self { socket, source }
    }
}

#[async_trait]
impl Component for SelectComponent {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn build(&self, node: &mut Node) -> Result<()> {
        let options = self.source.options().await?;
        if options.is_empty() {
            return Err(FlowError::failed("Select needs at least one option"));
        }
        if !node.data.contains_key(Self::KEY) {
            node.data
                .insert(Self::KEY.to_string(), Value::from(options[0].clone()));
        }

        node.add_control(Control::new(Self::KEY).with_prop("options", Value::from(options)))?
            .add_output(Output::new(Self::KEY, self.socket.clone()))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: &NodeJson,
        _inputs: &InputData,
        outputs: &mut OutputData,
        _args: &[Value],
    ) -> Result<()> {
        match node.data.get(Self::KEY) {
            Some(Value::String(choice)) => set_output(outputs, 0, Value::from(choice.as_str())),
            _ => Err(FlowError::failed(format!(
                "Select node {} has no selection",
                node.id
            ))),
        }
    }
}
