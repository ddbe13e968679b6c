//! Text input
//!
//! Emits the string stored in the node's data under `text`.

use async_trait::async_trait;
use flow_engine::{
    set_output, Component, Control, InputData, Node, NodeJson, Output, OutputData, Result, Socket,
};
use serde_json::Value;

/// Text input component
///
/// # Data
/// - `text` (optional) - the string to emit; missing means empty
///
/// # Outputs
/// - `text` - the string
pub struct TextComponent {
    socket: Socket,
}

impl TextComponent {
    pub const KIND: &'static str = "Text";
    pub const KEY: &'static str = "text";

    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Component for TextComponent {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn build(&self, node: &mut Node) -> Result<()> {
        node.add_control(Control::new(Self::KEY).with_prop("type", Value::from("text")))?
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
        let text = match node.data.get(Self::KEY) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        log::debug!("Text node {}: emitting {} chars", node.id, text.len());
        set_output(outputs, 0, Value::String(text))
    }
}
