//! Join
//!
//! Combines every value connected to its multi-connection input into one
//! string. Useful for collecting the results of parallel branches.

use async_trait::async_trait;
use flow_engine::{
    set_output, Component, Input, InputData, Node, NodeJson, Output, OutputData, Result, Socket,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-node settings, read from the node's data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinConfig {
    /// Separator to use when joining inputs
    pub separator: String,
    /// Whether to filter out empty inputs
    pub filter_empty: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            filter_empty: true,
        }
    }
}

impl JoinConfig {
    /// Read the settings from node data; unknown keys are ignored
    pub fn from_node(node: &NodeJson) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(node.data.clone()))?)
    }
}

/// Join component
///
/// # Inputs
/// - `inputs` (multiple) - values to join; non-strings are rendered as JSON
///
/// # Outputs
/// - `joined` - combined string
/// - `count` - number of values joined
pub struct JoinComponent {
    text: Socket,
    number: Socket,
}

impl JoinComponent {
    pub const KIND: &'static str = "Join";
    pub const PORT_INPUTS: &'static str = "inputs";
    pub const PORT_JOINED: &'static str = "joined";
    pub const PORT_COUNT: &'static str = "count";

    pub fn new(text: Socket, number: Socket) -> Self {
        Self { text, number }
    }
}

#[async_trait]
impl Component for JoinComponent {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn build(&self, node: &mut Node) -> Result<()> {
        node.add_input(Input::new(Self::PORT_INPUTS, self.text.clone()).multiple())?
            .add_output(Output::new(Self::PORT_JOINED, self.text.clone()))?
            .add_output(Output::new(Self::PORT_COUNT, self.number.clone()))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: &NodeJson,
        inputs: &InputData,
        outputs: &mut OutputData,
        _args: &[Value],
    ) -> Result<()> {
        let config = JoinConfig::from_node(node)?;

        let parts: Vec<String> = inputs
            .first()
            .map(|values| {
                values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .filter(|s| !config.filter_empty || !s.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let joined = parts.join(&config.separator);
        log::debug!(
            "Join node {}: joined {} inputs into {} chars",
            node.id,
            parts.len(),
            joined.len()
        );

        set_output(outputs, 0, Value::String(joined))?;
        set_output(outputs, 1, Value::from(parts.len()))
    }
}
