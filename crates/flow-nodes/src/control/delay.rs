//! Delay
//!
//! Forwards its input after waiting. Mostly useful to exercise abort: a
//! delay node keeps the run busy while the caller decides to stop it.

use std::time::Duration;

use async_trait::async_trait;
use flow_engine::{
    set_output, Component, Input, InputData, Node, NodeJson, Output, OutputData, Result, Socket,
};
use serde_json::Value;

/// Delay component
///
/// # Data
/// - `ms` - how long to wait, in milliseconds (defaults to 0)
///
/// # Inputs
/// - `value` - forwarded unchanged; null when unconnected
///
/// # Outputs
/// - `value`
pub struct DelayComponent {
    socket: Socket,
}

impl DelayComponent {
    pub const KIND: &'static str = "Delay";
    pub const PORT_VALUE: &'static str = "value";
    pub const KEY_MS: &'static str = "ms";

    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Component for DelayComponent {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn build(&self, node: &mut Node) -> Result<()> {
        node.add_input(Input::new(Self::PORT_VALUE, self.socket.clone()))?
            .add_output(Output::new(Self::PORT_VALUE, self.socket.clone()))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: &NodeJson,
        inputs: &InputData,
        outputs: &mut OutputData,
        _args: &[Value],
    ) -> Result<()> {
        let ms = node
            .data
            .get(Self::KEY_MS)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if ms > 0 {
            log::debug!("Delay node {}: waiting {}ms", node.id, ms);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let value = inputs
            .first()
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or(Value::Null);
        set_output(outputs, 0, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::NodeId;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_waits_then_forwards() {
        let component = DelayComponent::new(Socket::new("any", "Any", ""));
        let mut node = Node::new(NodeId(1), DelayComponent::KIND);
        node.data.insert("ms".to_string(), json!(500));
        let json = node.to_json();

        let start = tokio::time::Instant::now();
        let mut outputs = vec![Value::Null];
        component
            .worker(&json, &vec![vec![json!({"k": 1})]], &mut outputs, &[])
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(outputs[0], json!({"k": 1}));
    }
}
