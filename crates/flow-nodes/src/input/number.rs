//! Number input
//!
//! Emits the number stored in the node's data under `num`.

use async_trait::async_trait;
use flow_engine::{
    set_output, Component, Control, FlowError, InputData, Node, NodeJson, Output, OutputData,
    Result, Socket,
};
use serde_json::Value;

/// Number input component
///
/// # Data
/// - `num` - the value to emit (defaults to 0)
///
/// # Outputs
/// - `num` - the number
pub struct NumberComponent {
    socket: Socket,
}

impl NumberComponent {
    pub const KIND: &'static str = "Number";
    /// Data key and output title
    pub const KEY: &'static str = "num";

    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Component for NumberComponent {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn build(&self, node: &mut Node) -> Result<()> {
        node.add_control(Control::new(Self::KEY).with_prop("type", Value::from("number")))?
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
        let value = match node.data.get(Self::KEY) {
            None | Some(Value::Null) => Value::from(0),
            Some(v @ Value::Number(_)) => v.clone(),
            Some(other) => {
                return Err(FlowError::failed(format!(
                    "'{}' is not a number: {}",
                    Self::KEY,
                    other
                )))
            }
        };
        set_output(outputs, 0, value)
    }
}
