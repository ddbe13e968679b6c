//! Add
//!
//! Sums two numbers. An unconnected input falls back to the value its
//! embedded control stores in the node's data.

use async_trait::async_trait;
use flow_engine::{
    set_output, Component, Control, FlowError, Input, InputData, Node, NodeJson, Output,
    OutputData, Result, Socket,
};
use serde_json::Value;

/// Add component
///
/// # Inputs
/// - `num1`, `num2` - the operands; each falls back to `data[key]`, then 0
///
/// # Outputs
/// - `num` - the sum
pub struct AddComponent {
    socket: Socket,
}

impl AddComponent {
    pub const KIND: &'static str = "Add";
    pub const PORT_A: &'static str = "num1";
    pub const PORT_B: &'static str = "num2";
    pub const PORT_SUM: &'static str = "num";

    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }

    fn operand(node: &NodeJson, inputs: &InputData, index: usize, key: &str) -> Result<f64> {
        let value = inputs
            .get(index)
            .and_then(|values| values.first())
            .or_else(|| node.data.get(key));
        match value {
            None | Some(Value::Null) => Ok(0.0),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| FlowError::failed(format!("'{}' is not a number: {}", key, v))),
        }
    }
}

#[async_trait]
impl Component for AddComponent {
    fn name(&self) -> &str {
        Self::KIND
    }

    async fn build(&self, node: &mut Node) -> Result<()> {
        node.add_input(
            Input::new(Self::PORT_A, self.socket.clone()).with_control(Control::new(Self::PORT_A)),
        )?
        .add_input(
            Input::new(Self::PORT_B, self.socket.clone()).with_control(Control::new(Self::PORT_B)),
        )?
        .add_output(Output::new(Self::PORT_SUM, self.socket.clone()))?;
        Ok(())
    }

    async fn worker(
        &self,
        node: &NodeJson,
        inputs: &InputData,
        outputs: &mut OutputData,
        _args: &[Value],
    ) -> Result<()> {
        let a = Self::operand(node, inputs, 0, Self::PORT_A)?;
        let b = Self::operand(node, inputs, 1, Self::PORT_B)?;
        set_output(outputs, 0, Value::from(a + b))
    }
}
