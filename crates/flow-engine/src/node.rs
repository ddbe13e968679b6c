//! Graph vertices
//!
//! A [`Node`] owns its inputs, outputs and controls. Slots are addressed by
//! position, so each slot records its own [`IoRef`] once it is added.

use crate::constants::defaults;
use crate::error::{ContractViolation, Result};
use crate::io::{Connection, Control, Input, Io, Output};
use crate::registry::Component;
use crate::snapshot::{InputJson, InputLink, NodeJson, OutputJson, OutputLink};
use crate::types::{Block, DataMap, GroupId, IdCounter, IoRef, NodeId, Position};

/// A node in the live editor graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Kind name, used to resolve the node's component
    pub title: String,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    /// Kind-specific payload
    pub data: DataMap,
    /// Owning group, kept in sync by the editor
    pub group: Option<GroupId>,
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<Output>,
    pub(crate) controls: Vec<Control>,
}

impl Node {
    pub fn new(id: NodeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            position: (0.0, 0.0),
            width: defaults::NODE_WIDTH,
            height: defaults::NODE_HEIGHT,
            data: DataMap::new(),
            group: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            controls: Vec::new(),
        }
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn input(&self, index: usize) -> Option<&Input> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&Output> {
        self.outputs.get(index)
    }

    /// Append an input
    pub fn add_input(&mut self, input: Input) -> Result<&mut Self> {
        let len = self.inputs.len();
        self.insert_input(len, input)
    }

    /// Insert an input at `index` (`index <= len`)
    pub fn insert_input(&mut self, index: usize, input: Input) -> Result<&mut Self> {
        self.check_slot(index, self.inputs.len(), input.title(), input.owner())?;
        self.inputs.insert(index, input);
        let id = self.id;
        for (i, slot) in self.inputs.iter_mut().enumerate() {
            slot.owner = Some(IoRef::new(id, i));
        }
        Ok(self)
    }

    /// Append an output
    pub fn add_output(&mut self, output: Output) -> Result<&mut Self> {
        let len = self.outputs.len();
        self.insert_output(len, output)
    }

    /// Insert an output at `index` (`index <= len`)
    pub fn insert_output(&mut self, index: usize, output: Output) -> Result<&mut Self> {
        self.check_slot(index, self.outputs.len(), output.title(), output.owner())?;
        self.outputs.insert(index, output);
        let id = self.id;
        for (i, slot) in self.outputs.iter_mut().enumerate() {
            slot.owner = Some(IoRef::new(id, i));
        }
        Ok(self)
    }

    pub fn add_control(&mut self, control: Control) -> Result<&mut Self> {
        let len = self.controls.len();
        self.insert_control(len, control)
    }

    pub fn insert_control(&mut self, index: usize, control: Control) -> Result<&mut Self> {
        if index > self.controls.len() {
            return Err(ContractViolation::SlotIndexOutOfRange {
                index,
                len: self.controls.len(),
            }
            .into());
        }
        self.controls.insert(index, control);
        Ok(self)
    }

    fn check_slot(
        &self,
        index: usize,
        len: usize,
        title: &str,
        owner: Option<IoRef>,
    ) -> Result<()> {
        if let Some(owner) = owner {
            return Err(ContractViolation::IoAlreadyOwned {
                title: title.to_string(),
                owner: owner.node,
            }
            .into());
        }
        if index > len {
            return Err(ContractViolation::SlotIndexOutOfRange { index, len }.into());
        }
        // Shifting slots would invalidate the addresses stored in connections
        if index < len && self.has_connections() {
            return Err(ContractViolation::ConnectedSlots(self.id).into());
        }
        Ok(())
    }

    pub fn has_connections(&self) -> bool {
        self.inputs.iter().any(Io::has_connection) || self.outputs.iter().any(Io::has_connection)
    }

    /// Every connection touching this node, each listed once
    pub fn connections(&self) -> Vec<Connection> {
        let mut all: Vec<Connection> = Vec::new();
        let slots = self
            .outputs
            .iter()
            .flat_map(|o| o.connections.iter())
            .chain(self.inputs.iter().flat_map(|i| i.connections.iter()));
        for connection in slots {
            if !all.contains(connection) {
                all.push(*connection);
            }
        }
        all
    }

    /// Copy of this node with every connection stripped
    pub fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.strip_connections();
        copy
    }

    pub(crate) fn strip_connections(&mut self) {
        for input in &mut self.inputs {
            input.connections.clear();
        }
        for output in &mut self.outputs {
            output.connections.clear();
        }
    }

    /// Borrow one output and one input of this node at the same time
    pub(crate) fn split_io_mut(
        &mut self,
        output: usize,
        input: usize,
    ) -> Option<(&mut Output, &mut Input)> {
        let out = self.outputs.get_mut(output)?;
        let inp = self.inputs.get_mut(input)?;
        Some((out, inp))
    }

    pub fn to_json(&self) -> NodeJson {
        NodeJson {
            id: self.id,
            data: self.data.clone(),
            group: self.group,
            inputs: self
                .inputs
                .iter()
                .map(|input| InputJson {
                    connections: input
                        .connections
                        .iter()
                        .map(|c| InputLink {
                            node: c.output.node,
                            output: c.output.index,
                        })
                        .collect(),
                })
                .collect(),
            outputs: self
                .outputs
                .iter()
                .map(|output| OutputJson {
                    connections: output
                        .connections
                        .iter()
                        .map(|c| OutputLink {
                            node: c.input.node,
                            input: c.input.index,
                        })
                        .collect(),
                })
                .collect(),
            position: self.position,
            title: self.title.clone(),
        }
    }

    /// Rebuild a node from its serialized form
    ///
    /// Connections are not restored here; the caller wires them once every
    /// node exists. `ids` is advanced past the restored id.
    pub async fn from_json(
        json: &NodeJson,
        component: &dyn Component,
        ids: &IdCounter,
    ) -> Result<Self> {
        let mut node = Self::new(json.id, json.title.clone());
        node.data = json.data.clone();
        node.position = json.position;
        node.group = json.group;
        ids.advance_past(json.id.0);

        component.build(&mut node).await?;
        Ok(node)
    }
}

impl Block for Node {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}
