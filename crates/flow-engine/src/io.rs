//! Input/output slots, controls and connections
//!
//! A [`Connection`] is a plain value naming one output slot and one input
//! slot. Both slots keep a copy in their connection list; the editor keeps
//! the two sides in sync.

use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, ContractViolation};
use crate::node::Node;
use crate::socket::Socket;
use crate::types::{DataMap, IoRef};

/// Behaviour shared by inputs and outputs
pub trait Io {
    fn title(&self) -> &str;

    fn socket(&self) -> &Socket;

    /// Whether the slot accepts more than one connection
    fn is_multiple(&self) -> bool;

    fn connections(&self) -> &[Connection];

    /// Address of this slot, once it belongs to a node
    fn owner(&self) -> Option<IoRef>;

    fn has_connection(&self) -> bool {
        !self.connections().is_empty()
    }

    /// True if the multiplicity limit leaves room for another connection
    fn accepts_connection(&self) -> bool {
        self.is_multiple() || !self.has_connection()
    }
}

/// Embedded editable widget, opaque to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub key: String,
    #[serde(default)]
    pub props: DataMap,
}

impl Control {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            props: DataMap::new(),
        }
    }

    /// Set a widget property
    pub fn with_prop(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }
}

/// Edge linking exactly one output to one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub output: IoRef,
    pub input: IoRef,
}

impl Connection {
    /// Create a connection and register it on `input`
    ///
    /// The output side is appended by the caller (see [`Output::connect_to`]).
    pub fn attach(output: IoRef, input: &mut Input) -> std::result::Result<Self, ConnectError> {
        let owner = input
            .owner
            .ok_or_else(|| ConnectError::DetachedSlot(input.title.clone()))?;
        let connection = Self {
            output,
            input: owner,
        };
        input
            .add_connection(connection)
            .map_err(|_| ConnectError::InputAlreadyConnected)?;
        Ok(connection)
    }

    /// Detach from both endpoints
    ///
    /// Removing a connection that is already gone is a no-op.
    pub fn remove(&self, nodes: &mut [Node]) {
        if let Some(output) = nodes
            .iter_mut()
            .find(|n| n.id == self.output.node)
            .and_then(|n| n.outputs.get_mut(self.output.index))
        {
            output.connections.retain(|c| c != self);
        }
        if let Some(input) = nodes
            .iter_mut()
            .find(|n| n.id == self.input.node)
            .and_then(|n| n.inputs.get_mut(self.input.index))
        {
            input.connections.retain(|c| c != self);
        }
    }

    /// True if either end sits on `node`
    pub fn touches(&self, node: crate::types::NodeId) -> bool {
        self.output.node == node || self.input.node == node
    }
}

/// Inbound slot on a node
#[derive(Debug, Clone)]
pub struct Input {
    title: String,
    socket: Socket,
    multiple: bool,
    pub(crate) connections: Vec<Connection>,
    control: Option<Control>,
    pub(crate) owner: Option<IoRef>,
}

impl Input {
    /// Create a single-connection input
    pub fn new(title: impl Into<String>, socket: Socket) -> Self {
        Self {
            title: title.into(),
            socket,
            multiple: false,
            connections: Vec::new(),
            control: None,
            owner: None,
        }
    }

    /// Accept any number of connections
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Attach an editable control (shown while the input is unconnected)
    pub fn with_control(mut self, control: Control) -> Self {
        self.control = Some(control);
        self
    }

    pub fn control(&self) -> Option<&Control> {
        self.control.as_ref()
    }

    /// The control, if it should currently be shown
    pub fn active_control(&self) -> Option<&Control> {
        if self.has_connection() {
            None
        } else {
            self.control.as_ref()
        }
    }

    /// Register a connection, respecting the multiplicity limit
    pub fn add_connection(
        &mut self,
        connection: Connection,
    ) -> std::result::Result<(), ContractViolation> {
        if !self.accepts_connection() {
            return Err(ContractViolation::MultiplicityExceeded(self.title.clone()));
        }
        self.connections.push(connection);
        Ok(())
    }
}

impl Io for Input {
    fn title(&self) -> &str {
        &self.title
    }

    fn socket(&self) -> &Socket {
        &self.socket
    }

    fn is_multiple(&self) -> bool {
        self.multiple
    }

    fn connections(&self) -> &[Connection] {
        &self.connections
    }

    fn owner(&self) -> Option<IoRef> {
        self.owner
    }
}

/// Outbound slot on a node
#[derive(Debug, Clone)]
pub struct Output {
    title: String,
    socket: Socket,
    multiple: bool,
    pub(crate) connections: Vec<Connection>,
    pub(crate) owner: Option<IoRef>,
}

impl Output {
    /// Create an output that can feed any number of inputs
    pub fn new(title: impl Into<String>, socket: Socket) -> Self {
        Self {
            title: title.into(),
            socket,
            multiple: true,
            connections: Vec::new(),
            owner: None,
        }
    }

    /// Restrict this output to one connection
    pub fn single(mut self) -> Self {
        self.multiple = false;
        self
    }

    /// Connect this output to `input`
    ///
    /// Checks socket compatibility, then the input's occupancy, then this
    /// output's occupancy. Nothing is mutated unless every check passes.
    pub fn connect_to(&mut self, input: &mut Input) -> std::result::Result<Connection, ConnectError> {
        if !self.socket.compatible_with(&input.socket) {
            return Err(ConnectError::IncompatibleSockets {
                output: self.socket.id().to_string(),
                input: input.socket.id().to_string(),
            });
        }
        if !input.accepts_connection() {
            return Err(ConnectError::InputAlreadyConnected);
        }
        if !self.accepts_connection() {
            return Err(ConnectError::OutputAlreadyConnected);
        }
        let output = self
            .owner
            .ok_or_else(|| ConnectError::DetachedSlot(self.title.clone()))?;

        let connection = Connection::attach(output, input)?;
        self.connections.push(connection);
        Ok(connection)
    }
}

impl Io for Output {
    fn title(&self) -> &str {
        &self.title
    }

    fn socket(&self) -> &Socket {
        &self.socket
    }

    fn is_multiple(&self) -> bool {
        self.multiple
    }

    fn connections(&self) -> &[Connection] {
        &self.connections
    }

    fn owner(&self) -> Option<IoRef> {
        self.owner
    }
}
