//! Error types for the flow engine
//!
//! Four kinds of failure are kept apart so callers can tell them apart:
//!
//! - validation errors (bad snapshot, unknown kind, incompatible sockets)
//! - contract violations (programming errors, never silently corrected)
//! - worker failures (recovered by the engine, reported through events)
//! - policy vetoes, which are not errors at all and never appear here

use thiserror::Error;

use crate::types::{IoRef, NodeId};

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur in the editor core or the engine
#[derive(Debug, Error)]
pub enum FlowError {
    /// Snapshot or graph validation failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A connection could not be created
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// An API contract was broken by the caller or a component
    #[error(transparent)]
    Contract(#[from] ContractViolation),

    /// Raised by a component builder or worker
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A worker failed during evaluation (recovered by the engine)
    #[error("Worker for node {node} ('{kind}') failed: {message}")]
    Worker {
        node: NodeId,
        kind: String,
        message: String,
    },

    /// Node lookup failed
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    /// Event name is not one of the declared channels
    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`FlowError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Contract,
    Worker,
    Lookup,
    Io,
}

impl FlowError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Connect(_) => ErrorKind::Validation,
            Self::Contract(_) => ErrorKind::Contract,
            Self::ExecutionFailed(_) | Self::Worker { .. } => ErrorKind::Worker,
            Self::NodeNotFound(_) | Self::UnknownEvent(_) => ErrorKind::Lookup,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Validation failures: bad input data, graph state is left unchanged
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Identifier is not of the form `name@MAJOR.MINOR.PATCH`
    #[error("Malformed identifier '{0}'")]
    MalformedId(String),

    /// Snapshot identifier does not match the editor/engine identifier
    #[error("Snapshot identifier rejected: {}", join_mismatches(.0))]
    SnapshotId(Vec<IdMismatch>),

    /// No component is registered for a node's kind
    #[error("Unknown node kind '{kind}' for node {node}")]
    UnknownKind { node: NodeId, kind: String },

    /// A link points at a missing node or slot
    #[error("Node {node} has a link to missing slot {slot} on node {remote}")]
    DanglingLink {
        node: NodeId,
        remote: NodeId,
        slot: usize,
    },

    /// A link is recorded on one end only
    #[error(
        "Link from node {from} output {output} to node {to} input {input} is missing its other end"
    )]
    UnmatchedLink {
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    },

    /// A node declares fewer slots than its component builds
    #[error(
        "Node {node} ('{kind}') declares {inputs} inputs and {outputs} outputs, \
         its component needs {built_inputs} and {built_outputs}"
    )]
    MissingSlots {
        node: NodeId,
        kind: String,
        inputs: usize,
        outputs: usize,
        built_inputs: usize,
        built_outputs: usize,
    },

    /// The graph contains a cycle
    #[error("Cycle detected in graph")]
    CycleDetected,
}

/// One reason a snapshot identifier was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdMismatch {
    /// The snapshot identifier is malformed
    Malformed(String),
    /// Names differ
    Name { expected: String, found: String },
    /// Versions differ
    Version { expected: String, found: String },
}

impl std::fmt::Display for IdMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(id) => write!(f, "id '{}' is not valid", id),
            Self::Name { expected, found } => {
                write!(f, "name '{}' does not match '{}'", found, expected)
            }
            Self::Version { expected, found } => {
                write!(f, "version '{}' does not match '{}'", found, expected)
            }
        }
    }
}

fn join_mismatches(mismatches: &[IdMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reasons `Output::connect_to` refuses to create a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Sockets not compatible: '{output}' cannot feed '{input}'")]
    IncompatibleSockets { output: String, input: String },

    #[error("Input already connected")]
    InputAlreadyConnected,

    #[error("Output already connected")]
    OutputAlreadyConnected,

    /// The slot is not attached to a node yet
    #[error("Slot '{0}' does not belong to a node")]
    DetachedSlot(String),

    /// No slot at this address
    #[error("No slot at node {} index {}", .0.node, .0.index)]
    SlotNotFound(IoRef),
}

/// Programming errors: these propagate and are never swallowed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("Slot '{title}' already belongs to node {owner}")]
    IoAlreadyOwned { title: String, owner: NodeId },

    #[error("Slot index {index} out of range (len {len})")]
    SlotIndexOutOfRange { index: usize, len: usize },

    #[error("Cannot insert slots before connected slots on node {0}")]
    ConnectedSlots(NodeId),

    #[error("Slot '{0}' does not accept more connections")]
    MultiplicityExceeded(String),

    #[error("Node {node} produced {produced} output slots, expected {expected}")]
    OutputCountMismatch {
        node: NodeId,
        expected: usize,
        produced: usize,
    },
}
