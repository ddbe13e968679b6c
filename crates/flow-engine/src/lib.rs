//! Flow Engine - node graph editing and dataflow evaluation
//!
//! This crate provides the model, editor core and evaluation engine for
//! visual node programming. It supports:
//!
//! - Typed sockets with explicit compatibility sets
//! - Vetoable editor events and bounded undo/redo
//! - Groups that track the nodes they visually cover
//! - Portable JSON snapshots with identifier checking
//! - Async, memoized, abortable evaluation of snapshots
//!
//! # Architecture
//!
//! The editor and the engine never share live state. The editor edits a
//! graph of [`Node`]s and serializes it to a [`Snapshot`]; the engine
//! evaluates snapshots with [`Component`] workers looked up by node kind.
//!
//! - [`GraphEditor`]: live graph, history, selection and events
//! - [`Engine`]: one evaluation at a time, abortable from any task
//! - [`ComponentRegistry`]: kind name to builder and worker
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{Engine, GraphEditor};
//!
//! let mut editor = GraphEditor::new("demo@0.1.0", registry.clone())?;
//! let node = editor.create_node("Number").await?;
//! editor.add_node(node, true);
//!
//! let engine = Engine::new("demo@0.1.0", registry)?;
//! let result = engine.process(&editor.to_json(), None, &[]).await?;
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod diff;
pub mod editor;
pub mod engine;
pub mod error;
pub mod events;
pub mod groups;
pub mod io;
pub mod listener;
pub mod node;
pub mod registry;
pub mod selection;
pub mod snapshot;
pub mod socket;
pub mod types;
pub mod undo;
pub mod validation;

// Re-export key types
pub use builder::SnapshotBuilder;
pub use config::EditorConfig;
pub use diff::{compare, compare_snapshots, Diff};
pub use editor::{EditorCommand, EditorKey, GraphEditor};
pub use engine::{AbortHandle, Engine, EngineState, ProcessResult, ProcessStatus};
pub use error::{
    ConnectError, ContractViolation, ErrorKind, FlowError, IdMismatch, Result, ValidationError,
};
pub use events::{EngineEvent, EventSink, NullEventSink, VecEventSink};
pub use groups::Group;
pub use io::{Connection, Control, Input, Io, Output};
pub use listener::{EditorEvent, EventListener, EventName, Verdict};
pub use node::Node;
pub use registry::{
    set_output, CallbackComponent, Component, ComponentRegistry, InputData, OutputData,
};
pub use selection::{Selected, Selection};
pub use snapshot::{NodeJson, Snapshot, SnapshotId};
pub use socket::Socket;
pub use types::{GroupId, IoRef, NodeId, Position, Transform};
pub use undo::History;
pub use validation::{ensure_links_matched, ensure_valid, validate_snapshot};
