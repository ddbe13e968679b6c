//! Vetoable publish/subscribe bus for editor events
//!
//! The channel set is fixed. Handlers receive the event and a `persistent`
//! flag that is false while the editor replays a load, so handlers that
//! would prompt a user can stay quiet. Structural events can be vetoed by
//! returning [`Verdict::Veto`]; every handler still runs.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{FlowError, Result};
use crate::groups::Group;
use crate::io::Connection;
use crate::node::Node;
use crate::types::{IoRef, Transform};

/// A handler's answer to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Veto,
}

/// Declared event channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    NodeCreate,
    GroupCreate,
    ConnectionCreate,
    NodeRemove,
    GroupRemove,
    ConnectionRemove,
    NodeSelect,
    GroupSelect,
    Error,
    Change,
    Transform,
}

impl EventName {
    pub const ALL: [EventName; 11] = [
        Self::NodeCreate,
        Self::GroupCreate,
        Self::ConnectionCreate,
        Self::NodeRemove,
        Self::GroupRemove,
        Self::ConnectionRemove,
        Self::NodeSelect,
        Self::GroupSelect,
        Self::Error,
        Self::Change,
        Self::Transform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeCreate => "nodecreate",
            Self::GroupCreate => "groupcreate",
            Self::ConnectionCreate => "connectioncreate",
            Self::NodeRemove => "noderemove",
            Self::GroupRemove => "groupremove",
            Self::ConnectionRemove => "connectionremove",
            Self::NodeSelect => "nodeselect",
            Self::GroupSelect => "groupselect",
            Self::Error => "error",
            Self::Change => "change",
            Self::Transform => "transform",
        }
    }
}

impl FromStr for EventName {
    type Err = FlowError;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == name)
            .ok_or_else(|| FlowError::UnknownEvent(name.to_string()))
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payloads
#[derive(Debug, Clone, Copy)]
pub enum EditorEvent<'a> {
    NodeCreate(&'a Node),
    GroupCreate(&'a Group),
    ConnectionCreate { output: IoRef, input: IoRef },
    NodeRemove(&'a Node),
    GroupRemove(&'a Group),
    ConnectionRemove(Connection),
    NodeSelect(&'a Node),
    GroupSelect(&'a Group),
    Error(&'a FlowError),
    Change,
    Transform(Transform),
}

impl EditorEvent<'_> {
    pub fn name(&self) -> EventName {
        match self {
            Self::NodeCreate(_) => EventName::NodeCreate,
            Self::GroupCreate(_) => EventName::GroupCreate,
            Self::ConnectionCreate { .. } => EventName::ConnectionCreate,
            Self::NodeRemove(_) => EventName::NodeRemove,
            Self::GroupRemove(_) => EventName::GroupRemove,
            Self::ConnectionRemove(_) => EventName::ConnectionRemove,
            Self::NodeSelect(_) => EventName::NodeSelect,
            Self::GroupSelect(_) => EventName::GroupSelect,
            Self::Error(_) => EventName::Error,
            Self::Change => EventName::Change,
            Self::Transform(_) => EventName::Transform,
        }
    }
}

/// Event handler: `(event, persistent)`
pub type Handler = Arc<dyn Fn(&EditorEvent<'_>, bool) -> Verdict + Send + Sync>;

pub struct EventListener {
    handlers: HashMap<EventName, Vec<Handler>>,
    persistent: bool,
}

impl EventListener {
    pub fn new() -> Self {
        Self {
            handlers: EventName::ALL.into_iter().map(|n| (n, Vec::new())).collect(),
            persistent: true,
        }
    }

    /// Subscribe `handler` to a whitespace-separated list of event names
    ///
    /// Fails without registering anything if one of the names is unknown.
    pub fn on<F>(&mut self, names: &str, handler: F) -> Result<()>
    where
        F: Fn(&EditorEvent<'_>, bool) -> Verdict + Send + Sync + 'static,
    {
        let names = names
            .split_whitespace()
            .map(EventName::from_str)
            .collect::<Result<Vec<_>>>()?;
        let handler: Handler = Arc::new(handler);
        for name in names {
            self.handlers
                .entry(name)
                .or_default()
                .push(Arc::clone(&handler));
        }
        Ok(())
    }

    /// Run every handler for the event
    ///
    /// Returns false if any handler vetoed.
    pub fn trigger(&self, event: &EditorEvent<'_>) -> bool {
        let Some(handlers) = self.handlers.get(&event.name()) else {
            return true;
        };
        handlers.iter().fold(true, |proceed, handler| {
            let verdict = handler(event, self.persistent);
            verdict == Verdict::Proceed && proceed
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    /// Number of handlers subscribed to `name`
    pub fn handler_count(&self, name: EventName) -> usize {
        self.handlers.get(&name).map_or(0, Vec::len)
    }
}

impl Default for EventListener {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListener")
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}
