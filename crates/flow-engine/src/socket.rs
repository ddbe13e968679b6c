//! Sockets: typed connection-point identities
//!
//! Two sockets are compatible when they are the same socket, or when the
//! output's socket has explicitly registered the input's socket with
//! [`Socket::combine_with`]. Registration is one-directional.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Debug)]
struct SocketInner {
    id: String,
    name: String,
    hint: String,
    compatible: RwLock<HashSet<String>>,
}

/// Shared socket handle
///
/// Clones share the same compatibility set, so a socket can be handed to
/// many slots and combined later.
#[derive(Debug, Clone)]
pub struct Socket {
    inner: Arc<SocketInner>,
}

impl Socket {
    pub fn new(id: impl Into<String>, name: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                id: id.into(),
                name: name.into(),
                hint: hint.into(),
                compatible: RwLock::new(HashSet::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn hint(&self) -> &str {
        &self.inner.hint
    }

    /// Allow this socket to feed `other`
    pub fn combine_with(&self, other: &Socket) {
        self.inner.compatible.write().insert(other.id().to_string());
    }

    /// True if identical to `other` or `other` was registered via `combine_with`
    pub fn compatible_with(&self, other: &Socket) -> bool {
        self.id() == other.id() || self.inner.compatible.read().contains(other.id())
    }
}

impl PartialEq for Socket {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Socket {}
