//! Graph editor core
//!
//! [`GraphEditor`] owns the live nodes and groups and exposes every
//! structural mutation. Each one follows the same sequence:
//!
//! 1. fire the vetoable event (`nodecreate`, `connectionremove`, ...)
//! 2. mutate the graph
//! 3. fire `change`
//! 4. record the action and its inverse in [`History`]
//!
//! Undo and redo replay recorded commands through the same API with the
//! history locked, so replays fire events but are never recorded twice.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::config::EditorConfig;
use crate::constants::defaults;
use crate::error::{ConnectError, FlowError, Result, ValidationError};
use crate::groups::Group;
use crate::io::{Connection, Input, Output};
use crate::listener::{EditorEvent, EventListener, Verdict};
use crate::node::Node;
use crate::registry::ComponentRegistry;
use crate::selection::{Selected, Selection};
use crate::snapshot::{Snapshot, SnapshotId};
use crate::types::{Block, GroupId, IdCounter, IoRef, NodeId, Position, Transform};
use crate::undo::History;
use crate::validation;

/// Keyboard shortcuts understood by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    /// Remove the selected nodes and groups
    Delete,
    /// Wrap the selected nodes in a new group
    GroupSelection,
    Undo,
    Redo,
}

/// A recorded editor action with its captured arguments
#[derive(Debug, Clone)]
pub enum EditorCommand {
    /// Re-add a node, then restore its links and group membership
    AddNode {
        node: Node,
        links: Vec<Connection>,
        group: Option<GroupId>,
    },
    RemoveNode(NodeId),
    Connect(Connection),
    RemoveConnection(Connection),
    AddGroup(Group),
    RemoveGroup(GroupId),
}

/// Live, editable graph
pub struct GraphEditor {
    id: SnapshotId,
    config: EditorConfig,
    registry: Arc<ComponentRegistry>,
    nodes: Vec<Node>,
    groups: Vec<Group>,
    selection: Selection,
    history: History<EditorCommand>,
    listener: EventListener,
    node_ids: IdCounter,
    group_ids: IdCounter,
    pointer: Position,
    transform: Transform,
}

impl GraphEditor {
    /// Create an empty editor for snapshots identified by `id`
    pub fn new(id: &str, registry: Arc<ComponentRegistry>) -> Result<Self> {
        Self::with_config(id, registry, EditorConfig::default())
    }

    pub fn with_config(
        id: &str,
        registry: Arc<ComponentRegistry>,
        config: EditorConfig,
    ) -> Result<Self> {
        Ok(Self {
            id: SnapshotId::parse(id)?,
            history: History::new(config.history_limit),
            config,
            registry,
            nodes: Vec::new(),
            groups: Vec::new(),
            selection: Selection::new(),
            listener: EventListener::new(),
            node_ids: IdCounter::new(),
            group_ids: IdCounter::new(),
            pointer: (0.0, 0.0),
            transform: Transform::default(),
        })
    }

    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &History<EditorCommand> {
        &self.history
    }

    pub fn pointer(&self) -> Position {
        self.pointer
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Subscribe to editor events; see [`EventListener::on`]
    pub fn on<F>(&mut self, names: &str, handler: F) -> Result<()>
    where
        F: Fn(&EditorEvent<'_>, bool) -> Verdict + Send + Sync + 'static,
    {
        self.listener.on(names, handler)
    }

    fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn group_index(&self, id: GroupId) -> Option<usize> {
        self.groups.iter().position(|g| g.id == id)
    }

    /// Build a detached node of `kind` with a fresh id
    ///
    /// The node still has to be added with [`add_node`](Self::add_node).
    pub async fn create_node(&self, kind: &str) -> Result<Node> {
        let id = NodeId(self.node_ids.next());
        let component = self
            .registry
            .get(kind)
            .ok_or_else(|| ValidationError::UnknownKind {
                node: id,
                kind: kind.to_string(),
            })?;

        let mut node = Node::new(id, kind);
        node.width = self.config.node_width;
        node.height = self.config.node_height;
        component.build(&mut node).await?;
        Ok(node)
    }

    /// Build a detached empty group with a fresh id
    pub fn create_group(&self, title: &str) -> Group {
        Group::with_min_size(
            GroupId(self.group_ids.next()),
            title,
            self.config.group_min_width,
            self.config.group_min_height,
        )
    }

    /// Add a node, optionally placing it at the pointer
    ///
    /// Any connections or group reference the node carries are dropped.
    /// Returns false if vetoed or if a node with the same id exists.
    pub fn add_node(&mut self, mut node: Node, at_pointer: bool) -> bool {
        if self.node_index(node.id).is_some() {
            log::warn!("Node {} is already in the graph", node.id);
            return false;
        }
        node.strip_connections();
        node.group = None;
        if at_pointer {
            node.position = self.pointer;
        }

        if !self.listener.trigger(&EditorEvent::NodeCreate(&node)) {
            log::debug!("Creation of node {} vetoed", node.id);
            return false;
        }

        let id = node.id;
        self.node_ids.advance_past(id.0);
        let record = EditorCommand::AddNode {
            node: node.clone(),
            links: Vec::new(),
            group: None,
        };
        self.nodes.push(node);

        self.listener.trigger(&EditorEvent::Change);
        self.history.add(record, EditorCommand::RemoveNode(id));
        true
    }

    /// Remove a node together with its connections
    ///
    /// Returns false if vetoed or absent. A vetoed `connectionremove` for
    /// one of the node's connections is logged and the connection is
    /// detached anyway, so no connection outlives its node.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(index) = self.node_index(id) else {
            return false;
        };
        if !self.listener.trigger(&EditorEvent::NodeRemove(&self.nodes[index])) {
            log::debug!("Removal of node {} vetoed", id);
            return false;
        }

        let node = &self.nodes[index];
        let links = node.connections();
        let group = node.group;
        let copy = node.detached();

        self.history.lock();
        for connection in &links {
            if !self.remove_connection(*connection) {
                log::warn!(
                    "Removal of connection {:?} vetoed while removing node {}; detaching it anyway",
                    connection,
                    id
                );
                connection.remove(&mut self.nodes);
            }
        }
        self.history.unlock();

        self.release(id);
        self.selection.remove(id);
        self.nodes.retain(|n| n.id != id);

        self.listener.trigger(&EditorEvent::Change);
        self.history.add(
            EditorCommand::RemoveNode(id),
            EditorCommand::AddNode {
                node: copy,
                links,
                group,
            },
        );
        true
    }

    /// Borrow an output and an input that may live on different nodes
    fn io_pair_mut(
        &mut self,
        output: IoRef,
        input: IoRef,
    ) -> std::result::Result<(&mut Output, &mut Input), ConnectError> {
        let from = self
            .node_index(output.node)
            .ok_or(ConnectError::SlotNotFound(output))?;
        let to = self
            .node_index(input.node)
            .ok_or(ConnectError::SlotNotFound(input))?;
        if output.index >= self.nodes[from].outputs.len() {
            return Err(ConnectError::SlotNotFound(output));
        }
        if input.index >= self.nodes[to].inputs.len() {
            return Err(ConnectError::SlotNotFound(input));
        }

        if from == to {
            return self.nodes[from]
                .split_io_mut(output.index, input.index)
                .ok_or(ConnectError::SlotNotFound(output));
        }

        let (source, target) = if from < to {
            let (left, right) = self.nodes.split_at_mut(to);
            (&mut left[from], &mut right[0])
        } else {
            let (left, right) = self.nodes.split_at_mut(from);
            (&mut right[0], &mut left[to])
        };

        Ok((
            &mut source.outputs[output.index],
            &mut target.inputs[input.index],
        ))
    }

    /// Connect an output slot to an input slot
    ///
    /// Returns `Ok(None)` if vetoed. A rejected connection fires `error`
    /// and leaves both slots and the history untouched.
    pub fn connect(&mut self, output: IoRef, input: IoRef) -> Result<Option<Connection>> {
        if !self
            .listener
            .trigger(&EditorEvent::ConnectionCreate { output, input })
        {
            log::debug!("Connection {:?} -> {:?} vetoed", output, input);
            return Ok(None);
        }

        let connected = self
            .io_pair_mut(output, input)
            .and_then(|(out, inp)| out.connect_to(inp))
            .map_err(FlowError::from);

        match connected {
            Ok(connection) => {
                self.listener.trigger(&EditorEvent::Change);
                self.history.add(
                    EditorCommand::Connect(connection),
                    EditorCommand::RemoveConnection(connection),
                );
                Ok(Some(connection))
            }
            Err(e) => {
                log::warn!("Cannot connect {:?} -> {:?}: {}", output, input, e);
                self.listener.trigger(&EditorEvent::Error(&e));
                Err(e)
            }
        }
    }

    fn has_connection(&self, connection: Connection) -> bool {
        self.node(connection.output.node)
            .and_then(|n| n.output(connection.output.index))
            .is_some_and(|o| o.connections.contains(&connection))
    }

    /// Detach a connection from both of its slots
    ///
    /// Returns false if vetoed or not present.
    pub fn remove_connection(&mut self, connection: Connection) -> bool {
        if !self.has_connection(connection) {
            return false;
        }
        if !self
            .listener
            .trigger(&EditorEvent::ConnectionRemove(connection))
        {
            log::debug!("Removal of connection {:?} vetoed", connection);
            return false;
        }

        connection.remove(&mut self.nodes);

        self.listener.trigger(&EditorEvent::Change);
        self.history.add(
            EditorCommand::RemoveConnection(connection),
            EditorCommand::Connect(connection),
        );
        true
    }

    /// Add a group; its recorded members join it
    ///
    /// Member ids that are not in the graph are dropped. Returns false if
    /// vetoed or if a group with the same id exists.
    pub fn add_group(&mut self, mut group: Group) -> bool {
        if self.group_index(group.id).is_some() {
            log::warn!("Group {} is already in the graph", group.id);
            return false;
        }
        if !self.listener.trigger(&EditorEvent::GroupCreate(&group)) {
            log::debug!("Creation of group {} vetoed", group.id);
            return false;
        }

        let id = group.id;
        self.group_ids.advance_past(id.0);
        let members = group.clear_members();
        self.groups.push(group);
        for member in members {
            self.assign_to_group(member, id);
        }

        self.listener.trigger(&EditorEvent::Change);
        if let Some(group) = self.group(id) {
            let record = EditorCommand::AddGroup(group.clone());
            self.history.add(record, EditorCommand::RemoveGroup(id));
        }
        true
    }

    /// Remove a group, keeping its member nodes
    pub fn remove_group(&mut self, id: GroupId) -> bool {
        let Some(index) = self.group_index(id) else {
            return false;
        };
        if !self
            .listener
            .trigger(&EditorEvent::GroupRemove(&self.groups[index]))
        {
            log::debug!("Removal of group {} vetoed", id);
            return false;
        }

        let group = self.groups.remove(index);
        for member in group.nodes() {
            if let Some(node) = self.nodes.iter_mut().find(|n| n.id == *member) {
                node.group = None;
            }
        }
        self.selection.remove(id);

        self.listener.trigger(&EditorEvent::Change);
        self.history
            .add(EditorCommand::RemoveGroup(id), EditorCommand::AddGroup(group));
        true
    }

    /// Move `node` into `group`, leaving any previous group
    fn assign_to_group(&mut self, node_id: NodeId, group_id: GroupId) {
        if self.group_index(group_id).is_none() {
            return;
        }
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) else {
            return;
        };
        if let Some(previous) = node.group.replace(group_id) {
            if previous != group_id {
                if let Some(group) = self.groups.iter_mut().find(|g| g.id == previous) {
                    group.remove_member(node_id);
                }
            }
        }
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == group_id) {
            group.push_member(node_id);
        }
    }

    /// Take `node` out of its group, if any
    fn release(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) else {
            return;
        };
        if let Some(previous) = node.group.take() {
            if let Some(group) = self.groups.iter_mut().find(|g| g.id == previous) {
                group.remove_member(node_id);
            }
        }
    }

    /// Fit `group` around `nodes` and make them its members
    ///
    /// Returns false if the group is not in the graph.
    pub fn cover_nodes(&mut self, group: GroupId, nodes: &[NodeId]) -> bool {
        let Some(target) = self.groups.iter_mut().find(|g| g.id == group) else {
            return false;
        };
        let covered: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|n| nodes.contains(&n.id))
            .collect();
        target.cover_nodes(&covered, self.config.group_margin);

        for id in nodes {
            self.assign_to_group(*id, group);
        }
        true
    }

    /// Select a node; returns false if vetoed or absent
    pub fn select_node(&mut self, id: NodeId, accumulate: bool) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if !self.listener.trigger(&EditorEvent::NodeSelect(node)) {
            return false;
        }
        self.selection.add(id, accumulate);
        true
    }

    /// Select a group; returns false if vetoed or absent
    pub fn select_group(&mut self, id: GroupId, accumulate: bool) -> bool {
        let Some(group) = self.group(id) else {
            return false;
        };
        if !self.listener.trigger(&EditorEvent::GroupSelect(group)) {
            return false;
        }
        self.selection.add(id, accumulate);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_pointer(&mut self, position: Position) {
        self.pointer = position;
    }

    /// Zoom or pan the canvas; returns false if vetoed
    pub fn set_transform(&mut self, transform: Transform) -> bool {
        if !self.listener.trigger(&EditorEvent::Transform(transform)) {
            return false;
        }
        self.transform = transform;
        true
    }

    pub fn translate_node(&mut self, id: NodeId, dx: f64, dy: f64) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == id) {
            Some(node) => {
                node.translate(dx, dy);
                true
            }
            None => false,
        }
    }

    /// Move a group together with its members
    pub fn translate_group(&mut self, id: GroupId, dx: f64, dy: f64) -> bool {
        let Some(group) = self.groups.iter_mut().find(|g| g.id == id) else {
            return false;
        };
        group.translate(dx, dy);
        for node in self.nodes.iter_mut() {
            if group.contains_node(node.id) {
                node.translate(dx, dy);
            }
        }
        true
    }

    /// Recompute group membership at the end of a drag
    ///
    /// Every node is tested against every group: covered non-members join,
    /// members no longer covered leave.
    pub fn end_drag(&mut self) {
        for g in 0..self.groups.len() {
            for n in 0..self.nodes.len() {
                let group = &self.groups[g];
                let node = &self.nodes[n];
                let (group_id, node_id) = (group.id, node.id);
                let member = group.contains_node(node_id);
                let covered = group.is_cover_node(node);

                if member && !covered {
                    self.release(node_id);
                } else if !member && covered {
                    self.assign_to_group(node_id, group_id);
                }
            }
        }
    }

    /// Dispatch a keyboard shortcut over the selection and history
    pub fn handle_key(&mut self, key: EditorKey) {
        match key {
            EditorKey::Delete => {
                for item in self.selection.items().to_vec() {
                    match item {
                        Selected::Node(id) => {
                            self.remove_node(id);
                        }
                        Selected::Group(id) => {
                            self.remove_group(id);
                        }
                    }
                }
            }
            EditorKey::GroupSelection => {
                let selected = self.selection.nodes();
                if selected.is_empty() {
                    return;
                }
                let mut group = self.create_group(defaults::GROUP_TITLE);
                let covered: Vec<&Node> = self
                    .nodes
                    .iter()
                    .filter(|n| selected.contains(&n.id))
                    .collect();
                group.cover_nodes(&covered, self.config.group_margin);
                self.add_group(group);
            }
            EditorKey::Undo => {
                self.undo();
            }
            EditorKey::Redo => {
                self.redo();
            }
        }
    }

    /// Revert the last recorded action; returns false if there is none
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(command) => {
                self.replay(command);
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone action; returns false if there is none
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(command) => {
                self.replay(command);
                true
            }
            None => false,
        }
    }

    fn replay(&mut self, command: EditorCommand) {
        self.history.lock();
        match command {
            EditorCommand::AddNode { node, links, group } => {
                let id = node.id;
                if self.add_node(node, false) {
                    for link in links {
                        // The error is already reported through the `error` event
                        let _ = self.connect(link.output, link.input);
                    }
                    if let Some(group) = group {
                        self.assign_to_group(id, group);
                    }
                }
            }
            EditorCommand::RemoveNode(id) => {
                self.remove_node(id);
            }
            EditorCommand::Connect(connection) => {
                let _ = self.connect(connection.output, connection.input);
            }
            EditorCommand::RemoveConnection(connection) => {
                self.remove_connection(connection);
            }
            EditorCommand::AddGroup(group) => {
                self.add_group(group);
            }
            EditorCommand::RemoveGroup(id) => {
                self.remove_group(id);
            }
        }
        self.history.unlock();
    }

    /// Remove every node and group without recording history
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.groups.clear();
        self.selection.clear();
        self.listener.trigger(&EditorEvent::Change);
    }

    /// Serialize the graph
    pub fn to_json(&self) -> Snapshot {
        Snapshot {
            id: self.id.to_string(),
            nodes: self.nodes.iter().map(|n| (n.id, n.to_json())).collect(),
            groups: self.groups.iter().map(|g| (g.id, g.to_json())).collect(),
        }
    }

    /// Replace the graph with `snapshot`
    ///
    /// The snapshot id is checked, every node is built and every link is
    /// checked before the current graph is touched; on failure the graph is
    /// unchanged, `error` fires and the error is returned. While the graph
    /// is replayed, handlers are told the events are not persistent and
    /// nothing is recorded. The history is cleared afterwards.
    pub async fn from_json(&mut self, snapshot: &Snapshot) -> Result<()> {
        let result = self.load(snapshot).await;
        if let Err(e) = &result {
            log::warn!("Failed to load '{}': {}", snapshot.id, e);
            self.listener.trigger(&EditorEvent::Error(e));
        }
        result
    }

    async fn load(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.id.check(&snapshot.id)?;
        // Connections are replayed from the output side only
        validation::ensure_links_matched(snapshot)?;

        let mut jobs = Vec::with_capacity(snapshot.nodes.len());
        for json in snapshot.nodes.values() {
            let component =
                self.registry
                    .get(&json.title)
                    .ok_or_else(|| ValidationError::UnknownKind {
                        node: json.id,
                        kind: json.title.clone(),
                    })?;
            jobs.push((json, component));
        }
        let node_ids = &self.node_ids;
        let built = try_join_all(
            jobs.iter()
                .map(|(json, component)| Node::from_json(json, component.as_ref(), node_ids)),
        )
        .await?;

        // Links are checked against the slots the builders actually created
        let slots: HashMap<NodeId, (usize, usize)> = built
            .iter()
            .map(|n| (n.id, (n.inputs.len(), n.outputs.len())))
            .collect();
        for json in snapshot.nodes.values() {
            for (index, input) in json.inputs.iter().enumerate() {
                if !slots.get(&json.id).is_some_and(|(ins, _)| index < *ins) {
                    return Err(ValidationError::DanglingLink {
                        node: json.id,
                        remote: json.id,
                        slot: index,
                    }
                    .into());
                }
                for link in &input.connections {
                    if !slots.get(&link.node).is_some_and(|(_, outs)| link.output < *outs) {
                        return Err(ValidationError::DanglingLink {
                            node: json.id,
                            remote: link.node,
                            slot: link.output,
                        }
                        .into());
                    }
                }
            }
            for (index, output) in json.outputs.iter().enumerate() {
                if !slots.get(&json.id).is_some_and(|(_, outs)| index < *outs) {
                    return Err(ValidationError::DanglingLink {
                        node: json.id,
                        remote: json.id,
                        slot: index,
                    }
                    .into());
                }
                for link in &output.connections {
                    if !slots.get(&link.node).is_some_and(|(ins, _)| link.input < *ins) {
                        return Err(ValidationError::DanglingLink {
                            node: json.id,
                            remote: link.node,
                            slot: link.input,
                        }
                        .into());
                    }
                }
            }
        }

        self.clear();
        self.listener.set_persistent(false);
        self.history.lock();

        for node in built {
            self.add_node(node, false);
        }
        for json in snapshot.nodes.values() {
            for (index, output) in json.outputs.iter().enumerate() {
                for link in &output.connections {
                    let _ = self.connect(
                        IoRef::new(json.id, index),
                        IoRef::new(link.node, link.input),
                    );
                }
            }
        }
        for json in snapshot.groups.values() {
            self.add_group(Group::from_json(json));
        }

        self.history.unlock();
        self.history.clear();
        self.listener.set_persistent(true);
        log::debug!(
            "Loaded '{}' ({} nodes, {} groups)",
            snapshot.id,
            self.nodes.len(),
            self.groups.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for GraphEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEditor")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .field("groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io::Io;
    use crate::listener::EventName;
    use crate::registry::CallbackComponent;
    use crate::socket::Socket;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ID: &str = "demo@0.1.0";

    fn registry() -> Arc<ComponentRegistry> {
        let num = Socket::new("num", "Number", "");
        let text = Socket::new("str", "Text", "");
        let mut registry = ComponentRegistry::new();

        let s = num.clone();
        registry.register(Arc::new(
            CallbackComponent::new("Number", |_node, _inputs, _args| async move {
                Ok(vec![Value::from(1)])
            })
            .with_builder(move |node| {
                node.add_output(Output::new("num", s.clone()))?;
                Ok(())
            }),
        ));

        let s = num.clone();
        registry.register(Arc::new(
            CallbackComponent::new("Add", |_node, _inputs, _args| async move {
                Ok(vec![Value::from(2)])
            })
            .with_builder(move |node| {
                node.add_input(Input::new("a", s.clone()))?
                    .add_input(Input::new("b", s.clone()))?
                    .add_output(Output::new("sum", s.clone()))?;
                Ok(())
            }),
        ));

        registry.register(Arc::new(
            CallbackComponent::new("Print", |_node, _inputs, _args| async move { Ok(vec![]) })
                .with_builder(move |node| {
                    node.add_input(Input::new("text", text.clone()))?;
                    Ok(())
                }),
        ));

        Arc::new(registry)
    }

    fn editor() -> GraphEditor {
        GraphEditor::new(ID, registry()).unwrap()
    }

    async fn add(editor: &mut GraphEditor, kind: &str, x: f64, y: f64) -> NodeId {
        let mut node = editor.create_node(kind).await.unwrap();
        node.position = (x, y);
        let id = node.id;
        assert!(editor.add_node(node, false));
        id
    }

    fn out(node: NodeId, index: usize) -> IoRef {
        IoRef::new(node, index)
    }

    fn inp(node: NodeId, index: usize) -> IoRef {
        IoRef::new(node, index)
    }

    fn connection_count(editor: &GraphEditor, id: NodeId) -> usize {
        editor
            .nodes()
            .iter()
            .flat_map(|n| n.connections())
            .filter(|c| c.touches(id))
            .count()
    }

    /// Two numbers feeding an adder
    async fn sum_graph(editor: &mut GraphEditor) -> (NodeId, NodeId, NodeId) {
        let a = add(editor, "Number", 0.0, 0.0).await;
        let b = add(editor, "Number", 0.0, 200.0).await;
        let c = add(editor, "Add", 300.0, 100.0).await;
        editor.connect(out(a, 0), inp(c, 0)).unwrap().unwrap();
        editor.connect(out(b, 0), inp(c, 1)).unwrap().unwrap();
        (a, b, c)
    }

    #[tokio::test]
    async fn test_create_node_uses_builder_and_fresh_ids() {
        let editor = editor();
        let first = editor.create_node("Add").await.unwrap();
        let second = editor.create_node("Add").await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.inputs().len(), 2);
        assert_eq!(first.outputs().len(), 1);

        let err = editor.create_node("Mystery").await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::UnknownKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_node_at_pointer() {
        let mut editor = editor();
        editor.set_pointer((42.0, 7.0));
        let node = editor.create_node("Number").await.unwrap();
        let id = node.id;

        assert!(editor.add_node(node, true));
        assert_eq!(editor.node(id).unwrap().position, (42.0, 7.0));
        assert_eq!(editor.history().len(), 1);
    }

    #[tokio::test]
    async fn test_vetoed_creation_leaves_graph_untouched() {
        let mut editor = editor();
        editor.on("nodecreate", |_, _| Verdict::Veto).unwrap();

        let node = editor.create_node("Number").await.unwrap();
        assert!(!editor.add_node(node, false));
        assert!(editor.nodes().is_empty());
        assert!(editor.history().is_empty());
    }

    #[tokio::test]
    async fn test_undo_redo_restore_structure() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 0.0, 0.0).await;
        let c = add(&mut editor, "Add", 300.0, 0.0).await;

        let before = editor.to_json();
        editor.connect(out(a, 0), inp(c, 0)).unwrap().unwrap();
        let after = editor.to_json();

        assert!(editor.undo());
        assert_eq!(editor.to_json(), before);
        assert!(editor.redo());
        assert_eq!(editor.to_json(), after);
    }

    #[tokio::test]
    async fn test_undo_node_removal_restores_connections() {
        let mut editor = editor();
        let (a, _, c) = sum_graph(&mut editor).await;
        let before = editor.to_json();

        assert!(editor.remove_node(c));
        assert_eq!(connection_count(&editor, c), 0);
        assert!(!editor.node(a).unwrap().outputs()[0].has_connection());
        let after = editor.to_json();

        editor.handle_key(EditorKey::Undo);
        assert_eq!(editor.to_json(), before);
        editor.handle_key(EditorKey::Redo);
        assert_eq!(editor.to_json(), after);
    }

    #[tokio::test]
    async fn test_undo_does_not_grow_history() {
        let mut editor = editor();
        sum_graph(&mut editor).await;
        let len = editor.history().len();

        editor.undo();
        assert_eq!(editor.history().len(), len);
        assert!(editor.history().can_redo());
        editor.redo();
        assert_eq!(editor.history().len(), len);
    }

    #[tokio::test]
    async fn test_incompatible_connect_reports_error() {
        let mut editor = editor();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&errors);
        editor
            .on("error", move |event, _| {
                assert_eq!(event.name(), EventName::Error);
                e.fetch_add(1, Ordering::SeqCst);
                Verdict::Proceed
            })
            .unwrap();

        let a = add(&mut editor, "Number", 0.0, 0.0).await;
        let p = add(&mut editor, "Print", 300.0, 0.0).await;
        let history = editor.history().len();

        let err = editor.connect(out(a, 0), inp(p, 0)).unwrap_err();
        assert!(matches!(
            err,
            FlowError::Connect(ConnectError::IncompatibleSockets { .. })
        ));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(!editor.node(a).unwrap().outputs()[0].has_connection());
        assert!(!editor.node(p).unwrap().inputs()[0].has_connection());
        assert_eq!(editor.history().len(), history);
    }

    #[tokio::test]
    async fn test_occupied_input_keeps_existing_connection() {
        let mut editor = editor();
        let (a, b, c) = sum_graph(&mut editor).await;

        let err = editor.connect(out(b, 0), inp(c, 0)).unwrap_err();
        assert!(matches!(
            err,
            FlowError::Connect(ConnectError::InputAlreadyConnected)
        ));
        let input = &editor.node(c).unwrap().inputs()[0];
        assert_eq!(input.connections().len(), 1);
        assert_eq!(input.connections()[0].output, out(a, 0));
    }

    #[tokio::test]
    async fn test_vetoed_connect_returns_none() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 0.0, 0.0).await;
        let c = add(&mut editor, "Add", 300.0, 0.0).await;
        // Reject self-loops
        editor
            .on("connectioncreate", move |event, _| match event {
                EditorEvent::ConnectionCreate { output, input } if output.node == input.node => {
                    Verdict::Veto
                }
                _ => Verdict::Proceed,
            })
            .unwrap();

        assert_eq!(editor.connect(out(c, 0), inp(c, 0)).unwrap(), None);
        assert!(editor.connect(out(a, 0), inp(c, 0)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_slot_is_an_error() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 0.0, 0.0).await;
        let c = add(&mut editor, "Add", 300.0, 0.0).await;

        assert!(matches!(
            editor.connect(out(a, 3), inp(c, 0)),
            Err(FlowError::Connect(ConnectError::SlotNotFound(_)))
        ));
        assert!(matches!(
            editor.connect(out(a, 0), inp(NodeId(99), 0)),
            Err(FlowError::Connect(ConnectError::SlotNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_remove_node_ignores_nested_veto() {
        let mut editor = editor();
        let (a, b, c) = sum_graph(&mut editor).await;
        editor
            .on("connectionremove", |_, _| Verdict::Veto)
            .unwrap();

        assert!(editor.remove_node(c));
        assert_eq!(connection_count(&editor, c), 0);
        assert!(!editor.node(a).unwrap().outputs()[0].has_connection());
        assert!(!editor.node(b).unwrap().outputs()[0].has_connection());
    }

    #[tokio::test]
    async fn test_remove_connection() {
        let mut editor = editor();
        let (a, _, c) = sum_graph(&mut editor).await;
        let connection = editor.node(c).unwrap().inputs()[0].connections()[0];

        assert!(editor.remove_connection(connection));
        assert!(!editor.remove_connection(connection));
        assert!(!editor.node(a).unwrap().outputs()[0].has_connection());

        editor.undo();
        assert!(editor.node(a).unwrap().outputs()[0].has_connection());
    }

    #[tokio::test]
    async fn test_groups_follow_drag() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 100.0, 100.0).await;
        let b = add(&mut editor, "Number", 2000.0, 2000.0).await;
        let group = editor.create_group("Inputs");
        let gid = group.id;
        assert!(editor.add_group(group));
        assert!(editor.cover_nodes(gid, &[a]));
        assert_eq!(editor.node(a).unwrap().group, Some(gid));

        // Drag `a` far away
        editor.translate_node(a, 5000.0, 0.0);
        editor.end_drag();
        assert_eq!(editor.node(a).unwrap().group, None);
        assert!(editor.group(gid).unwrap().nodes().is_empty());

        // Drag the group over `b`
        let (gx, gy) = editor.group(gid).unwrap().position;
        editor.translate_group(gid, 2000.0 - gx - 10.0, 2000.0 - gy - 10.0);
        editor.end_drag();
        assert_eq!(editor.node(b).unwrap().group, Some(gid));
        assert_eq!(editor.group(gid).unwrap().nodes(), &[b]);
    }

    #[tokio::test]
    async fn test_translate_group_moves_members() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 100.0, 100.0).await;
        let group = editor.create_group("Inputs");
        let gid = group.id;
        editor.add_group(group);
        editor.cover_nodes(gid, &[a]);

        editor.translate_group(gid, 10.0, 20.0);
        assert_eq!(editor.node(a).unwrap().position, (110.0, 120.0));
        editor.end_drag();
        assert_eq!(editor.node(a).unwrap().group, Some(gid));
    }

    #[tokio::test]
    async fn test_node_belongs_to_one_group() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 100.0, 100.0).await;
        let first = editor.create_group("First");
        let second = editor.create_group("Second");
        let (g1, g2) = (first.id, second.id);
        editor.add_group(first);
        editor.add_group(second);

        editor.cover_nodes(g1, &[a]);
        editor.cover_nodes(g2, &[a]);

        assert_eq!(editor.node(a).unwrap().group, Some(g2));
        assert!(editor.group(g1).unwrap().nodes().is_empty());
    }

    #[tokio::test]
    async fn test_remove_group_releases_members() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 100.0, 100.0).await;
        let group = editor.create_group("Inputs");
        let gid = group.id;
        editor.add_group(group);
        editor.cover_nodes(gid, &[a]);

        assert!(editor.remove_group(gid));
        assert!(editor.node(a).is_some());
        assert_eq!(editor.node(a).unwrap().group, None);

        editor.undo();
        assert_eq!(editor.node(a).unwrap().group, Some(gid));
    }

    #[tokio::test]
    async fn test_keyboard_group_and_delete() {
        let mut editor = editor();
        let (a, b, c) = sum_graph(&mut editor).await;

        assert!(editor.select_node(a, false));
        assert!(editor.select_node(b, true));
        editor.handle_key(EditorKey::GroupSelection);

        assert_eq!(editor.groups().len(), 1);
        let gid = editor.groups()[0].id;
        assert_eq!(editor.groups()[0].nodes(), &[a, b]);
        assert_eq!(editor.node(a).unwrap().group, Some(gid));

        editor.handle_key(EditorKey::Delete);
        assert!(editor.node(a).is_none());
        assert!(editor.node(b).is_none());
        assert!(editor.group(gid).unwrap().nodes().is_empty());
        assert_eq!(connection_count(&editor, c), 0);
        assert!(editor.selection().is_empty());
    }

    #[tokio::test]
    async fn test_selection_veto() {
        let mut editor = editor();
        let a = add(&mut editor, "Number", 0.0, 0.0).await;
        editor.on("nodeselect", |_, _| Verdict::Veto).unwrap();

        assert!(!editor.select_node(a, false));
        assert!(editor.selection().is_empty());
        assert!(!editor.select_node(NodeId(99), false));
    }

    #[test]
    fn test_transform_event() {
        let mut editor = editor();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        editor
            .on("transform", move |event, _| {
                if let EditorEvent::Transform(t) = event {
                    assert_eq!(t.k, 2.0);
                    s.fetch_add(1, Ordering::SeqCst);
                }
                Verdict::Proceed
            })
            .unwrap();

        let zoom = Transform {
            k: 2.0,
            x: 5.0,
            y: 5.0,
        };
        assert!(editor.set_transform(zoom));
        assert_eq!(editor.transform(), zoom);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_round_trip() {
        let mut source = editor();
        let (a, b, _) = sum_graph(&mut source).await;
        let group = source.create_group("Inputs");
        let gid = group.id;
        source.add_group(group);
        source.cover_nodes(gid, &[a, b]);
        let snapshot = source.to_json();

        let mut target = editor();
        let replayed = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&replayed);
        target
            .on("nodecreate connectioncreate groupcreate", move |_, persistent| {
                if !persistent {
                    r.fetch_add(1, Ordering::SeqCst);
                }
                Verdict::Proceed
            })
            .unwrap();

        target.from_json(&snapshot).await.unwrap();

        assert_eq!(target.to_json(), snapshot);
        // 3 nodes, 2 connections, 1 group
        assert_eq!(replayed.load(Ordering::SeqCst), 6);
        assert!(target.history().is_empty());

        // Restored ids are never handed out again
        let fresh = target.create_node("Number").await.unwrap();
        assert!(snapshot.nodes.keys().all(|id| *id < fresh.id));
        assert!(target.create_group("Next").id > gid);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_current_graph() {
        let mut editor = editor();
        let (_, _, c) = sum_graph(&mut editor).await;
        let before = editor.to_json();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&errors);
        editor
            .on("error", move |_, _| {
                e.fetch_add(1, Ordering::SeqCst);
                Verdict::Proceed
            })
            .unwrap();

        let mut unknown = before.clone();
        unknown.nodes.get_mut(&c).unwrap().title = "Mystery".to_string();
        let err = editor.from_json(&unknown).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::UnknownKind { .. })
        ));

        let mut foreign = before.clone();
        foreign.id = "other@0.2.0".to_string();
        let err = editor.from_json(&foreign).await.unwrap_err();
        match err {
            FlowError::Validation(ValidationError::SnapshotId(mismatches)) => {
                assert_eq!(mismatches.len(), 2)
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut dangling = before.clone();
        dangling.nodes.get_mut(&c).unwrap().outputs[0]
            .connections
            .push(crate::snapshot::OutputLink {
                node: NodeId(77),
                input: 0,
            });
        assert_eq!(
            editor.from_json(&dangling).await.unwrap_err().kind(),
            ErrorKind::Validation
        );

        assert_eq!(errors.load(Ordering::SeqCst), 3);
        assert_eq!(editor.to_json(), before);
    }

    #[tokio::test]
    async fn test_load_rejects_one_sided_links() {
        let mut editor = editor();
        let (a, b, c) = sum_graph(&mut editor).await;
        let before = editor.to_json();

        // Outputs still point at the adder, its inputs forgot them
        let mut outputs_only = before.clone();
        for input in &mut outputs_only.nodes.get_mut(&c).unwrap().inputs {
            input.connections.clear();
        }
        let err = editor.from_json(&outputs_only).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::UnmatchedLink { to, .. }) if to == c
        ));

        // The adder's inputs still name the numbers, their outputs are empty
        let mut inputs_only = before.clone();
        for id in [a, b] {
            inputs_only.nodes.get_mut(&id).unwrap().outputs[0]
                .connections
                .clear();
        }
        let err = editor.from_json(&inputs_only).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::UnmatchedLink { from, .. }) if from == a
        ));

        assert_eq!(editor.to_json(), before);
    }

    #[test]
    fn test_history_limit_from_config() {
        let config = EditorConfig {
            history_limit: 1,
            ..EditorConfig::default()
        };
        let mut editor = GraphEditor::with_config(ID, registry(), config).unwrap();
        let group = editor.create_group("A");
        editor.add_group(group);
        let group = editor.create_group("B");
        editor.add_group(group);

        assert_eq!(editor.history().len(), 1);
        assert_eq!(editor.group(GroupId(1)).unwrap().min_width(), 600.0);
    }
}
