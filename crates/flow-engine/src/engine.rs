//! Dataflow evaluation engine
//!
//! The engine evaluates a [`Snapshot`] by running each node's worker once
//! its inputs are available.
//!
//! # Key Concepts
//!
//! - **State machine**: `Available -> Processing -> (AbortRequested) -> Available`.
//!   A busy engine rejects new runs instead of queueing them.
//! - **Per-node lock**: each node's cached output sits behind a
//!   `tokio::sync::Mutex`. Concurrent requests for the same node wait on the
//!   lock and then read the cached value, so a worker runs at most once per run.
//! - **Pull, then push**: a node pulls its inputs through its upstream nodes,
//!   and forward propagation pushes evaluation to everything downstream.
//! - **Forward once**: each node pushes to its dependents at most once per
//!   run, however many paths reach it.
//! - **Cooperative abort**: `abort()` stops new workers from starting but
//!   cannot interrupt one that is already running.
//!
//! There is no timeout: a worker that never completes keeps `process` pending.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::error::{ContractViolation, FlowError, Result, ValidationError};
use crate::events::{EngineEvent, EventSink, NullEventSink};
use crate::node::Node;
use crate::registry::{Component, ComponentRegistry, InputData, OutputData};
use crate::snapshot::{NodeJson, Snapshot, SnapshotId};
use crate::types::NodeId;
use crate::validation;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Available,
    Processing,
    AbortRequested,
}

/// How a `process` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Every node was evaluated
    Success,
    /// `abort()` was called or a worker failed
    Aborted,
    /// Another run was in progress; nothing was evaluated
    Busy,
}

/// Outcome of one `process` call
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    pub status: ProcessStatus,
    /// Outputs of every node whose worker succeeded
    pub outputs: BTreeMap<NodeId, OutputData>,
}

impl ProcessResult {
    fn busy() -> Self {
        Self {
            status: ProcessStatus::Busy,
            outputs: BTreeMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessStatus::Success
    }

    /// Output `index` of `node`, if it was produced
    pub fn output(&self, node: NodeId, index: usize) -> Option<&Value> {
        self.outputs.get(&node).and_then(|o| o.get(index))
    }
}

/// Lifecycle state plus the number of runs started so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Status {
    state: EngineState,
    run: u64,
}

/// Resolves once the run that was in flight when `abort()` was called ends
///
/// A later run starting before the handle is polled does not delay it.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    rx: watch::Receiver<Status>,
    /// `None` when the engine was idle
    run: Option<u64>,
}

impl AbortHandle {
    pub async fn wait(&self) {
        let Some(run) = self.run else {
            return;
        };
        let mut rx = self.rx.clone();
        // An error means the engine is gone, so nothing is running either
        let _ = rx
            .wait_for(|status| status.run != run || status.state == EngineState::Available)
            .await;
    }
}

/// Evaluates snapshots with the components of a registry
pub struct Engine {
    id: SnapshotId,
    registry: Arc<ComponentRegistry>,
    status: watch::Sender<Status>,
    sink: Arc<dyn EventSink>,
    /// Input and output counts each kind's builder produces
    layouts: parking_lot::Mutex<HashMap<String, (usize, usize)>>,
}

fn idle() -> watch::Sender<Status> {
    let (status, _) = watch::channel(Status {
        state: EngineState::Available,
        run: 0,
    });
    status
}

impl Engine {
    /// Create an engine accepting snapshots with identifier `id`
    pub fn new(id: &str, registry: Arc<ComponentRegistry>) -> Result<Self> {
        Ok(Self {
            id: SnapshotId::parse(id)?,
            registry,
            status: idle(),
            sink: Arc::new(NullEventSink),
            layouts: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Send progress events to `sink`
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn state(&self) -> EngineState {
        self.status.borrow().state
    }

    fn is_abort_requested(&self) -> bool {
        self.state() == EngineState::AbortRequested
    }

    /// Request an abort of the current run
    ///
    /// Workers already running finish; no new worker starts. Calling this
    /// again while an abort is pending returns a handle for the same run.
    /// On an idle engine the handle resolves immediately.
    pub fn abort(&self) -> AbortHandle {
        self.request_abort();
        let status = *self.status.borrow();
        AbortHandle {
            rx: self.status.subscribe(),
            run: (status.state != EngineState::Available).then_some(status.run),
        }
    }

    fn request_abort(&self) {
        let requested = self.status.send_if_modified(|status| {
            if status.state == EngineState::Processing {
                status.state = EngineState::AbortRequested;
                true
            } else {
                false
            }
        });
        if requested {
            log::info!("Abort requested");
            self.emit(EngineEvent::AbortRequested);
        }
    }

    fn begin(&self) -> bool {
        self.status.send_if_modified(|status| {
            if status.state == EngineState::Available {
                status.state = EngineState::Processing;
                status.run += 1;
                true
            } else {
                false
            }
        })
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.sink.send(event) {
            log::debug!("Dropped engine event: {}", e);
        }
    }

    /// Slot counts a fresh node of this kind gets, built once per kind
    async fn layout(&self, component: &dyn Component) -> Result<(usize, usize)> {
        let cached = self.layouts.lock().get(component.name()).copied();
        if let Some(layout) = cached {
            return Ok(layout);
        }
        let mut node = Node::new(NodeId(0), component.name());
        component.build(&mut node).await?;
        let layout = (node.inputs().len(), node.outputs().len());
        self.layouts
            .lock()
            .insert(component.name().to_string(), layout);
        Ok(layout)
    }

    /// Reject nodes declaring fewer slots than their component builds
    ///
    /// Workers address their slots by index, so a short node would leave
    /// them writing past the end of their outputs.
    async fn check_slots(&self, snapshot: &Snapshot) -> Result<()> {
        for (id, node) in &snapshot.nodes {
            // Unknown kinds were rejected by validation already
            let Some(component) = self.registry.get(&node.title) else {
                continue;
            };
            let (inputs, outputs) = self.layout(component.as_ref()).await?;
            if node.inputs.len() < inputs || node.outputs.len() < outputs {
                return Err(ValidationError::MissingSlots {
                    node: *id,
                    kind: node.title.clone(),
                    inputs: node.inputs.len(),
                    outputs: node.outputs.len(),
                    built_inputs: inputs,
                    built_outputs: outputs,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Evaluate every node of `snapshot`
    ///
    /// With `start`, that node and everything downstream of it are
    /// evaluated first; the remaining nodes follow in id order. `args` are
    /// passed through to every worker.
    ///
    /// Returns `Busy` without doing anything while another run is in
    /// progress. Identifier or structural problems with the snapshot (links
    /// recorded on one end only, nodes missing slots their component needs),
    /// an unknown `start` and output count mismatches are errors. A failing
    /// worker is not: it aborts the run.
    pub async fn process(
        &self,
        snapshot: &Snapshot,
        start: Option<NodeId>,
        args: &[Value],
    ) -> Result<ProcessResult> {
        if !self.begin() {
            log::warn!("Engine is busy ({:?}), ignoring process request", self.state());
            return Ok(ProcessResult::busy());
        }
        let _guard = RunGuard(&self.status);

        self.id.check(&snapshot.id)?;
        validation::ensure_valid(snapshot, Some(&self.registry))?;
        self.check_slots(snapshot).await?;

        let run = Run::new(self, snapshot, args)?;
        log::debug!(
            "Processing '{}' ({} nodes, start {:?})",
            snapshot.id,
            run.nodes.len(),
            start
        );
        self.emit(EngineEvent::ProcessStarted {
            snapshot_id: snapshot.id.clone(),
            start,
        });

        if let Some(start) = start {
            if !run.nodes.contains_key(&start) {
                return Err(FlowError::NodeNotFound(start));
            }
            run.process_node(start).await?;
            run.forward_process(start).await?;
        }

        for &id in run.nodes.keys() {
            if self.is_abort_requested() {
                break;
            }
            if run.is_pending(id).await {
                run.process_node(id).await?;
                run.forward_process(id).await?;
            }
        }
        log::trace!("'{}' took {} node visits", snapshot.id, run.visits());

        let aborted = self.is_abort_requested();
        self.emit(EngineEvent::ProcessFinished { aborted });
        log::debug!("Finished '{}' (aborted: {})", snapshot.id, aborted);

        Ok(ProcessResult {
            status: if aborted {
                ProcessStatus::Aborted
            } else {
                ProcessStatus::Success
            },
            outputs: run.into_outputs(),
        })
    }
}

/// Independent engine sharing the registry and event sink
impl Clone for Engine {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            registry: Arc::clone(&self.registry),
            status: idle(),
            sink: Arc::clone(&self.sink),
            layouts: parking_lot::Mutex::new(self.layouts.lock().clone()),
        }
    }
}

/// Puts the engine back to `Available` when a run ends, however it ends
struct RunGuard<'a>(&'a watch::Sender<Status>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0
            .send_modify(|status| status.state = EngineState::Available);
    }
}

enum Slot {
    Pending,
    Ready(Arc<OutputData>),
    Failed,
}

/// State owned by one `process` call
struct Run<'a> {
    engine: &'a Engine,
    nodes: BTreeMap<NodeId, NodeJson>,
    components: HashMap<NodeId, Arc<dyn Component>>,
    slots: HashMap<NodeId, Mutex<Slot>>,
    /// Nodes that already pushed to their dependents
    forwarded: parking_lot::Mutex<HashSet<NodeId>>,
    visits: AtomicUsize,
    args: &'a [Value],
}

impl<'a> Run<'a> {
    fn new(engine: &'a Engine, snapshot: &Snapshot, args: &'a [Value]) -> Result<Self> {
        let nodes = snapshot.nodes.clone();
        let mut components = HashMap::with_capacity(nodes.len());
        for (id, node) in &nodes {
            let component =
                engine
                    .registry
                    .get(&node.title)
                    .ok_or_else(|| ValidationError::UnknownKind {
                        node: *id,
                        kind: node.title.clone(),
                    })?;
            components.insert(*id, component);
        }
        let slots = nodes.keys().map(|id| (*id, Mutex::new(Slot::Pending))).collect();

        Ok(Self {
            engine,
            nodes,
            components,
            slots,
            forwarded: parking_lot::Mutex::new(HashSet::new()),
            visits: AtomicUsize::new(0),
            args,
        })
    }

    /// Number of `process_node` calls so far
    fn visits(&self) -> usize {
        self.visits.load(Ordering::Relaxed)
    }

    async fn is_pending(&self, id: NodeId) -> bool {
        match self.slots.get(&id) {
            Some(slot) => matches!(*slot.lock().await, Slot::Pending),
            None => false,
        }
    }

    /// Evaluate one node, at most once per run
    ///
    /// Yields `None` if the run is aborting or the node's worker failed.
    fn process_node(&self, id: NodeId) -> BoxFuture<'_, Result<Option<Arc<OutputData>>>> {
        async move {
            self.visits.fetch_add(1, Ordering::Relaxed);
            if self.engine.is_abort_requested() {
                return Ok(None);
            }
            let (Some(node), Some(slot)) = (self.nodes.get(&id), self.slots.get(&id)) else {
                return Ok(None);
            };

            // Held until the outputs are cached; later callers wait here
            let mut slot = slot.lock().await;
            match &*slot {
                Slot::Ready(outputs) => return Ok(Some(Arc::clone(outputs))),
                Slot::Failed => return Ok(None),
                Slot::Pending => {}
            }

            let inputs = self.extract_input_data(node).await?;
            if self.engine.is_abort_requested() {
                return Ok(None);
            }

            let component = self
                .components
                .get(&id)
                .ok_or_else(|| ValidationError::UnknownKind {
                    node: id,
                    kind: node.title.clone(),
                })?;
            let mut outputs: OutputData = vec![Value::Null; node.outputs.len()];

            self.engine.emit(EngineEvent::NodeStarted {
                node: id,
                kind: node.title.clone(),
            });
            let failed = match component
                .worker(node, &inputs, &mut outputs, self.args)
                .await
            {
                Ok(()) => false,
                Err(e) => {
                    let error = FlowError::Worker {
                        node: id,
                        kind: node.title.clone(),
                        message: e.to_string(),
                    };
                    log::warn!("{}", error);
                    self.engine.emit(EngineEvent::node_failed(id, &error));
                    self.engine.request_abort();
                    true
                }
            };

            if outputs.len() != node.outputs.len() {
                return Err(ContractViolation::OutputCountMismatch {
                    node: id,
                    expected: node.outputs.len(),
                    produced: outputs.len(),
                }
                .into());
            }

            if failed {
                *slot = Slot::Failed;
                return Ok(None);
            }
            let outputs = Arc::new(outputs);
            *slot = Slot::Ready(Arc::clone(&outputs));
            self.engine.emit(EngineEvent::NodeCompleted { node: id });
            Ok(Some(outputs))
        }
        .boxed()
    }

    /// Resolve every input of `node` through its upstream nodes
    async fn extract_input_data(&self, node: &NodeJson) -> Result<InputData> {
        let per_input = node.inputs.iter().map(|input| {
            try_join_all(input.connections.iter().map(|link| async move {
                let value = match self.process_node(link.node).await? {
                    Some(outputs) => outputs.get(link.output).cloned().unwrap_or(Value::Null),
                    None => {
                        self.engine.request_abort();
                        Value::Null
                    }
                };
                Ok::<_, FlowError>(value)
            }))
        });
        try_join_all(per_input).await
    }

    /// Evaluate everything reachable through the outputs of `id`
    ///
    /// A node reached again through another path is skipped: whoever got
    /// there first is already evaluating its dependents.
    fn forward_process(&self, id: NodeId) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.engine.is_abort_requested() {
                return Ok(());
            }
            if !self.forwarded.lock().insert(id) {
                return Ok(());
            }
            let Some(node) = self.nodes.get(&id) else {
                return Ok(());
            };
            try_join_all(node.dependents().map(|next| async move {
                self.process_node(next).await?;
                self.forward_process(next).await
            }))
            .await?;
            Ok(())
        }
        .boxed()
    }

    fn into_outputs(self) -> BTreeMap<NodeId, OutputData> {
        self.slots
            .into_iter()
            .filter_map(|(id, slot)| match slot.into_inner() {
                Slot::Ready(outputs) => Some((id, outputs.as_ref().clone())),
                Slot::Pending | Slot::Failed => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SnapshotBuilder;
    use crate::error::ErrorKind;
    use crate::events::VecEventSink;
    use crate::io::Output;
    use crate::registry::CallbackComponent;
    use crate::snapshot::OutputLink;
    use crate::socket::Socket;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;
    use tokio_test::{assert_pending, assert_ready, task};

    const ID: &str = "demo@0.1.0";

    fn math_registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register_callback("Const", |node: NodeJson, _inputs, _args| async move {
            Ok(vec![node.data.get("num").cloned().unwrap_or(Value::Null)])
        });
        registry.register_callback("Add", |_node, inputs: InputData, _args| async move {
            let sum: f64 = inputs.iter().flatten().filter_map(Value::as_f64).sum();
            Ok(vec![json!(sum)])
        });
        registry
    }

    fn engine(registry: ComponentRegistry) -> Engine {
        Engine::new(ID, Arc::new(registry)).unwrap()
    }

    /// Registry whose "Count" kind records how often each node ran
    fn counting_registry() -> (ComponentRegistry, Arc<parking_lot::Mutex<HashMap<NodeId, usize>>>) {
        let calls = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let mut registry = ComponentRegistry::new();
        let counter = Arc::clone(&calls);
        registry.register_callback("Count", move |node: NodeJson, _inputs, _args| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().entry(node.id).or_insert(0) += 1;
                Ok(vec![json!(node.id.0)])
            }
        });
        (registry, calls)
    }

    /// Registry where "Wait" blocks until `release` is notified
    fn gated_registry(
        started: Arc<Notify>,
        release: Arc<Notify>,
        sink_ran: Arc<AtomicBool>,
    ) -> ComponentRegistry {
        let mut registry = math_registry();
        registry.register_callback("Wait", move |_node, inputs: InputData, _args| {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            async move {
                started.notify_one();
                release.notified().await;
                Ok(vec![inputs[0].first().cloned().unwrap_or(Value::Null)])
            }
        });
        registry.register_callback("Sink", move |_node, _inputs, _args| {
            let sink_ran = Arc::clone(&sink_ran);
            async move {
                sink_ran.store(true, Ordering::SeqCst);
                Ok(vec![])
            }
        });
        registry
    }

    fn chain() -> Snapshot {
        SnapshotBuilder::new(ID)
            .node(1, "Const", 0, 1)
            .with_data("num", json!(4))
            .node(2, "Wait", 1, 1)
            .node(3, "Sink", 1, 0)
            .link(1, 0, 2, 0)
            .link(2, 0, 3, 0)
            .build()
    }

    #[tokio::test]
    async fn test_sum_of_constants() {
        let snapshot = SnapshotBuilder::new(ID)
            .node(1, "Const", 0, 1)
            .with_data("num", json!(2))
            .node(3, "Const", 0, 1)
            .with_data("num", json!(5))
            .node(2, "Add", 2, 1)
            .link(1, 0, 2, 0)
            .link(3, 0, 2, 1)
            .build();

        let result = engine(math_registry())
            .process(&snapshot, None, &[])
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.output(NodeId(2), 0), Some(&json!(7.0)));
    }

    #[tokio::test]
    async fn test_shared_upstream_runs_once() {
        let (registry, calls) = counting_registry();
        let snapshot = SnapshotBuilder::new(ID)
            .node(1, "Count", 0, 1)
            .node(2, "Count", 1, 1)
            .node(3, "Count", 1, 1)
            .node(4, "Count", 2, 1)
            .link(1, 0, 2, 0)
            .link(1, 0, 3, 0)
            .link(2, 0, 4, 0)
            .link(3, 0, 4, 1)
            .build();

        let result = engine(registry)
            .process(&snapshot, Some(NodeId(1)), &[])
            .await
            .unwrap();

        assert!(result.is_success());
        let calls = calls.lock();
        for id in 1..=4 {
            assert_eq!(calls[&NodeId(id)], 1, "node {} ran more than once", id);
        }
    }

    #[tokio::test]
    async fn test_disconnected_nodes_are_swept() {
        let (registry, calls) = counting_registry();
        let snapshot = SnapshotBuilder::new(ID)
            .node(1, "Count", 0, 1)
            .node(2, "Count", 0, 1)
            .node(3, "Count", 1, 1)
            .link(2, 0, 3, 0)
            .build();

        let result = engine(registry)
            .process(&snapshot, Some(NodeId(1)), &[])
            .await
            .unwrap();

        assert_eq!(result.status, ProcessStatus::Success);
        assert_eq!(calls.lock().len(), 3);
        assert_eq!(result.outputs.len(), 3);
    }

    #[tokio::test]
    async fn test_args_reach_workers() {
        let mut registry = ComponentRegistry::new();
        registry.register_callback("Args", |_node, _inputs, args: Vec<Value>| async move {
            Ok(vec![json!(args.len())])
        });
        let snapshot = SnapshotBuilder::new(ID).node(1, "Args", 0, 1).build();

        let result = engine(registry)
            .process(&snapshot, None, &[json!("a"), json!("b")])
            .await
            .unwrap();
        assert_eq!(result.output(NodeId(1), 0), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_abort_stops_before_next_worker() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sink_ran = Arc::new(AtomicBool::new(false));
        let sink = Arc::new(VecEventSink::new());
        let engine = engine(gated_registry(
            Arc::clone(&started),
            Arc::clone(&release),
            Arc::clone(&sink_ran),
        ))
        .with_event_sink(sink.clone());
        let snapshot = chain();

        let (result, ()) = tokio::join!(engine.process(&snapshot, None, &[]), async {
            started.notified().await;
            let handle = engine.abort();
            assert_eq!(engine.state(), EngineState::AbortRequested);

            // Still waiting on the middle worker
            let mut wait = task::spawn(handle.wait());
            assert_pending!(wait.poll());
            drop(wait);

            // A second abort shares the pending run
            let again = engine.abort();
            release.notify_one();
            handle.wait().await;
            again.wait().await;
        });

        let result = result.unwrap();
        assert_eq!(result.status, ProcessStatus::Aborted);
        assert!(!sink_ran.load(Ordering::SeqCst));
        assert_eq!(engine.state(), EngineState::Available);

        let events = sink.events();
        let aborts = events
            .iter()
            .filter(|e| **e == EngineEvent::AbortRequested)
            .count();
        assert_eq!(aborts, 1);
        assert_eq!(
            events.last(),
            Some(&EngineEvent::ProcessFinished { aborted: true })
        );
    }

    #[tokio::test]
    async fn test_busy_engine_rejects_second_run() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let engine = engine(gated_registry(
            Arc::clone(&started),
            Arc::clone(&release),
            Arc::new(AtomicBool::new(false)),
        ));
        let snapshot = chain();

        let (first, second) = tokio::join!(engine.process(&snapshot, None, &[]), async {
            started.notified().await;
            let second = engine.process(&snapshot, None, &[]).await;
            release.notify_one();
            second
        });

        assert_eq!(second.unwrap().status, ProcessStatus::Busy);
        assert_eq!(first.unwrap().status, ProcessStatus::Success);
    }

    #[tokio::test]
    async fn test_worker_failure_aborts_run() {
        let mut registry = math_registry();
        registry.register_callback("Fail", |_node, _inputs, _args| async move {
            Err(FlowError::failed("boom"))
        });
        let sink = Arc::new(VecEventSink::new());
        let engine = engine(registry).with_event_sink(sink.clone());
        let snapshot = SnapshotBuilder::new(ID)
            .node(1, "Fail", 0, 0)
            .node(2, "Const", 0, 1)
            .build();

        let result = engine.process(&snapshot, None, &[]).await.unwrap();

        assert_eq!(result.status, ProcessStatus::Aborted);
        assert!(result.outputs.is_empty());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::NodeFailed { node: NodeId(1), .. })));
        assert_eq!(engine.state(), EngineState::Available);
    }

    #[tokio::test]
    async fn test_output_count_mismatch_is_fatal() {
        let mut registry = ComponentRegistry::new();
        registry.register_callback("Greedy", |_node, _inputs, _args| async move {
            Ok(vec![json!(1), json!(2)])
        });
        let engine = engine(registry);
        let snapshot = SnapshotBuilder::new(ID).node(1, "Greedy", 0, 1).build();

        let err = engine.process(&snapshot, None, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Contract(ContractViolation::OutputCountMismatch {
                expected: 1,
                produced: 2,
                ..
            })
        ));
        assert_eq!(engine.state(), EngineState::Available);
    }

    #[tokio::test]
    async fn test_missing_start_node() {
        let engine = engine(math_registry());
        let snapshot = SnapshotBuilder::new(ID).node(1, "Const", 0, 1).build();

        let err = engine
            .process(&snapshot, Some(NodeId(9)), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NodeNotFound(NodeId(9))));
        assert_eq!(engine.state(), EngineState::Available);
    }

    #[tokio::test]
    async fn test_rejects_foreign_snapshot() {
        let engine = engine(math_registry());
        let snapshot = SnapshotBuilder::new("other@0.1.0")
            .node(1, "Const", 0, 1)
            .build();

        let err = engine.process(&snapshot, None, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_rejects_unknown_kind_and_cycles() {
        let engine = engine(math_registry());

        let unknown = SnapshotBuilder::new(ID).node(1, "Mystery", 0, 1).build();
        assert!(matches!(
            engine.process(&unknown, None, &[]).await,
            Err(FlowError::Validation(ValidationError::UnknownKind { .. }))
        ));

        let cycle = SnapshotBuilder::new(ID)
            .node(1, "Add", 1, 1)
            .node(2, "Add", 1, 1)
            .link(1, 0, 2, 0)
            .link(2, 0, 1, 0)
            .build();
        assert!(matches!(
            engine.process(&cycle, None, &[]).await,
            Err(FlowError::Validation(ValidationError::CycleDetected))
        ));
    }

    #[tokio::test]
    async fn test_rejects_links_recorded_on_outputs_only() {
        let engine = engine(math_registry());
        let mut snapshot = SnapshotBuilder::new(ID)
            .node(1, "Add", 1, 1)
            .node(2, "Add", 1, 1)
            .build();
        // 1 -> 2 -> 1, but neither input knows about it
        for (from, to) in [(1, 2), (2, 1)] {
            snapshot.nodes.get_mut(&NodeId(from)).unwrap().outputs[0]
                .connections
                .push(OutputLink {
                    node: NodeId(to),
                    input: 0,
                });
        }

        let err = engine
            .process(&snapshot, Some(NodeId(1)), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::UnmatchedLink { .. })
        ));
        assert_eq!(engine.state(), EngineState::Available);
    }

    #[tokio::test]
    async fn test_rejects_node_missing_built_slots() {
        let mut registry = ComponentRegistry::new();
        registry.register(Arc::new(
            CallbackComponent::new("Pair", |_node, _inputs, _args| async move {
                Ok(vec![json!(1), json!(2)])
            })
            .with_builder(|node: &mut Node| {
                let socket = Socket::new("number", "Number", "");
                node.add_output(Output::new("a", socket.clone()))?
                    .add_output(Output::new("b", socket))?;
                Ok(())
            }),
        ));
        let engine = engine(registry);

        let short = SnapshotBuilder::new(ID).node(1, "Pair", 0, 1).build();
        let err = engine.process(&short, None, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Validation(ValidationError::MissingSlots {
                node: NodeId(1),
                outputs: 1,
                built_outputs: 2,
                ..
            })
        ));
        assert_eq!(engine.state(), EngineState::Available);

        let full = SnapshotBuilder::new(ID).node(1, "Pair", 0, 2).build();
        let result = engine.process(&full, None, &[]).await.unwrap();
        assert_eq!(result.output(NodeId(1), 1), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_each_node_forwards_once() {
        // Two nodes per layer, both wired to both nodes of the next layer,
        // so the number of paths doubles with every layer
        const LAYERS: u64 = 20;
        let (registry, calls) = counting_registry();
        let mut builder = SnapshotBuilder::new(ID);
        for id in 1..=2 * LAYERS {
            builder = builder.node(id, "Count", 2, 1);
        }
        for layer in 0..LAYERS - 1 {
            let (a, b) = (2 * layer + 1, 2 * layer + 2);
            for next in [a + 2, b + 2] {
                builder = builder.link(a, 0, next, 0).link(b, 0, next, 1);
            }
        }
        let snapshot = builder.build();
        let engine = engine(registry);

        let run = Run::new(&engine, &snapshot, &[]).unwrap();
        for root in [NodeId(1), NodeId(2)] {
            run.process_node(root).await.unwrap();
            run.forward_process(root).await.unwrap();
        }

        // One pull per input link, one push per output link, one per root
        let links = (LAYERS as usize - 1) * 4;
        assert!(
            run.visits() <= 2 * links + 2,
            "{} node visits for {} links",
            run.visits(),
            links
        );
        let calls = calls.lock();
        assert_eq!(calls.len(), 2 * LAYERS as usize);
        assert!(calls.values().all(|&n| n == 1));
    }

    #[tokio::test]
    async fn test_abort_handle_ignores_later_runs() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let engine = engine(gated_registry(
            Arc::clone(&started),
            Arc::clone(&release),
            Arc::new(AtomicBool::new(false)),
        ));
        let snapshot = chain();

        let mut first = task::spawn(engine.process(&snapshot, None, &[]));
        assert_pending!(first.poll());
        let handle = engine.abort();
        release.notify_one();
        let result = assert_ready!(first.poll()).unwrap();
        assert_eq!(result.status, ProcessStatus::Aborted);

        // The next run is already going when the handle is first polled
        let mut second = task::spawn(engine.process(&snapshot, None, &[]));
        assert_pending!(second.poll());
        assert_eq!(engine.state(), EngineState::Processing);

        let mut wait = task::spawn(handle.wait());
        assert_ready!(wait.poll());

        release.notify_one();
        assert!(assert_ready!(second.poll()).unwrap().is_success());
    }

    #[tokio::test]
    async fn test_abort_on_idle_engine_resolves() {
        let engine = engine(math_registry());
        engine.abort().wait().await;
        assert_eq!(engine.state(), EngineState::Available);
    }

    #[test]
    fn test_clone_is_independent() {
        let engine = engine(math_registry());
        assert!(engine.begin());
        let copy = engine.clone();

        assert_eq!(engine.state(), EngineState::Processing);
        assert_eq!(copy.state(), EngineState::Available);
        assert!(Arc::ptr_eq(engine.registry(), copy.registry()));
    }

    #[test]
    fn test_invalid_engine_id() {
        assert!(Engine::new("x@1", Arc::new(ComponentRegistry::new())).is_err());
    }
}
