use crate::analysis::{self, GraphReport};
use crate::node::Node;
use crate::registry::StrategyRegistry;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use pageflow_core::{
    Browser, EventBus, ExecutionContext, ExecutionEvent, ExecutionId, FlowError, NodeType, Page,
    ProxySettings, SessionOptions, WorkflowDefinition, WorkflowError, WorkflowState,
};
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Point-in-time summary of a workflow, safe to hand to a dashboard.
///
/// Context values are never included, only their keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub name: String,
    pub state: WorkflowState,
    pub can_run: bool,
    pub node_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_execution_duration_ms: Option<u64>,
    pub last_error_message: Option<String>,
    pub current_node: Option<String>,
    pub context_keys: Vec<String>,
    pub context_size: usize,
    pub has_proxy: bool,
}

/// A built workflow graph together with its lifecycle and run metadata
pub struct Workflow {
    name: String,
    nodes: HashMap<String, Node>,
    start_node_id: String,
    context: ExecutionContext,
    state: WorkflowState,
    proxy_settings: Option<ProxySettings>,
    session: SessionOptions,
    created_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    last_execution_duration_ms: Option<u64>,
    last_error_message: Option<String>,
    current_node: Option<String>,
    status_tx: watch::Sender<WorkflowStatus>,
    events: Option<Arc<EventBus>>,
}

impl Workflow {
    /// Build the node graph from a definition.
    ///
    /// Fails when there are no nodes or not exactly one `start` node. Connections
    /// whose source node does not exist are skipped.
    pub fn build(
        name: impl Into<String>,
        definition: &WorkflowDefinition,
        proxy_settings: Option<ProxySettings>,
    ) -> Result<Self, WorkflowError> {
        let name = name.into();

        if definition.nodes.is_empty() {
            return Err(WorkflowError::InvalidDefinition(
                "workflow must contain at least one node".to_string(),
            ));
        }

        let mut nodes = HashMap::with_capacity(definition.nodes.len());
        let mut start_node_id: Option<String> = None;

        for spec in &definition.nodes {
            let node = Node::from_spec(spec);
            if node.is(NodeType::Start) {
                if let Some(existing) = &start_node_id {
                    return Err(WorkflowError::InvalidDefinition(format!(
                        "workflow may only have one start node (found '{}' and '{}')",
                        existing, spec.id
                    )));
                }
                start_node_id = Some(spec.id.clone());
            }
            if node.node_type().is_none() {
                tracing::warn!("Workflow '{}': node '{}' has unknown type '{}'", name, spec.id, spec.node_type);
            }
            nodes.insert(spec.id.clone(), node);
        }

        let start_node_id = start_node_id.ok_or_else(|| {
            WorkflowError::InvalidDefinition("workflow must have a start node".to_string())
        })?;

        for conn in &definition.connections {
            match nodes.get_mut(&conn.from_node) {
                Some(from) => from.add_connection(conn.from_port.clone(), conn.to_node.clone()),
                None => tracing::debug!(
                    "Workflow '{}': skipping connection from unknown node '{}'",
                    name,
                    conn.from_node
                ),
            }
        }

        let report = analysis::analyze(&nodes, &start_node_id);
        for id in &report.unreachable {
            tracing::warn!("Workflow '{}': node '{}' is unreachable from start", name, id);
        }
        for edge in &report.dangling {
            tracing::warn!(
                "Workflow '{}': port {}.{} points at missing node '{}'",
                name,
                edge.from_node,
                edge.from_port,
                edge.to_node
            );
        }
        if report.has_cycles {
            tracing::debug!("Workflow '{}' contains cycles; traversal stops on revisits", name);
        }

        let created_at = Utc::now();
        let initial = WorkflowStatus {
            name: name.clone(),
            state: WorkflowState::Pending,
            can_run: true,
            node_count: nodes.len(),
            created_at,
            last_run_at: None,
            last_execution_duration_ms: None,
            last_error_message: None,
            current_node: None,
            context_keys: Vec::new(),
            context_size: 0,
            has_proxy: proxy_settings.is_some(),
        };
        let (status_tx, _) = watch::channel(initial);

        Ok(Self {
            name,
            nodes,
            start_node_id,
            context: ExecutionContext::new(),
            state: WorkflowState::Pending,
            proxy_settings,
            session: SessionOptions::default(),
            created_at,
            last_run_at: None,
            last_execution_duration_ms: None,
            last_error_message: None,
            current_node: None,
            status_tx,
            events: None,
        })
    }

    /// Parse a JSON definition and build it
    pub fn from_json(
        name: impl Into<String>,
        json: &str,
        proxy_settings: Option<ProxySettings>,
    ) -> Result<Self, FlowError> {
        let definition = WorkflowDefinition::from_json(json)?;
        Ok(Self::build(name, &definition, proxy_settings)?)
    }

    /// Publish execution events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn set_event_bus(&mut self, bus: Arc<EventBus>) {
        self.events = Some(bus);
    }

    /// Base session options; the workflow's proxy settings are applied on top at run time
    pub fn with_session_options(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn can_run(&self) -> bool {
        self.state.can_run()
    }

    pub fn nodes(&self) -> &HashMap<String, Node> {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn start_node_id(&self) -> &str {
        &self.start_node_id
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn proxy_settings(&self) -> Option<&ProxySettings> {
        self.proxy_settings.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    pub fn last_execution_duration_ms(&self) -> Option<u64> {
        self.last_execution_duration_ms
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error_message.as_deref()
    }

    pub fn analyze(&self) -> GraphReport {
        analysis::analyze(&self.nodes, &self.start_node_id)
    }

    /// Current summary
    pub fn status(&self) -> WorkflowStatus {
        WorkflowStatus {
            name: self.name.clone(),
            state: self.state,
            can_run: self.can_run(),
            node_count: self.nodes.len(),
            created_at: self.created_at,
            last_run_at: self.last_run_at,
            last_execution_duration_ms: self.last_execution_duration_ms,
            last_error_message: self.last_error_message.clone(),
            current_node: self.current_node.clone(),
            context_keys: self.context.keys(),
            context_size: self.context.len(),
            has_proxy: self.proxy_settings.is_some(),
        }
    }

    /// Receive every status change, including those made while a run holds the workflow
    pub fn subscribe(&self) -> watch::Receiver<WorkflowStatus> {
        self.status_tx.subscribe()
    }

    /// Run the workflow once.
    ///
    /// Returns `false` without side effects when the current state does not allow a run.
    /// Every failure inside the run is recorded in `last_error_message` and reported as `false`.
    pub async fn run(&mut self, browser: &dyn Browser, registry: &StrategyRegistry) -> bool {
        if !self.can_run() {
            tracing::warn!("Cannot run workflow '{}' in state {}", self.name, self.state);
            return false;
        }

        let execution_id = ExecutionId::new_v4();
        self.last_run_at = Some(Utc::now());
        self.last_error_message = None;
        self.last_execution_duration_ms = None;
        for node in self.nodes.values_mut() {
            node.reset();
        }
        self.context.clear();
        self.transition(self.state.next(true));

        tracing::info!("Starting workflow '{}'", self.name);
        emit(&self.events, ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow: self.name.clone(),
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let outcome = self.run_session(browser, registry, execution_id).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.last_execution_duration_ms = Some(duration_ms);
        self.current_node = None;
        let success = match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Workflow '{}' failed: {}", self.name, e);
                self.last_error_message = Some(e.to_string());
                false
            }
        };
        self.transition(self.state.next(success));

        tracing::info!(
            "Workflow '{}' finished as {} in {}ms",
            self.name,
            self.state,
            duration_ms
        );
        emit(&self.events, ExecutionEvent::WorkflowCompleted {
            execution_id,
            workflow: self.name.clone(),
            success,
            duration_ms,
            error: self.last_error_message.clone(),
            timestamp: Utc::now(),
        });

        success
    }

    /// Restore the freshly-built state: Pending, empty context, no run metadata
    pub fn reset(&mut self) {
        self.context.clear();
        self.last_error_message = None;
        self.last_execution_duration_ms = None;
        self.current_node = None;
        for node in self.nodes.values_mut() {
            node.reset();
        }
        self.transition(WorkflowState::Pending);
        tracing::info!("Workflow '{}' reset to Pending", self.name);
    }

    fn session_options(&self) -> SessionOptions {
        self.session.clone().with_proxy(self.proxy_settings.clone())
    }

    /// Own a browser session for the whole traversal and close it whatever the outcome
    async fn run_session(
        &mut self,
        browser: &dyn Browser,
        registry: &StrategyRegistry,
        execution_id: ExecutionId,
    ) -> Result<(), FlowError> {
        let options = self.session_options();
        let mut page = browser.open(&options).await?;

        let result = AssertUnwindSafe(self.drive(page.as_mut(), &options, registry, execution_id))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(FlowError::Panicked(panic_message(panic.as_ref()))));

        if let Err(e) = page.close().await {
            tracing::warn!("Workflow '{}': failed to close browser session: {}", self.name, e);
        }
        result
    }

    async fn drive(
        &mut self,
        page: &mut dyn Page,
        options: &SessionOptions,
        registry: &StrategyRegistry,
        execution_id: ExecutionId,
    ) -> Result<(), FlowError> {
        let headers = options.extra_headers();
        if !headers.is_empty() {
            page.set_extra_http_headers(headers).await?;
        }
        self.traverse(page, registry, execution_id).await
    }

    /// Walk the graph from the start node, one node at a time
    async fn traverse(
        &mut self,
        page: &mut dyn Page,
        registry: &StrategyRegistry,
        execution_id: ExecutionId,
    ) -> Result<(), FlowError> {
        let mut current = self.start_node_id.clone();
        let mut visited: HashSet<String> = HashSet::new();

        loop {
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| WorkflowError::NextNodeNotFound(current.clone()))?;

            // forEach is expected to be revisited
            if visited.contains(&current) && !node.is(NodeType::ForEach) {
                tracing::warn!("Workflow '{}': loop detected at node '{}', stopping", self.name, current);
                return Ok(());
            }
            visited.insert(current.clone());

            emit(&self.events, ExecutionEvent::NodeStarted {
                execution_id,
                node_id: current.clone(),
                node_type: node.type_tag().to_string(),
                timestamp: Utc::now(),
            });
            self.current_node = Some(current.clone());
            self.publish();

            let node = self
                .nodes
                .get_mut(&current)
                .ok_or_else(|| WorkflowError::NextNodeNotFound(current.clone()))?;
            let result = match registry.get(node.type_tag()) {
                Ok(strategy) => node.execute(strategy.as_ref(), page, &mut self.context).await,
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                emit(&self.events, ExecutionEvent::NodeFailed {
                    execution_id,
                    node_id: current.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }

            emit(&self.events, ExecutionEvent::NodeCompleted {
                execution_id,
                node_id: current.clone(),
                duration_ms: node.last_execution_duration_ms().unwrap_or_default(),
                timestamp: Utc::now(),
            });

            let is_stop = node.is(NodeType::Stop);
            let next = node.next().map(str::to_string);
            self.publish();

            if is_stop {
                tracing::info!("Workflow '{}' reached stop node '{}'", self.name, current);
                return Ok(());
            }

            match next {
                Some(id) => current = id,
                None => {
                    tracing::info!("Workflow '{}': no next node after '{}', finishing", self.name, current);
                    return Ok(());
                }
            }
        }
    }

    fn transition(&mut self, state: WorkflowState) {
        self.state = state;
        self.publish();
        emit(&self.events, ExecutionEvent::StateChanged {
            workflow: self.name.clone(),
            state,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn emit(events: &Option<Arc<EventBus>>, event: ExecutionEvent) {
    if let Some(bus) = events {
        bus.emit(event);
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("nodes", &self.nodes.len())
            .field("start_node_id", &self.start_node_id)
            .finish()
    }
}
