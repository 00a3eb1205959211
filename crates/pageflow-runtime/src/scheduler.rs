use crate::config::SchedulerConfig;
use crate::registry::StrategyRegistry;
use crate::workflow::{Workflow, WorkflowStatus};
use chrono::Utc;
use futures::future::join_all;
use pageflow_core::{
    Browser, EventBus, ExecutionEvent, FlowError, ProxySettings, WorkflowState,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow '{0}' is running")]
    WorkflowBusy(String),

    #[error("Failed to load workflow from {}: {source}", .path.display())]
    Load { path: PathBuf, source: FlowError },

    #[error("Batch task failed: {0}")]
    Task(String),
}

/// Counters for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchProgress {
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    pub fn is_done(&self) -> bool {
        self.finished() >= self.total
    }

    /// Percentage of finished workflows, 100 for an empty batch
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.finished() * 100) / self.total).min(100) as u8
    }
}

/// Overview of the scheduler for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub runnable: usize,
    pub max_concurrent: usize,
    pub active_slots: usize,
    pub available_slots: usize,
}

/// Handle on a batch launched in the background
pub struct BatchHandle {
    progress: watch::Receiver<BatchProgress>,
    task: JoinHandle<HashMap<String, bool>>,
}

impl BatchHandle {
    pub fn progress(&self) -> BatchProgress {
        *self.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for every workflow of the batch to finish
    pub async fn wait(self) -> Result<HashMap<String, bool>, SchedulerError> {
        self.task
            .await
            .map_err(|e| SchedulerError::Task(e.to_string()))
    }
}

#[derive(Clone)]
struct Entry {
    workflow: Arc<Mutex<Workflow>>,
    status: watch::Receiver<WorkflowStatus>,
}

/// Removes a name from the running set when dropped, including on panic
struct RunningGuard {
    running: Arc<std::sync::Mutex<HashSet<String>>>,
    name: String,
}

impl RunningGuard {
    fn enter(running: Arc<std::sync::Mutex<HashSet<String>>>, name: &str) -> Self {
        lock(&running).insert(name.to_string());
        Self {
            running,
            name: name.to_string(),
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.name);
    }
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns named workflows and runs them under a global concurrency ceiling.
///
/// Cloning is cheap; clones share the same workflows, gate and bookkeeping.
#[derive(Clone)]
pub struct WorkflowScheduler {
    config: SchedulerConfig,
    workflows: Arc<RwLock<HashMap<String, Entry>>>,
    gate: Arc<Semaphore>,
    running: Arc<std::sync::Mutex<HashSet<String>>>,
    results: Arc<std::sync::Mutex<HashMap<String, bool>>>,
    browser: Arc<dyn Browser>,
    registry: Arc<StrategyRegistry>,
    event_bus: Arc<EventBus>,
    latest_batch: Arc<std::sync::Mutex<watch::Receiver<BatchProgress>>>,
}

impl WorkflowScheduler {
    pub fn new(
        config: SchedulerConfig,
        browser: Arc<dyn Browser>,
        registry: Arc<StrategyRegistry>,
    ) -> Self {
        let config = config.normalized();
        let (_, latest_batch) = watch::channel(BatchProgress::default());
        Self {
            gate: Arc::new(Semaphore::new(config.max_concurrent)),
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            config,
            workflows: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(std::sync::Mutex::new(HashSet::new())),
            results: Arc::new(std::sync::Mutex::new(HashMap::new())),
            browser,
            registry,
            latest_batch: Arc::new(std::sync::Mutex::new(latest_batch)),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    // ---- membership ----

    /// Add a workflow, replacing any idle workflow with the same name
    pub async fn add_workflow(&self, mut workflow: Workflow) -> Result<(), SchedulerError> {
        let name = workflow.name().to_string();
        let mut workflows = self.workflows.write().await;

        if let Some(existing) = workflows.get(&name) {
            if self.is_busy(&name, existing) {
                return Err(SchedulerError::WorkflowBusy(name));
            }
            tracing::warn!("Workflow '{}' already exists, replacing it", name);
        }

        workflow.set_event_bus(self.event_bus.clone());
        let entry = Entry {
            status: workflow.subscribe(),
            workflow: Arc::new(Mutex::new(workflow)),
        };
        workflows.insert(name.clone(), entry);
        lock(&self.results).remove(&name);

        tracing::info!("Added workflow '{}'", name);
        Ok(())
    }

    /// Load a JSON definition file. The name defaults to the file stem.
    pub async fn load_workflow(
        &self,
        path: impl AsRef<Path>,
        proxy_settings: Option<ProxySettings>,
        name: Option<&str>,
    ) -> Result<String, SchedulerError> {
        let path = path.as_ref();
        let load_err = |source: FlowError| SchedulerError::Load {
            path: path.to_path_buf(),
            source,
        };

        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    load_err(FlowError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "path has no file name",
                    )))
                })?,
        };

        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(e.into()))?;
        let workflow = Workflow::from_json(&name, &json, proxy_settings).map_err(load_err)?;

        tracing::info!(
            "Loaded workflow '{}' ({} nodes) from {}",
            name,
            workflow.nodes().len(),
            path.display()
        );
        self.add_workflow(workflow).await?;
        Ok(name)
    }

    /// Load every `*.json` file in `dir`, skipping files that fail. Returns the number loaded.
    pub async fn load_workflows_from_dir(
        &self,
        dir: impl AsRef<Path>,
        proxy_settings: Option<ProxySettings>,
    ) -> Result<usize, SchedulerError> {
        let dir = dir.as_ref();
        let load_err = |e: std::io::Error| SchedulerError::Load {
            path: dir.to_path_buf(),
            source: e.into(),
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(load_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(load_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            tracing::warn!("No workflow files found in {}", dir.display());
            return Ok(0);
        }

        let mut loaded = 0;
        for file in &files {
            match self.load_workflow(file, proxy_settings.clone(), None).await {
                Ok(_) => loaded += 1,
                Err(e) => tracing::error!("Skipping {}: {}", file.display(), e),
            }
        }

        tracing::info!("Loaded {}/{} workflows from {}", loaded, files.len(), dir.display());
        Ok(loaded)
    }

    /// Remove an idle workflow
    pub async fn remove_workflow(&self, name: &str) -> Result<(), SchedulerError> {
        let mut workflows = self.workflows.write().await;
        let entry = workflows
            .get(name)
            .ok_or_else(|| SchedulerError::NotFound(name.to_string()))?;
        if self.is_busy(name, entry) {
            return Err(SchedulerError::WorkflowBusy(name.to_string()));
        }

        workflows.remove(name);
        lock(&self.results).remove(name);
        tracing::info!("Removed workflow '{}'", name);
        Ok(())
    }

    /// Reset an idle workflow to Pending
    pub async fn reset_workflow(&self, name: &str) -> Result<(), SchedulerError> {
        let workflows = self.workflows.read().await;
        let entry = workflows
            .get(name)
            .ok_or_else(|| SchedulerError::NotFound(name.to_string()))?;
        if lock(&self.running).contains(name) {
            return Err(SchedulerError::WorkflowBusy(name.to_string()));
        }

        let mut workflow = entry
            .workflow
            .try_lock()
            .map_err(|_| SchedulerError::WorkflowBusy(name.to_string()))?;
        workflow.reset();
        lock(&self.results).remove(name);
        Ok(())
    }

    /// Reset every idle workflow. Returns how many were reset.
    pub async fn reset_all(&self) -> usize {
        let mut count = 0;
        for name in self.names().await {
            match self.reset_workflow(&name).await {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!("Not resetting '{}': {}", name, e),
            }
        }
        tracing::info!("Reset {} workflows", count);
        count
    }

    /// Remove every idle workflow. Returns how many were removed.
    pub async fn clear_all(&self) -> usize {
        let mut count = 0;
        for name in self.names().await {
            match self.remove_workflow(&name).await {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!("Not removing '{}': {}", name, e),
            }
        }
        tracing::info!("Removed {} workflows", count);
        count
    }

    // ---- queries ----

    /// Workflow names, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }

    /// Shared handle on a workflow. Locking it while a run is in flight waits for the run.
    pub async fn workflow(&self, name: &str) -> Option<Arc<Mutex<Workflow>>> {
        self.workflows
            .read()
            .await
            .get(name)
            .map(|e| e.workflow.clone())
    }

    /// Latest published status, readable while the workflow runs
    pub async fn workflow_status(&self, name: &str) -> Option<WorkflowStatus> {
        self.workflows
            .read()
            .await
            .get(name)
            .map(|e| e.status.borrow().clone())
    }

    pub async fn subscribe_workflow(&self, name: &str) -> Option<watch::Receiver<WorkflowStatus>> {
        self.workflows.read().await.get(name).map(|e| e.status.clone())
    }

    /// Status of every workflow, sorted by name
    pub async fn list_workflows(&self) -> Vec<WorkflowStatus> {
        let mut list: Vec<WorkflowStatus> = self
            .workflows
            .read()
            .await
            .values()
            .map(|e| e.status.borrow().clone())
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub async fn pending_workflows(&self) -> Vec<String> {
        self.names_where(|s| s.state == WorkflowState::Pending).await
    }

    /// Pending or Failed
    pub async fn runnable_workflows(&self) -> Vec<String> {
        self.names_where(|s| s.can_run).await
    }

    /// Names currently holding a concurrency slot, sorted
    pub fn running_workflows(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.running).iter().cloned().collect();
        names.sort();
        names
    }

    pub fn is_running(&self, name: &str) -> bool {
        lock(&self.running).contains(name)
    }

    /// Last outcome of every workflow run through this scheduler
    pub fn results(&self) -> HashMap<String, bool> {
        lock(&self.results).clone()
    }

    pub fn last_result(&self, name: &str) -> Option<bool> {
        lock(&self.results).get(name).copied()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let statuses = self.list_workflows().await;
        let active_slots = lock(&self.running).len();
        SchedulerStatus {
            total: statuses.len(),
            pending: statuses.iter().filter(|s| s.state == WorkflowState::Pending).count(),
            running: statuses.iter().filter(|s| s.state == WorkflowState::Running).count(),
            runnable: statuses.iter().filter(|s| s.can_run).count(),
            max_concurrent: self.config.max_concurrent,
            active_slots,
            available_slots: self.config.max_concurrent.saturating_sub(active_slots),
        }
    }

    /// Counters of the most recently launched batch
    pub fn batch_progress(&self) -> BatchProgress {
        *lock(&self.latest_batch).borrow()
    }

    /// Follow the most recently launched batch; later batches get their own channel
    pub fn subscribe_batch(&self) -> watch::Receiver<BatchProgress> {
        lock(&self.latest_batch).clone()
    }

    // ---- execution ----

    /// Run one workflow by name. `false` when it is unknown, not runnable, or fails.
    pub async fn run_workflow(&self, name: &str) -> bool {
        let Some(entry) = self.workflows.read().await.get(name).cloned() else {
            tracing::error!("Workflow not found: {}", name);
            return false;
        };
        if !entry.status.borrow().can_run {
            tracing::warn!("Workflow '{}' cannot run in state {}", name, entry.status.borrow().state);
            return false;
        }

        tracing::info!("Launching workflow '{}'", name);
        self.spawn_guarded(name.to_string(), entry.workflow).await
    }

    /// Run the runnable workflows among `names` concurrently under the admission gate.
    ///
    /// Unknown and non-runnable names are skipped and absent from the result.
    pub async fn run_multiple<S: AsRef<str>>(&self, names: &[S]) -> HashMap<String, bool> {
        let (progress, _) = watch::channel(BatchProgress::default());
        self.run_batch(names, progress).await
    }

    async fn run_batch<S: AsRef<str>>(
        &self,
        names: &[S],
        progress: watch::Sender<BatchProgress>,
    ) -> HashMap<String, bool> {
        let selected = self.select_runnable(names).await;
        let total = selected.len();
        progress.send_replace(BatchProgress {
            total,
            ..Default::default()
        });
        *lock(&self.latest_batch) = progress.subscribe();

        if selected.is_empty() {
            tracing::warn!("No runnable workflows to launch");
            return HashMap::new();
        }

        self.emit_batch_progress(*progress.borrow());
        tracing::info!(
            "Launching {} workflows (max {} concurrent)",
            total,
            self.config.max_concurrent
        );

        let progress = &progress;
        let tasks = selected.into_iter().map(|(name, workflow)| async move {
            let success = self.spawn_guarded(name.clone(), workflow).await;
            let mut snapshot = BatchProgress::default();
            progress.send_modify(|p| {
                if success {
                    p.completed += 1;
                } else {
                    p.failed += 1;
                }
                snapshot = *p;
            });
            self.emit_batch_progress(snapshot);
            (name, success)
        });
        let results: HashMap<String, bool> = join_all(tasks).await.into_iter().collect();

        let succeeded = results.values().filter(|ok| **ok).count();
        tracing::info!("Batch finished: {}/{} succeeded", succeeded, total);
        results
    }

    pub async fn run_all_pending(&self) -> HashMap<String, bool> {
        let names = self.pending_workflows().await;
        tracing::info!("Found {} pending workflows", names.len());
        self.run_multiple(&names).await
    }

    pub async fn run_all_runnable(&self) -> HashMap<String, bool> {
        let names = self.runnable_workflows().await;
        tracing::info!("Found {} runnable workflows", names.len());
        self.run_multiple(&names).await
    }

    /// Launch [`run_multiple`](Self::run_multiple) in the background
    ///
    /// The handle's counters belong to this batch only. Until selection finishes, `total`
    /// counts every distinct requested name.
    pub fn spawn_batch(&self, names: Vec<String>) -> BatchHandle {
        let requested = names.iter().collect::<HashSet<_>>().len();
        let (progress, receiver) = watch::channel(BatchProgress {
            total: requested,
            ..Default::default()
        });
        let this = self.clone();
        BatchHandle {
            progress: receiver,
            task: tokio::spawn(async move { this.run_batch(&names, progress).await }),
        }
    }

    async fn select_runnable<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Vec<(String, Arc<Mutex<Workflow>>)> {
        let workflows = self.workflows.read().await;
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for name in names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            let Some(entry) = workflows.get(name) else {
                tracing::warn!("Skipping unknown workflow '{}'", name);
                continue;
            };
            let status = entry.status.borrow();
            if !status.can_run {
                tracing::warn!("Skipping workflow '{}' in state {}", name, status.state);
                continue;
            }
            selected.push((name.to_string(), entry.workflow.clone()));
        }
        selected
    }

    /// Run on its own task so a panic outside the traversal is still reported as a failure
    async fn spawn_guarded(&self, name: String, workflow: Arc<Mutex<Workflow>>) -> bool {
        let this = self.clone();
        let task_name = name.clone();
        match tokio::spawn(async move { this.run_guarded(task_name, workflow).await }).await {
            Ok(success) => success,
            Err(e) => {
                tracing::error!("Workflow '{}' task aborted: {}", name, e);
                lock(&self.results).insert(name, false);
                false
            }
        }
    }

    async fn run_guarded(&self, name: String, workflow: Arc<Mutex<Workflow>>) -> bool {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!("Admission gate closed, not running '{}'", name);
                return false;
            }
        };

        // removed or replaced while waiting for a slot
        let current = self.workflows.read().await.get(&name).map(|e| e.workflow.clone());
        if !current.is_some_and(|c| Arc::ptr_eq(&c, &workflow)) {
            tracing::warn!("Workflow '{}' was removed before it could start", name);
            return false;
        }

        let mut workflow = workflow.lock().await;
        // another caller may have run it while we waited for the lock
        if !workflow.can_run() {
            tracing::warn!("Workflow '{}' is no longer runnable ({})", name, workflow.state());
            return false;
        }

        let success = {
            let _running = RunningGuard::enter(self.running.clone(), &name);
            workflow.run(self.browser.as_ref(), &self.registry).await
        };
        lock(&self.results).insert(name, success);
        success
    }

    fn is_busy(&self, name: &str, entry: &Entry) -> bool {
        lock(&self.running).contains(name) || entry.workflow.try_lock().is_err()
    }

    async fn names_where(&self, pred: impl Fn(&WorkflowStatus) -> bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .workflows
            .read()
            .await
            .iter()
            .filter(|(_, e)| pred(&e.status.borrow()))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn emit_batch_progress(&self, p: BatchProgress) {
        self.event_bus.emit(ExecutionEvent::BatchProgress {
            total: p.total,
            completed: p.completed,
            failed: p.failed,
            timestamp: Utc::now(),
        });
    }
}
