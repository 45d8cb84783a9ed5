//! ---
//! lt_section: "01-core-orchestration"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Role-bound worker units driving one workload instance each."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Worker units.
//!
//! A [`WorkerUnit`] owns exactly one workload instance and, once started,
//! loops on a single tokio task invoking the write or read operation that
//! matches its role:
//!
//! 1. Stop if the cooperative stop flag is raised
//! 2. Stop if the workload reports its stop condition
//! 3. Perform one operation
//! 4. Log and count transient failures, stop on fatal ones
//!
//! The unit publishes its lifecycle through a `watch` channel so that
//! [`WorkerUnit::join`] is idempotent and safe to cancel and retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lt_logging::{lt_debug, lt_error, lt_warn, LogContext};
use lt_workload::Workload;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::WorkerError;

/// Operation a worker unit drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    /// Invokes `perform_write`.
    Write,
    /// Invokes `perform_read`.
    Read,
}

impl WorkerRole {
    /// Lowercase role label used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Write => "write",
            WorkerRole::Read => "read",
        }
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a worker unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, not started.
    Created,
    /// Looping on its workload.
    Running,
    /// Stopped on the workload's stop condition or a cooperative stop.
    Finished,
    /// Stopped on a fatal failure.
    Failed,
}

impl WorkerState {
    /// Whether the unit will never run another operation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Finished | WorkerState::Failed)
    }
}

/// Fixed identity of a worker, assigned before anything starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerAssignment {
    /// Sequential identifier.
    pub id: usize,
    /// Role bound to the identifier.
    pub role: WorkerRole,
}

/// Assign ids `0..writers` to writers and `writers..writers + readers` to readers.
pub fn assign_roles(writers: usize, readers: usize) -> Vec<WorkerAssignment> {
    let writer_ids = (0..writers).map(|id| WorkerAssignment {
        id,
        role: WorkerRole::Write,
    });
    let reader_ids = (writers..writers + readers).map(|id| WorkerAssignment {
        id,
        role: WorkerRole::Read,
    });
    writer_ids.chain(reader_ids).collect()
}

/// Per-unit operation counters, read by the throughput reporter.
#[derive(Debug, Default)]
pub struct WorkerCounters {
    operations: AtomicU64,
    transient_errors: AtomicU64,
}

impl WorkerCounters {
    /// Successful operations so far.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    /// Transient failures so far.
    pub fn transient_errors(&self) -> u64 {
        self.transient_errors.load(Ordering::Relaxed)
    }

    fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// One role-bound loop driving an exclusively owned workload instance.
pub struct WorkerUnit {
    id: usize,
    role: WorkerRole,
    workload_name: String,
    workload: Option<Box<dyn Workload>>,
    counters: Arc<WorkerCounters>,
    failure: Arc<Mutex<Option<String>>>,
    stop: watch::Receiver<bool>,
    state_tx: Option<watch::Sender<WorkerState>>,
    state_rx: watch::Receiver<WorkerState>,
    task: Option<JoinHandle<()>>,
    terminal: Option<WorkerState>,
}

impl WorkerUnit {
    /// Bind a workload instance to a role. `stop` is the cooperative stop flag.
    pub fn new(
        id: usize,
        role: WorkerRole,
        workload: Box<dyn Workload>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(WorkerState::Created);
        Self {
            id,
            role,
            workload_name: workload.name().to_owned(),
            workload: Some(workload),
            counters: Arc::new(WorkerCounters::default()),
            failure: Arc::new(Mutex::new(None)),
            stop,
            state_tx: Some(state_tx),
            state_rx,
            task: None,
            terminal: None,
        }
    }

    /// Build a unit from a pre-computed assignment.
    pub fn from_assignment(
        assignment: WorkerAssignment,
        workload: Box<dyn Workload>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self::new(assignment.id, assignment.role, workload, stop)
    }

    /// Worker identifier.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Worker role.
    pub fn role(&self) -> WorkerRole {
        self.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.terminal.unwrap_or_else(|| *self.state_rx.borrow())
    }

    /// Counters shared with the throughput reporter.
    pub fn counters(&self) -> Arc<WorkerCounters> {
        Arc::clone(&self.counters)
    }

    /// Reason recorded when the unit failed.
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    /// Spawn the worker loop. Returns as soon as the task is scheduled.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(WorkerError::NoRuntime(self.id));
        }
        let (Some(workload), Some(state_tx)) = (self.workload.take(), self.state_tx.take()) else {
            return Err(WorkerError::AlreadyStarted(self.id));
        };

        state_tx.send_replace(WorkerState::Running);
        let driver = WorkerDriver {
            id: self.id,
            role: self.role,
            counters: Arc::clone(&self.counters),
            failure: Arc::clone(&self.failure),
            stop: self.stop.clone(),
        };
        self.task = Some(tokio::spawn(async move {
            let terminal = driver.drive(workload).await;
            state_tx.send_replace(terminal);
        }));
        Ok(())
    }

    /// Wait until the unit is terminal and return the terminal state.
    ///
    /// Returns immediately once a terminal state has been observed, and
    /// returns [`WorkerState::Created`] for a unit that was never started.
    /// Dropping the returned future before completion loses nothing.
    pub async fn join(&mut self) -> WorkerState {
        if let Some(terminal) = self.terminal {
            return terminal;
        }
        if self.task.is_none() {
            return self.state();
        }

        // A closed channel without a terminal state means the task panicked.
        let observed = self
            .state_rx
            .wait_for(WorkerState::is_terminal)
            .await
            .map(|state| *state)
            .unwrap_or(WorkerState::Failed);
        self.terminal = Some(observed);

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(worker_id = self.id, role = %self.role, error = %err, "worker join error");
                let mut failure = self.failure.lock();
                if failure.is_none() {
                    *failure = Some(format!("worker task aborted: {}", err));
                }
            }
        }
        observed
    }
}

impl std::fmt::Debug for WorkerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerUnit")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("workload", &self.workload_name)
            .field("state", &self.state())
            .finish()
    }
}

/// State moved onto the worker task.
struct WorkerDriver {
    id: usize,
    role: WorkerRole,
    counters: Arc<WorkerCounters>,
    failure: Arc<Mutex<Option<String>>>,
    stop: watch::Receiver<bool>,
}

impl WorkerDriver {
    async fn drive(self, mut workload: Box<dyn Workload>) -> WorkerState {
        let name = workload.name().to_owned();
        let ctx = LogContext::new()
            .with_workload(&name)
            .with_worker(self.id)
            .with_role(self.role.as_str());
        lt_debug!(context = ctx, "worker started");

        let terminal = loop {
            if *self.stop.borrow() {
                lt_debug!(context = ctx, "cooperative stop requested");
                break WorkerState::Finished;
            }
            if workload.has_finished() {
                break WorkerState::Finished;
            }

            let result = match self.role {
                WorkerRole::Write => workload.perform_write().await,
                WorkerRole::Read => workload.perform_read().await,
            };
            match result {
                Ok(()) => self.counters.record_operation(),
                Err(err) if err.is_fatal() => {
                    lt_error!(context = ctx, "worker stopping on fatal failure: {}", err);
                    *self.failure.lock() = Some(err.message().to_owned());
                    break WorkerState::Failed;
                }
                Err(err) => {
                    self.counters.record_transient_error();
                    lt_warn!(context = ctx, "{}", err);
                }
            }

            // One yield per operation, even for workloads that never await.
            tokio::task::yield_now().await;
        };

        // Release the instance before the terminal state becomes observable.
        drop(workload);
        lt_debug!(
            context = ctx,
            "worker {} after {} operations ({} transient errors)",
            if terminal == WorkerState::Finished { "finished" } else { "failed" },
            self.counters.operations(),
            self.counters.transient_errors()
        );
        terminal
    }
}
