//! ---
//! lt_section: "01-core-orchestration"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Run reports and periodic throughput logging."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lt_common::AppType;
use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::worker::{WorkerCounters, WorkerRole, WorkerState};

/// Outcome of a single worker unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    /// Worker identifier.
    pub id: usize,
    /// Worker role.
    pub role: WorkerRole,
    /// Terminal state observed by the orchestrator.
    pub state: WorkerState,
    /// Successful operations.
    pub operations: u64,
    /// Transient failures logged by the worker.
    pub transient_errors: u64,
    /// Failure reason when the worker failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// A worker that never ran because its instance could not be created or started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartFailure {
    /// Worker identifier.
    pub id: usize,
    /// Worker role.
    pub role: WorkerRole,
    /// Why the worker did not start.
    pub reason: String,
}

/// Summary of one orchestrated run.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Workload name.
    pub workload: String,
    /// Effective execution shape.
    pub app_type: AppType,
    /// Whether the schema was dropped and recreated.
    pub schema_reset: bool,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Time from start to teardown.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    /// Interrupts observed while waiting on workers.
    pub interruptions: u32,
    /// Joined workers in id order.
    pub workers: Vec<WorkerSummary>,
    /// Workers that were never started.
    pub start_failures: Vec<StartFailure>,
}

impl RunReport {
    pub(crate) fn new(workload: impl Into<String>, app_type: AppType) -> Self {
        Self {
            workload: workload.into(),
            app_type,
            schema_reset: false,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            interruptions: 0,
            workers: Vec::new(),
            start_failures: Vec::new(),
        }
    }

    fn role_operations(&self, role: WorkerRole) -> u64 {
        self.workers
            .iter()
            .filter(|worker| worker.role == role)
            .map(|worker| worker.operations)
            .sum()
    }

    fn per_second(&self, operations: u64) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            operations as f64 / secs
        } else {
            0.0
        }
    }

    /// Successful writes across all writers.
    pub fn total_writes(&self) -> u64 {
        self.role_operations(WorkerRole::Write)
    }

    /// Successful reads across all readers.
    pub fn total_reads(&self) -> u64 {
        self.role_operations(WorkerRole::Read)
    }

    /// Workers that finished normally.
    pub fn finished_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.state == WorkerState::Finished)
            .count()
    }

    /// Workers that failed.
    pub fn failed_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.state == WorkerState::Failed)
            .count()
    }

    /// Overall throughput.
    pub fn ops_per_second(&self) -> f64 {
        self.per_second(self.total_writes() + self.total_reads())
    }

    /// Write throughput.
    pub fn write_ops_per_second(&self) -> f64 {
        self.per_second(self.total_writes())
    }

    /// Read throughput.
    pub fn read_ops_per_second(&self) -> f64 {
        self.per_second(self.total_reads())
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Emit the report summary at info level.
    pub fn log_summary(&self) {
        info!(
            workload = %self.workload,
            app_type = %self.app_type,
            elapsed_secs = self.elapsed.as_secs_f64(),
            workers = self.workers.len(),
            finished = self.finished_count(),
            failed = self.failed_count(),
            not_started = self.start_failures.len(),
            writes = self.total_writes(),
            reads = self.total_reads(),
            write_ops_per_sec = %format!("{:.2}", self.write_ops_per_second()),
            read_ops_per_sec = %format!("{:.2}", self.read_ops_per_second()),
            interruptions = self.interruptions,
            "run summary"
        );
    }
}

/// Shortest reporting period; `interval_at` rejects a zero period.
const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(1);

/// Background task logging per-role throughput while workers run.
#[derive(Debug)]
pub struct ThroughputReporter {
    shutdown: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl ThroughputReporter {
    /// Spawn the reporter over the given counters. The first line is logged after one `every`,
    /// which is raised to one millisecond when shorter.
    pub fn spawn(counters: Vec<(WorkerRole, Arc<WorkerCounters>)>, every: Duration) -> Self {
        let every = every.max(MIN_REPORT_INTERVAL);
        let (shutdown, mut shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();
            let mut last_writes = 0u64;
            let mut last_reads = 0u64;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("throughput reporter shutdown received");
                        break;
                    }
                    _ = ticker.tick() => {
                        let (writes, reads) = totals(&counters);
                        let window = last.elapsed().as_secs_f64().max(f64::EPSILON);
                        info!(
                            writes,
                            reads,
                            write_ops_per_sec = %format!("{:.2}", (writes - last_writes) as f64 / window),
                            read_ops_per_sec = %format!("{:.2}", (reads - last_reads) as f64 / window),
                            "throughput"
                        );
                        last = Instant::now();
                        last_writes = writes;
                        last_reads = reads;
                    }
                }
            }
        });

        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Stop the reporter and wait for its task.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(error = %err, "throughput reporter join error");
            }
        }
    }
}

fn totals(counters: &[(WorkerRole, Arc<WorkerCounters>)]) -> (u64, u64) {
    counters
        .iter()
        .fold((0, 0), |(writes, reads), (role, counters)| match role {
            WorkerRole::Write => (writes + counters.operations(), reads),
            WorkerRole::Read => (writes, reads + counters.operations()),
        })
}
