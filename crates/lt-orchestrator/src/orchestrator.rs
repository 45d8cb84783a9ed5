//! ---
//! lt_section: "01-core-orchestration"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Run lifecycle: schema reset, worker pool, FIFO join, teardown."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Orchestrator run lifecycle.
//!
//! A run creates a control workload instance, resolves the execution shape,
//! and either performs a single simple run or drives the writer/reader pool:
//!
//! 1. Drop and recreate the schema unless `reuse_existing_schema` is set
//! 2. Create one unit per assignment, then start every unit
//! 3. Join units in creation order; interrupts never skip a unit
//! 4. Tear the control instance down exactly once
//!
//! Interrupts are delivered through [`InterruptHandle`]s (or Ctrl+C via
//! [`Orchestrator::run_with_signal_handling`]). The wait always resumes on the
//! same unit. Workers are asked to stop after their current operation when
//! `stop_on_interrupt` is set, when no limit bounds the run, or on the second
//! interrupt.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use lt_common::{AppType, LoadTesterConfig};
use lt_logging::{log_system_event, lt_info, LogContext, SystemEventOutcome};
use lt_workload::{Workload, WorkloadFactory};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::error::RunError;
use crate::report::{RunReport, StartFailure, ThroughputReporter, WorkerSummary};
use crate::worker::{assign_roles, WorkerAssignment, WorkerState, WorkerUnit};

const INTERRUPT_CAPACITY: usize = 16;
/// Interrupt count at which a bounded run stops its workers regardless of config.
const ESCALATING_INTERRUPTS: u32 = 2;

/// Sender side of the interrupt channel.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: broadcast::Sender<()>,
}

impl InterruptHandle {
    /// Deliver an interrupt. Returns `false` when no run is listening.
    pub fn interrupt(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Coordinates one load test run per call to [`Orchestrator::run`].
pub struct Orchestrator {
    config: Arc<LoadTesterConfig>,
    factory: Arc<dyn WorkloadFactory>,
    interrupts: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Build an orchestrator over a resolved configuration and a workload factory.
    pub fn new(config: LoadTesterConfig, factory: Arc<dyn WorkloadFactory>) -> Self {
        let (interrupts, _) = broadcast::channel(INTERRUPT_CAPACITY);
        Self {
            config: Arc::new(config),
            factory,
            interrupts,
        }
    }

    /// Configuration the orchestrator runs with.
    pub fn config(&self) -> &LoadTesterConfig {
        &self.config
    }

    /// Handle used to interrupt the wait phase of a run.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: self.interrupts.clone(),
        }
    }

    /// Execute one run and return its report, or the first fatal error observed.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let mut interrupts = self.interrupts.subscribe();

        let mut control = match self.factory.create() {
            Ok(control) => control,
            Err(source) => {
                log_system_event(
                    Some(&LogContext::new().with_stage("initialization")),
                    "run.initialization",
                    &format!("failed to create workload instance: {}", source),
                    SystemEventOutcome::Fault,
                );
                return Err(RunError::Initialization { source });
            }
        };

        let app_type = self.config.app_type.unwrap_or_else(|| control.app_type());
        let workload = control.name().to_owned();
        let mut report = RunReport::new(workload.clone(), app_type);
        let ctx = LogContext::new().with_workload(&workload);
        lt_info!(
            context = ctx,
            "starting {} run (writers={}, readers={}, reuse_existing_schema={})",
            app_type,
            self.config.threads.writers,
            self.config.threads.readers,
            self.config.reuse_existing_schema
        );

        let outcome = match app_type {
            AppType::Simple => Self::run_simple(control.as_mut()).await,
            AppType::Concurrent => {
                self.run_concurrent(control.as_mut(), &mut report, &mut interrupts)
                    .await
            }
        };

        control.teardown().await;
        drop(control);
        debug!(workload = %workload, "workload torn down");
        report.elapsed = started.elapsed();

        match outcome {
            Ok(()) => {
                log_system_event(
                    Some(&ctx),
                    "run.finished",
                    "load test completed",
                    SystemEventOutcome::Success,
                );
                Ok(report)
            }
            Err(err) => {
                report.log_summary();
                log_system_event(
                    Some(&ctx.clone().with_stage(err.stage().as_ref())),
                    "run.finished",
                    &err.summary(),
                    SystemEventOutcome::Fault,
                );
                Err(err)
            }
        }
    }

    /// Run with Ctrl+C delivered as interrupts for the duration of the run.
    pub async fn run_with_signal_handling(&self) -> Result<RunReport, RunError> {
        let handle = self.interrupt_handle();
        let signal_task = tokio::spawn(async move {
            loop {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("received Ctrl+C, interrupting wait");
                        handle.interrupt();
                    }
                    Err(err) => {
                        error!(error = %err, "failed to listen for Ctrl+C");
                        break;
                    }
                }
            }
        });

        let result = self.run().await;
        signal_task.abort();
        result
    }

    async fn run_simple(control: &mut dyn Workload) -> Result<(), RunError> {
        control
            .run_simple()
            .await
            .map_err(|source| RunError::SimpleRun { source })
    }

    async fn run_concurrent(
        &self,
        control: &mut dyn Workload,
        report: &mut RunReport,
        interrupts: &mut broadcast::Receiver<()>,
    ) -> Result<(), RunError> {
        if !self.config.reuse_existing_schema {
            control
                .drop_schema()
                .await
                .map_err(|source| RunError::SchemaSetup {
                    operation: "drop_schema",
                    source,
                })?;
            control
                .create_schema_if_needed()
                .await
                .map_err(|source| RunError::SchemaSetup {
                    operation: "create_schema_if_needed",
                    source,
                })?;
            report.schema_reset = true;
            log_system_event(
                Some(
                    &LogContext::new()
                        .with_workload(&report.workload)
                        .with_stage("schema setup"),
                ),
                "run.schema",
                "schema dropped and recreated",
                SystemEventOutcome::Success,
            );
        }

        let mut first_error: Option<RunError> = None;
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut created = Vec::new();
        for assignment in assign_roles(self.config.threads.writers, self.config.threads.readers) {
            match self.factory.create() {
                Ok(workload) => created.push(WorkerUnit::from_assignment(
                    assignment,
                    workload,
                    stop_rx.clone(),
                )),
                Err(err) => record_start_failure(report, &mut first_error, assignment, err.to_string()),
            }
        }

        let mut pending = VecDeque::with_capacity(created.len());
        for mut unit in created {
            match unit.start() {
                Ok(()) => pending.push_back(unit),
                Err(err) => {
                    let assignment = WorkerAssignment {
                        id: unit.id(),
                        role: unit.role(),
                    };
                    record_start_failure(report, &mut first_error, assignment, err.to_string());
                }
            }
        }
        info!(
            workload = %report.workload,
            started = pending.len(),
            not_started = report.start_failures.len(),
            "worker units started"
        );

        let reporter = ThroughputReporter::spawn(
            pending
                .iter()
                .map(|unit| (unit.role(), unit.counters()))
                .collect(),
            self.config.reporting.interval,
        );

        if !self.config.limits.is_bounded() && !pending.is_empty() {
            warn!(
                workload = %report.workload,
                "no write, read or run-time limit configured; the run ends when workloads finish or on interrupt"
            );
        }

        let total = pending.len();
        let mut interrupts_open = true;
        while let Some(head) = pending.front_mut() {
            let worker_id = head.id();
            let remaining = total - report.workers.len();
            let joined = tokio::select! {
                biased;
                received = interrupts.recv(), if interrupts_open => {
                    match received {
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            report.interruptions = report.interruptions.saturating_add(1);
                            warn!(
                                worker_id,
                                remaining,
                                "interrupted while waiting for worker, waiting again"
                            );
                            if self.should_stop_workers(report.interruptions)
                                && !*stop_tx.borrow()
                            {
                                stop_tx.send_replace(true);
                                warn!(
                                    remaining,
                                    "asking workers to stop after their current operation"
                                );
                            }
                        }
                        Err(RecvError::Closed) => interrupts_open = false,
                    }
                    None
                }
                state = head.join() => Some(state),
            };

            let Some(state) = joined else {
                continue;
            };
            if let Some(unit) = pending.pop_front() {
                let summary = WorkerSummary {
                    id: unit.id(),
                    role: unit.role(),
                    state,
                    operations: unit.counters().operations(),
                    transient_errors: unit.counters().transient_errors(),
                    failure: unit.failure(),
                };
                debug!(
                    worker_id = summary.id,
                    role = %summary.role,
                    state = ?summary.state,
                    remaining = remaining - 1,
                    "worker joined"
                );
                if state == WorkerState::Failed && first_error.is_none() {
                    first_error = Some(RunError::WorkerExecution {
                        worker_id: summary.id,
                        role: summary.role,
                        reason: summary
                            .failure
                            .clone()
                            .unwrap_or_else(|| "worker failed".to_owned()),
                    });
                }
                report.workers.push(summary);
            }
        }

        reporter.shutdown().await;
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn should_stop_workers(&self, interruptions: u32) -> bool {
        self.config.stop_on_interrupt
            || !self.config.limits.is_bounded()
            || interruptions >= ESCALATING_INTERRUPTS
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn record_start_failure(
    report: &mut RunReport,
    first_error: &mut Option<RunError>,
    assignment: WorkerAssignment,
    reason: String,
) {
    error!(
        worker_id = assignment.id,
        role = %assignment.role,
        reason = %reason,
        "worker could not be started"
    );
    if first_error.is_none() {
        *first_error = Some(RunError::WorkerStart {
            worker_id: assignment.id,
            role: assignment.role,
            reason: reason.clone(),
        });
    }
    report.start_failures.push(StartFailure {
        id: assignment.id,
        role: assignment.role,
        reason,
    });
}
