//! ---
//! lt_section: "01-core-orchestration"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Run-level error taxonomy and exit status mapping."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use lt_workload::WorkloadError;
use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::worker::WorkerRole;

/// Stage of a run in which a fatal error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum RunStage {
    /// Creating the control workload instance.
    #[strum(serialize = "initialization")]
    Initialization,
    /// Dropping and recreating the schema.
    #[strum(serialize = "schema setup")]
    SchemaSetup,
    /// Creating or starting a worker unit.
    #[strum(serialize = "worker start")]
    WorkerStart,
    /// A worker unit failed while running.
    #[strum(serialize = "worker execution")]
    WorkerExecution,
    /// The one-shot execution of a simple workload.
    #[strum(serialize = "simple run")]
    SimpleRun,
}

impl RunStage {
    /// Process exit status reported for a failure in this stage.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStage::Initialization => 2,
            RunStage::SchemaSetup => 3,
            RunStage::WorkerStart => 4,
            RunStage::WorkerExecution => 5,
            RunStage::SimpleRun => 6,
        }
    }
}

/// First fatal cause observed during a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The control workload instance could not be created.
    #[error("failed to initialize workload: {source}")]
    Initialization {
        /// Underlying workload error.
        #[source]
        source: WorkloadError,
    },

    /// Dropping or creating the schema failed.
    #[error("schema setup failed during {operation}: {source}")]
    SchemaSetup {
        /// `drop_schema` or `create_schema_if_needed`.
        operation: &'static str,
        /// Underlying workload error.
        #[source]
        source: WorkloadError,
    },

    /// A worker could not be created or started.
    #[error("failed to start worker #{worker_id} ({role}): {reason}")]
    WorkerStart {
        /// Identifier of the worker.
        worker_id: usize,
        /// Role of the worker.
        role: WorkerRole,
        /// Why the worker could not start.
        reason: String,
    },

    /// A worker stopped on a fatal operation failure.
    #[error("worker #{worker_id} ({role}) failed: {reason}")]
    WorkerExecution {
        /// Identifier of the worker.
        worker_id: usize,
        /// Role of the worker.
        role: WorkerRole,
        /// Failure reported by the workload.
        reason: String,
    },

    /// The simple workload's one-shot execution failed.
    #[error("simple run failed: {source}")]
    SimpleRun {
        /// Underlying workload error.
        #[source]
        source: WorkloadError,
    },
}

impl RunError {
    /// Stage in which the error surfaced.
    pub fn stage(&self) -> RunStage {
        match self {
            RunError::Initialization { .. } => RunStage::Initialization,
            RunError::SchemaSetup { .. } => RunStage::SchemaSetup,
            RunError::WorkerStart { .. } => RunStage::WorkerStart,
            RunError::WorkerExecution { .. } => RunStage::WorkerExecution,
            RunError::SimpleRun { .. } => RunStage::SimpleRun,
        }
    }

    /// Human-readable one-line summary naming the failed stage.
    pub fn summary(&self) -> String {
        format!("load test failed during {}: {}", self.stage(), self)
    }
}

/// Errors raised when starting a [`WorkerUnit`](crate::WorkerUnit).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// `start` was called on a unit that already started.
    #[error("worker #{0} was already started")]
    AlreadyStarted(usize),

    /// No tokio runtime is available to spawn the worker on.
    #[error("worker #{0} cannot start outside a tokio runtime")]
    NoRuntime(usize),
}
