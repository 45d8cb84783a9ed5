//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Workload and operation error taxonomy."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Error types surfaced by workloads.

use thiserror::Error;

/// Lifecycle failure raised by a workload (creation, schema, simple run).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    /// The workload could not acquire its client or connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// Schema creation or removal failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// A one-shot execution failed.
    #[error("execution error: {0}")]
    Execution(String),

    /// The workload does not implement the requested lifecycle operation.
    #[error("workload {workload} does not support {operation}")]
    Unsupported {
        /// Workload name.
        workload: String,
        /// Operation that was requested.
        operation: &'static str,
    },

    /// The workload rejected its configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure of a single read or write, classified by the workload.
///
/// Transient failures are logged and the worker keeps looping; fatal
/// failures stop the worker and fail the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Recoverable failure; the next operation is attempted as usual.
    #[error("transient operation failure: {0}")]
    Transient(String),

    /// Unrecoverable failure; the worker stops.
    #[error("fatal operation failure: {0}")]
    Fatal(String),
}

impl OperationError {
    /// Build a transient failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Build a fatal failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Whether the failure must stop the worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Message without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(message) | Self::Fatal(message) => message,
        }
    }
}
