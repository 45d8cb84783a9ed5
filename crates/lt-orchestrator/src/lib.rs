//! ---
//! lt_section: "01-core-orchestration"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Concurrent worker orchestration kernel."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Concurrent worker orchestrator.
//!
//! Partitions the configured thread budget into writer and reader
//! [`WorkerUnit`]s, runs them against per-worker workload instances, waits
//! for every unit to reach a terminal state, and tears the workload down
//! exactly once on every exit path.
#![warn(missing_docs)]

pub mod error;
pub mod orchestrator;
pub mod report;
pub mod worker;

pub use error::{RunError, RunStage, WorkerError};
pub use orchestrator::{InterruptHandle, Orchestrator};
pub use report::{RunReport, StartFailure, ThroughputReporter, WorkerSummary};
pub use worker::{
    assign_roles, WorkerAssignment, WorkerCounters, WorkerRole, WorkerState, WorkerUnit,
};
