//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Workload and factory traits."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! The capability set the orchestrator consumes.

use async_trait::async_trait;
use lt_common::AppType;

use crate::error::{OperationError, WorkloadError};

/// A pluggable unit of work driven by the orchestrator.
///
/// Instances are not assumed to be thread-safe across workers: every worker
/// receives its own instance, and the orchestrator keeps a separate control
/// instance for schema management, simple runs, and teardown.
///
/// Operations run on the async runtime. Blocking clients belong behind
/// `tokio::task::spawn_blocking`; the worker loop yields between operations
/// but cannot preempt a call that blocks indefinitely.
#[async_trait]
pub trait Workload: Send {
    /// Human readable workload name used in logs and reports.
    fn name(&self) -> &str;

    /// Execution shape declared by the workload.
    fn app_type(&self) -> AppType {
        AppType::Concurrent
    }

    /// Create the schema the workload needs. Must be idempotent.
    async fn create_schema_if_needed(&mut self) -> Result<(), WorkloadError> {
        Ok(())
    }

    /// Remove the schema. Must be idempotent.
    async fn drop_schema(&mut self) -> Result<(), WorkloadError> {
        Ok(())
    }

    /// Perform one write operation.
    async fn perform_write(&mut self) -> Result<(), OperationError>;

    /// Perform one read operation.
    async fn perform_read(&mut self) -> Result<(), OperationError>;

    /// Single synchronous execution for simple workloads.
    async fn run_simple(&mut self) -> Result<(), WorkloadError> {
        Err(WorkloadError::Unsupported {
            workload: self.name().to_owned(),
            operation: "run_simple",
        })
    }

    /// Stop condition owned by the workload (operation budget, run time).
    fn has_finished(&self) -> bool {
        false
    }

    /// Release every resource held by the instance. Safe after partial setup.
    async fn teardown(&mut self) {}
}

/// Produces fresh workload instances, one per worker.
pub trait WorkloadFactory: Send + Sync {
    /// Create a new, independently owned workload instance.
    fn create(&self) -> Result<Box<dyn Workload>, WorkloadError>;
}

impl<F> WorkloadFactory for F
where
    F: Fn() -> Result<Box<dyn Workload>, WorkloadError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn Workload>, WorkloadError> {
        self()
    }
}
