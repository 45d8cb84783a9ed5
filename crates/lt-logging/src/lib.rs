//! ---
//! lt_section: "03-logging"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Structured logging context, macros, and lifecycle events."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the load tester crates.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

#[doc(hidden)]
pub use tracing as __tracing;

/// Initialize a baseline tracing subscriber suitable for tests and tooling.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_test_writer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Workload name associated with the log event.
    pub workload: Option<&'a str>,
    /// Worker unit identifier.
    pub worker: Option<usize>,
    /// Worker role (`write` or `read`).
    pub role: Option<&'a str>,
    /// Orchestration stage the event belongs to.
    pub stage: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a workload name.
    pub fn with_workload(mut self, workload: &'a str) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Attach a worker identifier.
    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attach a worker role.
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach an orchestration stage.
    pub fn with_stage(mut self, stage: &'a str) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The stage completed successfully.
    Success,
    /// The stage failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    match outcome {
        SystemEventOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            workload = ctx.workload.unwrap_or(""),
            worker = ctx.worker,
            role = ctx.role.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            workload = ctx.workload.unwrap_or(""),
            worker = ctx.worker,
            role = ctx.role.unwrap_or(""),
            stage = ctx.stage.unwrap_or(""),
            message = %message
        ),
    }
}
