//! ---
//! lt_section: "04-configuration"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Shared primitives for the load tester runtime."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Shared primitives for the load tester workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the workload, orchestrator, and binary crates.

pub mod config;
pub mod logging;

pub use config::{
    AppType, KeyValueConfig, LimitsConfig, LoadTesterConfig, LoadedConfig, LoggingConfig,
    ReportingConfig, ThreadsConfig,
};
pub use logging::{init_tracing, LogFormat};
