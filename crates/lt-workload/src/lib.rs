//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Workload contract and bundled workloads."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
//! Workload contract consumed by the orchestrator.
//!
//! A workload owns the schema lifecycle and the per-operation read/write
//! logic; the orchestrator only drives it. The bundled workloads run against
//! [`InMemoryStore`] so the harness can be exercised without a backend.

#![warn(missing_docs)]

pub mod apps;
pub mod budget;
pub mod error;
pub mod registry;
pub mod store;
pub mod traits;

pub use apps::{HelloWorld, HelloWorldFactory, KeyValue, KeyValueFactory};
pub use budget::OperationBudget;
pub use error::{OperationError, WorkloadError};
pub use lt_common::AppType;
pub use registry::WorkloadKind;
pub use store::{InMemoryStore, StoreError};
pub use traits::{Workload, WorkloadFactory};
