//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Name-based registry of the bundled workloads."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use std::str::FromStr;
use std::sync::Arc;

use lt_common::{AppType, LoadTesterConfig};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::apps::{HelloWorldFactory, KeyValueFactory};
use crate::budget::OperationBudget;
use crate::error::WorkloadError;
use crate::store::InMemoryStore;
use crate::traits::WorkloadFactory;

/// Workloads shipped with the load tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum WorkloadKind {
    /// One-shot write and read back of a single record.
    HelloWorld,
    /// Sequential writes and verified random reads.
    KeyValue,
}

impl WorkloadKind {
    /// Resolve a workload by its registry name.
    pub fn resolve(name: &str) -> Result<Self, WorkloadError> {
        Self::from_str(name).map_err(|_| {
            WorkloadError::Config(format!(
                "unknown workload '{}'; available: {}",
                name,
                Self::iter()
                    .map(|kind| kind.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Execution shape declared by the workload.
    pub fn app_type(&self) -> AppType {
        match self {
            WorkloadKind::HelloWorld => AppType::Simple,
            WorkloadKind::KeyValue => AppType::Concurrent,
        }
    }

    /// One-line description used by `--list-workloads`.
    pub fn description(&self) -> &'static str {
        match self {
            WorkloadKind::HelloWorld => {
                "Writes one employee record and reads it back. Good starting point."
            }
            WorkloadKind::KeyValue => {
                "Sequential-key writers and random-key readers with value verification."
            }
        }
    }

    /// Build the factory for this workload against `store`.
    pub fn factory(
        &self,
        config: &LoadTesterConfig,
        store: InMemoryStore,
    ) -> Arc<dyn WorkloadFactory> {
        match self {
            WorkloadKind::HelloWorld => Arc::new(HelloWorldFactory::new(store)),
            WorkloadKind::KeyValue => Arc::new(KeyValueFactory::new(
                store,
                config.key_value.clone(),
                OperationBudget::from_limits(&config.limits),
            )),
        }
    }
}
