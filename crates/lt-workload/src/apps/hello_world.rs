//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "One-shot demonstration workload."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use async_trait::async_trait;
use lt_common::AppType;
use tracing::info;

use crate::error::{OperationError, WorkloadError};
use crate::store::InMemoryStore;
use crate::traits::{Workload, WorkloadFactory};

const TABLE: &str = "employee";
const RECORD_KEY: &str = "employee:1";
const RECORD_VALUE: &str = "John,35,Texas";

/// Writes a single employee record and reads it back.
#[derive(Debug)]
pub struct HelloWorld {
    client: Option<InMemoryStore>,
}

impl HelloWorld {
    /// Bind a new instance to the store.
    pub fn connect(store: &InMemoryStore) -> Self {
        Self {
            client: Some(store.clone()),
        }
    }

    fn client(&self) -> Result<&InMemoryStore, WorkloadError> {
        self.client
            .as_ref()
            .ok_or_else(|| WorkloadError::Connection("client already closed".into()))
    }
}

#[async_trait]
impl Workload for HelloWorld {
    fn name(&self) -> &str {
        "hello-world"
    }

    fn app_type(&self) -> AppType {
        AppType::Simple
    }

    async fn perform_write(&mut self) -> Result<(), OperationError> {
        Err(OperationError::fatal("hello-world only supports simple runs"))
    }

    async fn perform_read(&mut self) -> Result<(), OperationError> {
        Err(OperationError::fatal("hello-world only supports simple runs"))
    }

    async fn run_simple(&mut self) -> Result<(), WorkloadError> {
        let store = self.client()?;
        if store.create_table(TABLE) {
            info!(table = TABLE, "created table");
        }
        store
            .put(TABLE, RECORD_KEY.to_owned(), RECORD_VALUE.as_bytes().to_vec())
            .map_err(|err| WorkloadError::Execution(err.to_string()))?;
        let stored = store
            .get(TABLE, RECORD_KEY)
            .map_err(|err| WorkloadError::Execution(err.to_string()))?;
        match stored {
            Some(value) if value == RECORD_VALUE.as_bytes() => {
                info!(key = RECORD_KEY, value = RECORD_VALUE, "record written and read back");
                Ok(())
            }
            Some(_) => Err(WorkloadError::Execution(format!(
                "record {} read back with unexpected contents",
                RECORD_KEY
            ))),
            None => Err(WorkloadError::Execution(format!(
                "record {} missing after write",
                RECORD_KEY
            ))),
        }
    }

    async fn teardown(&mut self) {
        self.client = None;
    }
}

/// Factory handing out [`HelloWorld`] instances bound to one store.
#[derive(Debug, Clone)]
pub struct HelloWorldFactory {
    store: InMemoryStore,
}

impl HelloWorldFactory {
    /// Create a factory for the given store.
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

impl WorkloadFactory for HelloWorldFactory {
    fn create(&self) -> Result<Box<dyn Workload>, WorkloadError> {
        Ok(Box::new(HelloWorld::connect(&self.store)))
    }
}
