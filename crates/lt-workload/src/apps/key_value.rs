//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Sequential-write, random-read key-value workload."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lt_common::KeyValueConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::budget::OperationBudget;
use crate::error::{OperationError, WorkloadError};
use crate::store::{InMemoryStore, StoreError};
use crate::traits::{Workload, WorkloadFactory};

const TABLE: &str = "key_value";

/// Writes sequential keys and reads random keys among those written,
/// verifying each value.
///
/// Failure classification: a key that was claimed but is not visible yet is
/// transient; a missing table or a corrupt value is fatal.
#[derive(Debug)]
pub struct KeyValue {
    client: Option<InMemoryStore>,
    settings: KeyValueConfig,
    budget: Arc<OperationBudget>,
    next_key: Arc<AtomicU64>,
    rng: StdRng,
}

impl KeyValue {
    fn client(&self) -> Result<&InMemoryStore, OperationError> {
        self.client
            .as_ref()
            .ok_or_else(|| OperationError::fatal("client already closed"))
    }

    fn keys_written(&self) -> u64 {
        self.next_key
            .load(Ordering::Acquire)
            .min(self.settings.num_unique_keys)
    }

    /// Value stored under `key`, padded or truncated to the configured size.
    fn value_for(&self, key: &str) -> Vec<u8> {
        let seed = format!("val:{}", key);
        seed.bytes().cycle().take(self.settings.value_size).collect()
    }
}

fn key_for(index: u64) -> String {
    format!("key:{}", index)
}

fn classify_store_error(err: StoreError) -> OperationError {
    match err {
        StoreError::MissingTable(_) => OperationError::fatal(err.to_string()),
    }
}

#[async_trait]
impl Workload for KeyValue {
    fn name(&self) -> &str {
        "key-value"
    }

    async fn create_schema_if_needed(&mut self) -> Result<(), WorkloadError> {
        let store = self
            .client
            .as_ref()
            .ok_or_else(|| WorkloadError::Connection("client already closed".into()))?;
        if store.create_table(TABLE) {
            info!(table = TABLE, "created table");
        } else {
            debug!(table = TABLE, "table already exists");
        }
        Ok(())
    }

    async fn drop_schema(&mut self) -> Result<(), WorkloadError> {
        let store = self
            .client
            .as_ref()
            .ok_or_else(|| WorkloadError::Connection("client already closed".into()))?;
        if !store.table_exists(TABLE) {
            debug!(table = TABLE, "no table to drop");
            return Ok(());
        }
        if store.drop_table(TABLE) {
            info!(table = TABLE, "dropped table");
        }
        Ok(())
    }

    async fn perform_write(&mut self) -> Result<(), OperationError> {
        let index = self.next_key.fetch_add(1, Ordering::AcqRel) % self.settings.num_unique_keys;
        let key = key_for(index);
        let value = self.value_for(&key);
        self.client()?
            .put(TABLE, key, value)
            .map_err(classify_store_error)?;
        self.budget.record_write();
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn perform_read(&mut self) -> Result<(), OperationError> {
        let written = self.keys_written();
        // Nothing written by this run yet: sample the whole key space, misses are expected.
        let (index, must_exist) = if written == 0 {
            (self.rng.gen_range(0..self.settings.num_unique_keys), false)
        } else {
            (self.rng.gen_range(0..written), true)
        };
        let key = key_for(index);
        let stored = self
            .client()?
            .get(TABLE, &key)
            .map_err(classify_store_error)?;
        match stored {
            Some(value) if value != self.value_for(&key) => {
                return Err(OperationError::fatal(format!(
                    "value for {} does not match what was written",
                    key
                )));
            }
            Some(_) => {}
            None if must_exist => {
                return Err(OperationError::transient(format!(
                    "{} not visible yet",
                    key
                )));
            }
            None => trace!(%key, "read miss before any write"),
        }
        self.budget.record_read();
        tokio::task::yield_now().await;
        Ok(())
    }

    fn has_finished(&self) -> bool {
        self.budget.is_exhausted()
    }

    async fn teardown(&mut self) {
        if self.client.take().is_some() {
            info!(
                writes = self.budget.writes(),
                reads = self.budget.reads(),
                "key-value client closed"
            );
        }
    }
}

/// Factory sharing one store, budget, and key cursor across instances.
#[derive(Debug, Clone)]
pub struct KeyValueFactory {
    store: InMemoryStore,
    settings: KeyValueConfig,
    budget: Arc<OperationBudget>,
    next_key: Arc<AtomicU64>,
}

impl KeyValueFactory {
    /// Create a factory for the given store, settings, and budget.
    pub fn new(store: InMemoryStore, settings: KeyValueConfig, budget: OperationBudget) -> Self {
        Self {
            store,
            settings,
            budget: Arc::new(budget),
            next_key: Arc::new(AtomicU64::new(0)),
        }
    }

    #[cfg(test)]
    fn budget(&self) -> Arc<OperationBudget> {
        Arc::clone(&self.budget)
    }
}

impl WorkloadFactory for KeyValueFactory {
    fn create(&self) -> Result<Box<dyn Workload>, WorkloadError> {
        self.settings
            .validate()
            .map_err(|err| WorkloadError::Config(err.to_string()))?;
        Ok(Box::new(KeyValue {
            client: Some(self.store.clone()),
            settings: self.settings.clone(),
            budget: Arc::clone(&self.budget),
            next_key: Arc::clone(&self.next_key),
            rng: StdRng::from_entropy(),
        }))
    }
}
