//! ---
//! lt_section: "02-workloads"
//! lt_subsection: "module"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "In-process table store backing the bundled workloads."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

type Table = HashMap<String, Vec<u8>>;

/// Errors returned by [`InMemoryStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed table has not been created (or was dropped).
    #[error("table {0} does not exist")]
    MissingTable(String),
}

/// Cheaply cloneable handle to a shared set of in-memory tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table; returns `false` when it already existed.
    pub fn create_table(&self, table: &str) -> bool {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return false;
        }
        tables.insert(table.to_owned(), Table::new());
        true
    }

    /// Drop a table; returns `false` when it did not exist.
    pub fn drop_table(&self, table: &str) -> bool {
        self.tables.write().remove(table).is_some()
    }

    /// Whether the table exists.
    pub fn table_exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Insert or overwrite a value.
    pub fn put(&self, table: &str, key: String, value: Vec<u8>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_owned()))?;
        rows.insert(key, value);
        Ok(())
    }

    /// Fetch a value.
    pub fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_owned()))?;
        Ok(rows.get(key).cloned())
    }

    /// Number of rows held by the table.
    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        let tables = self.tables.read();
        tables
            .get(table)
            .map(HashMap::len)
            .ok_or_else(|| StoreError::MissingTable(table.to_owned()))
    }
}
