//! Byte-level persistence for per-session conversation state.
//!
//! Values are opaque bytes; the TTL envelope and JSON encoding live one
//! layer up, in reverie-core.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const SESSION_STATES_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("session_states");

#[derive(Debug, Clone)]
pub struct SessionStateStorage {
    db: Arc<Database>,
}

impl SessionStateStorage {
    /// Open the store, creating its table on first use.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(SESSION_STATES_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Write one session's encoded state, replacing any previous value.
    pub fn put_raw(&self, session_id: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION_STATES_TABLE)?;
            table.insert(session_id, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read one session's encoded state.
    pub fn get_raw(&self, session_id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_STATES_TABLE)?;

        let Some(data) = table.get(session_id)? else {
            return Ok(None);
        };
        Ok(Some(data.value().to_vec()))
    }

    /// Read every stored session as `(session_id, encoded state)` pairs.
    pub fn list_raw(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_STATES_TABLE)?;

        table
            .iter()?
            .map(|item| {
                let (key, value) = item?;
                Ok((key.value().to_string(), value.value().to_vec()))
            })
            .collect()
    }

    pub fn exists(&self, session_id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_STATES_TABLE)?;
        Ok(table.get(session_id)?.is_some())
    }

    /// Remove one session. Returns whether an entry was actually there.
    pub fn delete(&self, session_id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(SESSION_STATES_TABLE)?;
            table.remove(session_id)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }
}
