//! Reverie Storage - Low-level persistence layer
//!
//! This crate provides the persistence layer for Reverie, using redb as the
//! embedded database for session state and flat JSON files for the long-term
//! memory and desire stores. The session API is byte-level; the typed TTL
//! envelope lives in reverie-core.
//!
//! # Tables
//!
//! - `session_states` - Per-session conversation state envelopes

pub mod desire_file;
pub mod memory_file;
pub mod session;
pub mod time_utils;

use anyhow::Result;
use redb::Database;
use std::sync::Arc;

pub use desire_file::DesireFileStore;
pub use memory_file::{MemoryFile, MemoryFileStore};
pub use session::SessionStateStorage;

/// Central storage manager that initializes the database-backed subsystems.
pub struct Storage {
    db: Arc<Database>,
    pub sessions: SessionStateStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file if it doesn't exist and initialize
    /// all required tables.
    pub fn new(path: &str) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);
        let sessions = SessionStateStorage::new(db.clone())?;

        Ok(Self { db, sessions })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}
