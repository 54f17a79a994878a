//! Snapshot database storage
//!
//! This module provides the persistent database an ingestion run writes into.
//! Everything it stores is scoped to a snapshot:
//! - Snapshots themselves (one per logical date)
//! - Sources, ASNs and announced prefixes with their origin relations
//! - Expanded prefixes and their mappings back to announced prefixes

mod announcements;
mod snapshots;

pub use announcements::{AnnouncementStore, ExpandedPrefixRecord, SourceRecord, RELATION_ORIGIN};
pub use snapshots::{Snapshot, SnapshotRepository, DEFAULT_SNAPSHOT_DESCRIPTION};

use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus};
use crate::error::IngestResult;
use anyhow::{anyhow, Result};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
#[cfg(feature = "display")]
use tabled::Tabled;
use tracing::info;

/// Row counts of every entity within one snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(Tabled))]
pub struct SnapshotCounts {
    pub sources: u64,
    pub asns: u64,
    pub prefixes: u64,
    pub prefix_origins: u64,
    pub expanded_prefixes: u64,
    pub expanded_mappings: u64,
}

/// Main snapshot database (SQLite backend)
///
/// Owns the connection that every component of a run goes through. The
/// database is passed explicitly to whoever needs it; there is no shared
/// process-wide engine.
pub struct SnapshotDatabase {
    db: DatabaseConn,
}

impl SnapshotDatabase {
    /// Open the snapshot database at the specified path
    ///
    /// If the database doesn't exist, it will be created and initialized.
    /// An outdated, incompatible or corrupted schema is an error; the tables
    /// hold the only copy of every snapshot, so they are only dropped through
    /// [`SnapshotDatabase::recreate`].
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {
                info!("Snapshot database schema is current");
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing snapshot database schema");
                schema.initialize()?;
            }
            status => {
                return Err(anyhow!(
                    "Snapshot database '{}' schema is {}; run `bgpsnap init --reset` to recreate it (deletes all snapshots)",
                    path,
                    status
                ));
            }
        }

        Ok(Self { db })
    }

    /// Open the snapshot database at `path` and recreate its schema
    ///
    /// Drops every table first, deleting all snapshots.
    pub fn recreate(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn);
        info!("Recreating snapshot database schema at {}", path);
        schema.reset()?;
        schema.initialize()?;
        Ok(Self { db })
    }

    /// Open the snapshot database from a data directory
    ///
    /// Uses the standard database file path: `{data_dir}/bgpsnap.sqlite3`
    pub fn open_in_dir(data_dir: &str) -> Result<Self> {
        let path = format!("{}/bgpsnap.sqlite3", data_dir.trim_end_matches('/'));
        Self::open(&path)
    }

    /// Create an in-memory snapshot database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn).initialize()?;
        Ok(Self { db })
    }

    /// Snapshot identity repository
    pub fn snapshots(&self) -> SnapshotRepository<'_> {
        SnapshotRepository::new(&self.db.conn)
    }

    /// Announcement store outside any explicit transaction (reads, ad-hoc writes)
    pub fn announcements(&self) -> AnnouncementStore<'_> {
        AnnouncementStore::new(&self.db.conn)
    }

    /// Begin a unit of work. Dropping it without `commit` rolls back.
    pub fn begin(&self) -> IngestResult<Transaction<'_>> {
        Ok(self.db.transaction()?)
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// Schema status of the open database
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        SchemaManager::new(&self.db.conn).check_status()
    }

    /// Row counts of every entity within a snapshot
    pub fn counts(&self, snapshot_id: i64) -> IngestResult<SnapshotCounts> {
        let count = |table: &str| -> IngestResult<u64> {
            let n: u64 = self.db.conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE snapshot_id = ?1", table),
                [snapshot_id],
                |row| row.get(0),
            )?;
            Ok(n)
        };

        Ok(SnapshotCounts {
            sources: count("source")?,
            asns: count("asn")?,
            prefixes: count("prefix")?,
            prefix_origins: count("prefix_asn")?,
            expanded_prefixes: count("prefix_expanded")?,
            expanded_mappings: count("prefix_expanded_map")?,
        })
    }
}
