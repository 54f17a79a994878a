//! Database module
//!
//! This module provides all database functionality for bgpsnap, organized into:
//!
//! - **core**: Core database infrastructure (SQLite connections, schema management)
//! - **snapshot**: The snapshot database that ingestion runs write into
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/               # Foundation
//! │   ├── connection      # SQLite DatabaseConn wrapper
//! │   └── schema          # Schema definitions and management
//! │
//! └── snapshot/           # Persistent storage
//!     ├── snapshots       # Snapshot identity (one per logical date)
//!     └── announcements   # Sources, ASNs, prefixes, expansions
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use bgpsnap::database::SnapshotDatabase;
//!
//! let db = SnapshotDatabase::open_in_dir("~/.bgpsnap")?;
//! let snapshot_id = db.snapshots().resolve_or_create(date, None)?;
//! let counts = db.counts(snapshot_id)?;
//! ```

pub mod core;
pub mod snapshot;

pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};

pub use snapshot::{
    AnnouncementStore, ExpandedPrefixRecord, Snapshot, SnapshotCounts, SnapshotDatabase,
    SnapshotRepository, SourceRecord, DEFAULT_SNAPSHOT_DESCRIPTION, RELATION_ORIGIN,
};

