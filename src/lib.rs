#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! bgpsnap - BGP snapshot ingestion
//!
//! bgpsnap ingests raw BGP announcement batches into dated snapshots and
//! expands every announced prefix into fixed-granularity blocks (`/24` for
//! IPv4, `/48` for IPv6) with traceability back to the announcement. It can be
//! used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Pipeline, storage and configuration | `rusqlite`, `ipnet`, `oneio` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `bgpsnap` binary | All above + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! bgpsnap = { version = "0.1", default-features = false }
//!
//! # Default (CLI binary)
//! bgpsnap = "0.1"
//! ```
//!
//! # Architecture
//!
//! - **[`pipeline`]**: normalization, prefix expansion, source registry and the
//!   per-file transactional ingestion driver
//! - **[`database`]**: SQLite connection, schema and snapshot-scoped repositories
//! - **[`datasets`]**: raw batch producers (the demonstration collector)
//! - **[`config`]**: configuration management
//! - **[`error`]**: the ingestion error taxonomy
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bgpsnap::{IngestPipeline, SnapshotConfig, SnapshotDatabase};
//!
//! let config = SnapshotConfig::new(&None)?;
//! config.ensure_directories()?;
//! let db = SnapshotDatabase::open(&config.sqlite_path())?;
//!
//! let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let report = IngestPipeline::new(&db).ingest(&["bgp_ixp_df.json"], date)?;
//! println!("{} file(s) committed", report.committed());
//!
//! let counts = db.counts(report.snapshot_id)?;
//! println!("{} expanded prefixes", counts.expanded_prefixes);
//! ```

pub mod config;
pub mod database;
pub mod datasets;
pub mod error;
pub mod output;
pub mod pipeline;

// =============================================================================
// Configuration and errors
// =============================================================================

pub use config::SnapshotConfig;
pub use error::{IngestError, IngestResult};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};

pub use database::{
    AnnouncementStore, ExpandedPrefixRecord, Snapshot, SnapshotCounts, SnapshotDatabase,
    SnapshotRepository, SourceRecord,
};

// =============================================================================
// Pipeline
// =============================================================================

pub use pipeline::{
    expand_prefix, normalize_batch, AnnouncedRecord, ExpandedPrefixCandidate, FileReport,
    FileStatus, IngestPipeline, IngestReport, RawAnnouncement, SourceRegistry,
};

pub use datasets::collect_sample;

pub use output::OutputFormat;
