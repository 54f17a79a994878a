//! Ingestion pipeline
//!
//! Turns raw announcement batches into snapshot-scoped rows:
//!
//! 1. resolve (or create) the snapshot for the logical date, once per run
//! 2. for each raw file, normalize its records; an empty file is skipped
//! 3. inside one transaction per file, resolve each record's source, record
//!    the ASN, the announced prefix and its origin relation, then every
//!    expanded prefix and its mapping back to the announcement
//! 4. commit the file, or roll the whole file back on the first error
//!
//! A failed file does not stop the run. The returned [`IngestReport`] lists
//! the outcome of every file; the run itself fails only when no file could be
//! committed.
//!
//! # Example
//!
//! ```rust,ignore
//! use bgpsnap::database::SnapshotDatabase;
//! use bgpsnap::pipeline::IngestPipeline;
//!
//! let db = SnapshotDatabase::open_in_dir("~/.bgpsnap")?;
//! let report = IngestPipeline::new(&db).ingest(&["data/raw/2024-05-01/bgp_ixp_df.json"], date)?;
//! if report.has_failures() {
//!     eprintln!("{} file(s) failed", report.failed());
//! }
//! ```

pub mod expand;
pub mod normalize;
pub mod registry;

pub use expand::{
    expand_network, expand_prefix, ip_version, parse_prefix, ExpandedPrefixCandidate, Expansion,
    IPV4_GRANULARITY, IPV6_GRANULARITY,
};
pub use normalize::{
    load_raw_file, normalize_batch, normalize_entries, AnnouncedRecord, RawAnnouncement,
    DEFAULT_SOURCE_CODE, DEFAULT_SOURCE_TYPE,
};
pub use registry::{SourceRegistry, SourceStore};

use crate::database::{AnnouncementStore, SnapshotDatabase};
use crate::error::{IngestError, IngestResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "display")]
use tabled::Tabled;
use tracing::{debug, info, warn};

/// Snapshot description used by pipeline runs
pub const PIPELINE_SNAPSHOT_DESCRIPTION: &str = "BGP ingest";

/// Outcome of one raw file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// All records were written and committed
    Committed,
    /// The file held no records; no transaction was opened
    Skipped,
    /// Nothing from the file was written
    Failed { kind: String, reason: String },
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Committed => write!(f, "committed"),
            FileStatus::Skipped => write!(f, "skipped"),
            FileStatus::Failed { reason, .. } => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-file line of an ingestion report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(Tabled))]
pub struct FileReport {
    pub file: String,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Records written
    pub records: usize,
    /// Expanded prefix candidates written (before deduplication)
    pub expanded: u64,
}

impl FileReport {
    fn committed(file: &str, stats: FileStats) -> Self {
        FileReport {
            file: file.to_string(),
            status: FileStatus::Committed,
            records: stats.records,
            expanded: stats.expanded,
        }
    }

    fn skipped(file: &str) -> Self {
        FileReport {
            file: file.to_string(),
            status: FileStatus::Skipped,
            records: 0,
            expanded: 0,
        }
    }

    fn failed(file: &str, error: &IngestError) -> Self {
        FileReport {
            file: file.to_string(),
            status: FileStatus::Failed {
                kind: error.kind().to_string(),
                reason: error.to_string(),
            },
            records: 0,
            expanded: 0,
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub snapshot_id: i64,
    pub logical_date: NaiveDate,
    pub files: Vec<FileReport>,
}

impl IngestReport {
    pub fn committed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Committed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    /// True when at least one file was not written
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }
}

/// Counters for one committed file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub records: usize,
    pub expanded: u64,
}

/// Write normalized records through `store`, resolving sources via `registry`.
///
/// Stops at the first error; the caller owns the transaction `store` writes
/// into and decides whether to commit.
pub fn persist_records(
    store: &AnnouncementStore<'_>,
    registry: &mut SourceRegistry,
    records: &[AnnouncedRecord],
) -> IngestResult<FileStats> {
    let snapshot_id = registry.snapshot_id();
    let mut stats = FileStats::default();

    for record in records {
        let source_id = registry.resolve(store, &record.source_code, &record.source_type)?;

        store.insert_asn(snapshot_id, record.origin_asn)?;
        store.insert_prefix(
            snapshot_id,
            &record.prefix,
            ip_version(&record.prefix),
            source_id,
            &record.as_path,
        )?;
        store.insert_prefix_origin(snapshot_id, &record.prefix, source_id, record.origin_asn)?;

        let expansion = expand_prefix(&record.prefix, record.origin_asn, &record.source_code)?;
        debug!(
            "Expanding {} into {} candidate(s)",
            record.prefix,
            expansion.candidate_count()
        );
        for candidate in expansion {
            let prefix_exp = candidate.prefix.to_string();
            store.insert_expanded_prefix(
                snapshot_id,
                &prefix_exp,
                candidate.ip_version(),
                candidate.origin_asn,
            )?;
            store.insert_expanded_mapping(snapshot_id, &prefix_exp, &record.prefix, source_id)?;
            stats.expanded += 1;
        }

        stats.records += 1;
    }

    Ok(stats)
}

/// Drives a run over a set of raw files for one logical date
pub struct IngestPipeline<'a> {
    db: &'a SnapshotDatabase,
    description: String,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(db: &'a SnapshotDatabase) -> Self {
        Self {
            db,
            description: PIPELINE_SNAPSHOT_DESCRIPTION.to_string(),
        }
    }

    /// Description stored on a snapshot this pipeline creates
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Ingest `raw_files` into the snapshot for `snapshot_date`.
    ///
    /// Returns a report with one entry per file, in input order. Fails with
    /// [`IngestError::AllFilesFailed`] when files were given, none of them was
    /// committed and at least one failed.
    pub fn ingest<S: AsRef<str>>(
        &self,
        raw_files: &[S],
        snapshot_date: NaiveDate,
    ) -> IngestResult<IngestReport> {
        let snapshot_id = self
            .db
            .snapshots()
            .resolve_or_create(snapshot_date, Some(&self.description))?;
        info!(
            "Ingesting {} raw file(s) into snapshot {} ({})",
            raw_files.len(),
            snapshot_id,
            snapshot_date
        );

        let mut registry = SourceRegistry::new(snapshot_id);
        let mut files = Vec::with_capacity(raw_files.len());
        let mut first_failure: Option<String> = None;

        for raw_file in raw_files {
            let path = raw_file.as_ref();
            let file_report = match self.ingest_file(path, &mut registry) {
                Ok(Some(stats)) => {
                    registry.commit();
                    info!(
                        "Committed {}: {} record(s), {} expanded prefix(es)",
                        path, stats.records, stats.expanded
                    );
                    FileReport::committed(path, stats)
                }
                Ok(None) => {
                    info!("Skipping {}: no records", path);
                    FileReport::skipped(path)
                }
                Err(e) => {
                    registry.rollback();
                    warn!("Rolled back {}: {}", path, e);
                    if first_failure.is_none() {
                        first_failure = Some(format!("{}: {}", path, e));
                    }
                    FileReport::failed(path, &e)
                }
            };
            files.push(file_report);
        }

        let report = IngestReport {
            snapshot_id,
            logical_date: snapshot_date,
            files,
        };

        if let Some(first) = first_failure {
            if report.committed() == 0 {
                return Err(IngestError::AllFilesFailed {
                    failed: report.failed(),
                    first,
                });
            }
        }

        Ok(report)
    }

    /// Process one file in its own transaction. `Ok(None)` means the file was empty.
    fn ingest_file(
        &self,
        path: &str,
        registry: &mut SourceRegistry,
    ) -> IngestResult<Option<FileStats>> {
        let records = load_raw_file(path)?;
        if records.is_empty() {
            return Ok(None);
        }

        let tx = self.db.begin()?;
        let stats = persist_records(&AnnouncementStore::new(&tx), registry, &records)?;
        tx.commit()?;
        Ok(Some(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SnapshotCounts;
    use std::path::Path;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn write_raw(dir: &Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path.to_str().unwrap().to_string()
    }

    const IXP_DF: &str = r#"[
        {"prefix": "200.160.0.0/16", "as_path": "65001 65002 65003", "origin_asn": 65003, "source_code": "ixp_df"}
    ]"#;

    const GLOBAL: &str = r#"[
        {"prefix": "187.16.0.0/20", "as_path": "65010 65020", "origin_asn": 65020, "source_code": "global"},
        {"prefix": "192.0.2.0/24", "as_path": "65010 65030", "origin_asn": 65030, "source_code": "global"}
    ]"#;

    #[test]
    fn test_ingest_counts() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![
            write_raw(dir.path(), "bgp_ixp_df.json", IXP_DF),
            write_raw(dir.path(), "bgp_global.json", GLOBAL),
        ];

        let report = IngestPipeline::new(&db)
            .ingest(&files, date("2024-05-01"))
            .unwrap();
        assert_eq!(report.committed(), 2);
        assert!(!report.has_failures());
        assert_eq!(report.files[0].records, 1);
        assert_eq!(report.files[0].expanded, 256);
        assert_eq!(report.files[1].expanded, 17);

        let counts = db.counts(report.snapshot_id).unwrap();
        assert_eq!(
            counts,
            SnapshotCounts {
                sources: 2,
                asns: 3,
                prefixes: 3,
                prefix_origins: 3,
                expanded_prefixes: 256 + 16 + 1,
                expanded_mappings: 256 + 16 + 1,
            }
        );

        let snapshot = db.snapshots().get_by_date(date("2024-05-01")).unwrap().unwrap();
        assert_eq!(snapshot.description, PIPELINE_SNAPSHOT_DESCRIPTION);
    }

    #[test]
    fn test_ipv6_expansion_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let file = write_raw(
            dir.path(),
            "bgp_ixp_sp.json",
            r#"[{"prefix": "2804:10::/32", "as_path": "64512 64513", "origin_asn": 64513, "source_code": "ixp_sp", "source_type": "global"}]"#,
        );

        let report = IngestPipeline::new(&db)
            .ingest(&[file], date("2024-05-01"))
            .unwrap();
        let counts = db.counts(report.snapshot_id).unwrap();
        assert_eq!(counts.expanded_prefixes, 65_536);
        assert_eq!(counts.expanded_mappings, 65_536);

        let sources = db.announcements().sources(report.snapshot_id).unwrap();
        assert_eq!(sources[0].source_type, "global");

        let ip_version: u8 = db
            .connection()
            .query_row(
                "SELECT ip_version FROM prefix WHERE prefix = '2804:10::/32'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(ip_version, 6);
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![
            write_raw(dir.path(), "bgp_ixp_df.json", IXP_DF),
            write_raw(dir.path(), "bgp_global.json", GLOBAL),
        ];
        let pipeline = IngestPipeline::new(&db);

        let first = pipeline.ingest(&files, date("2024-05-01")).unwrap();
        let before = db.counts(first.snapshot_id).unwrap();

        let second = pipeline.ingest(&files, date("2024-05-01")).unwrap();
        assert_eq!(first.snapshot_id, second.snapshot_id);
        assert_eq!(db.counts(second.snapshot_id).unwrap(), before);

        // one file again on its own
        pipeline.ingest(&files[..1], date("2024-05-01")).unwrap();
        assert_eq!(db.counts(first.snapshot_id).unwrap().prefixes, before.prefixes);
        assert_eq!(db.snapshots().list().unwrap().len(), 1);
    }

    #[test]
    fn test_dates_are_separate_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![write_raw(dir.path(), "bgp_ixp_df.json", IXP_DF)];
        let pipeline = IngestPipeline::new(&db);

        let a = pipeline.ingest(&files, date("2024-05-01")).unwrap();
        let b = pipeline.ingest(&files, date("2024-05-02")).unwrap();
        assert_ne!(a.snapshot_id, b.snapshot_id);
        assert_eq!(db.counts(a.snapshot_id).unwrap(), db.counts(b.snapshot_id).unwrap());
    }

    #[test]
    fn test_shared_source_code_resolves_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![
            write_raw(dir.path(), "a.json", GLOBAL),
            write_raw(
                dir.path(),
                "b.json",
                r#"[{"prefix": "198.51.100.0/24", "as_path": "65040", "origin_asn": 65040, "source_code": "global"},
                    {"prefix": "203.0.113.0/24", "as_path": "65050", "origin_asn": 65050}]"#,
            ),
        ];

        let report = IngestPipeline::new(&db)
            .ingest(&files, date("2024-05-01"))
            .unwrap();
        let sources = db.announcements().sources(report.snapshot_id).unwrap();
        let codes: Vec<_> = sources.iter().map(|s| s.source_code.as_str()).collect();
        assert_eq!(codes, vec!["global", DEFAULT_SOURCE_CODE]);
    }

    #[test]
    fn test_same_prefix_from_two_sources() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let file = write_raw(
            dir.path(),
            "both.json",
            r#"[
                {"prefix": "187.16.0.0/23", "as_path": "65010 65020", "origin_asn": 65020, "source_code": "global"},
                {"prefix": "187.16.0.0/23", "as_path": "65099 65020", "origin_asn": 65020, "source_code": "ixp_df"}
            ]"#,
        );

        let report = IngestPipeline::new(&db)
            .ingest(&[file], date("2024-05-01"))
            .unwrap();
        let counts = db.counts(report.snapshot_id).unwrap();
        assert_eq!(counts.prefixes, 1);
        assert_eq!(counts.prefix_origins, 2);
        assert_eq!(counts.expanded_prefixes, 2);
        assert_eq!(counts.expanded_mappings, 4);

        // the first announcement owns the prefix row
        let as_path: String = db
            .connection()
            .query_row(
                "SELECT as_path FROM prefix WHERE prefix = '187.16.0.0/23'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(as_path, "65010 65020");

        let expanded = db
            .announcements()
            .expanded_for_prefix(report.snapshot_id, "187.16.0.0/23")
            .unwrap();
        assert_eq!(expanded.len(), 4);
    }

    #[test]
    fn test_malformed_file_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![
            write_raw(
                dir.path(),
                "bad.json",
                r#"[
                    {"prefix": "10.0.0.0/16", "as_path": "1", "origin_asn": 1, "source_code": "bad"},
                    {"prefix": "10.1.0.0/16", "as_path": "1", "source_code": "bad"}
                ]"#,
            ),
            write_raw(dir.path(), "good.json", IXP_DF),
        ];

        let report = IngestPipeline::new(&db)
            .ingest(&files, date("2024-05-01"))
            .unwrap();
        assert!(report.has_failures());
        assert_eq!(report.failed(), 1);
        assert_eq!(report.committed(), 1);
        match &report.files[0].status {
            FileStatus::Failed { kind, .. } => assert_eq!(kind, "malformed_record"),
            other => panic!("unexpected status: {:?}", other),
        }

        let counts = db.counts(report.snapshot_id).unwrap();
        assert_eq!(counts.sources, 1);
        assert_eq!(counts.prefixes, 1);
        assert_eq!(counts.expanded_prefixes, 256);
    }

    #[test]
    fn test_invalid_prefix_rolls_back_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![
            write_raw(
                dir.path(),
                "bad_prefix.json",
                r#"[
                    {"prefix": "10.0.0.0/16", "as_path": "1", "origin_asn": 1, "source_code": "x"},
                    {"prefix": "10.0.0.0/40", "as_path": "1", "origin_asn": 1, "source_code": "x"}
                ]"#,
            ),
            write_raw(dir.path(), "good.json", IXP_DF),
        ];

        let report = IngestPipeline::new(&db)
            .ingest(&files, date("2024-05-01"))
            .unwrap();
        match &report.files[0].status {
            FileStatus::Failed { kind, .. } => assert_eq!(kind, "invalid_prefix"),
            other => panic!("unexpected status: {:?}", other),
        }

        let counts = db.counts(report.snapshot_id).unwrap();
        assert_eq!(counts.sources, 1);
        assert_eq!(counts.asns, 1);
        assert_eq!(counts.expanded_prefixes, 256);
    }

    #[test]
    fn test_storage_failure_rolls_back_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        db.connection()
            .execute_batch(
                "CREATE TRIGGER fail_expansion BEFORE INSERT ON prefix_expanded
                 WHEN NEW.prefix_exp = '10.9.1.0/24'
                 BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END;",
            )
            .unwrap();

        let files = vec![
            write_raw(dir.path(), "first.json", IXP_DF),
            write_raw(
                dir.path(),
                "second.json",
                r#"[
                    {"prefix": "10.8.0.0/24", "as_path": "2", "origin_asn": 2, "source_code": "late"},
                    {"prefix": "10.9.0.0/22", "as_path": "2", "origin_asn": 2, "source_code": "late"}
                ]"#,
            ),
            write_raw(
                dir.path(),
                "third.json",
                r#"[{"prefix": "10.7.0.0/24", "as_path": "3", "origin_asn": 3, "source_code": "late"}]"#,
            ),
        ];

        let report = IngestPipeline::new(&db)
            .ingest(&files, date("2024-05-01"))
            .unwrap();
        assert_eq!(report.committed(), 2);
        assert_eq!(report.failed(), 1);
        match &report.files[1].status {
            FileStatus::Failed { kind, reason } => {
                assert_eq!(kind, "persistence");
                assert!(reason.contains("simulated storage failure"));
            }
            other => panic!("unexpected status: {:?}", other),
        }

        // "late" was created and rolled back in the second file, then created
        // again by the third
        let counts = db.counts(report.snapshot_id).unwrap();
        assert_eq!(counts.sources, 2);
        assert_eq!(counts.prefixes, 2);
        assert_eq!(counts.expanded_prefixes, 257);
        let leftover: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM prefix WHERE prefix IN ('10.8.0.0/24', '10.9.0.0/22')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_empty_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![write_raw(dir.path(), "empty.json", "[]")];

        let report = IngestPipeline::new(&db)
            .ingest(&files, date("2024-05-01"))
            .unwrap();
        assert_eq!(report.skipped(), 1);
        assert_eq!(
            db.counts(report.snapshot_id).unwrap(),
            SnapshotCounts::default()
        );
    }

    #[test]
    fn test_all_files_failed() {
        let dir = tempfile::tempdir().unwrap();
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files = vec![
            write_raw(dir.path(), "empty.json", "[]"),
            write_raw(dir.path(), "bad.json", r#"[{"as_path": "1", "origin_asn": 1}]"#),
            dir.path().join("missing.json").to_str().unwrap().to_string(),
        ];

        let err = IngestPipeline::new(&db)
            .ingest(&files, date("2024-05-01"))
            .unwrap_err();
        match err {
            IngestError::AllFilesFailed { failed, first } => {
                assert_eq!(failed, 2);
                assert!(first.contains("bad.json"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // the snapshot itself was still created
        assert!(db
            .snapshots()
            .get_by_date(date("2024-05-01"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_no_files() {
        let db = SnapshotDatabase::open_in_memory().unwrap();
        let files: Vec<String> = vec![];
        let report = IngestPipeline::new(&db)
            .with_description("manual")
            .ingest(&files, date("2024-05-01"))
            .unwrap();
        assert!(report.files.is_empty());
        let snapshot = db.snapshots().get_by_date(date("2024-05-01")).unwrap().unwrap();
        assert_eq!(snapshot.description, "manual");
    }

    #[test]
    fn test_report_serializes_status() {
        let report = FileReport::failed(
            "bad.json",
            &IngestError::MalformedRecord {
                index: 0,
                reason: "missing field `prefix`".to_string(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "malformed_record");
        assert_eq!(json["file"], "bad.json");
    }
}
