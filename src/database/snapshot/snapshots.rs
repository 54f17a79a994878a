//! Snapshot repository
//!
//! A snapshot is the namespace of one dated ingestion run. Its natural key is
//! the logical date, which the schema enforces as unique.

use crate::error::IngestResult;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
#[cfg(feature = "display")]
use tabled::Tabled;
use tracing::{debug, info};

/// Description used when the caller does not provide one
pub const DEFAULT_SNAPSHOT_DESCRIPTION: &str = "Automatic snapshot";

const LOGICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// A snapshot row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(Tabled))]
pub struct Snapshot {
    pub snapshot_id: i64,
    pub logical_date: NaiveDate,
    pub collected_at: DateTime<Utc>,
    pub description: String,
}

impl Snapshot {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let date_str: String = row.get(1)?;
        let logical_date = NaiveDate::parse_from_str(&date_str, LOGICAL_DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let collected_ts: i64 = row.get(2)?;
        Ok(Snapshot {
            snapshot_id: row.get(0)?,
            logical_date,
            collected_at: DateTime::from_timestamp(collected_ts, 0).unwrap_or_default(),
            description: row.get(3)?,
        })
    }
}

/// Repository for snapshot identity
pub struct SnapshotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SnapshotRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Resolve the snapshot for `logical_date`, creating it on first reference.
    ///
    /// An existing snapshot is returned unchanged and `description` is ignored.
    /// The insert is conflict-aware, so concurrent first creation still yields
    /// a single row per date.
    pub fn resolve_or_create(
        &self,
        logical_date: NaiveDate,
        description: Option<&str>,
    ) -> IngestResult<i64> {
        let date_str = logical_date.format(LOGICAL_DATE_FORMAT).to_string();
        let created = self.conn.execute(
            "INSERT INTO snapshot (logical_date, collected_at, description)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (logical_date) DO NOTHING",
            params![
                date_str,
                Utc::now().timestamp(),
                description.unwrap_or(DEFAULT_SNAPSHOT_DESCRIPTION)
            ],
        )?;

        let snapshot_id: i64 = self.conn.query_row(
            "SELECT snapshot_id FROM snapshot
             WHERE logical_date = ?1
             ORDER BY snapshot_id DESC
             LIMIT 1",
            [&date_str],
            |row| row.get(0),
        )?;

        if created > 0 {
            info!("Created snapshot {} for {}", snapshot_id, date_str);
        } else {
            debug!("Reusing snapshot {} for {}", snapshot_id, date_str);
        }

        Ok(snapshot_id)
    }

    /// Get the authoritative snapshot for a logical date
    pub fn get_by_date(&self, logical_date: NaiveDate) -> IngestResult<Option<Snapshot>> {
        let date_str = logical_date.format(LOGICAL_DATE_FORMAT).to_string();
        let snapshot = self
            .conn
            .query_row(
                "SELECT snapshot_id, logical_date, collected_at, description FROM snapshot
                 WHERE logical_date = ?1
                 ORDER BY snapshot_id DESC
                 LIMIT 1",
                [&date_str],
                Snapshot::from_row,
            )
            .optional()?;
        Ok(snapshot)
    }

    /// List all snapshots, most recent logical date first
    pub fn list(&self) -> IngestResult<Vec<Snapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT snapshot_id, logical_date, collected_at, description FROM snapshot
             ORDER BY logical_date DESC, snapshot_id DESC",
        )?;
        let rows = stmt.query_map([], Snapshot::from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}
