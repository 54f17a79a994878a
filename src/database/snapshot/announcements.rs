//! Announcement store
//!
//! Idempotent writes for everything an ingestion run records inside a
//! snapshot: sources, ASNs, announced prefixes, prefix-origin relations,
//! expanded prefixes and the mappings from expanded back to announced
//! prefixes. Every insert is keyed on its natural key and a conflicting insert
//! is silently absorbed.
//!
//! The store borrows a plain `Connection`, so it works the same on a
//! connection and on a `Transaction` (which derefs to one).

use crate::error::IngestResult;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
#[cfg(feature = "display")]
use tabled::Tabled;
use tracing::debug;

/// Relation kind recorded for an announcement's origin AS
pub const RELATION_ORIGIN: &str = "origin";

/// A source row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(Tabled))]
pub struct SourceRecord {
    pub source_id: i64,
    pub source_code: String,
    pub source_type: String,
}

/// An expanded prefix together with the source whose announcement produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(Tabled))]
pub struct ExpandedPrefixRecord {
    pub prefix_exp: String,
    pub ip_version: u8,
    pub origin_asn: u32,
    pub source_id: i64,
}

/// Writes announcements for one snapshot
pub struct AnnouncementStore<'a> {
    conn: &'a Connection,
}

impl<'a> AnnouncementStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert the source if absent, then fetch its identity by natural key.
    pub fn get_or_create_source(
        &self,
        snapshot_id: i64,
        source_code: &str,
        source_type: &str,
    ) -> IngestResult<i64> {
        let created = self
            .conn
            .prepare_cached(
                "INSERT INTO source (snapshot_id, source_code, source_type)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (snapshot_id, source_code) DO NOTHING",
            )?
            .execute(params![snapshot_id, source_code, source_type])?;

        let source_id: i64 = self
            .conn
            .prepare_cached(
                "SELECT source_id FROM source WHERE snapshot_id = ?1 AND source_code = ?2",
            )?
            .query_row(params![snapshot_id, source_code], |row| row.get(0))?;

        if created > 0 {
            debug!(
                "Created source {} ({}) as {} in snapshot {}",
                source_code, source_type, source_id, snapshot_id
            );
        }
        Ok(source_id)
    }

    /// Record that an ASN was seen in the snapshot. Returns whether a row was added.
    pub fn insert_asn(&self, snapshot_id: i64, asn: u32) -> IngestResult<bool> {
        let n = self
            .conn
            .prepare_cached(
                "INSERT INTO asn (snapshot_id, asn) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            )?
            .execute(params![snapshot_id, asn])?;
        Ok(n > 0)
    }

    /// Record an announced prefix. The first source to announce it owns the row.
    pub fn insert_prefix(
        &self,
        snapshot_id: i64,
        prefix: &str,
        ip_version: u8,
        source_id: i64,
        as_path: &str,
    ) -> IngestResult<bool> {
        let n = self
            .conn
            .prepare_cached(
                "INSERT INTO prefix (snapshot_id, prefix, ip_version, source_id, as_path)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT DO NOTHING",
            )?
            .execute(params![snapshot_id, prefix, ip_version, source_id, as_path])?;
        Ok(n > 0)
    }

    /// Record that `source_id` announced `prefix` with origin `asn`.
    pub fn insert_prefix_origin(
        &self,
        snapshot_id: i64,
        prefix: &str,
        source_id: i64,
        asn: u32,
    ) -> IngestResult<bool> {
        let n = self
            .conn
            .prepare_cached(
                "INSERT INTO prefix_asn (snapshot_id, prefix, source_id, asn, relation_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT DO NOTHING",
            )?
            .execute(params![snapshot_id, prefix, source_id, asn, RELATION_ORIGIN])?;
        Ok(n > 0)
    }

    pub fn insert_expanded_prefix(
        &self,
        snapshot_id: i64,
        prefix_exp: &str,
        ip_version: u8,
        origin_asn: u32,
    ) -> IngestResult<bool> {
        let n = self
            .conn
            .prepare_cached(
                "INSERT INTO prefix_expanded (snapshot_id, prefix_exp, ip_version, origin_asn)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT DO NOTHING",
            )?
            .execute(params![snapshot_id, prefix_exp, ip_version, origin_asn])?;
        Ok(n > 0)
    }

    pub fn insert_expanded_mapping(
        &self,
        snapshot_id: i64,
        prefix_exp: &str,
        prefix_orig: &str,
        source_id: i64,
    ) -> IngestResult<bool> {
        let n = self
            .conn
            .prepare_cached(
                "INSERT INTO prefix_expanded_map (snapshot_id, prefix_exp, prefix_orig, source_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT DO NOTHING",
            )?
            .execute(params![snapshot_id, prefix_exp, prefix_orig, source_id])?;
        Ok(n > 0)
    }

    /// All sources of a snapshot
    pub fn sources(&self, snapshot_id: i64) -> IngestResult<Vec<SourceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, source_code, source_type FROM source
             WHERE snapshot_id = ?1 ORDER BY source_id",
        )?;
        let rows = stmt.query_map([snapshot_id], |row| {
            Ok(SourceRecord {
                source_id: row.get(0)?,
                source_code: row.get(1)?,
                source_type: row.get(2)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Expanded prefixes mapped back to an announced prefix
    pub fn expanded_for_prefix(
        &self,
        snapshot_id: i64,
        prefix_orig: &str,
    ) -> IngestResult<Vec<ExpandedPrefixRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.prefix_exp, e.ip_version, e.origin_asn, m.source_id
             FROM prefix_expanded_map AS m
             JOIN prefix_expanded AS e
               ON e.snapshot_id = m.snapshot_id AND e.prefix_exp = m.prefix_exp
             WHERE m.snapshot_id = ?1 AND m.prefix_orig = ?2
             ORDER BY m.rowid",
        )?;
        let rows = stmt.query_map(params![snapshot_id, prefix_orig], |row| {
            Ok(ExpandedPrefixRecord {
                prefix_exp: row.get(0)?,
                ip_version: row.get(1)?,
                origin_asn: row.get(2)?,
                source_id: row.get(3)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{DatabaseConn, SchemaManager};
    use crate::database::snapshot::SnapshotRepository;
    use chrono::NaiveDate;

    fn setup_test_db() -> (DatabaseConn, i64) {
        let db = DatabaseConn::open_in_memory().unwrap();
        SchemaManager::new(&db.conn).initialize().unwrap();
        let snapshot_id = SnapshotRepository::new(&db.conn)
            .resolve_or_create(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), None)
            .unwrap();
        (db, snapshot_id)
    }

    #[test]
    fn test_get_or_create_source() {
        let (db, snapshot_id) = setup_test_db();
        let store = AnnouncementStore::new(&db.conn);

        let a = store.get_or_create_source(snapshot_id, "ixp_df", "ixp").unwrap();
        let again = store
            .get_or_create_source(snapshot_id, "ixp_df", "global")
            .unwrap();
        let b = store.get_or_create_source(snapshot_id, "ixp_sp", "global").unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);

        let sources = store.sources(snapshot_id).unwrap();
        assert_eq!(sources.len(), 2);
        // the first type wins
        assert_eq!(sources[0].source_type, "ixp");
    }

    #[test]
    fn test_inserts_are_idempotent() {
        let (db, snapshot_id) = setup_test_db();
        let store = AnnouncementStore::new(&db.conn);
        let source_id = store.get_or_create_source(snapshot_id, "ixp_df", "ixp").unwrap();

        assert!(store.insert_asn(snapshot_id, 65003).unwrap());
        assert!(!store.insert_asn(snapshot_id, 65003).unwrap());

        assert!(store
            .insert_prefix(snapshot_id, "200.160.0.0/16", 4, source_id, "65001 65002 65003")
            .unwrap());
        assert!(!store
            .insert_prefix(snapshot_id, "200.160.0.0/16", 4, source_id, "65001 65003")
            .unwrap());

        assert!(store
            .insert_prefix_origin(snapshot_id, "200.160.0.0/16", source_id, 65003)
            .unwrap());
        assert!(!store
            .insert_prefix_origin(snapshot_id, "200.160.0.0/16", source_id, 65003)
            .unwrap());

        assert!(store
            .insert_expanded_prefix(snapshot_id, "200.160.0.0/24", 4, 65003)
            .unwrap());
        assert!(!store
            .insert_expanded_prefix(snapshot_id, "200.160.0.0/24", 4, 65003)
            .unwrap());

        assert!(store
            .insert_expanded_mapping(snapshot_id, "200.160.0.0/24", "200.160.0.0/16", source_id)
            .unwrap());
        assert!(!store
            .insert_expanded_mapping(snapshot_id, "200.160.0.0/24", "200.160.0.0/16", source_id)
            .unwrap());
    }

    #[test]
    fn test_distinct_sources_get_own_origin_relation() {
        let (db, snapshot_id) = setup_test_db();
        let store = AnnouncementStore::new(&db.conn);
        let a = store.get_or_create_source(snapshot_id, "ixp_df", "ixp").unwrap();
        let b = store.get_or_create_source(snapshot_id, "global", "ixp").unwrap();

        assert!(store
            .insert_prefix_origin(snapshot_id, "187.16.0.0/20", a, 65020)
            .unwrap());
        assert!(store
            .insert_prefix_origin(snapshot_id, "187.16.0.0/20", b, 65020)
            .unwrap());
    }

    #[test]
    fn test_mapping_requires_expanded_prefix() {
        let (db, snapshot_id) = setup_test_db();
        let store = AnnouncementStore::new(&db.conn);
        let source_id = store.get_or_create_source(snapshot_id, "ixp_df", "ixp").unwrap();

        let result =
            store.insert_expanded_mapping(snapshot_id, "10.0.0.0/24", "10.0.0.0/16", source_id);
        assert!(result.is_err());
    }

    #[test]
    fn test_expanded_for_prefix() {
        let (db, snapshot_id) = setup_test_db();
        let store = AnnouncementStore::new(&db.conn);
        let source_id = store.get_or_create_source(snapshot_id, "ixp_df", "ixp").unwrap();

        for exp in ["10.0.0.0/24", "10.0.1.0/24"] {
            store.insert_expanded_prefix(snapshot_id, exp, 4, 64500).unwrap();
            store
                .insert_expanded_mapping(snapshot_id, exp, "10.0.0.0/23", source_id)
                .unwrap();
        }

        let expanded = store.expanded_for_prefix(snapshot_id, "10.0.0.0/23").unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].prefix_exp, "10.0.0.0/24");
        assert_eq!(expanded[1].origin_asn, 64500);
        assert!(store
            .expanded_for_prefix(snapshot_id, "10.0.0.0/8")
            .unwrap()
            .is_empty());
    }
}
