//! Database schema management
//!
//! All snapshot-scoped tables are defined here. Natural keys are enforced as
//! primary keys or unique constraints so that every insert can be written as
//! `INSERT ... ON CONFLICT DO NOTHING`.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Tables in creation order. Reset drops them in reverse.
const TABLES: [&str; 8] = [
    "bgpsnap_meta",
    "snapshot",
    "source",
    "asn",
    "prefix",
    "prefix_asn",
    "prefix_expanded",
    "prefix_expanded_map",
];

/// Schema definitions for all tables in the snapshot database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version and global metadata)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS bgpsnap_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// One row per logical date
    pub const SNAPSHOT_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS snapshot (
            snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
            logical_date TEXT NOT NULL UNIQUE,
            collected_at INTEGER NOT NULL,
            description TEXT NOT NULL
        );
    "#;

    pub const SOURCE_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS source (
            source_id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id INTEGER NOT NULL REFERENCES snapshot(snapshot_id),
            source_code TEXT NOT NULL,
            source_type TEXT NOT NULL,
            UNIQUE (snapshot_id, source_code)
        );
    "#;

    pub const ASN_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS asn (
            snapshot_id INTEGER NOT NULL REFERENCES snapshot(snapshot_id),
            asn INTEGER NOT NULL,
            PRIMARY KEY (snapshot_id, asn)
        );
    "#;

    pub const PREFIX_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefix (
            snapshot_id INTEGER NOT NULL REFERENCES snapshot(snapshot_id),
            prefix TEXT NOT NULL,
            ip_version INTEGER NOT NULL CHECK (ip_version IN (4, 6)),
            source_id INTEGER NOT NULL REFERENCES source(source_id),
            as_path TEXT NOT NULL,
            PRIMARY KEY (snapshot_id, prefix)
        );
    "#;

    pub const PREFIX_ASN_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefix_asn (
            snapshot_id INTEGER NOT NULL REFERENCES snapshot(snapshot_id),
            prefix TEXT NOT NULL,
            source_id INTEGER NOT NULL REFERENCES source(source_id),
            asn INTEGER NOT NULL,
            relation_type TEXT NOT NULL,
            PRIMARY KEY (snapshot_id, prefix, source_id)
        );
    "#;

    pub const PREFIX_EXPANDED_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefix_expanded (
            snapshot_id INTEGER NOT NULL REFERENCES snapshot(snapshot_id),
            prefix_exp TEXT NOT NULL,
            ip_version INTEGER NOT NULL CHECK (ip_version IN (4, 6)),
            origin_asn INTEGER NOT NULL,
            PRIMARY KEY (snapshot_id, prefix_exp)
        );
    "#;

    pub const PREFIX_EXPANDED_MAP_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefix_expanded_map (
            snapshot_id INTEGER NOT NULL,
            prefix_exp TEXT NOT NULL,
            prefix_orig TEXT NOT NULL,
            source_id INTEGER NOT NULL REFERENCES source(source_id),
            PRIMARY KEY (snapshot_id, prefix_exp, prefix_orig, source_id),
            FOREIGN KEY (snapshot_id, prefix_exp)
                REFERENCES prefix_expanded(snapshot_id, prefix_exp)
        );
    "#;

    /// SQL for creating secondary indexes
    pub const INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_prefix_asn_asn ON prefix_asn(snapshot_id, asn)",
        "CREATE INDEX IF NOT EXISTS idx_prefix_expanded_origin ON prefix_expanded(snapshot_id, origin_asn)",
        "CREATE INDEX IF NOT EXISTS idx_prefix_expanded_map_orig ON prefix_expanded_map(snapshot_id, prefix_orig)",
    ];

    /// Table DDL in creation order, paired with the table name for error messages
    fn tables() -> [(&'static str, &'static str); 7] {
        [
            ("snapshot", Self::SNAPSHOT_TABLE),
            ("source", Self::SOURCE_TABLE),
            ("asn", Self::ASN_TABLE),
            ("prefix", Self::PREFIX_TABLE),
            ("prefix_asn", Self::PREFIX_ASN_TABLE),
            ("prefix_expanded", Self::PREFIX_EXPANDED_TABLE),
            ("prefix_expanded_map", Self::PREFIX_EXPANDED_MAP_TABLE),
        ]
    }
}

/// Schema manager for the snapshot database
///
/// Handles schema initialization, version checking, and resets.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Creates all tables and indexes if they don't exist and records the
    /// schema version in the meta table.
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create meta table: {}", e))?;

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;

        for (name, sql) in SchemaDefinitions::tables() {
            self.conn
                .execute(sql, [])
                .map_err(|e| anyhow!("Failed to create {} table: {}", name, e))?;
        }

        for index_sql in SchemaDefinitions::INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create index: {}", e))?;
        }

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        if !self.table_exists("bgpsnap_meta")? {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current_version = self.get_schema_version()?;

        if current_version == SCHEMA_VERSION {
            if self.verify_integrity()? {
                Ok(SchemaStatus::Current)
            } else {
                Ok(SchemaStatus::Corrupted)
            }
        } else if current_version < SCHEMA_VERSION {
            Ok(SchemaStatus::NeedsMigration {
                from: current_version,
                to: SCHEMA_VERSION,
            })
        } else {
            Ok(SchemaStatus::Incompatible {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    fn get_schema_version(&self) -> Result<u32> {
        let version = self.get_meta("schema_version")?.unwrap_or_else(|| "0".to_string());
        version
            .parse()
            .map_err(|e| anyhow!("Invalid schema version: {}", e))
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table {}: {}", table, e))?;
        Ok(exists > 0)
    }

    /// Verify schema integrity by checking required tables exist
    fn verify_integrity(&self) -> Result<bool> {
        for table in TABLES {
            if !self.table_exists(table)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO bgpsnap_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM bgpsnap_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }

    /// Reset the database by dropping all tables
    pub fn reset(&self) -> Result<()> {
        for table in TABLES.iter().rev() {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", table), [])
                .map_err(|e| anyhow!("Failed to drop table {}: {}", table, e))?;
        }
        Ok(())
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Schema is current and valid
    Current,

    /// Schema needs migration from an older version
    NeedsMigration { from: u32, to: u32 },

    /// Database is from a newer version (incompatible)
    Incompatible {
        database_version: u32,
        required_version: u32,
    },

    /// Schema is corrupted (missing tables)
    Corrupted,
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current => write!(f, "current (v{})", SCHEMA_VERSION),
            SchemaStatus::NeedsMigration { from, to } => {
                write!(f, "needs migration (v{} -> v{})", from, to)
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => write!(
                f,
                "incompatible (database v{}, required v{})",
                database_version, required_version
            ),
            SchemaStatus::Corrupted => write!(f, "corrupted"),
        }
    }
}
