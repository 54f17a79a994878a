pub mod collect;
pub mod ingest;
pub mod init;
pub mod run;
pub mod snapshots;
pub mod trace;

use bgpsnap::output::render_rows;
use bgpsnap::{OutputFormat, SnapshotConfig, SnapshotDatabase};
use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// The given snapshot date, or today's local date
pub(crate) fn snapshot_date_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
}

/// The given sources, or the configured defaults
pub(crate) fn sources_or_default(config: &SnapshotConfig, sources: Vec<String>) -> Vec<String> {
    if sources.is_empty() {
        config.default_sources.clone()
    } else {
        sources
    }
}

/// Open the configured database, exiting on failure
pub(crate) fn open_database(config: &SnapshotConfig) -> SnapshotDatabase {
    if let Err(e) = config.ensure_directories() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
    match SnapshotDatabase::open(&config.sqlite_path()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: Failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}

pub(crate) fn print_rows<T: Tabled + Serialize>(rows: &[T], output_format: OutputFormat) {
    match render_rows(rows, output_format) {
        Ok(out) => println!("{}", out),
        Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
    }
}
