use bgpsnap::{OutputFormat, SnapshotConfig, SnapshotDatabase, SCHEMA_VERSION};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::{open_database, print_rows};

/// Arguments for the Init command
#[derive(Args)]
pub struct InitArgs {
    /// Drop every table and recreate the schema (deletes all snapshots)
    #[clap(long)]
    pub reset: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct InitInfo {
    data_dir: String,
    raw_data_dir: String,
    database: String,
    schema_version: u32,
    schema_status: String,
    snapshots: usize,
}

pub fn run(config: &SnapshotConfig, args: InitArgs, output_format: OutputFormat) {
    let InitArgs { reset } = args;

    let db = if reset {
        if let Err(e) = config.ensure_directories() {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
        match SnapshotDatabase::recreate(&config.sqlite_path()) {
            Ok(db) => {
                eprintln!("Schema reset");
                db
            }
            Err(e) => {
                eprintln!("ERROR: Failed to reset schema: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        open_database(config)
    };

    let schema_status = match db.schema_status() {
        Ok(status) => status.to_string(),
        Err(e) => format!("unknown ({})", e),
    };
    let snapshots = match db.snapshots().list() {
        Ok(list) => list.len(),
        Err(e) => {
            eprintln!("ERROR: Failed to list snapshots: {}", e);
            std::process::exit(1);
        }
    };

    let info = InitInfo {
        data_dir: config.data_dir.clone(),
        raw_data_dir: config.raw_data_dir.clone(),
        database: config.sqlite_path(),
        schema_version: SCHEMA_VERSION,
        schema_status,
        snapshots,
    };

    if output_format == OutputFormat::Table {
        eprintln!("{}", config.summary());
    }
    print_rows(&[info], output_format);
}
