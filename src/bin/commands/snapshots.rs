use bgpsnap::{IngestResult, OutputFormat, Snapshot, SnapshotConfig, SnapshotCounts};
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::{open_database, print_rows};

/// Arguments for the Snapshots command
#[derive(Args)]
pub struct SnapshotsArgs {
    /// Only show the snapshot of this logical date (YYYY-MM-DD)
    #[clap(short = 'd', long)]
    pub snapshot_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Tabled)]
struct SnapshotRow {
    #[tabled(inline)]
    #[serde(flatten)]
    snapshot: Snapshot,
    #[tabled(inline)]
    #[serde(flatten)]
    counts: SnapshotCounts,
}

pub fn run(config: &SnapshotConfig, args: SnapshotsArgs, output_format: OutputFormat) {
    let SnapshotsArgs { snapshot_date } = args;

    let db = open_database(config);
    let repo = db.snapshots();

    let snapshots: IngestResult<Vec<Snapshot>> = match snapshot_date {
        Some(date) => repo.get_by_date(date).map(|s| s.into_iter().collect()),
        None => repo.list(),
    };
    let snapshots = match snapshots {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: Failed to list snapshots: {}", e);
            std::process::exit(1);
        }
    };

    if snapshots.is_empty() {
        eprintln!("No snapshots found");
        return;
    }

    let mut rows = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let counts = match db.counts(snapshot.snapshot_id) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to count rows: {}", e);
                std::process::exit(1);
            }
        };
        rows.push(SnapshotRow { snapshot, counts });
    }

    print_rows(&rows, output_format);
}
