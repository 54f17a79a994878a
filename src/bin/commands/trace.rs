use bgpsnap::{OutputFormat, SnapshotConfig};
use chrono::NaiveDate;
use clap::Args;

use super::{open_database, print_rows, snapshot_date_or_today};

/// Arguments for the Trace command
#[derive(Args)]
pub struct TraceArgs {
    /// Announced prefix, as it was ingested
    #[clap()]
    pub prefix: String,

    /// Logical date of the snapshot (YYYY-MM-DD), defaults to today
    #[clap(short = 'd', long)]
    pub snapshot_date: Option<NaiveDate>,
}

pub fn run(config: &SnapshotConfig, args: TraceArgs, output_format: OutputFormat) {
    let TraceArgs {
        prefix,
        snapshot_date,
    } = args;

    let snapshot_date = snapshot_date_or_today(snapshot_date);
    let db = open_database(config);

    let snapshot = match db.snapshots().get_by_date(snapshot_date) {
        Ok(Some(s)) => s,
        Ok(None) => {
            eprintln!("ERROR: No snapshot for {}", snapshot_date);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("ERROR: Failed to load snapshot: {}", e);
            std::process::exit(1);
        }
    };

    match db
        .announcements()
        .expanded_for_prefix(snapshot.snapshot_id, &prefix)
    {
        Ok(records) if records.is_empty() => {
            eprintln!("No expanded prefixes for {} in {}", prefix, snapshot_date);
        }
        Ok(records) => print_rows(&records, output_format),
        Err(e) => {
            eprintln!("ERROR: Failed to look up {}: {}", prefix, e);
            std::process::exit(1);
        }
    }
}
