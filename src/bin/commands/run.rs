use bgpsnap::{OutputFormat, SnapshotConfig};
use chrono::NaiveDate;
use clap::Args;
use tracing::info;

use super::collect::collect_files;
use super::ingest::ingest_files;
use super::{snapshot_date_or_today, sources_or_default};

/// Arguments for the Run command
#[derive(Args)]
pub struct RunArgs {
    /// Logical date of the snapshot (YYYY-MM-DD), defaults to today
    #[clap(short = 'd', long)]
    pub snapshot_date: Option<NaiveDate>,

    /// Sources to collect, e.g. ixp_df or all; defaults to the configured sources
    #[clap(short, long, value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Overwrite raw files that already exist
    #[clap(short, long)]
    pub force: bool,
}

pub fn run(config: &SnapshotConfig, args: RunArgs, output_format: OutputFormat) {
    let RunArgs {
        snapshot_date,
        sources,
        force,
    } = args;

    let snapshot_date = snapshot_date_or_today(snapshot_date);
    let sources = sources_or_default(config, sources);

    info!(
        "Running snapshot {} for sources {}",
        snapshot_date,
        sources.join(",")
    );
    let files = collect_files(config, snapshot_date, &sources, force);
    ingest_files(config, &files, snapshot_date, output_format);
}
