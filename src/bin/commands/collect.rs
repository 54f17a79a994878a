use bgpsnap::{collect_sample, OutputFormat, SnapshotConfig};
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::{print_rows, snapshot_date_or_today, sources_or_default};

/// Arguments for the Collect command
#[derive(Args)]
pub struct CollectArgs {
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

#[derive(Debug, Serialize, Tabled)]
struct CollectedFile {
    source: String,
    file: String,
}

/// Collect raw files and return their paths, exiting on failure
pub(crate) fn collect_files(
    config: &SnapshotConfig,
    snapshot_date: NaiveDate,
    sources: &[String],
    force: bool,
) -> Vec<String> {
    if let Err(e) = config.ensure_directories() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    match collect_sample(&config.raw_dir(), snapshot_date, sources, force) {
        Ok(paths) => paths
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        Err(e) => {
            eprintln!("ERROR: Failed to collect raw data: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn run(config: &SnapshotConfig, args: CollectArgs, output_format: OutputFormat) {
    let CollectArgs {
        snapshot_date,
        sources,
        force,
    } = args;

    let snapshot_date = snapshot_date_or_today(snapshot_date);
    let sources = sources_or_default(config, sources);

    let files = collect_files(config, snapshot_date, &sources, force);
    let rows: Vec<CollectedFile> = sources
        .into_iter()
        .zip(files)
        .map(|(source, file)| CollectedFile { source, file })
        .collect();

    print_rows(&rows, output_format);
}
