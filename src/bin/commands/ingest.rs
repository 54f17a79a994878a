use bgpsnap::{IngestPipeline, OutputFormat, SnapshotConfig};
use chrono::NaiveDate;
use clap::Args;

use super::{open_database, print_rows, snapshot_date_or_today};

/// Arguments for the Ingest command
#[derive(Args)]
pub struct IngestArgs {
    /// Raw batch files (JSON arrays), local or remote, optionally compressed
    #[clap(required = true)]
    pub files: Vec<String>,

    /// Logical date of the snapshot (YYYY-MM-DD), defaults to today
    #[clap(short = 'd', long)]
    pub snapshot_date: Option<NaiveDate>,
}

/// Ingest `files` into the snapshot for `snapshot_date` and print the report.
///
/// Exits with status 1 when any file failed.
pub(crate) fn ingest_files(
    config: &SnapshotConfig,
    files: &[String],
    snapshot_date: NaiveDate,
    output_format: OutputFormat,
) {
    let db = open_database(config);

    let report = match IngestPipeline::new(&db).ingest(files, snapshot_date) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    print_rows(&report.files, output_format);
    eprintln!(
        "snapshot {} ({}): {} committed, {} skipped, {} failed",
        report.snapshot_id,
        report.logical_date,
        report.committed(),
        report.skipped(),
        report.failed()
    );

    if report.has_failures() {
        std::process::exit(1);
    }
}

pub fn run(config: &SnapshotConfig, args: IngestArgs, output_format: OutputFormat) {
    let IngestArgs {
        files,
        snapshot_date,
    } = args;

    ingest_files(
        config,
        &files,
        snapshot_date_or_today(snapshot_date),
        output_format,
    );
}
