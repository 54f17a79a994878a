use bgpsnap::*;
use clap::{Parser, Subcommand};
use tracing::Level;

mod commands;

use commands::collect::CollectArgs;
use commands::ingest::IngestArgs;
use commands::init::InitArgs;
use commands::run::RunArgs;
use commands::snapshots::SnapshotsArgs;
use commands::trace::TraceArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.bgpsnap/bgpsnap.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directories and database, and show their status.
    Init(InitArgs),

    /// Write raw batch files for a snapshot date with the sample collector.
    Collect(CollectArgs),

    /// Ingest raw batch files into the snapshot of a logical date.
    Ingest(IngestArgs),

    /// Collect then ingest a snapshot in one go.
    Run(RunArgs),

    /// List snapshots with per-entity row counts.
    Snapshots(SnapshotsArgs),

    /// Show the expanded prefixes recorded for an announced prefix.
    Trace(TraceArgs),
}

fn main() {
    let cli = Cli::parse();

    let config = match SnapshotConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let output_format = cli.format;

    match cli.command {
        Commands::Init(args) => commands::init::run(&config, args, output_format),
        Commands::Collect(args) => commands::collect::run(&config, args, output_format),
        Commands::Ingest(args) => commands::ingest::run(&config, args, output_format),
        Commands::Run(args) => commands::run::run(&config, args, output_format),
        Commands::Snapshots(args) => commands::snapshots::run(&config, args, output_format),
        Commands::Trace(args) => commands::trace::run(&config, args, output_format),
    }
}
