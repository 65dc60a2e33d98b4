use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jsonl2clf::{Options, Source, Strictness, Zone, convert_sources};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Convert JSON-Lines HTTP access records to Combined Log Format.
///
/// Reads standard input when no files are given.
#[derive(Parser, Debug)]
#[command(author, version, about = "Convert JSON access logs to CLF", long_about = None)]
struct Cli {
    /// Input files, converted in the order given
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Treat records missing a required field as errors instead of zero-filling them
    #[arg(long)]
    strict: bool,

    /// Render timestamps in UTC
    #[arg(long, conflicts_with = "tz")]
    utc: bool,

    /// Render timestamps in this zone: `local`, `utc`, or an offset like `+0200`
    #[arg(long, value_name = "OFFSET")]
    tz: Option<Zone>,
}

impl Cli {
    fn options(&self) -> Options {
        let zone = match (self.utc, self.tz) {
            (true, _) => Zone::utc(),
            (false, Some(zone)) => zone,
            (false, None) => Zone::Local,
        };
        let strictness = if self.strict {
            Strictness::Strict
        } else {
            Strictness::Lenient
        };
        Options { zone, strictness }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    init_logging();

    // Parse CLI flags
    let cli = Cli::parse();
    let options = cli.options();
    let sources = Source::from_args(cli.inputs);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let summary = convert_sources(&sources, io::stdin().lock(), &mut out, &options)
        .context("Cannot write to standard output")?;
    out.flush().context("Cannot write to standard output")?;

    info!(
        "converted {} of {} lines ({} decode errors, {} source errors)",
        summary.records_written, summary.lines_read, summary.decode_errors, summary.source_errors
    );
    Ok(())
}
