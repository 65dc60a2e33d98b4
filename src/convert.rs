//! Line-by-line conversion of readers and input files.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::ops::AddAssign;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, error, warn};

use crate::clf::to_combined;
use crate::record::{Strictness, decode};
use crate::zone::Zone;

/// Settings shared by every line of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub zone: Zone,
    pub strictness: Strictness,
}

/// One input to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    Path(PathBuf),
}

impl Source {
    /// Standard input when no paths are given, otherwise each path in order.
    pub fn from_args(paths: Vec<PathBuf>) -> Vec<Source> {
        if paths.is_empty() {
            vec![Source::Stdin]
        } else {
            paths.into_iter().map(Source::Path).collect()
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stdin => f.write_str("<stdin>"),
            Source::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Counts gathered while converting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub lines_read: usize,
    pub records_written: usize,
    pub decode_errors: usize,
    /// Sources that could not be opened or failed mid-read.
    pub source_errors: usize,
}

impl AddAssign for Summary {
    fn add_assign(&mut self, other: Summary) {
        self.lines_read += other.lines_read;
        self.records_written += other.records_written;
        self.decode_errors += other.decode_errors;
        self.source_errors += other.source_errors;
    }
}

/// Convert every line of `reader`, writing one output line per decoded record.
///
/// Bad lines and read failures are logged and counted; only failures writing
/// to `out` are returned.
pub fn convert_reader<R: BufRead, W: Write>(
    mut reader: R,
    name: &str,
    out: &mut W,
    options: &Options,
) -> io::Result<Summary> {
    let mut summary = Summary::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                error!("error reading {name}: {err}");
                summary.source_errors += 1;
                break;
            }
        }
        summary.lines_read += 1;

        let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        match decode(line, options.strictness) {
            Ok(record) => {
                writeln!(out, "{}", to_combined(&record, &options.zone))?;
                summary.records_written += 1;
            }
            Err(err) => {
                warn!("{name}:{}: {err}", summary.lines_read);
                summary.decode_errors += 1;
            }
        }
    }

    debug!("finished {name}: {summary:?}");
    Ok(summary)
}

/// Convert each source in order, reading [`Source::Stdin`] from `stdin`. A
/// source that cannot be opened is logged and skipped.
pub fn convert_sources<R: BufRead, W: Write>(
    sources: &[Source],
    mut stdin: R,
    out: &mut W,
    options: &Options,
) -> io::Result<Summary> {
    let mut summary = Summary::default();

    for source in sources {
        let name = source.to_string();
        match source {
            Source::Stdin => {
                summary += convert_reader(&mut stdin, &name, out, options)?;
            }
            Source::Path(path) => {
                let file = match File::open(path)
                    .with_context(|| format!("Cannot open input file: {name}"))
                {
                    Ok(file) => file,
                    Err(err) => {
                        error!("{err:#}");
                        summary.source_errors += 1;
                        continue;
                    }
                };
                summary += convert_reader(BufReader::new(file), &name, out, options)?;
            }
        }
    }

    Ok(summary)
}
