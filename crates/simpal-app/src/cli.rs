//! Command-line parsing.

use std::path::PathBuf;

use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run when no command words are given.
pub const DEFAULT_COMMAND: &str = "echo 'No command provided'";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("invalid line range {0:?} (expected e.g. 3 or 2-5, counting from 1)")]
    InvalidRange(String),
}

/// An inclusive range of 1-based line numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineRange {
    pub first: usize,
    pub last: usize,
}

impl LineRange {
    /// Zero-based indices covered by this range.
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        (self.first - 1)..=(self.last - 1)
    }
}

/// Settings taken from the command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub command: String,
    pub json: bool,
    pub quiet: bool,
    pub select: Vec<LineRange>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliAction {
    Run(CliArgs),
    Help,
    Version,
}

pub fn print_usage() {
    eprintln!("simpal - read-only terminal view of a shell command's output");
    eprintln!();
    eprintln!("Usage: simpal [OPTIONS] [--] [COMMAND...]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [COMMAND...]           Shell command line; words are joined with spaces");
    eprintln!("                         (default: {DEFAULT_COMMAND})");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -j, --json             Print every line as a JSON event");
    eprintln!("  -s, --select <RANGES>  After the command ends, print the copy text of");
    eprintln!("                         these lines, e.g. 1,3-5");
    eprintln!("  -q, --quiet            Do not stream lines while the command runs");
    eprintln!("  -c, --config <PATH>    Read settings from PATH");
    eprintln!("  -h, --help             Show this help message");
    eprintln!("  -V, --version          Show version");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  simpal ls -la");
    eprintln!("  simpal -s 2-3 -- 'dmesg | tail'");
}

/// Parse arguments, excluding the program name.
///
/// Options are only recognized before the first command word or `--`;
/// everything after belongs to the command.
pub fn parse_args<I>(args: I) -> Result<CliAction, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut parsed = CliArgs::default();
    let mut words: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "-j" | "--json" => parsed.json = true,
            "-q" | "--quiet" => parsed.quiet = true,
            "-s" | "--select" => {
                let value = args.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                parsed.select.extend(parse_ranges(&value)?);
            }
            "-c" | "--config" => {
                let value = args.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--" => break,
            opt if opt.starts_with('-') && opt.len() > 1 => {
                return Err(CliError::UnknownOption(opt.to_string()));
            }
            word => {
                words.push(word.to_string());
                break;
            }
        }
    }
    words.extend(args);

    parsed.command = if words.is_empty() {
        DEFAULT_COMMAND.to_string()
    } else {
        words.join(" ")
    };
    Ok(CliAction::Run(parsed))
}

/// Parse a comma-separated list of line numbers and `first-last` ranges.
pub fn parse_ranges(text: &str) -> Result<Vec<LineRange>, CliError> {
    let invalid = || CliError::InvalidRange(text.to_string());

    text.split(',')
        .map(str::trim)
        .map(|part| {
            let (first, last) = match part.split_once('-') {
                Some((a, b)) => (a.trim(), b.trim()),
                None => (part, part),
            };
            let first: usize = first.parse().map_err(|_| invalid())?;
            let last: usize = last.parse().map_err(|_| invalid())?;
            if first == 0 || last < first {
                return Err(invalid());
            }
            Ok(LineRange { first, last })
        })
        .collect()
}
