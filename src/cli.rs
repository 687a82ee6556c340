//! Command-line interface definitions for dupsort.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, configuration, tuning) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Catalogue a tree and report what was found
//! dupsort scan ~/Pictures
//!
//! # Write a hard-linking script for every duplicate
//! dupsort dedupe ~/Pictures hardlink --script dup.sh
//!
//! # Sort an upload folder into <year>/<month> under the photo library
//! dupsort relocate /volume1/upload /volume1/photo --ignore-index
//!
//! # Verbose mode for debugging
//! dupsort -v dedupe ~/Pictures check
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::ReconcileMode;
use crate::output::OutputFormat;

/// Content-based duplicate finder and date-based photo arranger.
///
/// dupsort groups byte-identical files with sampled BLAKE3 fingerprints and
/// writes a reviewable script to remove or link duplicates. It can also
/// move photos and videos into a <year>/<month> layout without ever
/// overwriting different content.
#[derive(Debug, Parser)]
#[command(name = "dupsort")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of I/O threads for fingerprinting (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, global = true, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Bytes read from each end of a large file when fingerprinting
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, global = true, value_name = "SIZE", value_parser = parse_size)]
    pub sample_size: Option<u64>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Catalogue a directory and report duplicate groups
    Scan(ScanArgs),
    /// Find duplicates and write a script that resolves them
    Dedupe(DedupeArgs),
    /// Move dated files into <dst>/<year>/<month>/
    Relocate(RelocateArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "ROOT")]
    pub path: PathBuf,

    /// Catalog database path (default: platform data directory)
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,
}

/// Arguments for the dedupe subcommand.
#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Directory to deduplicate
    #[arg(value_name = "ROOT")]
    pub path: PathBuf,

    /// How duplicates are resolved
    #[arg(value_enum, value_name = "MODE")]
    pub mode: ReconcileMode,

    /// Write the plan to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Plan format
    #[arg(short, long, value_enum, default_value = "sh")]
    pub format: OutputFormat,

    /// Catalog database path (default: platform data directory)
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,
}

/// Arguments for the relocate subcommand.
#[derive(Debug, Args)]
pub struct RelocateArgs {
    /// Directory holding files to sort
    #[arg(value_name = "SRC")]
    pub source: PathBuf,

    /// Library root receiving <year>/<month>/ directories
    #[arg(value_name = "DST")]
    pub destination: PathBuf,

    /// Do not notify the media index about new directories and files
    #[arg(long)]
    pub ignore_index: bool,

    /// Program used for index notifications (default: synoindex)
    #[arg(long, value_name = "PROGRAM", conflicts_with = "ignore_index")]
    pub index_program: Option<String>,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupsort::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("2MiB").unwrap(), 2_097_152);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_bytes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1024B").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("1KiB").unwrap(), 1_024);
        assert_eq!(parse_size("1kib").unwrap(), 1_024);
        assert_eq!(parse_size("10MB").unwrap(), 10_000_000);
        assert_eq!(parse_size("2MiB").unwrap(), 2_097_152);
        assert_eq!(parse_size("1GiB").unwrap(), 1_073_741_824);
        assert_eq!(parse_size("1TB").unwrap(), 1_000_000_000_000);
    }

    #[test]
    fn test_parse_size_fractional_and_whitespace() {
        assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
        assert_eq!(parse_size("  1024  ").unwrap(), 1024);
        assert_eq!(parse_size("1 MB").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_size_errors() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("1XB").is_err());
        assert!(parse_size("-1MB").is_err());
    }

    #[test]
    fn test_cli_parse_help() {
        assert!(Cli::try_parse_from(["dupsort", "--help"]).is_err());
    }

    #[test]
    fn test_cli_parse_scan_basic() {
        let cli = Cli::try_parse_from(["dupsort", "scan", "/some/path"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(cli.io_threads.is_none());
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.path, PathBuf::from("/some/path"));
                assert!(args.catalog.is_none());
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_dedupe() {
        let cli = Cli::try_parse_from([
            "dupsort",
            "-v",
            "--io-threads",
            "8",
            "--sample-size",
            "1MiB",
            "dedupe",
            "/photos",
            "hardlink",
            "--script",
            "dup.sh",
            "--ignore",
            "*.tmp",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.io_threads, Some(8));
        assert_eq!(cli.sample_size, Some(1_048_576));
        match cli.command {
            Commands::Dedupe(args) => {
                assert_eq!(args.path, PathBuf::from("/photos"));
                assert_eq!(args.mode, ReconcileMode::Hardlink);
                assert_eq!(args.script, Some(PathBuf::from("dup.sh")));
                assert_eq!(args.format, OutputFormat::Sh);
                assert_eq!(args.ignore_patterns, vec!["*.tmp"]);
            }
            _ => panic!("Expected Dedupe command"),
        }
    }

    #[test]
    fn test_cli_parse_dedupe_all_modes() {
        for (name, mode) in [
            ("check", ReconcileMode::Check),
            ("delete", ReconcileMode::Delete),
            ("softlink", ReconcileMode::Softlink),
            ("hardlink", ReconcileMode::Hardlink),
            ("reflink", ReconcileMode::Reflink),
        ] {
            let cli = Cli::try_parse_from(["dupsort", "dedupe", "/p", name]).unwrap();
            match cli.command {
                Commands::Dedupe(args) => assert_eq!(args.mode, mode),
                _ => panic!("Expected Dedupe command"),
            }
        }
    }

    #[test]
    fn test_cli_dedupe_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["dupsort", "dedupe", "/p", "shred"]).is_err());
        assert!(Cli::try_parse_from(["dupsort", "dedupe", "/p"]).is_err());
    }

    #[test]
    fn test_cli_dedupe_json_format() {
        let cli =
            Cli::try_parse_from(["dupsort", "dedupe", "/p", "check", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Dedupe(args) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("Expected Dedupe command"),
        }
    }

    #[test]
    fn test_cli_parse_relocate() {
        let cli = Cli::try_parse_from([
            "dupsort",
            "relocate",
            "/upload",
            "/photo",
            "--ignore-index",
        ])
        .unwrap();
        match cli.command {
            Commands::Relocate(args) => {
                assert_eq!(args.source, PathBuf::from("/upload"));
                assert_eq!(args.destination, PathBuf::from("/photo"));
                assert!(args.ignore_index);
                assert!(args.index_program.is_none());
            }
            _ => panic!("Expected Relocate command"),
        }
    }

    #[test]
    fn test_cli_relocate_index_program_conflicts_with_ignore() {
        let result = Cli::try_parse_from([
            "dupsort",
            "relocate",
            "/a",
            "/b",
            "--ignore-index",
            "--index-program",
            "true",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dupsort", "-v", "-q", "scan", "/path"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["dupsort", "scan", "/path", "-q", "--json-errors"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.json_errors);
    }

    #[test]
    fn test_cli_invalid_subcommand() {
        assert!(Cli::try_parse_from(["dupsort", "invalid", "/path"]).is_err());
    }

    #[test]
    fn test_cli_missing_path() {
        assert!(Cli::try_parse_from(["dupsort", "scan"]).is_err());
        assert!(Cli::try_parse_from(["dupsort", "relocate", "/only-src"]).is_err());
    }
}
