//! dupsort - content-based duplicate finder and date-based photo arranger.
//!
//! Two workflows share one kernel: sampled BLAKE3 fingerprints behind a
//! cheap size pre-filter, and a conflict check that never lets different
//! content be overwritten.
//!
//! - `dedupe` catalogues a tree, groups byte-identical files and renders a
//!   reviewable script that removes or links the duplicates.
//! - `relocate` moves dated photos and videos into `<root>/<yyyy>/<mm>/`,
//!   carrying thumbnails along and notifying the media index.

pub mod actions;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use yansi::Paint;

use crate::actions::{
    plan, CommandNotifier, IndexNotifier, NoopNotifier, Relocator, RelocatorConfig,
};
use crate::catalog::Catalog;
use crate::cli::{Cli, Commands, DedupeArgs, RelocateArgs, ScanArgs};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, EquivalenceClass, FinderConfig, ScanSummary};
use crate::error::{ExitCode, UsageError};
use crate::output::{JsonOutput, OutputFormat, ScriptOutput};
use crate::progress::Progress;
use crate::scanner::WalkerConfig;

/// Run the command described by `cli`.
///
/// Logging must already be initialized.
///
/// # Errors
///
/// Returns an error for fatal conditions: bad configuration, an invalid
/// root, a catalog failure, or an interrupt.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if cli.no_color {
        yansi::disable();
    }

    if let Some(ref path) = cli.config {
        if !path.is_file() {
            return Err(UsageError(format!("config file not found: {}", path.display())).into());
        }
    }
    let mut config = Config::try_load(cli.config.as_deref())?;
    config.merge_cli(&cli);
    log::debug!("Effective configuration: {:?}", config);

    let handler = signal::install_handler()?;
    let shutdown = handler.get_flag();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Scan(ref args) => run_scan(args, &config, shutdown, quiet),
        Commands::Dedupe(ref args) => run_dedupe(args, &config, shutdown, quiet),
        Commands::Relocate(ref args) => run_relocate(args, &config, shutdown, quiet),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::Success)
        }
    }
}

fn walker_config(config: &Config, extra_patterns: &[String]) -> WalkerConfig {
    let mut patterns = config.ignore_patterns.clone();
    patterns.extend(extra_patterns.iter().cloned());
    WalkerConfig {
        excluded_dirs: config.excluded_dirs.clone(),
        ..WalkerConfig::default()
    }
    .with_ignore_patterns(patterns)
}

fn open_catalog(config: &Config, explicit: Option<&Path>) -> Result<Catalog> {
    let path = config.resolve_catalog_path(explicit);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create catalog directory {}", parent.display()))?;
    }
    Catalog::create(&path).with_context(|| format!("cannot create catalog {}", path.display()))
}

fn absolute_root(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).with_context(|| format!("cannot resolve {}", path.display()))
}

fn find_classes(
    root: &Path,
    catalog_path: Option<&Path>,
    ignore_patterns: &[String],
    config: &Config,
    shutdown: Arc<AtomicBool>,
    quiet: bool,
) -> Result<(Vec<EquivalenceClass>, ScanSummary)> {
    let root = absolute_root(root)?;
    let catalog = open_catalog(config, catalog_path)?;

    let finder_config = FinderConfig::default()
        .with_io_threads(config.io_threads)
        .with_sample_size(config.dedupe_sample_size)
        .with_walker_config(walker_config(config, ignore_patterns))
        .with_shutdown_flag(shutdown)
        .with_progress_callback(Arc::new(Progress::new(quiet)));

    let finder = DuplicateFinder::new(finder_config);
    Ok(finder.find_duplicates(&root, &catalog)?)
}

fn outcome_code(summary: &ScanSummary) -> ExitCode {
    if !summary.scan_errors.is_empty() || summary.grouping.failed_files > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}

fn print_summary(summary: &ScanSummary) {
    let grouping = &summary.grouping;
    eprintln!(
        "{} {} files ({}) in {:.1}s",
        "Catalogued".bold(),
        summary.total_files,
        summary.total_size_display(),
        summary.duration.as_secs_f64()
    );
    eprintln!(
        "{} {} of {} files shared a size, {:.1}% never read",
        "Fingerprinted".bold(),
        grouping.fingerprinted_files,
        grouping.total_files,
        grouping.elimination_rate()
    );
    eprintln!(
        "{} {} groups, {} duplicates, {} reclaimable ({:.1}%)",
        "Found".bold(),
        grouping.duplicate_groups.green(),
        grouping.duplicate_files.yellow(),
        summary.reclaimable_display(),
        summary.wasted_percentage()
    );
    let problems = summary.scan_errors.len() + grouping.failed_files;
    if problems > 0 {
        eprintln!("{} {} files could not be read", "Warning:".red().bold(), problems);
    }
}

fn run_scan(
    args: &ScanArgs,
    config: &Config,
    shutdown: Arc<AtomicBool>,
    quiet: bool,
) -> Result<ExitCode> {
    let (classes, summary) = find_classes(
        &args.path,
        args.catalog.as_deref(),
        &args.ignore_patterns,
        config,
        shutdown,
        quiet,
    )?;

    if !quiet {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for class in &classes {
            writeln!(
                out,
                "{} {}",
                class.fingerprint_hex()[..12].dim(),
                bytesize::ByteSize::b(class.size)
            )?;
            writeln!(out, "  {}", class.canonical_path().display().green())?;
            for dup in class.duplicate_paths() {
                writeln!(out, "  {}", dup.display().yellow())?;
            }
        }
        print_summary(&summary);
    }
    Ok(outcome_code(&summary))
}

fn run_dedupe(
    args: &DedupeArgs,
    config: &Config,
    shutdown: Arc<AtomicBool>,
    quiet: bool,
) -> Result<ExitCode> {
    let (classes, summary) = find_classes(
        &args.path,
        args.catalog.as_deref(),
        &args.ignore_patterns,
        config,
        shutdown,
        quiet,
    )?;
    let actions = plan(&classes, args.mode);
    let code = outcome_code(&summary);

    let mut writer: Box<dyn Write> = match args.script {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot write {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    match args.format {
        OutputFormat::Sh => ScriptOutput::new(&actions, args.mode).write_to(&mut writer)?,
        OutputFormat::Json => {
            JsonOutput::new(&classes, &actions, args.mode, &summary, code)
                .write_to(&mut writer, true)?;
        }
    }
    writer.flush()?;

    if !quiet {
        print_summary(&summary);
        if let Some(ref path) = args.script {
            eprintln!(
                "{} {} actions written to {}",
                "Plan:".bold(),
                actions.len(),
                path.display()
            );
        }
    }
    Ok(code)
}

fn run_relocate(
    args: &RelocateArgs,
    config: &Config,
    shutdown: Arc<AtomicBool>,
    quiet: bool,
) -> Result<ExitCode> {
    let source = absolute_root(&args.source)?;
    let destination = std::path::absolute(&args.destination)
        .with_context(|| format!("cannot resolve {}", args.destination.display()))?;
    if source == destination || std::fs::canonicalize(&destination).ok().as_ref() == Some(&source)
    {
        return Err(UsageError("src and dst directory can not be the same".to_string()).into());
    }

    let relocator_config = RelocatorConfig::default()
        .with_sample_size(config.move_sample_size)
        .with_ignore_index(args.ignore_index)
        .with_walker_config(WalkerConfig {
            excluded_dirs: config.excluded_dirs.clone(),
            ..WalkerConfig::default().with_empty_files(true)
        })
        .with_shutdown_flag(shutdown);

    let notifier: Box<dyn IndexNotifier> = if args.ignore_index {
        Box::new(NoopNotifier)
    } else {
        let program = args
            .index_program
            .clone()
            .unwrap_or_else(|| config.index_program.clone());
        Box::new(CommandNotifier::new(program))
    };

    let relocator = Relocator::new(relocator_config)
        .with_notifier(notifier)
        .with_progress_callback(Arc::new(Progress::new(quiet)));
    let report = relocator.relocate_tree(&source, &destination)?;

    if !quiet {
        for (from, to) in &report.moved {
            println!("{} ==> {}", from.display(), to.display().green());
        }
        for rejected in &report.rejected {
            if let actions::RelocationOutcome::Rejected { from, to, reason } = rejected {
                println!(
                    "{} {} {} ({})",
                    "Found conflict file".red(),
                    from.display(),
                    to.display(),
                    reason
                );
            }
        }
        for (path, message) in &report.failed {
            eprintln!("{} {}: {}", "Failed".red().bold(), path.display(), message);
        }
        eprintln!("{} {}", "Relocation:".bold(), report.summary());
    }

    Ok(if report.interrupted {
        ExitCode::Interrupted
    } else if report.has_problems() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}
