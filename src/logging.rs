//! Logging setup for the `dupsort` binary.
//!
//! Library code logs through the `log` facade; the binary installs an
//! `env_logger` backend here. `RUST_LOG`, when set, wins over the
//! `-v`/`-q` flags.
//!
//! | flags   | level |
//! |---------|-------|
//! | `-q`    | error |
//! | none    | info  |
//! | `-v`    | debug |
//! | `-vv`   | trace |
//!
//! ```rust,no_run
//! use dupsort::logging::init_logging;
//!
//! init_logging(1, false, false);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::io::Write;

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

/// Install the global logger. Call once, before any logging.
///
/// # Panics
///
/// Panics if a logger is already installed.
pub fn init_logging(verbose: u8, quiet: bool, no_color: bool) {
    let mut builder = Builder::new();

    let from_env = env::var_os("RUST_LOG").is_some();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }
    if no_color {
        builder.write_style(WriteStyle::Never);
    }

    let with_module = verbose > 0;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if with_module {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                level,
                record.module_path().unwrap_or("?"),
                record.args()
            )
        } else if cfg!(debug_assertions) {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} {}",
                buf.timestamp_seconds(),
                level,
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    builder.init();
    log::debug!(
        "Logging at {} ({})",
        current_level_name(),
        if from_env { "RUST_LOG" } else { "flags" }
    );
}

/// Log level implied by the command-line flags. `quiet` wins.
fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Name of the active maximum level.
#[must_use]
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for(0, false), LevelFilter::Info);
        assert_eq!(level_for(1, false), LevelFilter::Debug);
        assert_eq!(level_for(2, false), LevelFilter::Trace);
        assert_eq!(level_for(5, false), LevelFilter::Trace);
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        assert_eq!(level_for(0, true), LevelFilter::Error);
        assert_eq!(level_for(2, true), LevelFilter::Error);
    }

    #[test]
    fn test_current_level_name_is_known() {
        let name = current_level_name();
        assert!(["off", "error", "warn", "info", "debug", "trace"].contains(&name));
    }
}
