//! Terminal progress reporting.
//!
//! Pipeline stages report through the [`ProgressCallback`] trait so they
//! stay independent of any UI. [`Progress`] is the indicatif-backed
//! implementation used by the binary: a spinner while walking, a bar with
//! throughput while fingerprinting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Receives progress events from long-running stages.
pub trait ProgressCallback: Send + Sync {
    /// A stage began. `total` is 0 when the amount of work is unknown.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Item `current` (1-based) at `path` is being processed.
    fn on_progress(&self, current: usize, path: &str);

    /// An item finished after reading `bytes`.
    fn on_item_completed(&self, _bytes: u64) {}

    /// A stage ended.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status text.
    fn on_message(&self, _message: &str) {}
}

/// indicatif progress display.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    bytes: AtomicU64,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; a quiet one draws nothing.
    ///
    /// ```
    /// use dupsort::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            bytes: AtomicU64::new(0),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn with_active(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.active.lock() {
            if let Some(ref pb) = *guard {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let pb = if total == 0 {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_message(match phase {
            "scan" => "Walking".to_string(),
            "fingerprint" => "Fingerprinting".to_string(),
            "relocate" => "Relocating".to_string(),
            other => other.to_string(),
        });
        self.bytes.store(0, Ordering::Relaxed);
        if let Ok(mut guard) = self.active.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        let shown = truncate_path(path, 30);
        self.with_active(|pb| {
            if pb.length().is_some() {
                pb.inc(1);
            } else {
                pb.set_position(current as u64);
            }
            pb.set_message(shown);
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        let read = self.bytes.load(Ordering::Relaxed);
        if let Ok(mut guard) = self.active.lock() {
            if let Some(pb) = guard.take() {
                if read > 0 {
                    pb.finish_with_message(format!(
                        "{} done, {} read",
                        phase,
                        bytesize::ByteSize::b(read)
                    ));
                } else {
                    pb.finish_with_message(format!("{} done", phase));
                }
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        let message = message.to_string();
        self.with_active(|pb| pb.set_message(message));
    }
}

/// Shorten a path for display, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let count = name.chars().count();
    if count + 4 > max_len {
        let tail: String = name.chars().skip(count.saturating_sub(max_len - 3)).collect();
        format!("...{}", tail)
    } else {
        format!(".../{}", name)
    }
}
