//! Progress reporting utilities using indicatif.
//!
//! The [`Progress`] struct implements [`ProgressCallback`] with a single
//! spinner that counts files as the tree walk visits them. The walk writes
//! nothing to stdout except the final digest, so the spinner draws on stderr.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Observer for the tree walk.
///
/// Implement this trait to follow a scan as it happens. The hasher holds it
/// as an `Arc<dyn ProgressCallback>` handed in at construction.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g. "hashing")
    /// * `total` - Total number of items, or 0 when unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each file visited.
    ///
    /// # Arguments
    ///
    /// * `current` - Number of files visited so far (1-based)
    /// * `path` - Relative path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called after a file's bytes were read, with the number of bytes.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called when the walk enters a directory.
    fn on_message(&self, _message: &str) {}
}

/// Spinner reporting the walk on stderr.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    bytes: Mutex<u64>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Examples
    ///
    /// ```
    /// use pathfingerprint::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// assert!(progress.is_quiet());
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            bytes: Mutex::new(0),
            quiet,
        }
    }

    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(Self::style());
        pb.set_message(phase.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(pb);
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        self.with_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 40));
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        if let Ok(mut total) = self.bytes.lock() {
            *total += bytes;
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let bar = self.bar.lock().ok().and_then(|mut guard| guard.take());
        if let Some(pb) = bar {
            let bytes = self.bytes.lock().map(|b| *b).unwrap_or(0);
            pb.finish_and_clear();
            log::debug!("Phase {phase} complete: {} files, {bytes} bytes read", pb.position());
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        self.with_bar(|pb| pb.set_message(truncate_path(message, 40)));
    }
}

/// Truncate a path for display, keeping its tail.
fn truncate_path(path: &str, max_len: usize) -> String {
    let chars = path.chars().count();
    if chars <= max_len {
        return path.to_string();
    }

    let tail: String = path.chars().skip(chars - (max_len - 3)).collect();
    format!("...{tail}")
}
