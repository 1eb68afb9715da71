//! Progress reporting surfaces for batch execution.
//!
//! Neither surface is required by the executor; both attach through the
//! progress callback.

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::batch::Progress;

/// Rate-limited textual progress reporting via `tracing`.
///
/// Emits at most one line per interval, plus an unconditional final line
/// when the batch completes.
pub struct ProgressLogger {
    interval: Duration,
    detailed: bool,
    last_emit: Mutex<Option<Instant>>,
}

impl ProgressLogger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            detailed: false,
            last_emit: Mutex::new(None),
        }
    }

    /// Include the success rate in every emitted line.
    pub fn with_detail(mut self) -> Self {
        self.detailed = true;
        self
    }

    /// Whether this snapshot is due for emission; updates the throttle state.
    fn should_emit(&self, progress: &Progress) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_emit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let due = progress.completed == progress.total
            || last.map_or(true, |at| now.duration_since(at) >= self.interval);
        if due {
            *last = Some(now);
        }
        due
    }

    /// Progress callback entry point.
    pub fn report(&self, progress: &Progress) {
        if !self.should_emit(progress) {
            return;
        }
        if self.detailed {
            tracing::info!(
                completed = progress.completed,
                total = progress.total,
                failed = progress.failed,
                success_rate = format!("{:.1}%", progress.success_rate() * 100.0),
                eta_secs = progress.eta.as_secs(),
                "batch progress"
            );
        } else {
            tracing::info!(
                completed = progress.completed,
                total = progress.total,
                failed = progress.failed,
                "batch progress"
            );
        }
    }
}

/// In-place ASCII progress bar with a fixed-width track.
///
/// Redundant redraws are suppressed by comparing the rendered frame against
/// the last emitted one; write failures are ignored.
pub struct ProgressBar<W> {
    width: usize,
    state: Mutex<BarState<W>>,
}

struct BarState<W> {
    writer: W,
    last_frame: String,
}

impl ProgressBar<std::io::Stderr> {
    /// Bar with the default 40-column track, drawing to stderr.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr(), 40)
    }
}

impl<W: Write> ProgressBar<W> {
    pub fn new(writer: W, width: usize) -> Self {
        Self {
            width: width.max(1),
            state: Mutex::new(BarState {
                writer,
                last_frame: String::new(),
            }),
        }
    }

    fn render(&self, progress: &Progress) -> String {
        let total = progress.total.max(1);
        let filled = (self.width * progress.completed.min(total)) / total;
        let percent = progress.completed.min(total) as f64 / total as f64 * 100.0;
        format!(
            "[{}{}] {}/{} ({:.1}%)",
            "#".repeat(filled),
            "-".repeat(self.width - filled),
            progress.completed,
            progress.total,
            percent
        )
    }

    /// Progress callback entry point.
    pub fn report(&self, progress: &Progress) {
        let frame = self.render(progress);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if frame == state.last_frame {
            return;
        }
        let _ = write!(state.writer, "\r{frame}");
        if progress.completed >= progress.total {
            let _ = writeln!(state.writer);
        }
        let _ = state.writer.flush();
        state.last_frame = frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total: usize, completed: usize, failed: usize) -> Progress {
        Progress {
            total,
            completed,
            failed,
            elapsed: Duration::from_secs(1),
            eta: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_logger_throttles_within_interval() {
        let logger = ProgressLogger::new(Duration::from_secs(3600));
        assert!(logger.should_emit(&snapshot(10, 1, 0)));
        assert!(!logger.should_emit(&snapshot(10, 2, 0)));
        assert!(!logger.should_emit(&snapshot(10, 9, 1)));
    }

    #[test]
    fn test_logger_always_emits_final_snapshot() {
        let logger = ProgressLogger::new(Duration::from_secs(3600));
        assert!(logger.should_emit(&snapshot(10, 1, 0)));
        assert!(logger.should_emit(&snapshot(10, 10, 2)));
    }

    #[test]
    fn test_logger_emits_again_after_interval() {
        let logger = ProgressLogger::new(Duration::ZERO);
        assert!(logger.should_emit(&snapshot(10, 1, 0)));
        assert!(logger.should_emit(&snapshot(10, 2, 0)));
    }

    #[test]
    fn test_bar_renders_fixed_width() {
        let bar = ProgressBar::new(Vec::new(), 10);
        assert_eq!(bar.render(&snapshot(100, 0, 0)), "[----------] 0/100 (0.0%)");
        assert_eq!(
            bar.render(&snapshot(100, 50, 0)),
            "[#####-----] 50/100 (50.0%)"
        );
        assert_eq!(
            bar.render(&snapshot(100, 100, 0)),
            "[##########] 100/100 (100.0%)"
        );
    }

    #[test]
    fn test_bar_suppresses_redundant_redraws() {
        let bar = ProgressBar::new(Vec::new(), 10);
        // Two snapshots that render identically produce one write.
        bar.report(&snapshot(1000, 1, 0));
        bar.report(&snapshot(1000, 1, 1));
        let state = bar.state.lock().unwrap();
        let written = String::from_utf8(state.writer.clone()).unwrap();
        assert_eq!(written.matches('\r').count(), 1);
    }

    #[test]
    fn test_bar_finishes_with_newline() {
        let bar = ProgressBar::new(Vec::new(), 10);
        bar.report(&snapshot(2, 1, 0));
        bar.report(&snapshot(2, 2, 0));
        let state = bar.state.lock().unwrap();
        let written = String::from_utf8(state.writer.clone()).unwrap();
        assert!(written.ends_with('\n'));
    }
}
