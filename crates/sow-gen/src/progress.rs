//! Progress reporting for scheme generation.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use sow_core::calendar::LessonLabel;
use sow_core::model::ContentSource;
use std::io::{self, Write};
use std::sync::Arc;

/// Emitted after each slot is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub completed_slots: usize,
    pub total_slots: usize,
    pub week: u32,
    pub lesson: LessonLabel,
    pub current_source: ContentSource,
    pub current_confidence: f64,
}

/// Receives progress events. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event);
    }
}

/// Terminal progress bars for a generation run.
#[derive(Clone)]
pub struct SchemeProgress {
    multi: Arc<MultiProgress>,
    slot_bar: ProgressBar,
    status_bar: ProgressBar,
}

impl Default for SchemeProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemeProgress {
    pub fn new() -> Self {
        Self::with_multi(MultiProgress::new())
    }

    /// Bars that never draw.
    pub fn hidden() -> Self {
        Self::with_multi(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    fn with_multi(multi: MultiProgress) -> Self {
        let multi = Arc::new(multi);

        let slot_bar = multi.add(ProgressBar::new(0));
        if let Ok(style) =
            ProgressStyle::default_bar().template("  {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            slot_bar.set_style(style.progress_chars("##-"));
        }
        slot_bar.set_prefix("Lessons");

        let status_bar = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            status_bar.set_style(style);
        }

        Self {
            multi,
            slot_bar,
            status_bar,
        }
    }

    /// Reset the bar for a run over `total` teaching slots.
    pub fn start(&self, total: u64) {
        self.slot_bar.set_length(total);
        self.slot_bar.set_position(0);
        self.slot_bar.set_message("");
    }

    /// Finish all bars.
    pub fn finish(&self) {
        self.slot_bar.finish_and_clear();
        self.status_bar.finish_and_clear();
    }

    /// Suspend progress bars for clean eprintln output, then resume.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.multi.suspend(f)
    }

    /// Stderr writer that clears the bars around each write, for use as a
    /// log sink while the bars are drawing.
    pub fn log_writer(&self) -> LogWriter {
        LogWriter {
            progress: self.clone(),
        }
    }
}

/// Writes to stderr above the progress bars. See [`SchemeProgress::log_writer`].
#[derive(Clone)]
pub struct LogWriter {
    progress: SchemeProgress,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.progress.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl ProgressSink for SchemeProgress {
    fn on_event(&self, event: &ProgressEvent) {
        self.slot_bar.set_length(event.total_slots as u64);
        self.slot_bar.set_position(event.completed_slots as u64);
        self.slot_bar
            .set_message(format!("week {} lesson {}", event.week, event.lesson));
        self.status_bar.set_message(format!(
            "last: {} ({:.2})",
            event.current_source, event.current_confidence
        ));
        self.status_bar.tick();
    }
}
