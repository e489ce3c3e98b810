//! Progress and error reporting for long-running stages.

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates and per-chunk errors from a stage.
///
/// Purely observational: nothing a sink does affects pipeline control flow.
pub trait ProgressSink {
    /// Report completion as a fraction in `0.0..=1.0` with a short label.
    fn progress(&mut self, fraction: f64, label: &str);

    /// Report a non-fatal error.
    fn error(&mut self, message: &str);

    /// Called once the stage is over.
    fn finish(&mut self) {}
}

/// Progress bar on stderr.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(initial_label: &str) -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(initial_label.to_string());
        Self { bar }
    }
}

impl ProgressSink for ConsoleProgress {
    fn progress(&mut self, fraction: f64, label: &str) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u64;
        self.bar.set_position(percent);
        self.bar.set_message(label.to_string());
    }

    fn error(&mut self, message: &str) {
        log::warn!("{}", message);
        self.bar.println(format!("Error: {}", message));
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Sink that only logs, for non-interactive use.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&mut self, fraction: f64, label: &str) {
        log::info!("[{:>3.0}%] {}", fraction * 100.0, label);
    }

    fn error(&mut self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Sink that records everything it is told, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub updates: Vec<(f64, String)>,
    pub errors: Vec<String>,
    pub finished: bool,
}

#[cfg(test)]
impl ProgressSink for RecordingProgress {
    fn progress(&mut self, fraction: f64, label: &str) {
        self.updates.push((fraction, label.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
