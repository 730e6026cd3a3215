//! CLI presenter for output formatting

use std::time::Duration as StdDuration;

use colored::*;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::domain::recording::format_clock;

/// Width of the level meter in cells
const METER_WIDTH: usize = 24;

/// Full scale of a 16-bit peak
const FULL_SCALE: f64 = i16::MAX as f64;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.red} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(StdDuration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a remediation hint below an error
    pub fn hint(&self, message: &str) {
        eprintln!("  {} {}", "→".dimmed(), message.dimmed());
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Format the level meter and elapsed clock
    ///
    /// # Arguments
    /// * `peak` - Peak magnitude on the 16-bit scale since the last update
    /// * `elapsed` - Time since recording started
    pub fn format_level(&self, peak: u32, elapsed: StdDuration) -> String {
        let ratio = (peak as f64 / FULL_SCALE).clamp(0.0, 1.0);
        let filled = (ratio * METER_WIDTH as f64).round() as usize;
        let empty = METER_WIDTH - filled;

        let bar = "█".repeat(filled);
        let bar = if ratio >= 0.99 {
            bar.red()
        } else if ratio >= 0.7 {
            bar.yellow()
        } else {
            bar.green()
        };

        format!("{} [{}{}]", format_clock(elapsed), bar, "░".repeat(empty))
    }

    /// Show the recording meter
    pub fn show_recording(&mut self, message: &str) {
        self.start_spinner(message);
    }

    /// Update the recording meter
    pub fn update_recording(&self, peak: u32, elapsed: StdDuration) {
        let level = self.format_level(peak, elapsed);
        self.update_spinner(&format!("Recording {}  (Ctrl+C to stop)", level));
    }

    /// A 0-100 progress bar for AAC encoding, drawn once it is first advanced
    pub fn encode_progress(&self) -> ProgressBar {
        let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::hidden());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix:.cyan} [{bar:24.cyan/blue}] {pos:>3}%")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.set_prefix("Encoding");
        bar
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}
