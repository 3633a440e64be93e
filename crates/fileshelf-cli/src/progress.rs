use colored::*;
use fileshelf_core::ScanReporter;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::time::Duration;

/// Spinner per scanned root, replaced when the next root starts.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar.lock().take() {
            pb.finish_and_clear();
        }
    }
}

impl ScanReporter for CliReporter {
    fn on_scan_start(&self, root: &str) {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} [{prefix}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.set_prefix("0");
        pb.set_message(format!("Scanning {}...", root));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_directory(&self, path: &str) {
        if let Some(pb) = self.bar.lock().as_ref() {
            pb.set_message(format!("Scanning {}", path));
        }
    }

    fn on_file_added(&self, files_added: usize) {
        if let Some(pb) = self.bar.lock().as_ref() {
            pb.set_prefix(files_added.to_string());
        }
    }

    fn on_scan_complete(&self, files_added: usize, dirs_touched: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scan complete: {} new files in {} directories ({:.2}s)",
            "✓".green(),
            files_added,
            dirs_touched,
            duration_secs
        );
    }
}
