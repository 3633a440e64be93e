/// Trait for reporting scan progress.
///
/// The CLI implements it with indicatif; every method defaults to a no-op.
pub trait ScanReporter: Send + Sync {
    fn on_scan_start(&self, _root: &str) {}
    fn on_directory(&self, _path: &str) {}
    fn on_file_added(&self, _files_added: usize) {}
    fn on_scan_complete(&self, _files_added: usize, _dirs_touched: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ScanReporter for SilentReporter {}
