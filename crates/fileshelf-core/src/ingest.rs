use crate::config::{AppConfig, ExtensionlessPolicy};
use crate::error::{Error, Result};
use crate::progress::ScanReporter;
use crate::reconcile::PathReconciler;
use crate::scanner::{walk_files, ExtensionFilter};
use crate::storage::models::DirId;
use crate::storage::{Database, SharedStore};
use crate::worker::CancelToken;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of one scan request.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub session_id: i64,
    /// Directories that received at least one new file.
    pub touched: BTreeSet<DirId>,
    pub files_added: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

/// Walks a root directory and feeds every matching file through the
/// [`PathReconciler`].
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    ignore_patterns: Vec<String>,
    extensionless: ExtensionlessPolicy,
}

impl Ingestor {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ignore_patterns: config.ignore_patterns.clone(),
            extensionless: config.extensionless,
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_extensionless(mut self, policy: ExtensionlessPolicy) -> Self {
        self.extensionless = policy;
        self
    }

    /// Scans `root` holding the store lock for the whole job, so user edits
    /// queue behind it. Cancellation is checked between directories; a
    /// cancelled scan keeps what it already inserted and returns the partial
    /// touched set.
    pub fn scan(
        &self,
        store: &SharedStore,
        root: &Path,
        filter: &ExtensionFilter,
        cancel: &CancelToken,
        reporter: &dyn ScanReporter,
    ) -> Result<ScanOutcome> {
        let start = Instant::now();
        let root = fs::canonicalize(root)?;
        let root_str = root.to_string_lossy().into_owned();

        info!("Scanning {} for {:?}", root_str, filter);
        reporter.on_scan_start(&root_str);

        let db = store.lock();
        let mut outcome = ScanOutcome {
            session_id: db.create_scan_session(&root_str, &filter.to_list())?,
            ..ScanOutcome::default()
        };

        let result = self.scan_batches(&db, &root, filter, cancel, reporter, &mut outcome);

        let status = match (&result, outcome.cancelled) {
            (Err(_), _) => "failed",
            (Ok(()), true) => "cancelled",
            (Ok(()), false) => "completed",
        };
        db.finish_scan_session(
            outcome.session_id,
            status,
            outcome.files_added as i64,
            outcome.touched.len() as i64,
        )?;
        drop(db);
        result?;

        outcome.duration = start.elapsed();
        reporter.on_scan_complete(
            outcome.files_added,
            outcome.touched.len(),
            outcome.duration.as_secs_f64(),
        );
        info!(
            "Scan of {} {}: {} files added in {} directories ({:.2}s)",
            root_str,
            status,
            outcome.files_added,
            outcome.touched.len(),
            outcome.duration.as_secs_f64()
        );
        Ok(outcome)
    }

    fn scan_batches(
        &self,
        db: &Database,
        root: &Path,
        filter: &ExtensionFilter,
        cancel: &CancelToken,
        reporter: &dyn ScanReporter,
        outcome: &mut ScanOutcome,
    ) -> Result<()> {
        let mut files = walk_files(root, &self.ignore_patterns)
            .filter(|path| filter.matches(path))
            .peekable();

        while let Some(first) = files.next() {
            let dir = match first.parent() {
                Some(dir) => dir.to_path_buf(),
                None => continue,
            };
            let mut batch = vec![first];
            while let Some(next) = files.next_if(|p| p.parent() == Some(dir.as_path())) {
                batch.push(next);
            }

            if cancel.is_cancelled() {
                info!("Scan cancelled before {}", dir.display());
                outcome.cancelled = true;
                break;
            }

            self.ingest_directory(db, &dir, &batch, reporter, outcome)?;
        }
        Ok(())
    }

    /// Inserts one directory and its files. Files that vanished or cannot be
    /// read since the walk are skipped.
    fn ingest_directory(
        &self,
        db: &Database,
        dir: &Path,
        files: &[PathBuf],
        reporter: &dyn ScanReporter,
        outcome: &mut ScanOutcome,
    ) -> Result<()> {
        reporter.on_directory(&dir.to_string_lossy());
        let reconciler = PathReconciler::new(db).with_extensionless(self.extensionless);
        let (dir_id, _) = reconciler.insert_dir(dir)?;

        for file in files {
            if let Err(err) = fs::metadata(file) {
                warn!("Skipping {}: {}", file.display(), err);
                continue;
            }
            match reconciler.insert_file(dir_id, file) {
                Ok(Some(_)) => {
                    outcome.files_added += 1;
                    outcome.touched.insert(dir_id);
                    reporter.on_file_added(outcome.files_added);
                }
                Ok(None) => {}
                Err(Error::Database(err)) => return Err(Error::Database(err)),
                Err(err) => warn!("Skipping {}: {}", file.display(), err),
            }
        }
        Ok(())
    }
}
