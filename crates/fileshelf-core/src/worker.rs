use crate::error::{Error, Result};
use crate::ingest::{Ingestor, ScanOutcome};
use crate::progress::ScanReporter;
use crate::scanner::ExtensionFilter;
use crate::storage::SharedStore;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Cooperative cancellation flag, checked by a scan between directories.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct ScanJob {
    pub root: PathBuf,
    pub filter: ExtensionFilter,
    pub cancel: CancelToken,
}

#[derive(Debug)]
pub struct ScanReport {
    pub root: PathBuf,
    pub result: Result<ScanOutcome>,
}

/// Background thread running queued scans one at a time.
///
/// The worker only writes the store (through the shared lock); it never sees
/// the namespace tree. Whoever owns the tree collects [`ScanReport`]s and
/// decides what to rebuild.
pub struct ScanWorker {
    jobs: Option<Sender<ScanJob>>,
    reports: Receiver<ScanReport>,
    handle: Option<JoinHandle<()>>,
}

impl ScanWorker {
    pub fn spawn(
        store: SharedStore,
        ingestor: Ingestor,
        reporter: Arc<dyn ScanReporter>,
    ) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<ScanJob>();
        let (report_tx, report_rx) = unbounded::<ScanReport>();

        let handle = thread::Builder::new()
            .name("fileshelf-scan".to_string())
            .spawn(move || {
                for job in job_rx.iter() {
                    debug!("Starting queued scan of {}", job.root.display());
                    let result =
                        ingestor.scan(&store, &job.root, &job.filter, &job.cancel, reporter.as_ref());
                    if let Err(err) = &result {
                        error!("Scan of {} failed: {}", job.root.display(), err);
                    }
                    let report = ScanReport {
                        root: job.root,
                        result,
                    };
                    if report_tx.send(report).is_err() {
                        break;
                    }
                }
                debug!("Scan worker exiting");
            })?;

        info!("Scan worker started");
        Ok(Self {
            jobs: Some(job_tx),
            reports: report_rx,
            handle: Some(handle),
        })
    }

    /// Queues a scan and returns the token that cancels it.
    pub fn submit(&self, root: impl Into<PathBuf>, filter: ExtensionFilter) -> Result<CancelToken> {
        let cancel = CancelToken::new();
        let job = ScanJob {
            root: root.into(),
            filter,
            cancel: cancel.clone(),
        };
        self.jobs
            .as_ref()
            .ok_or_else(|| Error::Worker("scan worker is shut down".to_string()))?
            .send(job)
            .map_err(|_| Error::Worker("scan worker stopped".to_string()))?;
        Ok(cancel)
    }

    /// Blocks until the next queued scan finishes.
    pub fn recv_report(&self) -> Result<ScanReport> {
        self.reports
            .recv()
            .map_err(|_| Error::Worker("scan worker stopped".to_string()))
    }

    pub fn try_recv_report(&self) -> Option<ScanReport> {
        self.reports.try_recv().ok()
    }

    /// Lets queued jobs finish, then joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Scan worker panicked");
            }
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
