pub mod config;
pub mod error;
pub mod ingest;
pub mod namespace;
pub mod paths;
pub mod progress;
pub mod reconcile;
pub mod scanner;
pub mod storage;
pub mod worker;

pub use config::{AppConfig, ExtensionlessPolicy};
pub use error::Error;
pub use ingest::{Ingestor, ScanOutcome};
pub use namespace::{FileDrop, FileRef, NamespaceTree, NodeId, Occurrence, TreeNode};
pub use progress::{ScanReporter, SilentReporter};
pub use reconcile::PathReconciler;
pub use scanner::ExtensionFilter;
pub use storage::models::{DirId, DirKind, FileId};
pub use storage::{Database, SharedStore};
pub use worker::{CancelToken, ScanJob, ScanReport, ScanWorker};
