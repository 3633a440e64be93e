use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use fileshelf_core::storage::models::ROOT_DIR_ID;
use fileshelf_core::{
    CancelToken, Database, ExtensionFilter, Ingestor, NamespaceTree, ScanReporter, SharedStore,
    SilentReporter, ScanWorker,
};

/// Layout:
///   lib/
///     a/
///       x.pdf
///       b/
///         y.pdf
fn create_library(root: &Path) -> PathBuf {
    let lib = root.join("lib");
    fs::create_dir_all(lib.join("a/b")).unwrap();
    fs::write(lib.join("a/x.pdf"), "x").unwrap();
    fs::write(lib.join("a/b/y.pdf"), "y").unwrap();
    fs::canonicalize(lib).unwrap()
}

fn pdf_only() -> ExtensionFilter {
    ExtensionFilter::from_list(&["pdf"])
}

fn new_store() -> SharedStore {
    Database::open_in_memory().unwrap().into_shared()
}

fn dir_id(store: &SharedStore, path: &Path) -> i64 {
    store
        .lock()
        .find_real_dir(path.to_str().unwrap())
        .unwrap()
        .expect("directory should be catalogued")
}

fn count(store: &SharedStore, sql: &str) -> i64 {
    store
        .lock()
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_scan_catalogues_only_directories_with_files() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    let store = new_store();

    let outcome = Ingestor::default()
        .scan(&store, &lib, &pdf_only(), &CancelToken::new(), &SilentReporter)
        .unwrap();

    let a = dir_id(&store, &lib.join("a"));
    let b = dir_id(&store, &lib.join("a/b"));
    assert_eq!(outcome.files_added, 2);
    assert_eq!(outcome.touched, BTreeSet::from([a, b]));
    assert!(!outcome.cancelled);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM dirs WHERE kind = 0 AND id != 0"), 2);
    assert_eq!(count(&store, "SELECT COUNT(*) FROM files"), 2);
    assert!(store.lock().find_real_dir(lib.to_str().unwrap()).unwrap().is_none());

    let db = store.lock();
    assert_eq!(db.get_dir(a).unwrap().unwrap().parent_id, ROOT_DIR_ID);
    assert_eq!(db.get_dir(b).unwrap().unwrap().parent_id, a);
}

#[test]
fn test_rescan_inserts_nothing() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    let store = new_store();
    let ingestor = Ingestor::default();

    ingestor
        .scan(&store, &lib, &pdf_only(), &CancelToken::new(), &SilentReporter)
        .unwrap();
    let again = ingestor
        .scan(&store, &lib, &pdf_only(), &CancelToken::new(), &SilentReporter)
        .unwrap();

    assert_eq!(again.files_added, 0);
    assert!(again.touched.is_empty());
    assert_eq!(count(&store, "SELECT COUNT(*) FROM files"), 2);

    let (sessions, total) = store.lock().list_sessions(0, 10).unwrap();
    assert_eq!(total, 2);
    assert!(sessions.iter().all(|s| s.status == "completed"));
    assert_eq!(sessions[0].files_added, 0);
    assert_eq!(sessions[1].files_added, 2);
}

#[test]
fn test_scanning_a_parent_after_a_child_reparents() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    let store = new_store();
    let ingestor = Ingestor::default();

    ingestor
        .scan(&store, &lib.join("a/b"), &pdf_only(), &CancelToken::new(), &SilentReporter)
        .unwrap();
    let b = dir_id(&store, &lib.join("a/b"));
    assert_eq!(store.lock().get_dir(b).unwrap().unwrap().parent_id, ROOT_DIR_ID);

    let outcome = ingestor
        .scan(&store, &lib, &pdf_only(), &CancelToken::new(), &SilentReporter)
        .unwrap();
    let a = dir_id(&store, &lib.join("a"));
    assert_eq!(outcome.touched, BTreeSet::from([a]));
    assert_eq!(store.lock().get_dir(b).unwrap().unwrap().parent_id, a);
}

#[test]
fn test_filter_decides_what_is_catalogued() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    fs::write(lib.join("a/notes.TXT"), "n").unwrap();
    fs::write(lib.join("a/README"), "r").unwrap();
    let store = new_store();
    let ingestor = Ingestor::default();

    let pdf = ingestor
        .scan(&store, &lib, &pdf_only(), &CancelToken::new(), &SilentReporter)
        .unwrap();
    assert_eq!(pdf.files_added, 2);

    let bare = ingestor
        .scan(&store, &lib, &ExtensionFilter::parse(""), &CancelToken::new(), &SilentReporter)
        .unwrap();
    assert_eq!(bare.files_added, 1);

    let any = ingestor
        .scan(&store, &lib, &ExtensionFilter::parse("*"), &CancelToken::new(), &SilentReporter)
        .unwrap();
    assert_eq!(any.files_added, 1);

    let ext: String = store
        .lock()
        .connection()
        .query_row(
            "SELECT e.extension FROM files f JOIN extensions e ON e.id = f.ext_id \
             WHERE f.file_name = 'notes.TXT'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(ext, "txt");
}

/// Counts progress callbacks that arrive while the store is free for edits.
struct LockWatch {
    store: SharedStore,
    unlocked: AtomicUsize,
    calls: AtomicUsize,
}

impl LockWatch {
    fn check(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.store.is_locked() {
            self.unlocked.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ScanReporter for LockWatch {
    fn on_directory(&self, _path: &str) {
        self.check();
    }

    fn on_file_added(&self, _files_added: usize) {
        self.check();
    }
}

#[test]
fn test_scan_holds_the_store_for_the_whole_job() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    let store = new_store();
    let watch = LockWatch {
        store: store.clone(),
        unlocked: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    };

    Ingestor::default()
        .scan(&store, &lib, &pdf_only(), &CancelToken::new(), &watch)
        .unwrap();

    assert_eq!(watch.calls.load(Ordering::SeqCst), 4);
    assert_eq!(watch.unlocked.load(Ordering::SeqCst), 0);
    assert!(!store.is_locked());
}

#[test]
fn test_ignored_directories_are_not_walked() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    let store = new_store();

    let outcome = Ingestor::default()
        .with_ignore_patterns(vec!["**/b".to_string()])
        .scan(&store, &lib, &pdf_only(), &CancelToken::new(), &SilentReporter)
        .unwrap();

    assert_eq!(outcome.files_added, 1);
    assert!(store
        .lock()
        .find_real_dir(lib.join("a/b").to_str().unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn test_cancelled_scan_keeps_partial_state() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    let store = new_store();
    let cancel = CancelToken::new();
    cancel.cancel();

    let outcome = Ingestor::default()
        .scan(&store, &lib, &pdf_only(), &cancel, &SilentReporter)
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.files_added, 0);
    assert!(outcome.touched.is_empty());
    let (sessions, _) = store.lock().list_sessions(0, 1).unwrap();
    assert_eq!(sessions[0].status, "cancelled");
}

#[test]
fn test_missing_root_is_an_error() {
    let tmp = tempdir().unwrap();
    let store = new_store();
    let result = Ingestor::default().scan(
        &store,
        &tmp.path().join("absent"),
        &pdf_only(),
        &CancelToken::new(),
        &SilentReporter,
    );
    assert!(result.is_err());
}

#[test]
fn test_worker_runs_queued_scans_in_order() {
    let tmp = tempdir().unwrap();
    let lib = create_library(tmp.path());
    let other = tmp.path().join("other");
    fs::create_dir_all(&other).unwrap();
    fs::write(other.join("z.epub"), "z").unwrap();
    let other = fs::canonicalize(other).unwrap();

    let store = new_store();
    let worker = ScanWorker::spawn(store.clone(), Ingestor::default(), Arc::new(SilentReporter)).unwrap();
    worker.submit(&lib, pdf_only()).unwrap();
    worker.submit(&other, ExtensionFilter::parse("epub")).unwrap();

    let first = worker.recv_report().unwrap();
    let second = worker.recv_report().unwrap();
    assert_eq!(first.root, lib);
    assert_eq!(first.result.unwrap().files_added, 2);
    assert_eq!(second.root, other);
    assert_eq!(second.result.unwrap().files_added, 1);
    assert!(worker.try_recv_report().is_none());
    worker.shutdown();

    let db = store.lock();
    let tree = NamespaceTree::load(&db).unwrap();
    let a = db.find_real_dir(lib.join("a").to_str().unwrap()).unwrap().unwrap();
    let b = db.find_real_dir(lib.join("a/b").to_str().unwrap()).unwrap().unwrap();
    let a_node = tree.primary_occurrence(a).unwrap();
    let b_node = tree.primary_occurrence(b).unwrap();
    assert_eq!(tree.parent(b_node), Some(a_node));
}

#[test]
fn test_worker_reports_failed_scans() {
    let tmp = tempdir().unwrap();
    let store = new_store();
    let worker = ScanWorker::spawn(store, Ingestor::default(), Arc::new(SilentReporter)).unwrap();
    worker.submit(tmp.path().join("absent"), pdf_only()).unwrap();

    let report = worker.recv_report().unwrap();
    assert!(report.result.is_err());
}
