use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::WalkDir;

/// Lazily yields every regular file below `root`, depth first and sorted by
/// name so repeated scans see the same order. Directories matching one of
/// `ignore_globs` are pruned. Unreadable entries are logged and skipped.
pub fn walk_files(root: &Path, ignore_globs: &[String]) -> impl Iterator<Item = PathBuf> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_walk_yields_files_only() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/x.pdf"), "x").unwrap();
        fs::write(tmp.path().join("a/b/y.pdf"), "y").unwrap();

        let files: Vec<PathBuf> = walk_files(tmp.path(), &[]).collect();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_file()));
    }

    #[test]
    fn test_walk_prunes_ignored_directories() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("keep")).unwrap();
        fs::create_dir_all(tmp.path().join("skip")).unwrap();
        fs::write(tmp.path().join("keep/a.pdf"), "a").unwrap();
        fs::write(tmp.path().join("skip/b.pdf"), "b").unwrap();

        let files: Vec<PathBuf> = walk_files(tmp.path(), &["**/skip".to_string()]).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep/a.pdf"));
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let tmp = tempdir().unwrap();
        let files: Vec<PathBuf> = walk_files(&tmp.path().join("absent"), &[]).collect();
        assert!(files.is_empty());
    }
}
