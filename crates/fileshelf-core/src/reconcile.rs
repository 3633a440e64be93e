use crate::config::ExtensionlessPolicy;
use crate::error::Result;
use crate::paths;
use crate::scanner::filter::extension_of;
use crate::storage::models::{DirId, DirKind, FileId, ROOT_DIR_ID};
use crate::storage::Database;
use std::path::Path;
use tracing::{debug, trace};

/// Inserts filesystem paths into the `dirs` tree so that every real
/// directory's `parent_id` names its nearest known real ancestor, whatever
/// order the paths arrive in.
///
/// Callers must hold the store exclusively: the reparenting step reads then
/// writes.
pub struct PathReconciler<'a> {
    db: &'a Database,
    extensionless: ExtensionlessPolicy,
}

impl<'a> PathReconciler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            extensionless: ExtensionlessPolicy::default(),
        }
    }

    pub fn with_extensionless(mut self, policy: ExtensionlessPolicy) -> Self {
        self.extensionless = policy;
        self
    }

    /// Returns the id of the directory at `path` and whether it was created
    /// by this call.
    ///
    /// A new directory is attached to its closest existing ancestor, then
    /// takes over every direct child of that ancestor lying below it. That
    /// splits the ancestor→child edge the same way a new internal trie node
    /// would, so only direct children need to move.
    pub fn insert_dir(&self, path: &Path) -> Result<(DirId, bool)> {
        let path = paths::normalize(path)?;

        let tx = self.db.connection().unchecked_transaction()?;

        let (closest_id, closest_path) = self.closest_known(&path)?;
        if closest_path.as_deref() == Some(path.as_str()) {
            return Ok((closest_id, false));
        }

        let id = self.db.insert_dir(&path, closest_id, DirKind::Real)?;
        let adopted =
            self.db
                .reparent_real_children(closest_id, id, &paths::descendant_prefix(&path))?;
        tx.commit()?;

        debug!(
            "Inserted dir {} as {} under {} (adopted {} children)",
            path, id, closest_id, adopted
        );
        Ok((id, true))
    }

    /// Nearest real directory on the ancestor chain of `path`, the path
    /// itself included. Falls back to the root sentinel.
    fn closest_known(&self, path: &str) -> Result<(DirId, Option<String>)> {
        for candidate in paths::self_and_ancestors(path) {
            if let Some(id) = self.db.find_real_dir(candidate)? {
                trace!("Closest known ancestor of {} is {} ({})", path, candidate, id);
                return Ok((id, Some(candidate.to_string())));
            }
        }
        Ok((ROOT_DIR_ID, None))
    }

    /// Records `file` as owned by `dir_id`. Returns `None` when it is already
    /// catalogued there or the extensionless policy says to skip it.
    pub fn insert_file(&self, dir_id: DirId, file: &Path) -> Result<Option<FileId>> {
        let file_name = match file.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Ok(None),
        };

        if self.db.find_file(dir_id, &file_name)?.is_some() {
            return Ok(None);
        }

        let extension = extension_of(file);
        if extension.is_none() && self.extensionless == ExtensionlessPolicy::Skip {
            trace!("Skipping extensionless file {}", file_name);
            return Ok(None);
        }

        let tx = self.db.connection().unchecked_transaction()?;
        let ext_id = match extension {
            Some(ext) => Some(self.db.find_or_insert_extension(&ext)?),
            None => None,
        };
        let file_id = self.db.insert_file(dir_id, &file_name, ext_id)?;
        tx.commit()?;

        Ok(Some(file_id))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn parent_of(db: &Database, id: DirId) -> DirId {
        db.get_dir(id).unwrap().unwrap().parent_id
    }

    #[test]
    fn test_missing_ancestors_are_not_created() {
        let db = Database::open_in_memory().unwrap();
        let rec = PathReconciler::new(&db);
        let (id, created) = rec.insert_dir(Path::new("/lib/a/b")).unwrap();
        assert!(created);
        assert_eq!(parent_of(&db, id), ROOT_DIR_ID);
        assert!(db.find_real_dir("/lib/a").unwrap().is_none());
    }

    #[test]
    fn test_prefix_sibling_is_not_adopted() {
        let db = Database::open_in_memory().unwrap();
        let rec = PathReconciler::new(&db);
        let (bc, _) = rec.insert_dir(Path::new("/a/bc")).unwrap();
        let (b, _) = rec.insert_dir(Path::new("/a/b")).unwrap();
        assert_eq!(parent_of(&db, bc), ROOT_DIR_ID);
        assert_eq!(parent_of(&db, b), ROOT_DIR_ID);
    }

    #[test]
    fn test_trailing_separator_is_the_same_directory() {
        let db = Database::open_in_memory().unwrap();
        let rec = PathReconciler::new(&db);
        let (first, _) = rec.insert_dir(Path::new("/lib/a")).unwrap();
        let (second, created) = rec.insert_dir(Path::new("/lib/a/")).unwrap();
        assert_eq!(first, second);
        assert!(!created);
    }

    #[test]
    fn test_extensionless_policy() {
        let db = Database::open_in_memory().unwrap();
        let (dir, _) = PathReconciler::new(&db)
            .insert_dir(Path::new("/lib"))
            .unwrap();

        let skip = PathReconciler::new(&db).with_extensionless(ExtensionlessPolicy::Skip);
        assert_eq!(skip.insert_file(dir, Path::new("/lib/README")).unwrap(), None);

        let store = PathReconciler::new(&db);
        let id = store.insert_file(dir, Path::new("/lib/README")).unwrap().unwrap();
        assert_eq!(db.get_file(id).unwrap().unwrap().ext_id, None);
    }
}
