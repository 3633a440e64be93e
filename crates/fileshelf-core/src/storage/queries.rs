use super::models::*;
use super::sqlite::Database;
use rusqlite::{params, OptionalExtension, Result};
use tracing::debug;

impl Database {
    // ── Directories ──────────────────────────────────────────────

    /// Exact-path lookup among real directories.
    pub fn find_real_dir(&self, path: &str) -> Result<Option<DirId>> {
        self.connection()
            .query_row(
                "SELECT id FROM dirs WHERE path = ?1 AND kind = 0 AND id != 0",
                params![path],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn insert_dir(&self, path: &str, parent_id: DirId, kind: DirKind) -> Result<DirId> {
        self.connection().execute(
            "INSERT INTO dirs (path, parent_id, kind) VALUES (?1, ?2, ?3)",
            params![path, parent_id, kind],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Move every real child of `old_parent_id` whose path starts with
    /// `prefix` under `new_parent_id`.
    pub fn reparent_real_children(
        &self,
        old_parent_id: DirId,
        new_parent_id: DirId,
        prefix: &str,
    ) -> Result<usize> {
        self.connection().execute(
            "UPDATE dirs SET parent_id = ?1 \
             WHERE parent_id = ?2 AND kind = 0 AND id != ?1 \
               AND substr(path, 1, length(?3)) = ?3",
            params![new_parent_id, old_parent_id, prefix],
        )
    }

    pub fn get_dir(&self, id: DirId) -> Result<Option<Directory>> {
        self.connection()
            .query_row(
                "SELECT id, path, parent_id, kind FROM dirs WHERE id = ?1 AND id != 0",
                params![id],
                map_dir,
            )
            .optional()
    }

    pub fn set_dir_parent(&self, id: DirId, parent_id: DirId) -> Result<usize> {
        self.connection().execute(
            "UPDATE dirs SET parent_id = ?1 WHERE id = ?2",
            params![parent_id, id],
        )
    }

    pub fn rename_dir(&self, id: DirId, label: &str) -> Result<usize> {
        self.connection().execute(
            "UPDATE dirs SET path = ?1 WHERE id = ?2",
            params![label, id],
        )
    }

    /// Deletes the row; descendants, files and aliases follow by cascade.
    pub fn delete_dir(&self, id: DirId) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM dirs WHERE id = ?1 AND id != 0", params![id])
    }

    pub fn favorites_id(&self) -> Result<DirId> {
        self.connection()
            .query_row("SELECT id FROM dirs WHERE kind = 1", [], |row| row.get(0))
    }

    /// Ids of `dir_id` and its primary descendants, down to `max_depth`
    /// levels below it (`None` = unbounded).
    pub fn subtree_dir_ids(&self, dir_id: DirId, max_depth: Option<u32>) -> Result<Vec<DirId>> {
        let limit = max_depth.map(i64::from).unwrap_or(-1);
        let mut stmt = self.connection().prepare(
            "WITH RECURSIVE sub(id, level) AS ( \
                 SELECT id, 0 FROM dirs WHERE id = ?1 \
                 UNION ALL \
                 SELECT d.id, sub.level + 1 FROM dirs d JOIN sub ON d.parent_id = sub.id \
                 WHERE d.id != 0 AND (?2 < 0 OR sub.level < ?2) \
             ) SELECT id FROM sub ORDER BY id",
        )?;
        let ids = stmt
            .query_map(params![dir_id, limit], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Real and group rows below `dir_id` whose primary path up to it runs
    /// through virtual rows only. Their own descendants are not listed.
    pub fn nearest_non_virtual_descendants(&self, dir_id: DirId) -> Result<Vec<Directory>> {
        let mut stmt = self.connection().prepare(
            "WITH RECURSIVE shell(id) AS ( \
                 SELECT ?1 \
                 UNION \
                 SELECT d.id FROM dirs d JOIN shell ON d.parent_id = shell.id \
                 WHERE d.kind = 2 AND d.id != 0 \
             ) \
             SELECT d.id, d.path, d.parent_id, d.kind FROM dirs d \
             JOIN shell ON d.parent_id = shell.id \
             WHERE d.kind IN (0, 3) AND d.id != 0 ORDER BY d.path",
        )?;
        let dirs = stmt
            .query_map(params![dir_id], map_dir)?
            .collect::<Result<Vec<_>>>()?;
        Ok(dirs)
    }

    /// Repeatedly remove real leaf directories that hold no files, take no
    /// part in any alias and have no child rows.
    pub fn delete_empty_dirs(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let removed = self.connection().execute(
                "DELETE FROM dirs WHERE kind = 0 AND id != 0 \
                   AND NOT EXISTS (SELECT 1 FROM files f WHERE f.dir_id = dirs.id) \
                   AND NOT EXISTS (SELECT 1 FROM dirs c WHERE c.parent_id = dirs.id) \
                   AND NOT EXISTS (SELECT 1 FROM virtual_dirs v \
                                   WHERE v.dir_id = dirs.id OR v.parent_id = dirs.id)",
                [],
            )?;
            if removed == 0 {
                break;
            }
            total += removed;
        }
        debug!("Removed {} empty directories", total);
        Ok(total)
    }

    /// Flat dump of every primary and alias edge, the input of a tree rebuild.
    pub fn tree_rows(&self) -> Result<Vec<TreeRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, parent_id, kind, path, 0 FROM dirs WHERE id != 0 \
             UNION ALL \
             SELECT d.id, v.parent_id, d.kind, d.path, 1 \
             FROM virtual_dirs v JOIN dirs d ON d.id = v.dir_id \
             ORDER BY 5, 4",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TreeRow {
                    dir_id: row.get(0)?,
                    parent_id: row.get(1)?,
                    kind: row.get(2)?,
                    path: row.get(3)?,
                    via_alias: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Directory aliases ────────────────────────────────────────

    pub fn alias_exists(&self, parent_id: DirId, dir_id: DirId) -> Result<bool> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM virtual_dirs WHERE parent_id = ?1 AND dir_id = ?2",
            params![parent_id, dir_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_alias(&self, parent_id: DirId, dir_id: DirId) -> Result<()> {
        self.connection().execute(
            "INSERT INTO virtual_dirs (parent_id, dir_id) VALUES (?1, ?2)",
            params![parent_id, dir_id],
        )?;
        Ok(())
    }

    pub fn delete_alias(&self, parent_id: DirId, dir_id: DirId) -> Result<usize> {
        self.connection().execute(
            "DELETE FROM virtual_dirs WHERE parent_id = ?1 AND dir_id = ?2",
            params![parent_id, dir_id],
        )
    }

    /// Remove every alias naming `dir_id` as its target.
    pub fn delete_aliases_of(&self, dir_id: DirId) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM virtual_dirs WHERE dir_id = ?1", params![dir_id])
    }

    pub fn aliases_of(&self, dir_id: DirId) -> Result<Vec<VirtualAlias>> {
        let mut stmt = self.connection().prepare(
            "SELECT parent_id, dir_id FROM virtual_dirs WHERE dir_id = ?1 ORDER BY parent_id",
        )?;
        let aliases = stmt
            .query_map(params![dir_id], |row| {
                Ok(VirtualAlias {
                    parent_id: row.get(0)?,
                    dir_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(aliases)
    }

    // ── Files & extensions ───────────────────────────────────────

    pub fn find_file(&self, dir_id: DirId, file_name: &str) -> Result<Option<FileId>> {
        self.connection()
            .query_row(
                "SELECT id FROM files WHERE dir_id = ?1 AND file_name = ?2",
                params![dir_id, file_name],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn find_or_insert_extension(&self, extension: &str) -> Result<i64> {
        let existing: Option<i64> = self
            .connection()
            .query_row(
                "SELECT id FROM extensions WHERE extension = ?1",
                params![extension],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.connection().execute(
            "INSERT INTO extensions (extension, group_id) VALUES (?1, 0)",
            params![extension],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn insert_file(&self, dir_id: DirId, file_name: &str, ext_id: Option<i64>) -> Result<FileId> {
        self.connection().execute(
            "INSERT INTO files (dir_id, file_name, ext_id) VALUES (?1, ?2, ?3)",
            params![dir_id, file_name, ext_id],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        self.connection()
            .query_row(
                "SELECT id, dir_id, ext_id, file_name FROM files WHERE id = ?1",
                params![id],
                map_file,
            )
            .optional()
    }

    /// Files owned by a directory.
    pub fn files_in_dir(&self, dir_id: DirId) -> Result<Vec<FileRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, dir_id, ext_id, file_name FROM files \
             WHERE dir_id = ?1 ORDER BY file_name",
        )?;
        let files = stmt
            .query_map(params![dir_id], map_file)?
            .collect::<Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Files listed under a virtual directory through `virtual_files`.
    pub fn files_in_virtual_dir(&self, dir_id: DirId) -> Result<Vec<FileRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT f.id, f.dir_id, f.ext_id, f.file_name FROM files f \
             JOIN virtual_files v ON v.file_id = f.id \
             WHERE v.dir_id = ?1 ORDER BY f.file_name",
        )?;
        let files = stmt
            .query_map(params![dir_id], map_file)?
            .collect::<Result<Vec<_>>>()?;
        Ok(files)
    }

    pub fn set_file_dir(&self, file_id: FileId, dir_id: DirId) -> Result<usize> {
        self.connection().execute(
            "UPDATE files SET dir_id = ?1 WHERE id = ?2",
            params![dir_id, file_id],
        )
    }

    pub fn file_alias_exists(&self, dir_id: DirId, file_id: FileId) -> Result<bool> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM virtual_files WHERE dir_id = ?1 AND file_id = ?2",
            params![dir_id, file_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_file_alias(&self, dir_id: DirId, file_id: FileId) -> Result<()> {
        self.connection().execute(
            "INSERT INTO virtual_files (dir_id, file_id) VALUES (?1, ?2)",
            params![dir_id, file_id],
        )?;
        Ok(())
    }

    pub fn move_file_alias(&self, from_dir: DirId, to_dir: DirId, file_id: FileId) -> Result<usize> {
        self.connection().execute(
            "UPDATE virtual_files SET dir_id = ?1 WHERE dir_id = ?2 AND file_id = ?3",
            params![to_dir, from_dir, file_id],
        )
    }

    pub fn delete_file_alias(&self, dir_id: DirId, file_id: FileId) -> Result<usize> {
        self.connection().execute(
            "DELETE FROM virtual_files WHERE dir_id = ?1 AND file_id = ?2",
            params![dir_id, file_id],
        )
    }

    /// Removes a file from the catalogue; every virtual listing of it goes
    /// with it.
    pub fn delete_file(&self, file_id: FileId) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM files WHERE id = ?1", params![file_id])
    }

    // ── Extensions ───────────────────────────────────────────────

    /// Every known extension with its group and how many files carry it.
    pub fn list_extensions(&self) -> Result<Vec<Extension>> {
        let mut stmt = self.connection().prepare(
            "SELECT e.id, e.extension, e.group_id, g.name, \
                    (SELECT COUNT(*) FROM files f WHERE f.ext_id = e.id) \
             FROM extensions e LEFT JOIN ext_groups g ON g.id = e.group_id \
             ORDER BY g.name, e.extension",
        )?;
        let extensions = stmt
            .query_map([], |row| {
                Ok(Extension {
                    id: row.get(0)?,
                    extension: row.get(1)?,
                    group_id: row.get(2)?,
                    group_name: row.get(3)?,
                    file_count: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(extensions)
    }

    /// Drops extensions no file carries, then groups left without members.
    pub fn remove_unused_extensions(&self) -> Result<usize> {
        let removed = self.connection().execute(
            "DELETE FROM extensions \
             WHERE NOT EXISTS (SELECT 1 FROM files f WHERE f.ext_id = extensions.id)",
            [],
        )?;
        self.remove_unused_extension_groups()?;
        debug!("Removed {} unused extensions", removed);
        Ok(removed)
    }

    /// Deletes every file with the extension, then the extension itself.
    /// Returns the number of files removed.
    pub fn delete_files_by_extension(&self, ext_id: i64) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let files = self
            .connection()
            .execute("DELETE FROM files WHERE ext_id = ?1", params![ext_id])?;
        self.connection()
            .execute("DELETE FROM extensions WHERE id = ?1", params![ext_id])?;
        self.remove_unused_extension_groups()?;
        tx.commit()?;
        Ok(files)
    }

    /// Creates a group and moves the given extensions into it. Groups
    /// emptied by the move are dropped.
    pub fn create_extension_group(&self, name: &str, ext_ids: &[i64]) -> Result<i64> {
        let tx = self.connection().unchecked_transaction()?;
        self.connection()
            .execute("INSERT INTO ext_groups (name) VALUES (?1)", params![name])?;
        let group_id = self.connection().last_insert_rowid();
        for ext_id in ext_ids {
            self.connection().execute(
                "UPDATE extensions SET group_id = ?1 WHERE id = ?2",
                params![group_id, ext_id],
            )?;
        }
        self.remove_unused_extension_groups()?;
        tx.commit()?;
        Ok(group_id)
    }

    fn remove_unused_extension_groups(&self) -> Result<usize> {
        self.connection().execute(
            "DELETE FROM ext_groups \
             WHERE NOT EXISTS (SELECT 1 FROM extensions e WHERE e.group_id = ext_groups.id)",
            [],
        )
    }

    // ── Scan sessions ────────────────────────────────────────────

    pub fn create_scan_session(&self, root_path: &str, extension_filter: &[String]) -> Result<i64> {
        let filter_json = serde_json::to_string(extension_filter)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO scan_session (root_path, extension_filter, started_at, status) \
             VALUES (?1, ?2, ?3, 'running')",
            params![root_path, filter_json, now],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn finish_scan_session(
        &self,
        session_id: i64,
        status: &str,
        files_added: i64,
        dirs_touched: i64,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "UPDATE scan_session SET completed_at = ?1, status = ?2, \
             files_added = ?3, dirs_touched = ?4 WHERE id = ?5",
            params![now, status, files_added, dirs_touched, session_id],
        )?;
        Ok(())
    }

    /// Sessions newest-first, with the total session count.
    pub fn list_sessions(&self, offset: i64, limit: i64) -> Result<(Vec<ScanSession>, i64)> {
        let total: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM scan_session", [], |row| row.get(0))?;

        let mut stmt = self.connection().prepare(
            "SELECT id, root_path, extension_filter, started_at, completed_at, status, \
                    files_added, dirs_touched \
             FROM scan_session ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let sessions = stmt
            .query_map(params![limit, offset], |row| {
                Ok(ScanSession {
                    id: row.get(0)?,
                    root_path: row.get(1)?,
                    extension_filter: row.get(2)?,
                    started_at: row.get(3)?,
                    completed_at: row.get(4)?,
                    status: row.get(5)?,
                    files_added: row.get(6)?,
                    dirs_touched: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok((sessions, total))
    }
}

fn map_dir(row: &rusqlite::Row<'_>) -> Result<Directory> {
    Ok(Directory {
        id: row.get(0)?,
        path: row.get(1)?,
        parent_id: row.get(2)?,
        kind: row.get(3)?,
    })
}

fn map_file(row: &rusqlite::Row<'_>) -> Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        dir_id: row.get(1)?,
        ext_id: row.get(2)?,
        file_name: row.get(3)?,
    })
}
