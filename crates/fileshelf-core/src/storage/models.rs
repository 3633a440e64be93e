use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

pub type DirId = i64;
pub type FileId = i64;

/// Id of the root sentinel row, parent of every top-level directory.
pub const ROOT_DIR_ID: DirId = 0;

/// How a directory row relates to the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirKind {
    /// Mirrors a filesystem directory; `path` is absolute and unique.
    Real,
    /// The singleton virtual root created with the store.
    Favorites,
    /// User folder with no filesystem backing, may be aliased anywhere.
    Virtual,
    /// User folder that destructively regroups real directories.
    Group,
}

impl DirKind {
    pub fn code(self) -> i64 {
        match self {
            DirKind::Real => 0,
            DirKind::Favorites => 1,
            DirKind::Virtual => 2,
            DirKind::Group => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(DirKind::Real),
            1 => Some(DirKind::Favorites),
            2 => Some(DirKind::Virtual),
            3 => Some(DirKind::Group),
            _ => None,
        }
    }

    /// Whether files dropped here become aliases rather than owned files.
    pub fn is_virtual(self) -> bool {
        matches!(self, DirKind::Favorites | DirKind::Virtual)
    }
}

impl ToSql for DirKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for DirKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        DirKind::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

/// A row of `dirs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub id: DirId,
    pub path: String,
    pub parent_id: DirId,
    pub kind: DirKind,
}

/// An overlay edge: `dir_id` also shows up under `parent_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAlias {
    pub parent_id: DirId,
    pub dir_id: DirId,
}

/// A row of `files`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub dir_id: DirId,
    pub ext_id: Option<i64>,
    pub file_name: String,
}

/// A known extension. `group_id` 0 means ungrouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub id: i64,
    pub extension: String,
    pub group_id: i64,
    pub group_name: Option<String>,
    pub file_count: i64,
}

/// One row of the flat dump the namespace tree is rebuilt from. Primary rows
/// come from `dirs.parent_id`, alias rows from `virtual_dirs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub dir_id: DirId,
    pub parent_id: DirId,
    pub kind: DirKind,
    pub path: String,
    pub via_alias: bool,
}

/// Bookkeeping for one scan request.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: i64,
    pub root_path: String,
    pub extension_filter: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub files_added: i64,
    pub dirs_touched: i64,
}
