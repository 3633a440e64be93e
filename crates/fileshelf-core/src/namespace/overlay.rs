//! Rules deciding how an edit on a tree occurrence is carried out in the
//! store. Pure functions over [`DirKind`] and [`Occurrence`]; the tree
//! executes the plans.

use crate::error::{Error, Result};
use crate::storage::models::{DirId, DirKind};

/// How an occurrence is reached from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occurrence {
    /// Through the directory's own `parent_id`.
    Primary,
    /// Through a `virtual_dirs` row.
    Alias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePlan {
    /// Drop one `(parent, dir)` alias edge, nothing else.
    RemoveAlias,
    /// Delete a real directory; descendants, files and aliases cascade.
    CascadeReal,
    /// Delete a virtual or group folder itself: real and group children are
    /// lifted to its parent, every alias and occurrence of it goes away.
    RemoveOriginal,
}

pub fn plan_delete(kind: DirKind, occurrence: Occurrence) -> Result<DeletePlan> {
    match (occurrence, kind) {
        (Occurrence::Alias, _) => Ok(DeletePlan::RemoveAlias),
        (Occurrence::Primary, DirKind::Favorites) => {
            Err(Error::Conflict("Favorites cannot be deleted".to_string()))
        }
        (Occurrence::Primary, DirKind::Real) => Ok(DeletePlan::CascadeReal),
        (Occurrence::Primary, DirKind::Virtual | DirKind::Group) => Ok(DeletePlan::RemoveOriginal),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    /// Rewrite `dirs.parent_id`.
    Reparent,
    /// Replace the `(old_parent, dir)` alias with `(new_parent, dir)`.
    ReAlias,
}

pub fn plan_move(kind: DirKind, occurrence: Occurrence) -> Result<MovePlan> {
    match (occurrence, kind) {
        (Occurrence::Alias, _) => Ok(MovePlan::ReAlias),
        (Occurrence::Primary, DirKind::Favorites) => {
            Err(Error::Conflict("Favorites cannot be moved".to_string()))
        }
        (Occurrence::Primary, DirKind::Real | DirKind::Virtual | DirKind::Group) => {
            Ok(MovePlan::Reparent)
        }
    }
}

/// Only user folders carry a free label; real paths mirror the filesystem.
pub fn check_rename(kind: DirKind) -> Result<()> {
    match kind {
        DirKind::Virtual | DirKind::Group => Ok(()),
        DirKind::Favorites => Err(Error::Conflict("Favorites cannot be renamed".to_string())),
        DirKind::Real => Err(Error::Conflict(
            "real directories are named by the filesystem".to_string(),
        )),
    }
}

/// Grouping rewrites `parent_id`, so only primary occurrences qualify.
pub fn check_groupable(kind: DirKind, occurrence: Occurrence) -> Result<()> {
    match (occurrence, kind) {
        (Occurrence::Alias, _) => Err(Error::Conflict(
            "an alias occurrence cannot be grouped".to_string(),
        )),
        (Occurrence::Primary, DirKind::Favorites) => {
            Err(Error::Conflict("Favorites cannot be grouped".to_string()))
        }
        (Occurrence::Primary, DirKind::Real | DirKind::Virtual | DirKind::Group) => Ok(()),
    }
}

/// Drag semantics chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDrop {
    Copy,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePlan {
    /// Add a `virtual_files` row.
    InsertAlias,
    /// Re-point the `virtual_files` row from the source folder.
    MoveAlias { from: DirId },
    /// Rewrite `files.dir_id`.
    ChangeOwner,
    /// Insert a new owned `files` row in the target.
    CopyOwned,
}

/// `source_virtual` is the virtual folder the file was dragged out of, if
/// any.
pub fn plan_file_drop(
    target: DirKind,
    action: FileDrop,
    source_virtual: Option<DirId>,
) -> Result<FilePlan> {
    match target {
        DirKind::Favorites | DirKind::Virtual => match (action, source_virtual) {
            (FileDrop::Copy, _) | (FileDrop::Move, None) => Ok(FilePlan::InsertAlias),
            (FileDrop::Move, Some(from)) => Ok(FilePlan::MoveAlias { from }),
        },
        DirKind::Real => match action {
            FileDrop::Move => Ok(FilePlan::ChangeOwner),
            FileDrop::Copy => Ok(FilePlan::CopyOwned),
        },
        DirKind::Group => Err(Error::Conflict(
            "group folders cannot hold files".to_string(),
        )),
    }
}
