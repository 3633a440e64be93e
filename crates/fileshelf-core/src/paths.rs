//! Lexical path handling for directory rows.
//!
//! Paths are compared as exact strings after lexical normalization: `.`
//! components and trailing separators are dropped, `..` is rejected and no
//! case folding is applied. Nothing here touches the filesystem.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR};

/// Normalize an absolute path into the string form stored in `dirs.path`.
pub fn normalize(path: &Path) -> Result<String> {
    if !path.is_absolute() {
        return Err(Error::InvalidPath(format!(
            "{} is not absolute",
            path.display()
        )));
    }

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::InvalidPath(format!(
                    "{} contains a parent component",
                    path.display()
                )))
            }
        }
    }

    Ok(out.to_string_lossy().into_owned())
}

/// The path itself followed by every ancestor, nearest first.
pub fn self_and_ancestors(path: &str) -> impl Iterator<Item = &str> {
    Path::new(path).ancestors().filter_map(|p| p.to_str()).filter(|p| !p.is_empty())
}

/// Prefix every strict descendant of `path` starts with.
pub fn descendant_prefix(path: &str) -> String {
    if path.ends_with(MAIN_SEPARATOR_STR) {
        path.to_string()
    } else {
        format!("{}{}", path, MAIN_SEPARATOR_STR)
    }
}

/// Display label of a real directory: its last component, or the whole path
/// for a filesystem root.
pub fn label_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
