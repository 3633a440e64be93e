//! The user-facing tree: real directories, virtual folders and groups, with
//! aliased directories shown once per alias.

pub mod overlay;
mod tree;

pub use overlay::{FileDrop, Occurrence};
pub use tree::{FileRef, NamespaceTree, NodeId, TreeNode};
