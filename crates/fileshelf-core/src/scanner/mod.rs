pub mod filter;
pub mod walk;

pub use filter::ExtensionFilter;
pub use walk::walk_files;
