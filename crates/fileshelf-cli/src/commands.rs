use clap::{Parser, Subcommand};
use fileshelf_core::{DirId, FileId};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fileshelf")]
#[command(about = "Catalogue document folders and arrange them into virtual shelves", long_about = None)]
pub struct Cli {
    /// Database file, overriding the configured one
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Directories are addressed by id as printed by `tree`; `0` is the root.
/// An aliased directory is picked by the directory it is shown under with
/// `--under`, otherwise its primary occurrence is used.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan directories into the catalogue (configured roots by default)
    Scan {
        paths: Vec<PathBuf>,
        /// Comma separated extensions, `*` for any, empty for extensionless files only
        #[arg(long)]
        ext: Option<String>,
    },
    /// Print the folder tree
    Tree,
    /// List the files shown under a directory
    Files {
        dir: DirId,
        #[arg(long)]
        under: Option<DirId>,
    },
    /// Create a virtual folder
    Mkdir { parent: DirId, label: String },
    /// Rename a virtual or group folder
    Rename { dir: DirId, label: String },
    /// Move a directory occurrence under another directory
    Move {
        dir: DirId,
        to: DirId,
        #[arg(long)]
        under: Option<DirId>,
    },
    /// Also show a directory under another directory
    Copy { dir: DirId, to: DirId },
    /// Put directories into a new group folder
    Group {
        parent: DirId,
        label: String,
        #[arg(required = true)]
        dirs: Vec<DirId>,
    },
    /// Delete a directory occurrence
    Delete {
        dir: DirId,
        #[arg(long)]
        under: Option<DirId>,
    },
    /// Drop files on a directory
    Drop {
        target: DirId,
        #[arg(required = true)]
        files: Vec<FileId>,
        /// Virtual folder the files are listed in
        #[arg(long)]
        from: Option<DirId>,
        /// Move instead of copy
        #[arg(long = "move")]
        move_files: bool,
    },
    /// Remove a file from a virtual folder
    Unlist { dir: DirId, file: FileId },
    /// Delete files from the catalogue, or only from the virtual folder given with `--from`
    Rm {
        #[arg(required = true)]
        files: Vec<FileId>,
        #[arg(long)]
        from: Option<DirId>,
    },
    /// Delete real directories that hold nothing
    RemoveEmpty,
    /// List known extensions with their groups
    Extensions,
    /// Delete extensions no file carries
    RemoveUnusedExt,
    /// Delete every file with an extension, then the extension
    DeleteExt { ext: i64 },
    /// Put extensions into a new group
    GroupExt {
        name: String,
        #[arg(required = true)]
        exts: Vec<i64>,
    },
    /// Show recent scans
    Sessions {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
