mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use fileshelf_core::config::{load_configuration, non_overlapping_directories};
use fileshelf_core::storage::models::ROOT_DIR_ID;
use fileshelf_core::{
    AppConfig, Database, DirId, ExtensionFilter, FileDrop, FileRef, Ingestor, NamespaceTree,
    NodeId, ScanWorker,
};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    if let Some(db) = args.db {
        config.database_path = db;
    }

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return Ok(());
    };

    if let Err(err) = run(command, &config) {
        error!("Error: {:#}", err);
        process::exit(1);
    }
    Ok(())
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Scan { paths, ext } => run_scan(config, paths, ext),
        Commands::Tree => with_tree(config, |_, tree| {
            print!("{}", tree.render());
            Ok(())
        }),
        Commands::Files { dir, under } => with_tree(config, |db, tree| {
            let node = locate(tree, dir, under)?;
            for file in tree.files(db, node)? {
                println!("{:>8}  {}", file.id, file.file_name);
            }
            Ok(())
        }),
        Commands::Mkdir { parent, label } => with_tree(config, |db, tree| {
            let node = locate(tree, parent, None)?;
            let id = tree.create_virtual_folder(db, node, &label)?;
            println!("Created folder {}", id.to_string().green());
            Ok(())
        }),
        Commands::Rename { dir, label } => with_tree(config, |db, tree| {
            let node = locate(tree, dir, None)?;
            tree.rename(db, node, &label)?;
            Ok(())
        }),
        Commands::Move { dir, to, under } => with_tree(config, |db, tree| {
            let node = locate(tree, dir, under)?;
            let target = locate(tree, to, None)?;
            tree.move_node(db, node, target)?;
            Ok(())
        }),
        Commands::Copy { dir, to } => with_tree(config, |db, tree| {
            let node = locate(tree, dir, None)?;
            let target = locate(tree, to, None)?;
            tree.copy_node(db, node, target)?;
            Ok(())
        }),
        Commands::Group { parent, label, dirs } => with_tree(config, |db, tree| {
            let parent = locate(tree, parent, None)?;
            let selected = dirs
                .iter()
                .map(|&dir| locate(tree, dir, None))
                .collect::<Result<Vec<_>>>()?;
            let id = tree.group(db, parent, &selected, &label)?;
            println!("Created group {}", id.to_string().green());
            Ok(())
        }),
        Commands::Delete { dir, under } => with_tree(config, |db, tree| {
            let node = locate(tree, dir, under)?;
            tree.delete(db, node)?;
            Ok(())
        }),
        Commands::Drop {
            target,
            files,
            from,
            move_files,
        } => with_tree(config, |db, tree| {
            let node = locate(tree, target, None)?;
            let refs: Vec<FileRef> = files
                .iter()
                .map(|&file_id| FileRef {
                    file_id,
                    source_virtual: from,
                })
                .collect();
            let action = if move_files {
                FileDrop::Move
            } else {
                FileDrop::Copy
            };
            let changed = tree.drop_files(db, node, &refs, action)?;
            println!("{} files changed", changed);
            Ok(())
        }),
        Commands::Unlist { dir, file } => with_tree(config, |db, tree| {
            let node = locate(tree, dir, None)?;
            tree.remove_file_alias(db, node, file)?;
            Ok(())
        }),
        Commands::Rm { files, from } => with_tree(config, |db, tree| {
            let refs: Vec<FileRef> = files
                .iter()
                .map(|&file_id| FileRef {
                    file_id,
                    source_virtual: from,
                })
                .collect();
            let removed = tree.delete_files(db, &refs)?;
            println!("{} files removed", removed.to_string().cyan());
            Ok(())
        }),
        Commands::RemoveEmpty => {
            let removed = open_db(config)?.delete_empty_dirs()?;
            println!("Removed {} empty directories", removed.to_string().cyan());
            Ok(())
        }
        Commands::Extensions => print_extensions(&open_db(config)?),
        Commands::RemoveUnusedExt => {
            let removed = open_db(config)?.remove_unused_extensions()?;
            println!("Removed {} unused extensions", removed.to_string().cyan());
            Ok(())
        }
        Commands::DeleteExt { ext } => {
            if prompt_confirm(
                &format!("Delete every file with extension {} from the catalogue?", ext),
                Some(false),
            )? {
                let removed = open_db(config)?.delete_files_by_extension(ext)?;
                println!("Removed {} files", removed.to_string().cyan());
            }
            Ok(())
        }
        Commands::GroupExt { name, exts } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("group name must not be empty");
            }
            let id = open_db(config)?.create_extension_group(name, &exts)?;
            println!("Created extension group {}", id.to_string().green());
            Ok(())
        }
        Commands::Sessions { limit } => print_sessions(&open_db(config)?, limit),
        Commands::PrintConfig => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
        Commands::TruncateDb => {
            if prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the Database?",
                Some(false),
            )? {
                open_db(config)?.truncate_all()?;
                println!("All tables truncated");
            }
            Ok(())
        }
    }
}

fn open_db(config: &AppConfig) -> Result<Database> {
    Database::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))
}

fn with_tree<F>(config: &AppConfig, edit: F) -> Result<()>
where
    F: FnOnce(&Database, &mut NamespaceTree) -> Result<()>,
{
    let db = open_db(config)?;
    let mut tree = NamespaceTree::load(&db)?;
    edit(&db, &mut tree)
}

/// Resolves a directory id to a tree node: `0` is the root, `under` picks
/// the occurrence shown below that directory.
fn locate(tree: &NamespaceTree, dir: DirId, under: Option<DirId>) -> Result<NodeId> {
    if dir == ROOT_DIR_ID {
        return Ok(tree.root());
    }
    match under {
        Some(parent) => tree
            .find_occurrence(parent, dir)
            .ok_or_else(|| anyhow!("directory {} is not shown under {}", dir, parent)),
        None => tree
            .primary_occurrence(dir)
            .ok_or_else(|| anyhow!("no directory {}", dir)),
    }
}

fn run_scan(config: &AppConfig, paths: Vec<PathBuf>, ext: Option<String>) -> Result<()> {
    let roots: Vec<PathBuf> = if paths.is_empty() {
        non_overlapping_directories(config.scan_roots.clone())
            .into_iter()
            .map(PathBuf::from)
            .collect()
    } else {
        paths
    };
    if roots.is_empty() {
        warn!("Nothing to scan: pass a path or set scan_roots");
        return Ok(());
    }

    let filter = match ext {
        Some(spec) => ExtensionFilter::parse(&spec),
        None => ExtensionFilter::from_list(&config.extensions),
    };

    let store = open_db(config)?.into_shared();
    let worker = ScanWorker::spawn(
        store.clone(),
        Ingestor::from_config(config),
        Arc::new(CliReporter::new()),
    )?;
    for root in &roots {
        worker.submit(root.clone(), filter.clone())?;
    }

    let mut files_added = 0;
    let mut dirs_touched = 0;
    for _ in &roots {
        let report = worker.recv_report()?;
        match report.result {
            Ok(outcome) => {
                files_added += outcome.files_added;
                dirs_touched += outcome.touched.len();
            }
            Err(err) => error!("Scan of {} failed: {}", report.root.display(), err),
        }
    }
    worker.shutdown();

    let db = store.lock();
    let tree = NamespaceTree::load(&db)?;
    let summary = scan_summary(files_added, dirs_touched, tree.node_count());
    info!("{}", summary);
    println!("{} {}", "✓".green(), summary);
    Ok(())
}

/// Plain text: it goes to the log file as well as the terminal.
fn scan_summary(files_added: usize, dirs_touched: usize, folders: usize) -> String {
    format!(
        "{} new files in {} directories, {} folders shown",
        files_added, dirs_touched, folders
    )
}

fn print_sessions(db: &Database, limit: i64) -> Result<()> {
    let (sessions, total) = db.list_sessions(0, limit)?;
    println!("{} scans recorded", total);
    for session in sessions {
        let status = match session.status.as_str() {
            "completed" => session.status.as_str().green(),
            "running" => session.status.as_str().yellow(),
            other => other.red(),
        };
        println!(
            "{:>4}  {}  {:<9}  {:>6} files  {:>4} dirs  {}  {}",
            session.id,
            session.started_at,
            status,
            session.files_added,
            session.dirs_touched,
            session.root_path,
            session.extension_filter,
        );
    }
    Ok(())
}

fn print_extensions(db: &Database) -> Result<()> {
    for ext in db.list_extensions()? {
        let group = ext.group_name.as_deref().unwrap_or("-");
        println!(
            "{:>4}  {:<10}  {:<12}  {:>6} files",
            ext.id, ext.extension, group, ext.file_count
        );
    }
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_summary_has_no_escape_codes() {
        colored::control::set_override(true);
        let summary = scan_summary(3, 2, 7);
        colored::control::unset_override();

        assert_eq!(summary, "3 new files in 2 directories, 7 folders shown");
        assert!(!summary.contains('\x1b'));
    }
}
