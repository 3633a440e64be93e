use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with files that carry no extension (`README`, `.profile`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionlessPolicy {
    /// Insert the file with a NULL extension id.
    #[default]
    Store,
    /// Never catalogue extensionless files.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub scan_roots: Vec<String>,
    /// Extensions to catalogue. `*` means any, an empty list means
    /// extensionless files only.
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub extensionless: ExtensionlessPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "fileshelf.db".to_string(),
            scan_roots: Vec::new(),
            extensions: vec!["pdf".to_string(), "djvu".to_string(), "epub".to_string()],
            ignore_patterns: Vec::new(),
            extensionless: ExtensionlessPolicy::Store,
        }
    }
}

/// Reads `Config.toml` (optional) and `FILESHELF_*` environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("FILESHELF"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Drop roots nested inside another root so no subtree is walked twice.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(dirs.len());

    for dir in dirs {
        let candidate = Path::new(&dir);
        if kept.iter().any(|k| candidate.starts_with(k)) {
            continue;
        }
        kept.retain(|k| !Path::new(k).starts_with(candidate));
        kept.push(dir);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_overlapping_no_overlap() {
        let dirs = vec![
            "/home/user/books".to_string(),
            "/home/user/papers".to_string(),
            "/srv/library".to_string(),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = vec![
            "/home/user/books/physics".to_string(),
            "/home/user/books".to_string(),
            "/srv/library".to_string(),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&"/home/user/books".to_string()));
        assert!(!result.contains(&"/home/user/books/physics".to_string()));
    }

    #[test]
    fn test_sibling_with_common_prefix_is_kept() {
        // "/data/book" is not an ancestor of "/data/books"
        let dirs = vec!["/data/book".to_string(), "/data/books".to_string()];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_default_config_stores_extensionless() {
        let config = AppConfig::default();
        assert_eq!(config.extensionless, ExtensionlessPolicy::Store);
        assert_eq!(config.database_path, "fileshelf.db");
    }
}
