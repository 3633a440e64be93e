use std::collections::BTreeSet;
use std::path::Path;

/// Which files a scan catalogues, by extension.
///
/// `*` anywhere in the list selects every file. Otherwise the listed
/// extensions are matched case-insensitively; an empty list selects only
/// files without an extension, and an empty entry adds them to a non-empty
/// list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionFilter {
    Any,
    Only(BTreeSet<String>),
}

impl ExtensionFilter {
    pub fn from_list<S: AsRef<str>>(items: &[S]) -> Self {
        let mut set = BTreeSet::new();
        for item in items {
            let ext = item.as_ref().trim().trim_start_matches('.');
            if ext == "*" {
                return ExtensionFilter::Any;
            }
            set.insert(ext.to_lowercase());
        }
        ExtensionFilter::Only(set)
    }

    /// Parses the comma separated form typed by users, e.g. `"pdf, djvu"`.
    pub fn parse(spec: &str) -> Self {
        let items: Vec<&str> = if spec.trim().is_empty() {
            Vec::new()
        } else {
            spec.split(',').collect()
        };
        Self::from_list(&items)
    }

    pub fn matches(&self, path: &Path) -> bool {
        match self {
            ExtensionFilter::Any => true,
            ExtensionFilter::Only(set) => match extension_of(path) {
                Some(ext) => set.contains(&ext),
                None => set.is_empty() || set.contains(""),
            },
        }
    }

    /// List form stored alongside a scan session.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            ExtensionFilter::Any => vec!["*".to_string()],
            ExtensionFilter::Only(set) => set.iter().cloned().collect(),
        }
    }
}

/// Lower-cased extension, `None` for `README` or `.profile`.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_selects_everything() {
        let filter = ExtensionFilter::parse("pdf, *");
        assert_eq!(filter, ExtensionFilter::Any);
        assert!(filter.matches(Path::new("/x/notes")));
        assert!(filter.matches(Path::new("/x/book.djvu")));
    }

    #[test]
    fn test_empty_filter_selects_extensionless_only() {
        let filter = ExtensionFilter::parse("");
        assert!(filter.matches(Path::new("/x/README")));
        assert!(filter.matches(Path::new("/x/.gitignore")));
        assert!(!filter.matches(Path::new("/x/book.pdf")));
    }

    #[test]
    fn test_listed_extensions_ignore_case_and_dots() {
        let filter = ExtensionFilter::parse(".PDF, ui");
        assert!(filter.matches(Path::new("/x/Book.pdf")));
        assert!(filter.matches(Path::new("/x/form.UI")));
        assert!(!filter.matches(Path::new("/x/README")));
        assert!(!filter.matches(Path::new("/x/a.py")));
    }

    #[test]
    fn test_blank_entry_adds_extensionless() {
        let filter = ExtensionFilter::from_list(&["pdf", ""]);
        assert!(filter.matches(Path::new("/x/README")));
        assert!(filter.matches(Path::new("/x/a.pdf")));
    }
}
