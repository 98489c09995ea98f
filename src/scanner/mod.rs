//! File scanner for discovering session log files.
//!
//! Explicit file arguments are always taken; directories are walked and
//! filtered by extension, skipping hidden entries.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include when walking directories (e.g., ["json", "jsonl"])
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["json".to_string(), "jsonl".to_string()],
        }
    }
}

impl From<&crate::config::IngestConfig> for ScanConfig {
    fn from(config: &crate::config::IngestConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
        }
    }
}

/// Scanned file information.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScannedFile {
    /// Path on disk
    pub path: PathBuf,
    /// Name shown in reports
    pub display: String,
}

/// File scanner for discovering session logs.
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    /// Create a new file scanner.
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Resolve the given paths into a sorted, de-duplicated file list.
    pub fn scan(&self, paths: &[PathBuf]) -> Result<Vec<ScannedFile>> {
        let mut files = BTreeSet::new();

        for path in paths {
            if path.is_dir() {
                self.walk_dir(path, &mut files)?;
            } else if path.is_file() {
                files.insert(ScannedFile {
                    path: path.clone(),
                    display: path.display().to_string(),
                });
            } else {
                warn!("Skipping {}: not a file or directory", path.display());
            }
        }

        Ok(files.into_iter().collect())
    }

    /// Check if a file has one of the configured extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    fn walk_dir(&self, root: &Path, files: &mut BTreeSet<ScannedFile>) -> Result<()> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let shown = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .display()
                .to_string();
            debug!("Found session file: {}", shown);

            files.insert(ScannedFile {
                path: entry.path().to_path_buf(),
                display: shown,
            });
        }

        Ok(())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_directory_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.JSONL"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.json"), "{}").unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache").join("d.json"), "{}").unwrap();

        let scanner = FileScanner::new(ScanConfig::default());
        let files = scanner.scan(&[dir.path().to_path_buf()]).unwrap();
        let mut names: Vec<_> = files.iter().map(|f| f.display.replace('\\', "/")).collect();
        names.sort();

        assert_eq!(names, vec!["a.JSONL", "b.json", "nested/c.json"]);
    }

    #[test]
    fn test_explicit_file_kept_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.txt");
        fs::write(&path, "{}").unwrap();

        let scanner = FileScanner::new(ScanConfig::default());
        let files = scanner.scan(&[path.clone(), path.clone()]).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, path);
    }

    #[test]
    fn test_scan_fixtures() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");

        let scanner = FileScanner::new(ScanConfig::default());
        let files = scanner.scan(&[fixtures]).unwrap();

        assert!(files.iter().any(|f| f.display.ends_with("knight_hunting.json")));
        assert!(files.iter().all(|f| scanner.matches(&f.path)));
    }
}
