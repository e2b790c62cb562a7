use anyhow::Result;
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// File scanner for traversing Go project directories.
///
/// The `FileScanner` recursively walks through a project directory to find all Go source
/// files. It automatically skips directories the Go toolchain itself ignores or that never
/// hold service code: `vendor`, `testdata`, and hidden directories (those starting with `.`).
/// Test files (`_test.go`) are never collected.
///
/// # Example
///
/// ```no_run
/// use swagger_from_source::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-service"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Go files", result.go_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
///
/// Contains the list of discovered Go files and any warnings encountered during scanning.
pub struct ScanResult {
    /// List of paths to all discovered `.go` files, sorted
    pub go_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all non-test `.go` files.
    ///
    /// If any directories or files cannot be accessed, warnings are logged and added to
    /// the result, but scanning continues. The file list is sorted so that every
    /// consumer sees the same registration order across runs.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut go_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }

                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_ignored_dir =
                    e.file_type().is_dir() && (file_name == "vendor" || file_name == "testdata");

                !is_hidden && !is_ignored_dir
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_go_source(path) {
                        go_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        go_files.sort();

        Ok(ScanResult { go_files, warnings })
    }
}

/// Whether a path names a Go source file that is not a test file.
pub fn is_go_source(path: &std::path::Path) -> bool {
    let is_go = path.extension().and_then(|s| s.to_str()) == Some("go");
    let is_test = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.ends_with("_test.go"))
        .unwrap_or(false);
    is_go && !is_test
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_normal_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("main.go"), "package main").unwrap();
        fs::write(root.join("routes.go"), "package main").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.go_files.len(), 2);
        assert!(result.warnings.is_empty());

        let file_names: Vec<String> = result
            .go_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(file_names, vec!["main.go".to_string(), "routes.go".to_string()]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let scanner = FileScanner::new(temp_dir.path().to_path_buf());
        let result = scanner.scan().unwrap();

        assert!(result.go_files.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("handlers")).unwrap();
        fs::create_dir_all(root.join("model/transport")).unwrap();

        fs::write(root.join("main.go"), "package main").unwrap();
        fs::write(root.join("handlers/users.go"), "package handlers").unwrap();
        fs::write(root.join("model/transport/user.go"), "package transport").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.go_files.len(), 3);
    }

    #[test]
    fn test_scan_skips_vendor_and_testdata() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("vendor/github.com/gorilla/mux")).unwrap();
        fs::create_dir_all(root.join("testdata")).unwrap();
        fs::write(root.join("vendor/github.com/gorilla/mux/mux.go"), "package mux").unwrap();
        fs::write(root.join("testdata/sample.go"), "package sample").unwrap();
        fs::write(root.join("main.go"), "package main").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.go_files.len(), 1);
        assert_eq!(
            result.go_files[0].file_name().unwrap().to_string_lossy(),
            "main.go"
        );
    }

    #[test]
    fn test_scan_skips_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/hooks.go"), "package hooks").unwrap();
        fs::write(root.join("main.go"), "package main").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.go_files.len(), 1);
    }

    #[test]
    fn test_scan_filters_test_and_non_go_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("main.go"), "package main").unwrap();
        fs::write(root.join("main_test.go"), "package main").unwrap();
        fs::write(root.join("go.mod"), "module example.com/svc").unwrap();
        fs::write(root.join("script.sh"), "#!/bin/bash").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.go_files.len(), 1);
        assert_eq!(
            result.go_files[0].file_name().unwrap().to_string_lossy(),
            "main.go"
        );
    }
}
