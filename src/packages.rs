//! Package location: mapping Go import paths to source directories and back.
//!
//! Type resolution and handler lookup both need to answer "which files make up package
//! `github.com/acme/svc/model/transport`?". The answer depends on how the project lays out
//! its dependencies, so it sits behind the [`PackageLocator`] trait with one implementation
//! per layout convention:
//!
//! - [`GoModLocator`] - packages of the module declared in `go.mod` (plus its `vendor/` tree)
//! - [`GoPathLocator`] - classic `$GOPATH/src/<import path>` layout
//! - [`SourceRootLocator`] - import paths relative to an arbitrary source root
//!
//! [`ChainedLocator`] tries several locators in order.

use crate::error::{Error, Result};
use crate::scanner::is_go_source;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

static MODULE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).unwrap());

static IMPORT_SPEC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:import\s+)?(?:([A-Za-z_][A-Za-z0-9_]*|\.)\s+)?"([^"]+)"$"#).unwrap()
});

static VERSION_SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v\d+$").unwrap());

/// Resolves Go import paths to directories.
pub trait PackageLocator {
    /// Directory holding the package with this import path, if this locator knows it.
    fn package_dir(&self, import_path: &str) -> Option<PathBuf>;

    /// Import path of the package whose sources live in `dir`.
    fn import_path_for(&self, dir: &Path) -> Option<String>;

    /// Lists the package's non-test `.go` files in a stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if the package is unknown or its directory cannot be listed.
    fn source_files(&self, import_path: &str) -> Result<Vec<PathBuf>> {
        let dir = self.package_dir(import_path).ok_or_else(|| {
            Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("package not found: {}", import_path),
            ))
        })?;
        list_go_files(&dir)
    }
}

/// Lists the non-test Go files directly inside `dir`, sorted by name.
pub fn list_go_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_go_source(&path) {
            files.push(path);
        }
    }
    files.sort();
    debug!("Package directory {} holds {} files", dir.display(), files.len());
    Ok(files)
}

/// Joins a slash-separated relative path onto a base directory.
fn join_import_path(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(base.to_path_buf(), |acc, segment| acc.join(segment))
}

/// Renders a relative directory as a slash-separated import path suffix.
fn relative_import_path(base: &Path, dir: &Path) -> Option<String> {
    let relative = dir.strip_prefix(base).ok()?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    Some(segments.join("/"))
}

/// Reads the import specs of a stripped Go file into an alias to import path map.
///
/// Only the header is considered: reading stops at the first `func` declaration.
/// Unaliased imports are keyed by the package name implied by their path; blank and
/// dot imports are skipped.
pub fn file_imports(lines: &[String]) -> HashMap<String, String> {
    let mut imports = HashMap::new();
    let mut in_block = false;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with("func ") || trimmed.starts_with("func(") {
            break;
        }
        if trimmed.starts_with("import (") || trimmed == "import(" {
            in_block = true;
            continue;
        }
        if in_block && trimmed.starts_with(')') {
            in_block = false;
            continue;
        }
        if !in_block && !trimmed.starts_with("import ") {
            continue;
        }

        if let Some(caps) = IMPORT_SPEC_REGEX.captures(trimmed) {
            let path = caps[2].to_string();
            let alias = match caps.get(1).map(|m| m.as_str()) {
                Some("_") | Some(".") => continue,
                Some(alias) => alias.to_string(),
                None => default_package_name(&path),
            };
            imports.insert(alias, path);
        }
    }

    debug!("Extracted {} imports", imports.len());
    imports
}

/// Package name implied by an import path: its last segment, skipping a trailing
/// major-version segment (`/v2`) and a gopkg.in style `.vN` suffix.
pub fn default_package_name(import_path: &str) -> String {
    let mut segments = import_path.rsplit('/');
    let last = segments.next().unwrap_or(import_path);
    let name = if VERSION_SEGMENT_REGEX.is_match(last) {
        segments.next().unwrap_or(last)
    } else {
        last
    };
    match name.rfind(".v") {
        Some(dot) if VERSION_SEGMENT_REGEX.is_match(&name[dot + 1..]) => name[..dot].to_string(),
        _ => name.to_string(),
    }
}

/// Locator for the packages of a Go module.
#[derive(Debug, Clone)]
pub struct GoModLocator {
    module_path: String,
    root: PathBuf,
}

impl GoModLocator {
    pub fn new(module_path: String, root: PathBuf) -> Self {
        Self { module_path, root }
    }

    /// Finds the nearest `go.mod` at or above `start` and reads its module path.
    pub fn discover(start: &Path) -> Option<Self> {
        let start = fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
        for dir in start.ancestors() {
            let go_mod = dir.join("go.mod");
            if !go_mod.is_file() {
                continue;
            }
            let content = fs::read_to_string(&go_mod).ok()?;
            let module_path = Self::parse_module_path(&content)?;
            debug!("Found go.mod at {} (module {})", go_mod.display(), module_path);
            return Some(Self::new(module_path, dir.to_path_buf()));
        }
        None
    }

    /// Extracts the module path from `go.mod` content.
    pub fn parse_module_path(content: &str) -> Option<String> {
        MODULE_REGEX
            .captures(content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PackageLocator for GoModLocator {
    fn package_dir(&self, import_path: &str) -> Option<PathBuf> {
        let candidate = if import_path == self.module_path {
            Some(self.root.clone())
        } else {
            import_path
                .strip_prefix(&self.module_path)
                .filter(|rest| rest.starts_with('/'))
                .map(|rest| join_import_path(&self.root, rest))
        };

        candidate
            .filter(|dir| dir.is_dir())
            .or_else(|| {
                let vendored = join_import_path(&self.root.join("vendor"), import_path);
                vendored.is_dir().then_some(vendored)
            })
    }

    fn import_path_for(&self, dir: &Path) -> Option<String> {
        let dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let root = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let relative = relative_import_path(&root, &dir)?;
        if relative.is_empty() {
            Some(self.module_path.clone())
        } else if let Some(vendored) = relative.strip_prefix("vendor/") {
            Some(vendored.to_string())
        } else {
            Some(format!("{}/{}", self.module_path, relative))
        }
    }
}

/// Locator for the classic GOPATH workspace layout.
#[derive(Debug, Clone)]
pub struct GoPathLocator {
    gopaths: Vec<PathBuf>,
}

impl GoPathLocator {
    pub fn new(gopaths: Vec<PathBuf>) -> Self {
        Self { gopaths }
    }

    /// Reads `GOPATH`, falling back to `$HOME/go` like the Go toolchain does.
    pub fn from_env() -> Self {
        let gopaths = match std::env::var_os("GOPATH") {
            Some(value) if !value.is_empty() => std::env::split_paths(&value).collect(),
            _ => std::env::var_os("HOME")
                .map(|home| vec![PathBuf::from(home).join("go")])
                .unwrap_or_default(),
        };
        Self::new(gopaths)
    }
}

impl PackageLocator for GoPathLocator {
    fn package_dir(&self, import_path: &str) -> Option<PathBuf> {
        self.gopaths
            .iter()
            .map(|gopath| join_import_path(&gopath.join("src"), import_path))
            .find(|dir| dir.is_dir())
    }

    fn import_path_for(&self, dir: &Path) -> Option<String> {
        self.gopaths
            .iter()
            .find_map(|gopath| relative_import_path(&gopath.join("src"), dir))
            .filter(|path| !path.is_empty())
    }
}

/// Locator treating directories below a source root as import paths.
///
/// This covers projects checked out directly as `$GOPATH/src` trees and projects
/// without a `go.mod`, where imports are written relative to the source root.
#[derive(Debug, Clone)]
pub struct SourceRootLocator {
    root: PathBuf,
}

impl SourceRootLocator {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl PackageLocator for SourceRootLocator {
    fn package_dir(&self, import_path: &str) -> Option<PathBuf> {
        let dir = join_import_path(&self.root, import_path);
        dir.is_dir().then_some(dir)
    }

    fn import_path_for(&self, dir: &Path) -> Option<String> {
        relative_import_path(&self.root, dir).filter(|path| !path.is_empty())
    }
}

/// Tries each locator in order; the first answer wins.
#[derive(Default)]
pub struct ChainedLocator {
    locators: Vec<Box<dyn PackageLocator>>,
}

impl ChainedLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: impl PackageLocator + 'static) -> Self {
        self.locators.push(Box::new(locator));
        self
    }

    /// Default chain for a project: its go.mod module (when there is one), the source
    /// root itself, then GOPATH.
    pub fn for_project(root: &Path) -> Self {
        let mut chain = Self::new();
        if let Some(go_mod) = GoModLocator::discover(root) {
            chain = chain.with(go_mod);
        }
        chain
            .with(SourceRootLocator::new(root.to_path_buf()))
            .with(GoPathLocator::from_env())
    }
}

impl PackageLocator for ChainedLocator {
    fn package_dir(&self, import_path: &str) -> Option<PathBuf> {
        self.locators
            .iter()
            .find_map(|locator| locator.package_dir(import_path))
    }

    fn import_path_for(&self, dir: &Path) -> Option<String> {
        self.locators
            .iter()
            .find_map(|locator| locator.import_path_for(dir))
    }
}
