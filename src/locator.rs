//! Handler location: mapping a handler symbol back to the line that defines it.

use crate::error::{Error, Result};
use crate::packages::PackageLocator;
use crate::parser::SourceCache;
use crate::route_table::SymbolRef;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::rc::Rc;

static FUNC_DEF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^func\s+(?:\((?P<recv>[^)]*)\)\s*)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*[\[(]")
        .unwrap()
});

/// Where a handler is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolLocation {
    /// Qualified symbol, e.g. `github.com/acme/stories/handlers.GetStory`
    pub relative_path: String,
    /// Absolute path of the defining file
    pub full_path: PathBuf,
    /// 1-based line of the `func` declaration
    pub line_number: usize,
}

impl SymbolLocation {
    /// Import path of the package the symbol belongs to.
    pub fn package_path(&self) -> &str {
        let last_slash = self.relative_path.rfind('/').map(|i| i + 1).unwrap_or(0);
        match self.relative_path[last_slash..].find('.') {
            Some(dot) => &self.relative_path[..last_slash + dot],
            None => "",
        }
    }
}

/// Maps handler symbols to source locations.
pub trait HandlerLocator {
    /// # Errors
    ///
    /// Returns `Error::Locator` when no definition can be found, or `Error::SourceIo`
    /// when an explicitly named file cannot be read. Either way only this route is lost.
    fn locate(&self, symbol: &SymbolRef, cache: &mut SourceCache) -> Result<SymbolLocation>;
}

/// Finds the declaration line of function `name` in stripped source lines.
///
/// With a `receiver`, only methods on that type match, through either a pointer or a
/// value receiver (`func (s *Server) Name(`, `func (s Server) Name(`). Without one,
/// plain functions and methods both match. Returns the 0-based line index.
pub fn find_function(lines: &[String], receiver: Option<&str>, name: &str) -> Option<usize> {
    lines.iter().position(|line| {
        let Some(caps) = FUNC_DEF_REGEX.captures(line) else {
            return false;
        };
        if &caps["name"] != name {
            return false;
        }
        match receiver {
            Some(receiver) => caps
                .name("recv")
                .and_then(|recv| receiver_type(recv.as_str()))
                .map(|found| found == receiver)
                .unwrap_or(false),
            None => true,
        }
    })
}

/// Name declared by a `func` line, if the line declares one.
pub fn function_name(line: &str) -> Option<&str> {
    FUNC_DEF_REGEX
        .captures(line)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str())
}

/// Type of a receiver clause such as `s *Server` or `c Cache[K, V]`.
fn receiver_type(receiver: &str) -> Option<&str> {
    let receiver = receiver.split('[').next().unwrap_or(receiver);
    let declared = receiver.split_whitespace().last()?.trim_start_matches('*');
    (!declared.is_empty()).then_some(declared)
}

/// Locator searching the package sources for the function declaration.
pub struct SourceLocator {
    packages: Rc<dyn PackageLocator>,
}

impl SourceLocator {
    pub fn new(packages: Rc<dyn PackageLocator>) -> Self {
        Self { packages }
    }

    fn not_found(symbol: &SymbolRef, message: impl Into<String>) -> Error {
        Error::Locator {
            symbol: symbol.symbol.clone(),
            message: message.into(),
        }
    }
}

impl HandlerLocator for SourceLocator {
    fn locate(&self, symbol: &SymbolRef, cache: &mut SourceCache) -> Result<SymbolLocation> {
        let (package, receiver, name) = symbol.split();
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "handler symbol without a function name: {:?}",
                symbol.symbol
            )));
        }
        debug!("Locating {} (package {:?}, receiver {:?})", name, package, receiver);

        let candidates = match &symbol.file {
            Some(file) => vec![file.clone()],
            None => self
                .packages
                .source_files(package)
                .map_err(|e| Self::not_found(symbol, e.to_string()))?,
        };

        for file in &candidates {
            let parsed = match cache.load(file) {
                Ok(parsed) => parsed,
                Err(err) if symbol.file.is_some() => return Err(err),
                Err(err) => {
                    warn!("Skipping {} while locating {}: {}", file.display(), name, err);
                    continue;
                }
            };

            if let Some(index) = find_function(&parsed.lines, receiver, name) {
                debug!("Found {} at {}:{}", name, parsed.path.display(), index + 1);
                return Ok(SymbolLocation {
                    relative_path: symbol.symbol.clone(),
                    full_path: parsed.path.clone(),
                    line_number: index + 1,
                });
            }
        }

        Err(Self::not_found(
            symbol,
            format!("no declaration of {} in {} files", name, candidates.len()),
        ))
    }
}
