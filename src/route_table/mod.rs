//! Route enumeration for gorilla/mux services.
//!
//! A route table yields one [`RouteEntry`] per registered route, in registration order.
//! Each entry carries the path template and methods as registered plus a reference to
//! the handler symbol, which the [`locator`](crate::locator) later maps back to source.
//!
//! # Implementations
//!
//! - **Manifest**: routes listed explicitly in a YAML or JSON file, see
//!   [`manifest::ManifestRouteTable`]
//! - **Mux source scan**: registrations found in the project's own source, see
//!   [`mux::MuxSourceRouteTable`]
//!
//! # Example
//!
//! ```no_run
//! use swagger_from_source::parser::SourceCache;
//! use swagger_from_source::route_table::{RouteTable, manifest::ManifestRouteTable};
//! use std::path::PathBuf;
//!
//! let table = ManifestRouteTable::new(PathBuf::from("routes.yaml"));
//! let mut cache = SourceCache::new();
//! let routes = table.walk(&mut cache).unwrap();
//! println!("Found {} routes", routes.len());
//! ```

pub mod manifest;
pub mod mux;

use crate::error::Result;
use crate::parser::SourceCache;
use std::path::PathBuf;

/// Source of route registrations.
pub trait RouteTable {
    /// Enumerates every registered route in registration order.
    ///
    /// # Errors
    ///
    /// A failure here aborts the whole generation step.
    fn walk(&self, cache: &mut SourceCache) -> Result<Vec<RouteEntry>>;
}

/// One registered route as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Path template, e.g. `/stories/{storyId}`; `None` for prefix-only routes
    pub path: Option<String>,
    /// Registered HTTP methods; `None` when the route matches every method
    pub methods: Option<Vec<String>>,
    pub handler: HandlerRef,
}

impl RouteEntry {
    pub fn new(path: Option<String>, methods: Option<Vec<String>>, handler: HandlerRef) -> Self {
        Self {
            path,
            methods,
            handler,
        }
    }
}

/// What serves a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerRef {
    /// A plain `func(http.ResponseWriter, *http.Request)`
    Func(SymbolRef),
    /// A go-kit transport server: the request decoder reads the request, the
    /// endpoint names the operation
    Kit {
        decoder: SymbolRef,
        endpoint: SymbolRef,
    },
}

/// Reference to a Go function by its qualified symbol.
///
/// Symbols look like `github.com/acme/stories/handlers.GetStory`. Method values may
/// carry a receiver, as in `github.com/acme/stories/handlers.(*Server).GetStory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRef {
    pub symbol: String,
    /// Source file holding the definition, when the registration already knows it
    pub file: Option<PathBuf>,
}

impl SymbolRef {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }

    /// Splits the symbol into its package import path, receiver type and function name.
    ///
    /// The package ends at the first `.` after the last `/`. The receiver is returned
    /// without its `(*...)` decoration, and the `-fm` suffix Go attaches to method values
    /// is dropped.
    pub fn split(&self) -> (&str, Option<&str>, &str) {
        let symbol = self.symbol.as_str();
        let last_slash = symbol.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (package, rest) = match symbol[last_slash..].find('.') {
            Some(dot) => (&symbol[..last_slash + dot], &symbol[last_slash + dot + 1..]),
            None => ("", symbol),
        };
        let (receiver, name) = match rest.rsplit_once('.') {
            Some((receiver, name)) => {
                let receiver = receiver.trim_start_matches('(').trim_end_matches(')');
                let receiver = receiver.trim_start_matches('*');
                (Some(receiver).filter(|r| !r.is_empty()), name)
            }
            None => (None, rest),
        };
        (package, receiver, name.trim_end_matches("-fm"))
    }

    /// Method value `(*T).name` in package `package`.
    pub fn method(package: &str, receiver: &str, name: &str) -> Self {
        Self::new(format!("{}.(*{}).{}", package, receiver, name))
    }
}
