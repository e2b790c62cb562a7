//! Route table backed by an explicit manifest file.
//!
//! The manifest lists every route with its handler metadata, so no registration code has
//! to be scanned. YAML and JSON are both accepted; the format follows the file extension.
//!
//! ```yaml
//! routes:
//!   - path: /stories/{storyId}
//!     methods: [GET]
//!     handler: github.com/acme/stories/handlers.GetStory
//!   - path: /stories
//!     methods: [POST]
//!     handler:
//!       symbol: github.com/acme/stories/handlers.CreateStory
//!       file: handlers/stories.go
//!   - path: /kit/stories/{storyId}
//!     methods: [GET]
//!     decoder: github.com/acme/stories/transport.decodeGetStory
//!     endpoint: github.com/acme/stories/endpoints.MakeGetStoryEndpoint
//! ```
//!
//! Relative `file` entries are resolved against the manifest's directory.

use super::{HandlerRef, RouteEntry, RouteTable, SymbolRef};
use crate::error::{Error, Result};
use crate::parser::SourceCache;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Route table read from a YAML or JSON manifest.
pub struct ManifestRouteTable {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    routes: Vec<ManifestRoute>,
}

#[derive(Debug, Deserialize)]
struct ManifestRoute {
    path: Option<String>,
    methods: Option<Vec<String>>,
    handler: Option<SymbolSpec>,
    decoder: Option<SymbolSpec>,
    endpoint: Option<SymbolSpec>,
    /// File shared by every symbol of this route that does not name its own
    file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SymbolSpec {
    Name(String),
    Detailed {
        symbol: String,
        file: Option<PathBuf>,
    },
}

impl ManifestRouteTable {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Manifest {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn decode(&self, content: &str) -> Result<Manifest> {
        let is_json = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(content).map_err(|e| self.error(e.to_string()))
        } else {
            serde_yaml::from_str(content).map_err(|e| self.error(e.to_string()))
        }
    }

    fn symbol_ref(&self, spec: SymbolSpec, route_file: Option<&PathBuf>) -> SymbolRef {
        let (symbol, file) = match spec {
            SymbolSpec::Name(symbol) => (symbol, None),
            SymbolSpec::Detailed { symbol, file } => (symbol, file),
        };
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));

        match file.or_else(|| route_file.cloned()) {
            Some(file) if file.is_relative() => SymbolRef::new(symbol).with_file(base.join(file)),
            Some(file) => SymbolRef::new(symbol).with_file(file),
            None => SymbolRef::new(symbol),
        }
    }

    fn convert(&self, index: usize, route: ManifestRoute) -> Result<RouteEntry> {
        let file = route.file.as_ref();
        let handler = match (route.handler, route.decoder, route.endpoint) {
            (Some(handler), None, None) => HandlerRef::Func(self.symbol_ref(handler, file)),
            (None, Some(decoder), Some(endpoint)) => HandlerRef::Kit {
                decoder: self.symbol_ref(decoder, file),
                endpoint: self.symbol_ref(endpoint, file),
            },
            _ => {
                return Err(self.error(format!(
                    "route #{} needs either `handler` or both `decoder` and `endpoint`",
                    index + 1
                )))
            }
        };

        Ok(RouteEntry::new(route.path, route.methods, handler))
    }
}

impl RouteTable for ManifestRouteTable {
    fn walk(&self, _cache: &mut SourceCache) -> Result<Vec<RouteEntry>> {
        debug!("Reading route manifest: {}", self.path.display());

        let content = fs::read_to_string(&self.path).map_err(|e| self.error(e.to_string()))?;
        let manifest = self.decode(&content)?;

        let entries = manifest
            .routes
            .into_iter()
            .enumerate()
            .map(|(index, route)| self.convert(index, route))
            .collect::<Result<Vec<_>>>()?;

        info!("Manifest lists {} routes", entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    fn walk(path: PathBuf) -> Result<Vec<RouteEntry>> {
        ManifestRouteTable::new(path).walk(&mut SourceCache::new())
    }

    #[test]
    fn test_yaml_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = create_temp_file(
            &temp_dir,
            "routes.yaml",
            r#"
routes:
  - path: /stories/{storyId}
    methods: [GET]
    handler: github.com/acme/stories/handlers.GetStory
  - path: /stories
    methods: [POST, PUT]
    handler:
      symbol: github.com/acme/stories/handlers.SaveStory
      file: handlers/stories.go
"#,
        );

        let entries = walk(manifest).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path.as_deref(), Some("/stories/{storyId}"));
        assert_eq!(entries[0].methods, Some(vec!["GET".to_string()]));
        assert_eq!(
            entries[0].handler,
            HandlerRef::Func(SymbolRef::new("github.com/acme/stories/handlers.GetStory"))
        );
        assert_eq!(
            entries[1].handler,
            HandlerRef::Func(
                SymbolRef::new("github.com/acme/stories/handlers.SaveStory")
                    .with_file(temp_dir.path().join("handlers/stories.go"))
            )
        );
    }

    #[test]
    fn test_json_manifest_with_kit_route() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = create_temp_file(
            &temp_dir,
            "routes.json",
            r#"{
  "routes": [
    {
      "path": "/kit/stories",
      "methods": ["POST"],
      "file": "/srv/stories/transport.go",
      "decoder": "github.com/acme/stories/transport.decodeCreateStory",
      "endpoint": "github.com/acme/stories/transport.makeCreateStoryEndpoint"
    }
  ]
}"#,
        );

        let entries = walk(manifest).unwrap();

        assert_eq!(
            entries[0].handler,
            HandlerRef::Kit {
                decoder: SymbolRef::new("github.com/acme/stories/transport.decodeCreateStory")
                    .with_file(PathBuf::from("/srv/stories/transport.go")),
                endpoint: SymbolRef::new(
                    "github.com/acme/stories/transport.makeCreateStoryEndpoint"
                )
                .with_file(PathBuf::from("/srv/stories/transport.go")),
            }
        );
    }

    #[test]
    fn test_routes_without_path_or_methods_are_kept() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = create_temp_file(
            &temp_dir,
            "routes.yaml",
            "routes:\n  - handler: main.Static\n",
        );

        let entries = walk(manifest).unwrap();

        assert_eq!(entries[0].path, None);
        assert_eq!(entries[0].methods, None);
    }

    #[test]
    fn test_route_without_handler_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = create_temp_file(
            &temp_dir,
            "routes.yaml",
            "routes:\n  - path: /x\n    decoder: main.decodeX\n",
        );

        let result = walk(manifest);

        assert!(matches!(result, Err(Error::Manifest { .. })));
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let err = walk(PathBuf::from("/nonexistent/routes.yaml")).unwrap_err();

        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = create_temp_file(&temp_dir, "routes.json", "{ not json");

        assert!(matches!(walk(manifest), Err(Error::Manifest { .. })));
    }
}
