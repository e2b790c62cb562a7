//! Swagger UI wiring for a generated document.
//!
//! The service that embeds the UI serves the document file at [`SwaggerUiMount::document_route`]
//! and the bundled swagger-ui assets under [`SwaggerUiMount::ui_route`]. The bundle's
//! `index.html` carries a `url: "..."` entry naming the document to load, which
//! [`update_index_file`] points at the generated file.

use crate::error::{Error, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

static INDEX_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^([ \t]*)url:[ \t]*"[^"]*"[ \t]*,?"#).unwrap());

/// Route under which the document is served.
pub const DOCUMENT_ROUTE: &str = "/swagger.json";

/// Route prefix under which the UI assets are served.
pub const UI_ROUTE: &str = "/swagger-ui/";

/// Routes to mount on the host service's router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwaggerUiMount {
    pub document_route: String,
    pub ui_route: String,
    /// Generated document served at `document_route`
    pub document_path: PathBuf,
}

impl SwaggerUiMount {
    /// Mount for an already written document at the default routes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Emission` if the document does not exist.
    pub fn new(document_path: PathBuf) -> Result<Self> {
        if !document_path.is_file() {
            return Err(Error::Emission(format!(
                "swagger document not found: {}",
                document_path.display()
            )));
        }

        Ok(Self {
            document_route: DOCUMENT_ROUTE.to_string(),
            ui_route: UI_ROUTE.to_string(),
            document_path,
        })
    }
}

/// Rewrites the `url: "..."` entry of a swagger-ui `index.html` to `url`.
///
/// Indentation of the entry is kept.
///
/// # Arguments
///
/// * `index` - The bundle's `index.html`
/// * `url` - Where the UI should load the document from, usually [`DOCUMENT_ROUTE`]
///
/// # Returns
///
/// Whether the file changed.
///
/// # Errors
///
/// Returns `Error::Emission` if the index cannot be read or written, or has no
/// `url:` entry.
pub fn update_index_file(index: &Path, url: &str) -> Result<bool> {
    let content = fs::read_to_string(index).map_err(|e| {
        Error::Emission(format!("cannot read UI index {}: {}", index.display(), e))
    })?;

    if !INDEX_URL_REGEX.is_match(&content) {
        return Err(Error::Emission(format!(
            "no url entry in UI index {}",
            index.display()
        )));
    }

    let escaped = url.replace('\\', "\\\\").replace('"', "\\\"");
    let updated = INDEX_URL_REGEX.replace(&content, |caps: &regex::Captures| {
        format!("{}url: \"{}\",", &caps[1], escaped)
    });

    if updated == content {
        debug!("UI index {} already points at {}", index.display(), url);
        return Ok(false);
    }

    fs::write(index, updated.as_bytes()).map_err(|e| {
        Error::Emission(format!("cannot write UI index {}: {}", index.display(), e))
    })?;
    info!("UI index {} now loads {}", index.display(), url);
    Ok(true)
}
