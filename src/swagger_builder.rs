use crate::naming::humanize;
use crate::schema_generator::{SchemaGenerator, SchemaNode};
use crate::type_resolver::InferredType;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static VERSION_SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v\d+$").unwrap());

/// Everything inferred about one route, ready for assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteHolder {
    /// Registration order of the route
    pub id: usize,
    pub route: String,
    pub methods: Vec<String>,
    /// Handler (or go-kit endpoint) name
    pub name: String,
    pub path: Vec<InferredType>,
    pub query: Vec<InferredType>,
    pub body: Option<InferredType>,
    pub form_data: Vec<InferredType>,
    /// Produced by the go-kit endpoint pass: carries the name only
    pub is_endpoint: bool,
}

/// Document-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentConfig {
    pub title: String,
    pub version: String,
    pub host: String,
    /// Prefix stripped from every route, e.g. `/v1`
    pub base_path: String,
    pub schemes: Vec<String>,
    /// Skip `v<digits>` segments when picking a route's tag
    pub skip_version_segments: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            host: "localhost".to_string(),
            base_path: "/".to_string(),
            schemes: vec!["http".to_string(), "https".to_string()],
            skip_version_segments: true,
        }
    }
}

/// Swagger 2.0 document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwaggerDocument {
    pub swagger: String,
    pub info: Info,
    pub host: String,
    #[serde(rename = "basePath")]
    pub base_path: String,
    pub schemes: Vec<String>,
    /// URL path -> lower-case method -> operation
    pub paths: BTreeMap<String, BTreeMap<String, Operation>>,
}

/// Swagger Info object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
}

/// Swagger Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId")]
    pub operation_id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    pub responses: BTreeMap<String, Response>,
}

/// Swagger Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query, body, formData)
    #[serde(rename = "in")]
    pub location: String,
    pub description: String,
    pub required: bool,
    /// Value type for non-body parameters
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    /// Element schema for array-valued non-body parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<SchemaNode>,
    /// Body schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

/// Swagger Response object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
}

/// Swagger document builder
pub struct SwaggerBuilder {
    config: DocumentConfig,
    /// Paths collection (URL path -> method -> operation)
    paths: BTreeMap<String, BTreeMap<String, Operation>>,
    /// Number of operations emitted so far, used to keep operation ids unique
    operation_count: usize,
}

impl SwaggerBuilder {
    pub fn new(config: DocumentConfig) -> Self {
        debug!("Initializing SwaggerBuilder");
        Self {
            config,
            paths: BTreeMap::new(),
            operation_count: 0,
        }
    }

    /// Add a route to the document, one operation per registered method.
    ///
    /// Routes without methods are skipped. A later route registered for the same path
    /// and method replaces the earlier operation.
    pub fn add_route(&mut self, holder: &RouteHolder) {
        if holder.methods.is_empty() {
            debug!("Skipping route without methods: {}", holder.route);
            return;
        }

        let path = self.document_path(&holder.route);
        let tags: Vec<String> = self.tag_for(&path).into_iter().collect();
        let parameters = Self::parameters(holder);
        let consumes = if holder.form_data.is_empty() {
            Vec::new()
        } else {
            vec!["multipart/form-data".to_string()]
        };
        let name = if holder.name.is_empty() {
            "operation"
        } else {
            holder.name.as_str()
        };

        for method in &holder.methods {
            debug!("Adding route: {} {}", method, path);

            let mut responses = BTreeMap::new();
            responses.insert(
                "200".to_string(),
                Response {
                    description: "successful operation".to_string(),
                },
            );

            let operation = Operation {
                operation_id: format!("{}_{}", name, self.operation_count),
                summary: humanize(name),
                tags: tags.clone(),
                parameters: parameters.clone(),
                consumes: consumes.clone(),
                responses,
            };
            self.operation_count += 1;

            self.paths
                .entry(path.clone())
                .or_default()
                .insert(method.to_lowercase(), operation);
        }
    }

    /// Build the final Swagger document
    pub fn build(self) -> SwaggerDocument {
        debug!("Building final Swagger document");

        SwaggerDocument {
            swagger: "2.0".to_string(),
            info: Info {
                version: self.config.version,
                title: self.config.title,
            },
            host: self.config.host,
            base_path: self.config.base_path,
            schemes: self.config.schemes,
            paths: self.paths,
        }
    }

    /// Route as it appears under `paths`: base path removed, variable patterns dropped.
    fn document_path(&self, route: &str) -> String {
        let base = self.config.base_path.trim_end_matches('/');
        let stripped = match route.strip_prefix(base) {
            Some(rest) if !base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
            _ => route,
        };

        let normalized = strip_variable_patterns(stripped);
        if normalized.starts_with('/') {
            normalized
        } else {
            format!("/{}", normalized)
        }
    }

    /// First meaningful path segment, used to group operations.
    fn tag_for(&self, path: &str) -> Option<String> {
        path.split('/')
            .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
            .find(|segment| {
                !(self.config.skip_version_segments && VERSION_SEGMENT_REGEX.is_match(segment))
            })
            .map(str::to_string)
    }

    /// Parameters in placement order: path, query, body, formData.
    fn parameters(holder: &RouteHolder) -> Vec<Parameter> {
        let mut parameters = Vec::new();

        for entry in &holder.path {
            parameters.push(Self::simple_parameter(entry, "path", true));
        }
        for entry in &holder.query {
            parameters.push(Self::simple_parameter(entry, "query", entry.required));
        }
        if let Some(body) = &holder.body {
            parameters.push(Parameter {
                name: body.name.clone(),
                location: "body".to_string(),
                description: humanize(&body.name),
                required: true,
                param_type: None,
                items: None,
                schema: Some(SchemaGenerator::generate_schema(body)),
            });
        }
        for entry in &holder.form_data {
            parameters.push(Self::simple_parameter(entry, "formData", true));
        }

        parameters
    }

    fn simple_parameter(entry: &InferredType, location: &str, required: bool) -> Parameter {
        let schema = SchemaGenerator::generate_schema(entry);
        Parameter {
            name: entry.name.clone(),
            location: location.to_string(),
            description: humanize(&entry.name),
            required,
            param_type: Some(schema.schema_type),
            items: schema.items.map(|items| *items),
            schema: None,
        }
    }
}

/// Merges the holders produced for one route id.
///
/// go-kit routes yield a decoder holder (parameters) and an endpoint holder (name);
/// the merged holder takes its parameters from the former and its name from the
/// latter. The result is ordered by id.
pub fn merge_holders(holders: Vec<RouteHolder>) -> Vec<RouteHolder> {
    let mut merged: BTreeMap<usize, RouteHolder> = BTreeMap::new();

    for holder in holders {
        match merged.remove(&holder.id) {
            None => {
                merged.insert(holder.id, holder);
            }
            Some(existing) => {
                let (mut decoder, endpoint) = if existing.is_endpoint {
                    (holder, existing)
                } else {
                    (existing, holder)
                };
                if endpoint.is_endpoint && !endpoint.name.is_empty() {
                    decoder.name = endpoint.name;
                }
                decoder.is_endpoint = false;
                merged.insert(decoder.id, decoder);
            }
        }
    }

    merged.into_values().collect()
}

/// Replaces mux variable patterns with the bare name: `{id:[0-9]+}` becomes `{id}`.
fn strip_variable_patterns(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0;
    let mut variable = String::new();

    for c in path.chars() {
        match c {
            '{' => {
                if depth > 0 {
                    variable.push(c);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let name = variable.split(':').next().unwrap_or_default().trim();
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                    variable.clear();
                } else {
                    variable.push(c);
                }
            }
            _ if depth > 0 => variable.push(c),
            _ => out.push(c),
        }
    }

    out
}
