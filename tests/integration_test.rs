use clap::Parser;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::rc::Rc;
use swagger_from_source::{
    cli::{self, CliArgs},
    generator::Generator,
    packages::ChainedLocator,
    route_table::{manifest::ManifestRouteTable, mux::MuxSourceRouteTable, RouteTable},
    serializer::{serialize_json, serialize_yaml},
    swagger_builder::{DocumentConfig, Operation, SwaggerDocument},
};
use tempfile::TempDir;

const STORIES_PROJECT: &[(&str, &str)] = &[
    ("go.mod", include_str!("fixtures/stories/go.mod")),
    ("main.go", include_str!("fixtures/stories/main.go")),
    ("routes.yaml", include_str!("fixtures/stories/routes.yaml")),
    ("handlers/stories.go", include_str!("fixtures/stories/handlers/stories.go")),
    ("handlers/clients.go", include_str!("fixtures/stories/handlers/clients.go")),
    ("kit/endpoints.go", include_str!("fixtures/stories/kit/endpoints.go")),
    (
        "model/transport/story.go",
        include_str!("fixtures/stories/model/transport/story.go"),
    ),
    (
        "model/transport/author.go",
        include_str!("fixtures/stories/model/transport/author.go"),
    ),
];

/// Helper function to create a temporary test project
fn create_test_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

fn v1_config() -> DocumentConfig {
    DocumentConfig {
        title: "Stories".to_string(),
        base_path: "/v1".to_string(),
        ..DocumentConfig::default()
    }
}

fn generate_from_source(root: &Path, config: &DocumentConfig) -> SwaggerDocument {
    let packages = Rc::new(ChainedLocator::for_project(root));
    let table = MuxSourceRouteTable::new(root.to_path_buf(), packages.clone());
    Generator::new(packages)
        .generate(&table, config)
        .expect("Failed to generate document")
}

fn operation<'a>(document: &'a SwaggerDocument, path: &str, method: &str) -> &'a Operation {
    document
        .paths
        .get(path)
        .and_then(|methods| methods.get(method))
        .unwrap_or_else(|| panic!("missing {} {}, paths: {:?}", method, path, document.paths.keys()))
}

fn parameter_names(operation: &Operation, location: &str) -> Vec<String> {
    operation
        .parameters
        .iter()
        .filter(|p| p.location == location)
        .map(|p| p.name.clone())
        .collect()
}

#[test]
fn test_mux_end_to_end_generation() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let document = generate_from_source(temp_dir.path(), &v1_config());

    assert_eq!(document.swagger, "2.0");
    assert_eq!(document.info.title, "Stories");
    assert_eq!(document.base_path, "/v1");

    let paths: Vec<&String> = document.paths.keys().collect();
    assert_eq!(
        paths,
        vec![
            "/attachments",
            "/clients/{id}",
            "/envelopes",
            "/health",
            "/kit/stories",
            "/stories",
            "/stories/{storyId}",
        ]
    );

    // Routes without methods or without a path template are not documented
    assert!(!document.paths.contains_key("/ping"));
    assert!(document.paths.keys().all(|p| !p.starts_with("/static")));

    let stories: Vec<&String> = document.paths["/stories"].keys().collect();
    assert_eq!(stories, vec!["get", "post"]);
}

#[test]
fn test_path_and_query_parameters() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let document = generate_from_source(temp_dir.path(), &v1_config());

    let get_story = operation(&document, "/stories/{storyId}", "get");
    assert_eq!(get_story.parameters.len(), 1);
    assert_eq!(get_story.parameters[0].name, "storyId");
    assert_eq!(get_story.parameters[0].location, "path");
    assert!(get_story.parameters[0].required);
    assert_eq!(get_story.parameters[0].param_type.as_deref(), Some("number"));

    let list = operation(&document, "/stories", "get");
    assert_eq!(parameter_names(list, "query"), vec!["storyId", "type"]);
    assert!(list.parameters.iter().all(|p| !p.required));
    assert_eq!(list.summary, "List Stories");
}

#[test]
fn test_version_prefix_is_not_a_tag() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let document = generate_from_source(temp_dir.path(), &v1_config());

    assert_eq!(operation(&document, "/clients/{id}", "get").tags, vec!["clients"]);
    assert_eq!(operation(&document, "/health", "get").tags, vec!["health"]);
    assert_eq!(operation(&document, "/kit/stories", "put").tags, vec!["kit"]);
}

#[test]
fn test_identical_path_and_method_collapse() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let document = generate_from_source(temp_dir.path(), &v1_config());

    let methods: Vec<&String> = document.paths["/clients/{id}"].keys().collect();
    assert_eq!(methods, vec!["delete", "get"]);

    let get = operation(&document, "/clients/{id}", "get");
    assert_eq!(get.operation_id, "GetClientV2_6");
    assert_eq!(parameter_names(get, "path"), vec!["id"]);
    assert_eq!(parameter_names(get, "query"), vec!["verbose"]);

    let delete = operation(&document, "/clients/{id}", "delete");
    assert_eq!(delete.operation_id, "GetClient_5");
    assert!(parameter_names(delete, "query").is_empty());
}

#[test]
fn test_body_schema_with_unresolved_field() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let document = generate_from_source(temp_dir.path(), &v1_config());
    let create = operation(&document, "/stories", "post");

    assert_eq!(create.parameters.len(), 1);
    let body = &create.parameters[0];
    assert_eq!(body.name, "story");
    assert_eq!(body.location, "body");
    assert!(body.required);

    let schema = serde_json::to_value(body.schema.as_ref().unwrap()).unwrap();
    let keys: Vec<&String> = schema["properties"].as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec!["title", "tags", "author", "chapters", "published", "location", "draft"]
    );
    assert_eq!(
        schema["required"],
        serde_json::json!(["title", "author", "chapters", "published", "location"])
    );

    // geo.Point lives outside the project: an unresolved leaf next to resolved siblings
    assert_eq!(schema["properties"]["location"], serde_json::json!({"type": "object"}));
    assert_eq!(schema["properties"]["published"], serde_json::json!({"type": "string"}));
    assert_eq!(schema["properties"]["draft"], serde_json::json!({"type": "boolean"}));
    assert_eq!(
        schema["properties"]["tags"],
        serde_json::json!({"type": "array", "items": {"type": "string"}})
    );
    assert_eq!(
        schema["properties"]["chapters"]["items"]["properties"]["number"],
        serde_json::json!({"type": "number"})
    );

    // Author refers back to Story: the cycle is cut at the second visit
    let author = &schema["properties"]["author"];
    assert_eq!(author["required"], serde_json::json!(["name", "books"]));
    assert_eq!(
        author["properties"]["books"],
        serde_json::json!({"type": "array", "items": {"type": "object"}})
    );
}

#[test]
fn test_body_schema_is_idempotent() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let first = generate_from_source(temp_dir.path(), &v1_config());
    let second = generate_from_source(temp_dir.path(), &v1_config());

    let schema_json = |document: &SwaggerDocument| {
        let put = operation(document, "/envelopes", "put");
        serde_json::to_string(put.parameters[0].schema.as_ref().unwrap()).unwrap()
    };

    assert_eq!(schema_json(&first), schema_json(&second));
    assert_eq!(
        schema_json(&first),
        r#"{"type":"object","properties":{"A":{"type":"string"},"B":{"type":"array","items":{"type":"object","properties":{"C":{"type":"number"}},"required":["C"]}}},"required":["A","B"]}"#
    );
    assert_eq!(serialize_json(&first).unwrap(), serialize_json(&second).unwrap());
}

#[test]
fn test_form_data_parameters() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let document = generate_from_source(temp_dir.path(), &v1_config());
    let upload = operation(&document, "/attachments", "post");

    assert_eq!(upload.consumes, vec!["multipart/form-data"]);
    assert_eq!(parameter_names(upload, "formData"), vec!["attachment", "caption"]);
    assert_eq!(upload.parameters[0].param_type.as_deref(), Some("file"));
    assert_eq!(upload.parameters[1].param_type.as_deref(), Some("string"));
    assert!(upload.parameters.iter().all(|p| p.required));
}

#[test]
fn test_kit_route_merges_decoder_and_endpoint() {
    let temp_dir = create_test_project(STORIES_PROJECT);

    let document = generate_from_source(temp_dir.path(), &v1_config());
    let put = operation(&document, "/kit/stories", "put");

    assert_eq!(put.operation_id, "PublishStory_9");
    assert_eq!(put.summary, "Publish Story");
    assert_eq!(parameter_names(put, "body"), vec!["story"]);

    let schema = put.parameters[0].schema.as_ref().unwrap();
    let properties = schema.properties.as_ref().unwrap();
    assert!(properties.contains_key("title"));
    assert!(properties.contains_key("author"));
}

#[test]
fn test_manifest_end_to_end_generation() {
    let temp_dir = create_test_project(STORIES_PROJECT);
    let root = temp_dir.path();

    let packages = Rc::new(ChainedLocator::for_project(root));
    let table = ManifestRouteTable::new(root.join("routes.yaml"));
    let entries = table
        .walk(&mut swagger_from_source::parser::SourceCache::new())
        .unwrap();
    assert_eq!(entries.len(), 5);

    let document = Generator::new(packages)
        .generate(&table, &v1_config())
        .unwrap();

    let paths: Vec<&String> = document.paths.keys().collect();
    assert_eq!(paths, vec!["/health", "/kit/stories", "/stories/{storyId}"]);
    assert_eq!(operation(&document, "/health", "get").operation_id, "Health_1");
    assert_eq!(
        operation(&document, "/kit/stories", "put").operation_id,
        "PublishStory_2"
    );
}

#[test]
fn test_cli_writes_document_and_ui_index() {
    let temp_dir = create_test_project(STORIES_PROJECT);
    let root = temp_dir.path();
    let index = root.join("swaggerui/index.html");
    std::fs::create_dir_all(index.parent().unwrap()).unwrap();
    std::fs::write(&index, "SwaggerUIBundle({\n  url: \"https://petstore.swagger.io/v2/swagger.json\",\n})\n")
        .unwrap();
    let output = root.join("docs/swagger.yaml");

    let args = CliArgs::parse_from([
        "swagger-from-source".to_string(),
        root.to_string_lossy().to_string(),
        "--format".to_string(),
        "yaml".to_string(),
        "--output".to_string(),
        output.to_string_lossy().to_string(),
        "--base-path".to_string(),
        "/v1".to_string(),
        "--ui-index".to_string(),
        index.to_string_lossy().to_string(),
    ]);
    cli::run(cli::parse_args_from_parsed(args).unwrap()).unwrap();

    let yaml = std::fs::read_to_string(&output).unwrap();
    let document: SwaggerDocument = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(document.paths.len(), 7);
    assert_eq!(serialize_yaml(&document).unwrap(), yaml);

    let index_content = std::fs::read_to_string(&index).unwrap();
    assert!(index_content.contains("  url: \"/swagger.json\","));
}

#[test]
fn test_empty_project_yields_empty_document() {
    let temp_dir = create_test_project(&[("go.mod", "module github.com/acme/empty\n")]);

    let document = generate_from_source(temp_dir.path(), &DocumentConfig::default());

    assert!(document.paths.is_empty());
    let json = serialize_json(&document).unwrap();
    assert!(json.contains("\"paths\": {}"));
}
