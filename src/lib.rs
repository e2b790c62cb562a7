//! Swagger generator - Swagger 2.0 documents from the source of Go gorilla/mux services.
//!
//! Routes come from a route table: either the service's own mux registrations or an
//! explicit manifest. Each route's handler is mapped back to its Go source, its body is
//! scanned for the request values it reads, and the types of those values are resolved
//! through struct definitions across files and packages.
//!
//! # Architecture
//!
//! 1. [`route_table`] - Enumerates registered routes (mux source scan or manifest)
//! 2. [`scanner`] - Recursively scans project directories for Go files
//! 3. [`parser`] - Loads Go files with comments stripped, cached per run
//! 4. [`packages`] - Maps import paths to package directories (go.mod, GOPATH)
//! 5. [`locator`] - Maps handler symbols to their declaration lines
//! 6. [`params`] - Extracts path, query, body and form parameters from handler bodies
//! 7. [`type_resolver`] - Resolves parameter types and expands struct definitions
//! 8. [`schema_generator`] - Converts resolved types to Swagger schemas
//! 9. [`swagger_builder`] - Assembles the Swagger document
//! 10. [`generator`] - Runs the pipeline end to end
//! 11. [`serializer`] - Serializes the document to YAML or JSON
//! 12. [`ui`] - Points a swagger-ui bundle at the generated document
//!
//! # Example Usage
//!
//! ```no_run
//! use swagger_from_source::{
//!     generator::Generator,
//!     packages::ChainedLocator,
//!     route_table::mux::MuxSourceRouteTable,
//!     serializer::serialize_yaml,
//!     swagger_builder::DocumentConfig,
//! };
//! use std::path::PathBuf;
//! use std::rc::Rc;
//!
//! let root = PathBuf::from("./my-service");
//! let packages = Rc::new(ChainedLocator::for_project(&root));
//! let table = MuxSourceRouteTable::new(root, packages.clone());
//!
//! let config = DocumentConfig {
//!     base_path: "/v1".to_string(),
//!     ..DocumentConfig::default()
//! };
//! let document = Generator::new(packages).generate(&table, &config).unwrap();
//!
//! let yaml = serialize_yaml(&document).unwrap();
//! println!("{}", yaml);
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod cli;
pub mod error;
pub mod generator;
pub mod locator;
pub mod naming;
pub mod packages;
pub mod params;
pub mod parser;
pub mod route_table;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod swagger_builder;
pub mod type_resolver;
pub mod ui;
