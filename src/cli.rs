use crate::generator::Generator;
use crate::packages::ChainedLocator;
use crate::route_table::manifest::ManifestRouteTable;
use crate::route_table::mux::MuxSourceRouteTable;
use crate::route_table::RouteTable;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::swagger_builder::DocumentConfig;
use crate::ui::{update_index_file, SwaggerUiMount};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::rc::Rc;

/// Swagger generator - Generate Swagger 2.0 documentation from Go gorilla/mux services
#[derive(Parser, Debug)]
#[command(name = "swagger-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Go project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Route manifest (YAML or JSON) to use instead of scanning mux registrations
    #[arg(short = 'm', long = "manifest", value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// API title
    #[arg(long = "title", default_value = "Generated API")]
    pub title: String,

    /// API version
    #[arg(long = "api-version", default_value = "1.0.0")]
    pub api_version: String,

    /// Host serving the API
    #[arg(long = "host", default_value = "localhost")]
    pub host: String,

    /// Base path stripped from every route
    #[arg(short = 'b', long = "base-path", default_value = "/")]
    pub base_path: String,

    /// Transfer protocols of the API
    #[arg(long = "schemes", value_delimiter = ',', default_values = ["http", "https"])]
    pub schemes: Vec<String>,

    /// Use version segments such as v1 as operation tags
    #[arg(long = "keep-version-tags")]
    pub keep_version_tags: bool,

    /// swagger-ui index.html to point at the written document
    #[arg(long = "ui-index", value_name = "FILE", requires = "output_path")]
    pub ui_index: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

impl CliArgs {
    /// Document settings carried by the arguments.
    pub fn document_config(&self) -> DocumentConfig {
        DocumentConfig {
            title: self.title.clone(),
            version: self.api_version.clone(),
            host: self.host.clone(),
            base_path: self.base_path.clone(),
            schemes: self.schemes.clone(),
            skip_version_segments: !self.keep_version_tags,
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    if let Some(ref manifest) = args.manifest {
        if !manifest.is_file() {
            anyhow::bail!("Route manifest does not exist: {}", manifest.display());
        }
    }

    if !args.base_path.starts_with('/') {
        anyhow::bail!("Base path must start with '/': {}", args.base_path);
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if let Some(ref manifest) = args.manifest {
        info!("Routes: manifest {}", manifest.display());
    } else {
        info!("Routes: mux registrations in project sources");
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting Swagger document generation...");

    // Step 1: Package layout
    let packages = Rc::new(ChainedLocator::for_project(&args.project_path));

    // Step 2: Route table
    let table: Box<dyn RouteTable> = match &args.manifest {
        Some(manifest) => Box::new(ManifestRouteTable::new(manifest.clone())),
        None => Box::new(MuxSourceRouteTable::new(
            args.project_path.clone(),
            packages.clone(),
        )),
    };

    // Step 3: Locate handlers, extract parameters and assemble
    let mut generator = Generator::new(packages);
    let document = generator
        .generate(table.as_ref(), &args.document_config())
        .context("Failed to generate Swagger document")?;

    if document.paths.is_empty() {
        warn!("No documented routes found in the project");
    }

    // Step 4: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    // Step 5: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote Swagger document to {}", output_path.display());

        // Step 6: Point the UI bundle at the document
        if let Some(index) = &args.ui_index {
            let mount = SwaggerUiMount::new(output_path.clone())?;
            update_index_file(index, &mount.document_route)
                .with_context(|| format!("Failed to update UI index {}", index.display()))?;
            info!(
                "Serve {} at {} and the UI under {}",
                mount.document_path.display(),
                mount.document_route,
                mount.ui_route
            );
        }
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Paths documented: {}", document.paths.len());
    info!(
        "  - Operations: {}",
        document.paths.values().map(|methods| methods.len()).sum::<usize>()
    );
    info!("  - Source files read: {}", generator.cache().disk_reads());

    Ok(())
}
