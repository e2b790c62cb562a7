//! Swagger generator - Command-line tool for generating Swagger documentation.
//!
//! This binary reads the source of a Go service built on gorilla/mux and generates a
//! Swagger 2.0 document describing its routes, parameters and request bodies.
//!
//! # Usage
//!
//! ```bash
//! swagger-from-source [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate JSON documentation:
//! ```bash
//! swagger-from-source ./my-service -o swagger.json
//! ```
//!
//! Use a route manifest and strip the `/v1` base path:
//! ```bash
//! swagger-from-source ./my-service -m routes.yaml -b /v1 -f yaml -o swagger.yaml
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! swagger-from-source ./my-service -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use swagger_from_source::cli;

fn main() -> Result<()> {
    // Parse once to read the verbose flag before the logger exists
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Swagger generator starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("Swagger document generation completed successfully");

    Ok(())
}
