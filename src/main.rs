//! OpenAPI from docs - Command-line tool for generating OpenAPI documents.
//!
//! Reads a documentation tree extracted from a service's doc comments, resolves the types it
//! references against the given modules, and writes one OpenAPI 3.0 document per variant.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-docs [OPTIONS] <DOC_TREE>
//! ```
//!
//! # Examples
//!
//! Generate YAML documents resolving types from a metadata file:
//! ```bash
//! openapi-from-docs docs.yaml -m contracts.yaml -o out
//! ```
//!
//! Split documents by a `group` tag and write diagnostics:
//! ```bash
//! openapi-from-docs docs.yaml -m src/models --categorizer group -d diagnostics.json
//! ```
//!
//! The process exits with a non-zero code when generation fails.

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use openapi_from_docs::cli;
use openapi_from_docs::diagnostics::GenerationStatus;

fn main() -> Result<()> {
    // Parse once for the verbose flag before the logger exists, then validate.
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from docs starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    match cli::run(args)? {
        GenerationStatus::Failure => {
            error!("OpenAPI document generation finished with failures");
            std::process::exit(1);
        }
        GenerationStatus::Warning => {
            info!("OpenAPI document generation completed with warnings");
        }
        GenerationStatus::Success => {
            info!("OpenAPI document generation completed successfully");
        }
    }

    Ok(())
}
