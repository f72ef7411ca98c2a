use crate::config::{is_json, GeneratorConfig};
use crate::diagnostics::{GenerationDiagnostic, GenerationStatus};
use crate::doc_tree::DocTree;
use crate::generator::DocumentGenerator;
use crate::module::ModuleContext;
use crate::serializer::{serialize_json, serialize_yaml, write_documents, write_to_file};
use crate::type_resolver::TypeResolver;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;

/// Generate OpenAPI documents from documentation annotations and type metadata
#[derive(Parser, Debug)]
#[command(name = "openapi-from-docs")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the documentation tree (.yaml, .yml or .json)
    #[arg(value_name = "DOC_TREE")]
    pub doc_tree: PathBuf,

    /// Module to search for types; repeat to search several, in order
    #[arg(short = 'm', long = "module", value_name = "PATH")]
    pub modules: Vec<PathBuf>,

    /// Generator configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Directory the documents are written to
    #[arg(short = 'o', long = "output-dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Write the diagnostic report to this file
    #[arg(short = 'd', long = "diagnostics", value_name = "FILE")]
    pub diagnostics: Option<PathBuf>,

    /// Custom tag name that marks document variants, in addition to configured ones
    #[arg(long = "categorizer", value_name = "NAME")]
    pub categorizers: Vec<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

/// Diagnostic file contents
#[derive(Serialize)]
struct DiagnosticReport<'a> {
    status: GenerationStatus,
    #[serde(rename = "defaultVariantStatus")]
    default_variant_status: GenerationStatus,
    #[serde(flatten)]
    diagnostic: &'a GenerationDiagnostic,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.doc_tree.is_file() {
        anyhow::bail!(
            "Documentation tree does not exist or is not a file: {}",
            args.doc_tree.display()
        );
    }

    for module in &args.modules {
        if !module.exists() {
            anyhow::bail!("Module path does not exist: {}", module.display());
        }
    }

    if let Some(ref config) = args.config {
        if !config.is_file() {
            anyhow::bail!("Configuration file does not exist: {}", config.display());
        }
    }

    info!("Documentation tree: {}", args.doc_tree.display());
    info!("Modules: {}", args.modules.len());
    info!("Output format: {:?}", args.output_format);
    info!("Output directory: {}", args.output_dir.display());

    Ok(args)
}

/// Run the main workflow and return the overall status
pub fn run(args: CliArgs) -> Result<GenerationStatus> {
    info!("Starting OpenAPI document generation...");

    // Step 1: Configuration
    let mut config = match &args.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    for categorizer in &args.categorizers {
        if !config.categorizers.contains(categorizer) {
            config.categorizers.push(categorizer.clone());
        }
    }
    debug!("Recognized categorizers: {:?}", config.categorizers);

    // Step 2: Documentation tree
    info!("Loading documentation tree...");
    let doc_tree = DocTree::load(&args.doc_tree)?;
    info!(
        "Found {} documented operations and {} member docs",
        doc_tree.operations.len(),
        doc_tree.members.len()
    );

    // Step 3: Modules
    info!("Loading {} module(s)...", args.modules.len());
    let context = ModuleContext::load(&args.modules)?;
    if context.is_empty() {
        warn!("No modules given; only built-in types can be resolved");
    }

    // Step 4: Generate
    info!("Generating documents...");
    let mut generator = DocumentGenerator::new(config, TypeResolver::new(context));
    let output = generator.generate(&doc_tree);

    // Step 5: Write documents
    let written = write_documents(&output.documents, &args.output_dir, args.output_format)?;

    // Step 6: Diagnostics
    let diagnostic = &output.diagnostic;
    for operation in diagnostic.operations.iter().filter(|o| !o.errors.is_empty()) {
        for entry in &operation.errors {
            warn!(
                "{} {}: [{}] {}",
                operation.method, operation.path, entry.kind, entry.message
            );
        }
    }
    for document in &diagnostic.documents {
        for entry in &document.errors {
            match &document.variant {
                Some(variant) => warn!("Document {}: [{}] {}", variant, entry.kind, entry.message),
                None => warn!("[{}] {}", entry.kind, entry.message),
            }
        }
    }

    let status = diagnostic.overall_status();
    if let Some(path) = &args.diagnostics {
        let report = DiagnosticReport {
            status,
            default_variant_status: diagnostic.default_variant_status(),
            diagnostic,
        };
        let content = if is_json(path) {
            serialize_json(&report)?
        } else {
            serialize_yaml(&report)?
        };
        write_to_file(&content, path)?;
        info!("Wrote diagnostics to {}", path.display());
    }

    // Step 7: Summary
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Operations: {}", diagnostic.operations.len());
    info!("  - Documents written: {}", written.len());
    info!("  - Status: {:?}", status);

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(doc_tree: PathBuf, output_dir: PathBuf) -> CliArgs {
        CliArgs {
            doc_tree,
            modules: Vec::new(),
            config: None,
            output_format: OutputFormat::Yaml,
            output_dir,
            diagnostics: None,
            categorizers: Vec::new(),
            verbose: false,
        }
    }

    #[test]
    fn test_cli_parsing() {
        let parsed = CliArgs::try_parse_from([
            "openapi-from-docs",
            "docs.yaml",
            "-m",
            "contracts.yaml",
            "--module",
            "src/models",
            "-f",
            "json",
            "--categorizer",
            "group",
            "-v",
        ])
        .unwrap();

        assert_eq!(parsed.doc_tree, PathBuf::from("docs.yaml"));
        assert_eq!(
            parsed.modules,
            vec![PathBuf::from("contracts.yaml"), PathBuf::from("src/models")]
        );
        assert_eq!(parsed.output_format, OutputFormat::Json);
        assert_eq!(parsed.output_dir, PathBuf::from("."));
        assert_eq!(parsed.categorizers, vec!["group".to_string()]);
        assert!(parsed.verbose);
    }

    #[test]
    fn test_missing_doc_tree_rejected() {
        let dir = TempDir::new().unwrap();
        let result = parse_args_from_parsed(args(dir.path().join("nope.yaml"), dir.path().to_path_buf()));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_module_rejected() {
        let dir = TempDir::new().unwrap();
        let doc_tree = dir.path().join("docs.yaml");
        fs::write(&doc_tree, "operations: []").unwrap();

        let mut cli_args = args(doc_tree, dir.path().to_path_buf());
        cli_args.modules.push(dir.path().join("missing.yaml"));
        assert!(parse_args_from_parsed(cli_args).is_err());
    }

    #[test]
    fn test_run_writes_documents_and_diagnostics() {
        let dir = TempDir::new().unwrap();
        let doc_tree = dir.path().join("docs.yaml");
        fs::write(
            &doc_tree,
            r#"
operations:
  - url: /health
    verb: get
    responses:
      - description: OK
        type: ["T:System.String"]
"#,
        )
        .unwrap();

        let mut cli_args = args(doc_tree, dir.path().join("out"));
        cli_args.diagnostics = Some(dir.path().join("diagnostics.json"));

        let status = run(cli_args).unwrap();
        assert_eq!(status, GenerationStatus::Success);
        assert!(dir.path().join("out").join("openapi.yaml").exists());

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("diagnostics.json")).unwrap()).unwrap();
        assert_eq!(report["status"], "Success");
        assert_eq!(report["operations"][0]["path"], "/health");
    }
}
