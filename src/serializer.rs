//! Serialization module for writing generated documents and diagnostics as YAML or JSON.
//!
//! Every variant is written to its own file in the output directory: `openapi.<ext>` for
//! the default variant and `openapi.<categorizer>.<title>.<ext>` for the others.

use crate::cli::OutputFormat;
use crate::openapi_builder::OpenApiDocument;
use crate::variant::DocumentVariantInfo;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Serializes a value to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing to YAML");
    serde_yaml::to_string(value).context("Failed to serialize to YAML")
}

/// Serializes a value to JSON format with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing to JSON");
    serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
}

/// Serializes a value in the requested format.
pub fn serialize<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serialize_yaml(value),
        OutputFormat::Json => serialize_json(value),
    }
}

/// Writes string content to a file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// File name of a variant's document.
pub fn document_file_name(variant: &DocumentVariantInfo, format: OutputFormat) -> String {
    let ext = format.extension();
    if variant.is_default() {
        format!("openapi.{}", ext)
    } else {
        format!(
            "openapi.{}.{}.{}",
            file_safe(&variant.categorizer),
            file_safe(&variant.title),
            ext
        )
    }
}

fn file_safe(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Writes every document into `dir` and returns the written paths in document order.
pub fn write_documents(
    documents: &IndexMap<DocumentVariantInfo, OpenApiDocument>,
    dir: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(documents.len());

    for (variant, document) in documents {
        let path = dir.join(document_file_name(variant, format));
        let content = serialize(document, format)
            .with_context(|| format!("Failed to serialize document for variant {}", variant))?;
        write_to_file(&content, &path)?;
        info!("Wrote {} document to {}", variant, path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi_builder::Info;
    use tempfile::TempDir;

    /// Helper function to create a minimal OpenAPI document for testing
    fn create_test_document(title: &str) -> OpenApiDocument {
        OpenApiDocument::empty(Info {
            title: title.to_string(),
            version: "1.0.0".to_string(),
            description: Some("A test API".to_string()),
        })
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_document("Test API")).unwrap();

        assert!(yaml.contains("openapi:"));
        assert!(yaml.contains("3.0.0"));
        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("description: A test API"));
        assert!(yaml.contains("paths:"));
        assert!(!yaml.contains("components"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&create_test_document("Test API")).unwrap();

        // Pretty printed
        assert!(json.lines().count() > 5);

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["openapi"], "3.0.0");
        assert_eq!(parsed["info"]["title"], "Test API");
        assert!(parsed["paths"].is_object());
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("nested").join("test.yaml");

        write_to_file("initial", &file_path).unwrap();
        write_to_file("test content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "test content");
    }

    #[test]
    fn test_document_file_names() {
        let default = DocumentVariantInfo::default_variant();
        assert_eq!(document_file_name(&default, OutputFormat::Yaml), "openapi.yaml");

        let admin = DocumentVariantInfo::new("group", "Admin Tools");
        assert_eq!(
            document_file_name(&admin, OutputFormat::Json),
            "openapi.group.Admin_Tools.json"
        );
    }

    #[test]
    fn test_write_documents() {
        let temp_dir = TempDir::new().unwrap();
        let mut documents = IndexMap::new();
        documents.insert(DocumentVariantInfo::default_variant(), create_test_document("All"));
        documents.insert(DocumentVariantInfo::new("group", "A"), create_test_document("A"));

        let written = write_documents(&documents, temp_dir.path(), OutputFormat::Json).unwrap();
        assert_eq!(
            written,
            vec![
                temp_dir.path().join("openapi.json"),
                temp_dir.path().join("openapi.group.A.json"),
            ]
        );

        let content = fs::read_to_string(&written[1]).unwrap();
        let deserialized: OpenApiDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(deserialized.info.title, "A");
    }

    #[test]
    fn test_roundtrip_yaml_serialization() {
        let doc = create_test_document("Test API");
        let yaml = serialize(&doc, OutputFormat::Yaml).unwrap();
        let deserialized: OpenApiDocument = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(deserialized, doc);
    }
}
