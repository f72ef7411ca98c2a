//! Generator configuration.
//!
//! Configuration is optional. It can be read from a YAML or JSON file and is then
//! overridden piecemeal by command-line flags.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Settings that shape the generated documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Info section written into every document
    pub info: InfoConfig,
    /// Custom tag names that mark document variants
    pub categorizers: Vec<String>,
    /// Attribute mappings declared per (categorizer, title)
    pub variants: Vec<VariantOptions>,
    /// Status code used for responses documented without one
    pub default_response_code: String,
    /// Media type used for request and response content
    pub content_type: String,
}

/// API title, version and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoConfig {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

/// Configuration entry for one categorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOptions {
    pub categorizer: String,
    #[serde(default)]
    pub options: Vec<VariantOption>,
}

/// One configured variant. Exactly one title is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOption {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            info: InfoConfig::default(),
            categorizers: Vec::new(),
            variants: Vec::new(),
            default_response_code: "200".to_string(),
            content_type: "application/json".to_string(),
        }
    }
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config = if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON configuration: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML configuration: {}", path.display()))?
        };

        Ok(config)
    }
}

/// Whether a path should be read as JSON rather than YAML.
pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
