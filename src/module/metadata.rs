//! Metadata modules: type definitions serialized to YAML or JSON.
//!
//! ```yaml
//! name: Contracts
//! types:
//!   - name: Contracts.Box`1
//!     generic_params: [T]
//!     base: Contracts.Entity
//!     members:
//!       - name: Value
//!         type: T
//!         required: true
//!   - name: Contracts.Color
//!     kind: enum
//!     enum_members: [Red, Green]
//!   - name: Contracts.Examples
//!     fields:
//!       - name: Sample
//!         type: System.Int32
//!         value: 42
//! ```

use super::{
    DefinitionKind, FieldDefinition, MemberAnnotations, MemberDefinition, TypeDefinition,
    TypeModule, TypeRef,
};
use crate::config::is_json;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A module loaded from a metadata file.
#[derive(Debug)]
pub struct MetadataModule {
    name: String,
    types: IndexMap<String, TypeDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    types: Vec<RawType>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    name: String,
    #[serde(default = "default_kind")]
    kind: DefinitionKind,
    #[serde(default)]
    generic_params: Vec<String>,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    members: Vec<RawMember>,
    #[serde(default)]
    enum_members: Vec<String>,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    annotations: MemberAnnotations,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default = "default_true")]
    public: bool,
    #[serde(rename = "static", default = "default_true")]
    is_static: bool,
    #[serde(default)]
    value: serde_json::Value,
}

fn default_kind() -> DefinitionKind {
    DefinitionKind::Object
}

fn default_true() -> bool {
    true
}

impl MetadataModule {
    /// Load a metadata module from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading metadata module: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read module file: {}", path.display()))?;

        let raw: RawModule = if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON module: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML module: {}", path.display()))?
        };

        let fallback_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "module".to_string());
        Self::from_raw(raw, fallback_name)
    }

    /// Parse a metadata module from YAML text.
    pub fn from_yaml(name: &str, content: &str) -> Result<Self> {
        let raw: RawModule = serde_yaml::from_str(content)
            .with_context(|| format!("Failed to parse YAML module '{}'", name))?;
        Self::from_raw(raw, name.to_string())
    }

    fn from_raw(raw: RawModule, fallback_name: String) -> Result<Self> {
        let name = raw.name.unwrap_or(fallback_name);
        let mut types = IndexMap::new();

        for raw_type in raw.types {
            let definition = convert_type(raw_type)
                .with_context(|| format!("Invalid type definition in module '{}'", name))?;
            if types.contains_key(&definition.full_name) {
                warn!(
                    "Module '{}' defines {} more than once; keeping the first",
                    name, definition.full_name
                );
                continue;
            }
            types.insert(definition.full_name.clone(), definition);
        }

        Ok(Self { name, types })
    }
}

fn convert_type(raw: RawType) -> Result<TypeDefinition> {
    let type_name = raw.name.clone();
    let parse = |text: &str| {
        TypeRef::parse(text).with_context(|| format!("Invalid type '{}' in {}", text, type_name))
    };

    let expected_arity = raw
        .name
        .split_once('`')
        .and_then(|(_, arity)| arity.parse::<usize>().ok())
        .unwrap_or(0);
    if expected_arity != raw.generic_params.len() {
        anyhow::bail!(
            "{} declares {} generic parameter(s) but its name has arity {}",
            raw.name,
            raw.generic_params.len(),
            expected_arity
        );
    }

    let bases: Vec<TypeRef> = raw.base.as_deref().map(parse).transpose()?.into_iter().collect();

    let members = raw
        .members
        .into_iter()
        .map(|m| -> Result<MemberDefinition> {
            Ok(MemberDefinition {
                ty: parse(&m.ty)?,
                name: m.name,
                annotations: m.annotations,
                description: m.description,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let fields = raw
        .fields
        .into_iter()
        .map(|f| -> Result<FieldDefinition> {
            Ok(FieldDefinition {
                ty: parse(&f.ty)?,
                name: f.name,
                is_public: f.public,
                is_static: f.is_static,
                value: f.value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TypeDefinition {
        full_name: raw.name,
        kind: raw.kind,
        generic_params: raw.generic_params,
        bases,
        members,
        enum_members: raw.enum_members,
        fields,
        description: raw.description,
    })
}

impl TypeModule for MetadataModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_type(&self, full_name: &str) -> Option<&TypeDefinition> {
        self.types.get(full_name)
    }

    fn type_count(&self) -> usize {
        self.types.len()
    }
}
