//! Type modules searched when resolving crefs.
//!
//! A module is anything that can answer "is there a type with this full name, and what does
//! it look like". Two kinds are supported:
//!
//! - [`metadata::MetadataModule`] - serialized type metadata in a `.json`/`.yaml` file
//! - [`source::SourceModule`] - a directory of Rust sources parsed with `syn`
//!
//! Modules are searched in the order they were given; the first module that defines a name
//! wins. A [`ModuleContext`] owns the loaded modules for the duration of one generation run
//! and releases them when dropped, so nothing about one run's search path outlives it.

pub mod metadata;
pub mod source;

use crate::cref::CrefToken;
use crate::error::CrefError;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A loaded module of type definitions.
pub trait TypeModule: std::fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Look up a definition by full name (generic definitions carry a backtick arity suffix).
    fn find_type(&self, full_name: &str) -> Option<&TypeDefinition>;

    /// Number of definitions in the module
    fn type_count(&self) -> usize;
}

/// Structural kind of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Object,
    Enum,
    Primitive,
}

/// A type as found in a module.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    /// Fully qualified name, e.g. `Contracts.Box`1`
    pub full_name: String,
    pub kind: DefinitionKind,
    /// Type parameter names in declaration order
    pub generic_params: Vec<String>,
    /// Types whose members this type inherits, nearest first
    pub bases: Vec<TypeRef>,
    /// Members declared by this type itself
    pub members: Vec<MemberDefinition>,
    /// Symbolic member names of an enum, in declaration order
    pub enum_members: Vec<String>,
    /// Fields with constant values
    pub fields: Vec<FieldDefinition>,
    pub description: Option<String>,
}

/// A serializable member of an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub annotations: MemberAnnotations,
    pub description: Option<String>,
}

/// Serialization annotations on a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberAnnotations {
    /// Excluded from serialization
    pub ignore: bool,
    /// Exposed under this name instead of the member name
    pub rename: Option<String>,
    /// Always required
    pub required: bool,
    /// Has a getter but no setter
    pub read_only: bool,
}

/// A field carrying a literal value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub is_public: bool,
    pub is_static: bool,
    pub value: serde_json::Value,
}

/// A reference to a type from inside a definition, e.g. a member type.
///
/// A reference without arguments whose name is one of the declaring type's generic
/// parameters refers to that parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeRef>,
    pub array_rank: usize,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            array_rank: 0,
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
            array_rank: 0,
        }
    }

    /// Parse the type part of a cref, e.g. `Ns.Box{Ns.Item}[]`.
    pub fn parse(text: &str) -> std::result::Result<Self, CrefError> {
        let token = CrefToken::parse(&format!("T:{}", text.trim()))?;
        if token.arity > 0 && token.inline_args.is_empty() {
            return Err(CrefError::Malformed {
                cref: text.to_string(),
                reason: "type references must spell out their generic arguments".to_string(),
            });
        }
        Ok(Self::from(&token))
    }

    /// Name under which the referenced definition is registered.
    pub fn definition_name(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{}`{}", self.name, self.args.len())
        }
    }

    /// Whether this refers to a type parameter in `params`.
    pub fn as_param<'a>(&self, params: &'a [String]) -> Option<&'a str> {
        if self.args.is_empty() {
            params.iter().find(|p| **p == self.name).map(String::as_str)
        } else {
            None
        }
    }
}

impl From<&CrefToken> for TypeRef {
    fn from(token: &CrefToken) -> Self {
        Self {
            name: token.name.clone(),
            args: token.inline_args.iter().map(TypeRef::from).collect(),
            array_rank: token.array_rank,
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "{{{}}}", args.join(","))?;
        }
        for _ in 0..self.array_rank {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

impl TypeDefinition {
    pub fn new(full_name: impl Into<String>, kind: DefinitionKind) -> Self {
        Self {
            full_name: full_name.into(),
            kind,
            generic_params: Vec::new(),
            bases: Vec::new(),
            members: Vec::new(),
            enum_members: Vec::new(),
            fields: Vec::new(),
            description: None,
        }
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The ordered set of modules searched during one generation run.
#[derive(Debug)]
pub struct ModuleContext {
    modules: Vec<Box<dyn TypeModule>>,
}

impl ModuleContext {
    /// Load every module on the search path, in order.
    ///
    /// Directories load as source modules; files load as metadata modules.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut modules: Vec<Box<dyn TypeModule>> = Vec::with_capacity(paths.len());

        for path in paths {
            let module = load_module(path)
                .with_context(|| format!("Failed to load module: {}", path.display()))?;
            info!("Loaded module '{}' with {} types", module.name(), module.type_count());
            modules.push(module);
        }

        Ok(Self { modules })
    }

    pub fn from_modules(modules: Vec<Box<dyn TypeModule>>) -> Self {
        Self { modules }
    }

    /// Find a definition in the first module that has it.
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDefinition> {
        self.modules.iter().find_map(|module| {
            let found = module.find_type(full_name);
            if found.is_some() {
                debug!("Found {} in module {}", full_name, module.name());
            }
            found
        })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Drop for ModuleContext {
    fn drop(&mut self) {
        debug!("Releasing module context with {} module(s)", self.modules.len());
    }
}

fn load_module(path: &Path) -> Result<Box<dyn TypeModule>> {
    if path.is_dir() {
        Ok(Box::new(source::SourceModule::load(path)?))
    } else {
        Ok(Box::new(metadata::MetadataModule::load(path)?))
    }
}
