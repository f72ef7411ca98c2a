//! Documentation tree input.
//!
//! The documentation tree is the extracted form of a service's doc comments: one element per
//! documented operation with its route, verb, parameter, response and custom tags, plus the
//! member documentation used to describe schema properties. It is read from YAML or JSON.
//!
//! # Example
//!
//! ```yaml
//! operations:
//!   - id: getUser
//!     url: /users/{id}
//!     verb: get
//!     params:
//!       - name: id
//!         in: path
//!         type: ["T:System.Int32"]
//!     responses:
//!       - code: "200"
//!         description: The user
//!         type: ["T:Contracts.User"]
//!     tags:
//!       - name: group
//!         text: Admin
//! members:
//!   - name: P:Contracts.User.Name
//!     summary: Display name
//! ```

use crate::config::is_json;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// All documented operations and member docs of a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocTree {
    #[serde(default)]
    pub operations: Vec<OperationElement>,
    #[serde(default)]
    pub members: Vec<MemberDoc>,
}

/// One documented operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationElement {
    /// Operation ID, usually the handler name
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    /// The URL template, e.g. `/users/{id}`
    pub url: String,
    /// The HTTP verb as written in the annotation
    pub verb: String,
    #[serde(default)]
    pub params: Vec<ParamTag>,
    #[serde(default)]
    pub responses: Vec<ResponseTag>,
    /// Every other tag attached to the operation
    #[serde(default)]
    pub tags: Vec<CustomTag>,
}

/// A `<param>` tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamTag {
    pub name: String,
    #[serde(rename = "in", default)]
    pub location: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub types: Vec<CrefRef>,
    #[serde(default)]
    pub example: Option<CrefRef>,
}

/// A `<response>` tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTag {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub types: Vec<CrefRef>,
    #[serde(default)]
    pub example: Option<CrefRef>,
}

/// Any tag the core does not interpret itself. Tags named after a categorizer mark variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomTag {
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: BTreeMap<String, String>,
}

/// A `<see cref="..."/>` reference, optionally naming the type parameter it binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrefRef {
    Plain(String),
    Bound {
        cref: String,
        #[serde(default)]
        typeparam: Option<String>,
    },
}

impl CrefRef {
    pub fn cref(&self) -> &str {
        match self {
            CrefRef::Plain(cref) => cref,
            CrefRef::Bound { cref, .. } => cref,
        }
    }

    pub fn type_param(&self) -> Option<&str> {
        match self {
            CrefRef::Plain(_) => None,
            CrefRef::Bound { typeparam, .. } => typeparam.as_deref(),
        }
    }
}

impl From<&str> for CrefRef {
    fn from(cref: &str) -> Self {
        CrefRef::Plain(cref.to_string())
    }
}

/// Documentation of a type member, keyed by its cref (`P:Ns.Type.Member` or `F:...`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberDoc {
    pub name: String,
    pub summary: String,
}

/// HTTP methods an operation can be documented with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Parse a verb case-insensitively.
    pub fn parse(verb: &str) -> Option<Self> {
        match verb.trim().to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl OperationElement {
    /// Label used in diagnostics when the verb is not a known method.
    pub fn method_label(&self) -> String {
        HttpMethod::parse(&self.verb)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| self.verb.to_ascii_uppercase())
    }

    /// Names of the `{placeholders}` in the URL template, in order.
    pub fn path_placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut rest = self.url.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else { break };
            let name = after[..end].trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            rest = &after[end + 1..];
        }
        names
    }

    /// The URL without any query string.
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

impl DocTree {
    /// Load a documentation tree from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading documentation tree from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read documentation file: {}", path.display()))?;

        let tree: DocTree = if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON documentation: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML documentation: {}", path.display()))?
        };

        debug!(
            "Loaded {} operations and {} member docs",
            tree.operations.len(),
            tree.members.len()
        );
        Ok(tree)
    }

    /// Look up the summary documented for a member cref.
    pub fn member_summary(&self, cref: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.name == cref)
            .map(|m| m.summary.trim())
    }
}
