//! Document variants.
//!
//! Every operation lands in the default document. Operations carrying variant-marking tags
//! (custom tags whose name is a recognized categorizer) also land in one document per
//! distinct (categorizer, title) pair. Attributes of a pair are fixed the first time the pair
//! is seen; configuration-supplied attributes are seen before any annotation.

use crate::config::VariantOptions;
use crate::doc_tree::CustomTag;
use crate::error::VariantError;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Identity of one generated document.
///
/// Equality and hashing only consider `categorizer` and `title`; use
/// [`DocumentVariantInfo::attributes_equivalent`] to compare attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVariantInfo {
    pub categorizer: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl DocumentVariantInfo {
    pub fn new(categorizer: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            categorizer: categorizer.into(),
            title: title.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// The unfiltered document that holds every operation.
    pub fn default_variant() -> Self {
        Self::new("", "")
    }

    pub fn is_default(&self) -> bool {
        self.categorizer.is_empty() && self.title.is_empty()
    }

    /// Unordered key/value equality of the attribute mappings.
    pub fn attributes_equivalent(&self, other: &DocumentVariantInfo) -> bool {
        self.attributes == other.attributes
    }

    fn key(&self) -> (String, String) {
        (self.categorizer.clone(), self.title.clone())
    }
}

impl PartialEq for DocumentVariantInfo {
    fn eq(&self, other: &Self) -> bool {
        self.categorizer == other.categorizer && self.title == other.title
    }
}

impl Eq for DocumentVariantInfo {}

impl Hash for DocumentVariantInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.categorizer.hash(state);
        self.title.hash(state);
    }
}

impl std::fmt::Display for DocumentVariantInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_default() {
            write!(f, "default")
        } else {
            write!(f, "{}:{}", self.categorizer, self.title)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariantSource {
    Configuration,
    Annotation,
}

#[derive(Debug, Clone)]
struct KnownVariant {
    info: DocumentVariantInfo,
    source: VariantSource,
}

/// Tracks every variant seen during a run and validates repeated sightings.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    categorizers: Vec<String>,
    known: IndexMap<(String, String), KnownVariant>,
}

impl VariantRegistry {
    /// Create a registry recognizing the given categorizer names.
    pub fn new(categorizers: impl IntoIterator<Item = String>) -> Self {
        let mut registry = Self::default();
        for categorizer in categorizers {
            registry.recognize(categorizer);
        }
        registry
    }

    fn recognize(&mut self, categorizer: String) {
        if !self.categorizers.contains(&categorizer) {
            debug!("Recognizing variant categorizer: {}", categorizer);
            self.categorizers.push(categorizer);
        }
    }

    pub fn is_categorizer(&self, name: &str) -> bool {
        self.categorizers.iter().any(|c| c == name)
    }

    /// Seed the registry from external configuration.
    ///
    /// Returns the errors found; well-formed entries are registered regardless.
    pub fn register_configuration(&mut self, options: &[VariantOptions]) -> Vec<VariantError> {
        let mut errors = Vec::new();

        for entry in options {
            self.recognize(entry.categorizer.clone());

            for option in &entry.options {
                let title = match option.titles.as_slice() {
                    [title] => title.clone(),
                    [] => {
                        errors.push(VariantError::MissingVariantTitle {
                            categorizer: entry.categorizer.clone(),
                        });
                        continue;
                    }
                    titles => {
                        warn!(
                            "Categorizer '{}' lists {} titles in one entry",
                            entry.categorizer,
                            titles.len()
                        );
                        errors.push(VariantError::AmbiguousVariantName {
                            categorizer: entry.categorizer.clone(),
                            titles: titles.to_vec(),
                        });
                        continue;
                    }
                };

                let info = DocumentVariantInfo::new(entry.categorizer.clone(), title)
                    .with_attributes(option.attributes.clone());
                if let Err(err) = self.register(info, VariantSource::Configuration) {
                    errors.push(err);
                }
            }
        }

        errors
    }

    /// Register a variant seen on an operation, or validate it against the first sighting.
    ///
    /// On conflict the first-seen attributes stay in effect.
    pub fn register_or_validate(&mut self, info: DocumentVariantInfo) -> Result<(), VariantError> {
        self.register(info, VariantSource::Annotation)
    }

    fn register(&mut self, info: DocumentVariantInfo, source: VariantSource) -> Result<(), VariantError> {
        let Some(known) = self.known.get(&info.key()) else {
            debug!("First sighting of variant {} with {:?}", info, info.attributes);
            self.known.insert(info.key(), KnownVariant { info, source });
            return Ok(());
        };

        if known.info.attributes_equivalent(&info) {
            return Ok(());
        }

        // An annotation may restate part of what configuration declares.
        if known.source == VariantSource::Configuration
            && source == VariantSource::Annotation
            && info
                .attributes
                .iter()
                .all(|(k, v)| known.info.attributes.get(k) == Some(v))
        {
            return Ok(());
        }

        warn!("Conflicting attributes for variant {}", info);
        Err(VariantError::ConflictingAttributes {
            categorizer: info.categorizer.clone(),
            title: info.title.clone(),
            first: known.info.attributes.clone(),
            conflicting: info.attributes,
        })
    }

    /// The variant as it is in effect, with its first-seen or configured attributes.
    pub fn effective(&self, info: &DocumentVariantInfo) -> DocumentVariantInfo {
        self.known
            .get(&info.key())
            .map(|known| known.info.clone())
            .unwrap_or_else(|| info.clone())
    }

    /// Decide which documents an operation with these tags belongs to.
    ///
    /// The default variant always comes first. Conflicts are returned alongside; they never
    /// remove the operation from a document.
    pub fn assign_variants(&mut self, tags: &[CustomTag]) -> (Vec<DocumentVariantInfo>, Vec<VariantError>) {
        let mut variants = vec![DocumentVariantInfo::default_variant()];
        let mut errors = Vec::new();

        for tag in tags {
            if !self.is_categorizer(&tag.name) {
                continue;
            }
            let title = tag.text.as_deref().map(str::trim).unwrap_or_default();
            if title.is_empty() {
                warn!("Ignoring '{}' tag without a title", tag.name);
                continue;
            }

            let info = DocumentVariantInfo::new(tag.name.clone(), title).with_attributes(tag.children.clone());
            if let Err(err) = self.register_or_validate(info.clone()) {
                errors.push(err);
            }

            let effective = self.effective(&info);
            if !variants.contains(&effective) {
                variants.push(effective);
            }
        }

        (variants, errors)
    }

    /// All variants seen so far, in first-seen order.
    pub fn variants(&self) -> impl Iterator<Item = &DocumentVariantInfo> {
        self.known.values().map(|known| &known.info)
    }
}
