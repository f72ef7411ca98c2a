//! Error types raised while turning documentation and type metadata into OpenAPI documents.
//!
//! None of these abort a generation run on their own. The generator catches them at the
//! operation or document boundary and records them as diagnostics, using [`GenerationError::kind`]
//! as the exception-kind tag and [`GenerationError::severity`] to decide Failure vs Warning.

use crate::diagnostics::Severity;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for generation steps
pub type Result<T> = std::result::Result<T, GenerationError>;

/// A cref token could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrefError {
    #[error("ill-formed cref '{0}': expected '<kind>:<name>'")]
    MissingKind(String),

    #[error("ill-formed cref '{cref}': unknown kind marker '{kind}'")]
    UnknownKind { cref: String, kind: String },

    #[error("ill-formed cref '{cref}': {reason}")]
    Malformed { cref: String, reason: String },
}

/// A cref could not be turned into a type handle or field value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Cref(#[from] CrefError),

    #[error("no type cref was documented")]
    NoCref,

    #[error("cref '{0}' does not identify a type")]
    NotAType(String),

    #[error("cref '{0}' does not identify a field")]
    NotAField(String),

    #[error("type '{name}' was not found in any of {searched} searched module(s)")]
    TypeNotFound { name: String, searched: usize },

    #[error("field '{field}' was not found on type '{type_name}'")]
    FieldNotFound { type_name: String, field: String },

    #[error("field '{field}' on type '{type_name}' is not public and static")]
    FieldNotStatic { type_name: String, field: String },

    #[error(
        "generic arguments of '{type_name}' are out of order: position {position} binds \
         '{expected}' but the documented argument binds '{found}'"
    )]
    UnorderedGenericArguments {
        type_name: String,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("generic type '{type_name}' expects {expected} type argument(s) but {found} were documented")]
    GenericArgumentCount {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("type parameter '{param}' of '{type_name}' has no bound argument")]
    UnboundTypeParameter { type_name: String, param: String },
}

/// Schema generation failed for a type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("schema '{key}' could not be generated: {message}")]
    Poisoned { key: String, message: String },

    #[error("type '{0}' has no definition to generate a schema from")]
    MissingDefinition(String),
}

/// The annotations of an operation are structurally wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentationError {
    #[error("path parameter '{name}' appears in the url but is not documented")]
    UndocumentedPathParameter { name: String },

    #[error("parameter '{name}' is documented as both a path and a query parameter")]
    ConflictingPathAndQueryParameters { name: String },

    #[error("parameter '{name}' has unsupported location '{location}'")]
    UnsupportedParameterLocation { name: String, location: String },

    #[error("parameter '{name}' has no location; inferred '{inferred}'")]
    MissingParameterLocation { name: String, inferred: String },

    #[error("parameter '{name}' has no documented type")]
    MissingParameterType { name: String },

    #[error("response '{code}' has no description")]
    MissingResponseDescription { code: String },

    #[error("request body has no description")]
    MissingRequestBodyDescription,

    #[error("more than one request body was documented")]
    MultipleRequestBodies,

    #[error("verb '{0}' is not a supported HTTP method")]
    UnsupportedVerb(String),

    #[error("operation {method} {path} is documented more than once")]
    DuplicateOperation { method: String, path: String },
}

/// Variant metadata is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    #[error(
        "variant '{title}' of categorizer '{categorizer}' has conflicting attributes: \
         first seen {first:?}, later {conflicting:?}"
    )]
    ConflictingAttributes {
        categorizer: String,
        title: String,
        first: BTreeMap<String, String>,
        conflicting: BTreeMap<String, String>,
    },

    #[error("categorizer '{categorizer}' names more than one variant in a single configuration entry: {}", titles.join(", "))]
    AmbiguousVariantName {
        categorizer: String,
        titles: Vec<String>,
    },

    #[error("categorizer '{categorizer}' has a configuration entry without a title")]
    MissingVariantTitle { categorizer: String },
}

/// Any error that can be recorded as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Documentation(#[from] DocumentationError),

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<ResolutionError> for GenerationError {
    fn from(err: ResolutionError) -> Self {
        GenerationError::Schema(SchemaError::Resolution(err))
    }
}

impl From<CrefError> for GenerationError {
    fn from(err: CrefError) -> Self {
        ResolutionError::Cref(err).into()
    }
}

impl ResolutionError {
    fn kind(&self) -> &'static str {
        match self {
            ResolutionError::Cref(_) | ResolutionError::NoCref => "InvalidCref",
            ResolutionError::NotAType(_) => "InvalidCref",
            ResolutionError::NotAField(_) => "InvalidCref",
            ResolutionError::TypeNotFound { .. } => "TypeNotFound",
            ResolutionError::FieldNotFound { .. } => "FieldNotFound",
            ResolutionError::FieldNotStatic { .. } => "FieldNotFound",
            ResolutionError::UnorderedGenericArguments { .. } => "UnorderedGenericType",
            ResolutionError::GenericArgumentCount { .. } => "MissingGenericArguments",
            ResolutionError::UnboundTypeParameter { .. } => "UnboundTypeParameter",
        }
    }
}

impl GenerationError {
    /// The exception-kind tag recorded alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Schema(SchemaError::Resolution(e)) => e.kind(),
            GenerationError::Schema(SchemaError::Poisoned { .. }) => "SchemaGenerationFailed",
            GenerationError::Schema(SchemaError::MissingDefinition(_)) => "TypeNotFound",
            GenerationError::Documentation(e) => match e {
                DocumentationError::UndocumentedPathParameter { .. } => "UndocumentedPathParameter",
                DocumentationError::ConflictingPathAndQueryParameters { .. } => {
                    "ConflictingPathAndQueryParameters"
                }
                DocumentationError::UnsupportedParameterLocation { .. } => {
                    "UnsupportedParameterLocation"
                }
                DocumentationError::MissingParameterLocation { .. } => "MissingParameterLocation",
                DocumentationError::MissingParameterType { .. } => "MissingParameterType",
                DocumentationError::MissingResponseDescription { .. } => {
                    "MissingResponseDescription"
                }
                DocumentationError::MissingRequestBodyDescription => "MissingRequestDescription",
                DocumentationError::MultipleRequestBodies => "MultipleRequestBodies",
                DocumentationError::UnsupportedVerb(_) => "UnsupportedVerb",
                DocumentationError::DuplicateOperation { .. } => "DuplicateOperation",
            },
            GenerationError::Variant(VariantError::ConflictingAttributes { .. }) => {
                "ConflictingDocumentVariantAttributes"
            }
            GenerationError::Variant(VariantError::AmbiguousVariantName { .. }) => {
                "AmbiguousDocumentVariantName"
            }
            GenerationError::Variant(VariantError::MissingVariantTitle { .. }) => {
                "MissingDocumentVariantTitle"
            }
            GenerationError::Unexpected(_) => "Unexpected",
        }
    }

    /// Whether the error prevents a correct document or can be worked around.
    pub fn severity(&self) -> Severity {
        match self {
            GenerationError::Documentation(DocumentationError::MissingParameterLocation { .. })
            | GenerationError::Documentation(DocumentationError::MissingRequestBodyDescription) => {
                Severity::Warning
            }
            _ => Severity::Failure,
        }
    }
}
