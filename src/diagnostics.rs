//! Diagnostic aggregation.
//!
//! Diagnostics accumulate while documents are generated: one [`OperationDiagnostic`] per
//! documented operation and any number of [`DocumentDiagnostic`]s for variant conflicts
//! and document post-processing failures. Status is always derived from the current
//! entries and never stored, so it stays correct while entries are still being added.

use crate::error::GenerationError;
use crate::variant::DocumentVariantInfo;
use serde::{Deserialize, Serialize};

/// Severity of a single diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Failure,
}

/// Rolled-up status. Ordered so that the maximum of a set is its rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GenerationStatus {
    Success,
    Warning,
    Failure,
}

impl From<Severity> for GenerationStatus {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => GenerationStatus::Warning,
            Severity::Failure => GenerationStatus::Failure,
        }
    }
}

impl GenerationStatus {
    /// Failure if any entry is a Failure, else Warning if any is a Warning, else Success.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DiagnosticEntry>) -> Self {
        entries
            .into_iter()
            .map(|entry| GenerationStatus::from(entry.severity))
            .max()
            .unwrap_or(GenerationStatus::Success)
    }
}

/// One recorded (exception-kind, message) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    #[serde(rename = "exceptionType")]
    pub kind: String,
    pub message: String,
    pub severity: Severity,
}

impl From<&GenerationError> for DiagnosticEntry {
    fn from(err: &GenerationError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            severity: err.severity(),
        }
    }
}

/// Diagnostics for one documented operation, across every variant it was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDiagnostic {
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub method: String,
    pub path: String,
    pub errors: Vec<DiagnosticEntry>,
}

impl OperationDiagnostic {
    pub fn new(operation_id: Option<String>, method: String, path: String) -> Self {
        Self {
            operation_id,
            method,
            path,
            errors: Vec::new(),
        }
    }

    /// Record an error. The same error raised by several variant passes is kept once.
    pub fn record(&mut self, err: &GenerationError) {
        let entry = DiagnosticEntry::from(err);
        if !self.errors.contains(&entry) {
            self.errors.push(entry);
        }
    }

    pub fn status(&self) -> GenerationStatus {
        GenerationStatus::from_entries(&self.errors)
    }
}

/// Document-level diagnostics. `variant` is `None` for run-level problems that belong to no
/// single document, such as an ambiguous configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDiagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<DocumentVariantInfo>,
    pub errors: Vec<DiagnosticEntry>,
}

impl DocumentDiagnostic {
    pub fn new(variant: Option<DocumentVariantInfo>, err: &GenerationError) -> Self {
        Self {
            variant,
            errors: vec![DiagnosticEntry::from(err)],
        }
    }

    pub fn status(&self) -> GenerationStatus {
        GenerationStatus::from_entries(&self.errors)
    }

    fn concerns_default(&self) -> bool {
        self.variant.as_ref().is_some_and(DocumentVariantInfo::is_default)
    }
}

/// Everything recorded during one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationDiagnostic {
    pub operations: Vec<OperationDiagnostic>,
    pub documents: Vec<DocumentDiagnostic>,
}

impl GenerationDiagnostic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_document_error(&mut self, variant: Option<DocumentVariantInfo>, err: &GenerationError) {
        self.documents.push(DocumentDiagnostic::new(variant, err));
    }

    /// Status of the whole run.
    pub fn overall_status(&self) -> GenerationStatus {
        rollup(&self.operations, &self.documents)
    }

    /// Status of the default document: every operation belongs to it, but only document
    /// diagnostics tagged with the default variant count.
    pub fn default_variant_status(&self) -> GenerationStatus {
        let documents: Vec<DocumentDiagnostic> = self
            .documents
            .iter()
            .filter(|d| d.concerns_default())
            .cloned()
            .collect();
        rollup(&self.operations, &documents)
    }
}

/// Roll operation-level and document-level diagnostics into one status.
pub fn rollup(operations: &[OperationDiagnostic], documents: &[DocumentDiagnostic]) -> GenerationStatus {
    let operation_entries = operations.iter().flat_map(|d| d.errors.iter());
    let document_entries = documents.iter().flat_map(|d| d.errors.iter());
    GenerationStatus::from_entries(operation_entries.chain(document_entries))
}
