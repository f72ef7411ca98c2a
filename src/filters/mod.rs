//! Processing steps applied to every operation and every finished document.
//!
//! A [`FilterPipeline`] is a plain value holding the steps in the order they run. The
//! generator receives one at construction; [`FilterPipeline::default`] gives the standard
//! steps, and tests can build a pipeline from any subset or from their own filters.

pub mod document;
pub mod operation;

use crate::config::GeneratorConfig;
use crate::doc_tree::{DocTree, HttpMethod, OperationElement};
use crate::error::{GenerationError, Result};
use crate::openapi_builder::{DocumentBuilder, Operation};
use crate::schema_generator::{ReferenceTable, SchemaGenerator};
use crate::variant::DocumentVariantInfo;

/// Everything an operation filter can see and touch during one variant pass.
pub struct OperationContext<'a> {
    pub element: &'a OperationElement,
    pub method: HttpMethod,
    pub variant: &'a DocumentVariantInfo,
    pub config: &'a GeneratorConfig,
    pub schemas: &'a mut SchemaGenerator,
    pub table: &'a mut ReferenceTable,
    /// Problems found so far; warnings and failures alike
    pub errors: Vec<GenerationError>,
}

impl OperationContext<'_> {
    /// Record a problem and keep going.
    pub fn record(&mut self, err: impl Into<GenerationError>) {
        let err = err.into();
        log::debug!("{} {}: {}", self.method.as_str(), self.element.url, err);
        self.errors.push(err);
    }
}

/// Fills in part of an operation from its documentation.
pub trait OperationFilter {
    fn name(&self) -> &'static str;

    /// Returning an error records it and moves on to the next filter.
    fn apply(&self, operation: &mut Operation, ctx: &mut OperationContext<'_>) -> Result<()>;
}

/// Read-only inputs of document post-processing.
pub struct DocumentContext<'a> {
    pub variant: &'a DocumentVariantInfo,
    pub config: &'a GeneratorConfig,
    pub doc_tree: &'a DocTree,
}

/// Post-processes a whole document once every operation has been added.
pub trait DocumentFilter {
    fn name(&self) -> &'static str;

    /// An error discards the document.
    fn apply(&self, builder: &mut DocumentBuilder, ctx: &DocumentContext<'_>) -> Result<()>;
}

/// Ordered operation and document filters.
pub struct FilterPipeline {
    pub operation_filters: Vec<Box<dyn OperationFilter>>,
    pub document_filters: Vec<Box<dyn DocumentFilter>>,
}

impl FilterPipeline {
    pub fn new(
        operation_filters: Vec<Box<dyn OperationFilter>>,
        document_filters: Vec<Box<dyn DocumentFilter>>,
    ) -> Self {
        Self {
            operation_filters,
            document_filters,
        }
    }

    /// A pipeline that does nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn with_operation_filter(mut self, filter: impl OperationFilter + 'static) -> Self {
        self.operation_filters.push(Box::new(filter));
        self
    }

    pub fn with_document_filter(mut self, filter: impl DocumentFilter + 'static) -> Self {
        self.document_filters.push(Box::new(filter));
        self
    }

    /// Run every operation filter, collecting errors into the context.
    pub fn apply_operation_filters(&self, operation: &mut Operation, ctx: &mut OperationContext<'_>) {
        for filter in &self.operation_filters {
            if let Err(err) = filter.apply(operation, ctx) {
                log::warn!("Operation filter '{}' failed: {}", filter.name(), err);
                ctx.errors.push(err);
            }
        }
    }

    /// Run every document filter, stopping at the first error.
    pub fn apply_document_filters(&self, builder: &mut DocumentBuilder, ctx: &DocumentContext<'_>) -> Result<()> {
        for filter in &self.document_filters {
            filter.apply(builder, ctx).map_err(|err| {
                log::warn!(
                    "Document filter '{}' failed for variant {}: {}",
                    filter.name(),
                    ctx.variant,
                    err
                );
                err
            })?;
        }
        Ok(())
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::empty()
            .with_operation_filter(operation::SummaryFilter)
            .with_operation_filter(operation::ParameterFilter)
            .with_operation_filter(operation::RequestBodyFilter)
            .with_operation_filter(operation::ResponseFilter)
            .with_operation_filter(operation::ExampleFilter)
            .with_document_filter(document::InfoFilter)
            .with_document_filter(document::MemberDescriptionFilter)
            .with_document_filter(document::ReferenceCheckFilter)
    }
}
