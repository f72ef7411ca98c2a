//! Document generation.
//!
//! [`DocumentGenerator::generate`] walks the documentation tree once. Each operation is run
//! through the operation filters once per variant it belongs to; each variant owns its own
//! reference table and document builder. Once every operation has been placed, the document
//! filters post-process each variant's document.

use crate::config::GeneratorConfig;
use crate::diagnostics::{GenerationDiagnostic, OperationDiagnostic, Severity};
use crate::doc_tree::{DocTree, HttpMethod, OperationElement};
use crate::error::{DocumentationError, GenerationError, VariantError};
use crate::filters::{DocumentContext, FilterPipeline, OperationContext};
use crate::openapi_builder::{DocumentBuilder, OpenApiDocument, Operation};
use crate::schema_generator::SchemaGenerator;
use crate::type_resolver::TypeResolver;
use crate::variant::{DocumentVariantInfo, VariantRegistry};
use indexmap::IndexMap;
use log::{debug, info, warn};

/// Turns a documentation tree into one OpenAPI document per variant.
pub struct DocumentGenerator {
    config: GeneratorConfig,
    schemas: SchemaGenerator,
    pipeline: FilterPipeline,
}

/// Documents and diagnostics of one run.
#[derive(Debug)]
pub struct GenerationOutput {
    /// The default variant first, then every other variant in first-seen order
    pub documents: IndexMap<DocumentVariantInfo, OpenApiDocument>,
    pub diagnostic: GenerationDiagnostic,
}

impl DocumentGenerator {
    /// Create a generator with the standard filter pipeline.
    pub fn new(config: GeneratorConfig, resolver: TypeResolver) -> Self {
        Self {
            config,
            schemas: SchemaGenerator::new(resolver),
            pipeline: FilterPipeline::default(),
        }
    }

    /// Replace the filter pipeline.
    pub fn with_pipeline(mut self, pipeline: FilterPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate every document. Problems are recorded in the returned diagnostic; nothing
    /// short of a panic stops the run.
    pub fn generate(&mut self, doc_tree: &DocTree) -> GenerationOutput {
        let mut diagnostic = GenerationDiagnostic::new();
        let mut registry = VariantRegistry::new(self.config.categorizers.iter().cloned());

        for err in registry.register_configuration(&self.config.variants) {
            record_variant_error(&mut diagnostic, err);
        }

        let mut builders: IndexMap<DocumentVariantInfo, DocumentBuilder> = IndexMap::new();
        let default_variant = DocumentVariantInfo::default_variant();
        builders.insert(default_variant.clone(), DocumentBuilder::new(default_variant));

        info!("Generating {} operations", doc_tree.operations.len());
        for element in &doc_tree.operations {
            let operation_diagnostic = self.generate_operation(element, &mut registry, &mut builders, &mut diagnostic);
            diagnostic.operations.push(operation_diagnostic);
        }

        let mut documents = IndexMap::new();
        for (variant, mut builder) in builders {
            for (key, err) in builder.table().failures() {
                debug!("Schema {} left out of variant {}: {}", key, variant, err);
            }
            let ctx = DocumentContext {
                variant: &variant,
                config: &self.config,
                doc_tree,
            };

            let document = match self.pipeline.apply_document_filters(&mut builder, &ctx) {
                Ok(()) => builder.build(),
                Err(err) => {
                    warn!("Discarding document for variant {}: {}", variant, err);
                    diagnostic.record_document_error(Some(variant.clone()), &err);
                    OpenApiDocument::empty(builder.info().clone())
                }
            };
            documents.insert(variant, document);
        }

        info!(
            "Generated {} document(s) with status {:?}",
            documents.len(),
            diagnostic.overall_status()
        );
        GenerationOutput {
            documents,
            diagnostic,
        }
    }

    /// Run one operation through every variant it belongs to.
    fn generate_operation(
        &mut self,
        element: &OperationElement,
        registry: &mut VariantRegistry,
        builders: &mut IndexMap<DocumentVariantInfo, DocumentBuilder>,
        diagnostic: &mut GenerationDiagnostic,
    ) -> OperationDiagnostic {
        let mut operation_diagnostic =
            OperationDiagnostic::new(element.id.clone(), element.method_label(), element.path().to_string());

        let Some(method) = HttpMethod::parse(&element.verb) else {
            operation_diagnostic.record(&DocumentationError::UnsupportedVerb(element.verb.clone()).into());
            return operation_diagnostic;
        };

        let (variants, errors) = registry.assign_variants(&element.tags);
        for err in errors {
            record_variant_error(diagnostic, err);
        }

        for variant in variants {
            debug!("Processing {} {} for variant {}", method.as_str(), element.url, variant);
            let builder = builders
                .entry(variant.clone())
                .or_insert_with(|| DocumentBuilder::new(variant.clone()));

            let mut operation = Operation::default();
            let mut ctx = OperationContext {
                element,
                method,
                variant: &variant,
                config: &self.config,
                schemas: &mut self.schemas,
                table: builder.table_mut(),
                errors: Vec::new(),
            };
            self.pipeline.apply_operation_filters(&mut operation, &mut ctx);
            let errors = ctx.errors;

            for err in &errors {
                operation_diagnostic.record(err);
            }
            if errors.iter().any(|e| e.severity() == Severity::Failure) {
                debug!("Leaving {} {} out of variant {}", method.as_str(), element.url, variant);
                continue;
            }

            if let Err(err) = builder.add_operation(element.path(), method, operation) {
                operation_diagnostic.record(&err.into());
            }
        }

        operation_diagnostic
    }
}

/// Variant errors are document level; attach them to the variant they name when there is one.
fn record_variant_error(diagnostic: &mut GenerationDiagnostic, err: VariantError) {
    let variant = match &err {
        VariantError::ConflictingAttributes { categorizer, title, .. } => {
            Some(DocumentVariantInfo::new(categorizer.clone(), title.clone()))
        }
        VariantError::AmbiguousVariantName { .. } | VariantError::MissingVariantTitle { .. } => None,
    };
    diagnostic.record_document_error(variant, &GenerationError::from(err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VariantOption, VariantOptions};
    use crate::diagnostics::GenerationStatus;
    use crate::doc_tree::{CrefRef, CustomTag, ParamTag, ResponseTag};
    use crate::filters::DocumentFilter;
    use crate::module::metadata::MetadataModule;
    use crate::module::{ModuleContext, TypeModule};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    const CONTRACTS: &str = r#"
types:
  - name: Ns.User
    members:
      - name: Name
        type: System.String
      - name: Manager
        type: Ns.User
  - name: Ns.Order
    members:
      - name: Total
        type: System.Decimal
  - name: Ns.Cyclic
    members:
      - name: Back
        type: Ns.Back
      - name: Gone
        type: Ns.Gone
  - name: Ns.Back
    members:
      - name: Cyclic
        type: Ns.Cyclic
"#;

    fn create_generator(config: GeneratorConfig) -> DocumentGenerator {
        let module: Box<dyn TypeModule> = Box::new(MetadataModule::from_yaml("contracts", CONTRACTS).unwrap());
        DocumentGenerator::new(config, TypeResolver::new(ModuleContext::from_modules(vec![module])))
    }

    fn group_config() -> GeneratorConfig {
        GeneratorConfig {
            categorizers: vec!["group".to_string()],
            ..GeneratorConfig::default()
        }
    }

    fn group_tag(title: &str, attributes: &[(&str, &str)]) -> CustomTag {
        CustomTag {
            name: "group".to_string(),
            text: Some(title.to_string()),
            children: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn operation(id: &str, verb: &str, url: &str, returns: &str, tags: Vec<CustomTag>) -> OperationElement {
        OperationElement {
            id: Some(id.to_string()),
            url: url.to_string(),
            verb: verb.to_string(),
            responses: vec![ResponseTag {
                code: None,
                description: Some("OK".to_string()),
                types: vec![CrefRef::from(returns)],
                example: None,
            }],
            tags,
            ..OperationElement::default()
        }
    }

    fn doc_tree(operations: Vec<OperationElement>) -> DocTree {
        DocTree {
            operations,
            members: Vec::new(),
        }
    }

    #[test]
    fn test_single_default_document() {
        let mut generator = create_generator(GeneratorConfig::default());
        let output = generator.generate(&doc_tree(vec![
            operation("getUser", "get", "/users/{id}", "T:Ns.User", vec![]),
        ]));

        // The undocumented {id} is a failure, so the operation is left out.
        assert_eq!(output.diagnostic.overall_status(), GenerationStatus::Failure);
        let document = &output.documents[&DocumentVariantInfo::default_variant()];
        assert!(document.paths.is_empty());

        let mut generator = create_generator(GeneratorConfig::default());
        let output = generator.generate(&doc_tree(vec![
            operation("listUsers", "get", "/users", "T:Ns.User[]", vec![]),
        ]));
        assert_eq!(output.diagnostic.overall_status(), GenerationStatus::Success);
        assert_eq!(output.documents.len(), 1);

        let document = &output.documents[&DocumentVariantInfo::default_variant()];
        assert!(document.paths["/users"].get.is_some());
        let schemas = &document.components.as_ref().unwrap().schemas;
        assert_eq!(schemas.keys().collect::<Vec<_>>(), vec!["Ns.User"]);
    }

    #[test]
    fn test_operations_split_into_variants() {
        let mut generator = create_generator(group_config());
        let output = generator.generate(&doc_tree(vec![
            operation("users", "get", "/users", "T:Ns.User", vec![group_tag("Admin", &[])]),
            operation("orders", "get", "/orders", "T:Ns.Order", vec![group_tag("Shop", &[])]),
            operation("health", "get", "/health", "T:System.String", vec![]),
        ]));

        let variants: Vec<String> = output.documents.keys().map(|v| v.to_string()).collect();
        assert_eq!(variants, vec!["default", "group:Admin", "group:Shop"]);

        let default = &output.documents[&DocumentVariantInfo::default_variant()];
        assert_eq!(default.paths.len(), 3);

        let admin = &output.documents[&DocumentVariantInfo::new("group", "Admin")];
        assert_eq!(admin.paths.keys().collect::<Vec<_>>(), vec!["/users"]);
        let admin_schemas = &admin.components.as_ref().unwrap().schemas;
        assert!(admin_schemas.contains_key("Ns.User"));
        assert!(!admin_schemas.contains_key("Ns.Order"));
        assert_eq!(admin.info.title, "Generated API (Admin)");

        let shop = &output.documents[&DocumentVariantInfo::new("group", "Shop")];
        assert_eq!(shop.paths.keys().collect::<Vec<_>>(), vec!["/orders"]);
    }

    #[test]
    fn test_variant_conflict_keeps_first_mapping() {
        let mut generator = create_generator(group_config());
        let output = generator.generate(&doc_tree(vec![
            operation("a", "get", "/a", "T:Ns.User", vec![group_tag("A", &[("v", "1")])]),
            operation("b", "get", "/b", "T:Ns.User", vec![group_tag("A", &[("v", "2")])]),
        ]));

        let conflicts: Vec<_> = output
            .diagnostic
            .documents
            .iter()
            .flat_map(|d| d.errors.iter())
            .filter(|e| e.kind == "ConflictingDocumentVariantAttributes")
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].message.contains("group"));
        assert!(conflicts[0].message.contains("\"1\""));
        assert!(conflicts[0].message.contains("\"2\""));

        let (variant, document) = output
            .documents
            .get_key_value(&DocumentVariantInfo::new("group", "A"))
            .unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("v".to_string(), "1".to_string());
        assert_eq!(variant.attributes, expected);
        assert_eq!(document.paths.len(), 2);

        // Operations are unaffected; only the named variant's document level fails.
        assert!(output.diagnostic.operations.iter().all(|o| o.errors.is_empty()));
        assert_eq!(output.diagnostic.default_variant_status(), GenerationStatus::Success);
        assert_eq!(output.diagnostic.overall_status(), GenerationStatus::Failure);
    }

    #[test]
    fn test_configuration_errors_reported() {
        let mut config = group_config();
        config.variants = vec![VariantOptions {
            categorizer: "group".to_string(),
            options: vec![VariantOption {
                titles: vec!["A".to_string(), "B".to_string()],
                attributes: BTreeMap::new(),
            }],
        }];

        let mut generator = create_generator(config);
        let output = generator.generate(&doc_tree(vec![]));

        assert_eq!(output.diagnostic.documents.len(), 1);
        assert_eq!(output.diagnostic.documents[0].variant, None);
        assert_eq!(
            output.diagnostic.documents[0].errors[0].kind,
            "AmbiguousDocumentVariantName"
        );
        assert_eq!(output.documents.len(), 1);
    }

    #[test]
    fn test_failed_operation_left_out_and_diagnosed() {
        let mut generator = create_generator(GeneratorConfig::default());
        let mut broken = operation("broken", "post", "/broken", "T:Ns.Missing", vec![]);
        broken.params.push(ParamTag {
            name: "q".to_string(),
            ..ParamTag::default()
        });
        let output = generator.generate(&doc_tree(vec![
            broken,
            operation("bad-verb", "fetch", "/x", "T:Ns.User", vec![]),
        ]));

        let broken = &output.diagnostic.operations[0];
        assert_eq!(broken.method, "POST");
        assert_eq!(broken.path, "/broken");
        let kinds: Vec<&str> = broken.errors.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["MissingParameterLocation", "TypeNotFound"]);
        assert_eq!(broken.status(), GenerationStatus::Failure);

        let bad_verb = &output.diagnostic.operations[1];
        assert_eq!(bad_verb.method, "FETCH");
        assert_eq!(bad_verb.errors[0].kind, "UnsupportedVerb");

        let document = &output.documents[&DocumentVariantInfo::default_variant()];
        assert!(document.paths.is_empty());
    }

    #[test]
    fn test_failure_inside_cycle_keeps_other_operations() {
        let mut generator = create_generator(GeneratorConfig::default());
        let output = generator.generate(&doc_tree(vec![
            operation("cyclic", "get", "/cyclic", "T:Ns.Cyclic", vec![]),
            operation("health", "get", "/health", "T:System.String", vec![]),
            operation("users", "get", "/users", "T:Ns.User", vec![]),
        ]));

        let kinds: Vec<&str> = output.diagnostic.operations[0]
            .errors
            .iter()
            .map(|e| e.kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["TypeNotFound"]);
        assert!(output.diagnostic.documents.is_empty());

        let document = &output.documents[&DocumentVariantInfo::default_variant()];
        assert_eq!(document.paths.keys().collect::<Vec<_>>(), vec!["/health", "/users"]);
        let schemas = &document.components.as_ref().unwrap().schemas;
        assert_eq!(schemas.keys().collect::<Vec<_>>(), vec!["Ns.User"]);
        assert!(document
            .references()
            .iter()
            .all(|r| r.trim_start_matches("#/components/schemas/") == "Ns.User"));
    }

    #[test]
    fn test_warnings_keep_operation() {
        let mut generator = create_generator(GeneratorConfig::default());
        let mut element = operation("search", "get", "/search", "T:Ns.User[]", vec![]);
        element.params.push(ParamTag {
            name: "q".to_string(),
            ..ParamTag::default()
        });
        let output = generator.generate(&doc_tree(vec![element]));

        assert_eq!(output.diagnostic.overall_status(), GenerationStatus::Warning);
        let document = &output.documents[&DocumentVariantInfo::default_variant()];
        let parameters = &document.paths["/search"].get.as_ref().unwrap().parameters;
        assert_eq!(parameters[0].location, "query");
    }

    #[test]
    fn test_duplicate_operation_recorded() {
        let mut generator = create_generator(GeneratorConfig::default());
        let output = generator.generate(&doc_tree(vec![
            operation("a", "get", "/users", "T:Ns.User", vec![]),
            operation("b", "GET", "/users", "T:Ns.User", vec![]),
        ]));

        assert_eq!(output.diagnostic.operations[1].errors[0].kind, "DuplicateOperation");
        let document = &output.documents[&DocumentVariantInfo::default_variant()];
        let kept = document.paths["/users"].get.as_ref().unwrap();
        assert_eq!(kept.operation_id.as_deref(), Some("a"));
    }

    struct FailingFilter;

    impl DocumentFilter for FailingFilter {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn apply(&self, builder: &mut DocumentBuilder, _ctx: &DocumentContext<'_>) -> crate::error::Result<()> {
            if builder.variant().is_default() {
                return Ok(());
            }
            Err(GenerationError::Unexpected("boom".to_string()))
        }
    }

    #[test]
    fn test_document_filter_failure_empties_document() {
        let pipeline = FilterPipeline::default().with_document_filter(FailingFilter);
        let mut generator = create_generator(group_config()).with_pipeline(pipeline);
        let output = generator.generate(&doc_tree(vec![operation(
            "users",
            "get",
            "/users",
            "T:Ns.User",
            vec![group_tag("Admin", &[])],
        )]));

        let admin_variant = DocumentVariantInfo::new("group", "Admin");
        let admin = &output.documents[&admin_variant];
        assert!(admin.paths.is_empty());
        assert!(admin.components.is_none());
        assert_eq!(admin.info.title, "Generated API (Admin)");

        let default = &output.documents[&DocumentVariantInfo::default_variant()];
        assert_eq!(default.paths.len(), 1);

        assert_eq!(output.diagnostic.documents.len(), 1);
        assert_eq!(output.diagnostic.documents[0].variant, Some(admin_variant));
        assert_eq!(output.diagnostic.documents[0].errors[0].kind, "Unexpected");
        assert_eq!(output.diagnostic.default_variant_status(), GenerationStatus::Success);
        assert_eq!(output.diagnostic.overall_status(), GenerationStatus::Failure);
    }

    #[test]
    fn test_empty_pipeline_adds_bare_operations() {
        let mut generator = create_generator(GeneratorConfig::default()).with_pipeline(FilterPipeline::empty());
        let output = generator.generate(&doc_tree(vec![operation("a", "get", "/users/{id}", "T:Ns.User", vec![])]));

        assert_eq!(output.diagnostic.overall_status(), GenerationStatus::Success);
        let document = &output.documents[&DocumentVariantInfo::default_variant()];
        let op = document.paths["/users/{id}"].get.as_ref().unwrap();
        assert!(op.responses.is_empty());
        assert!(document.components.is_none());
    }
}
