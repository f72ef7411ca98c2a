use crate::doc_tree::HttpMethod;
use crate::error::DocumentationError;
use crate::schema_generator::{ReferenceTable, Schema};
use crate::variant::DocumentVariantInfo;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Builder for the document of one variant
pub struct DocumentBuilder {
    variant: DocumentVariantInfo,
    /// OpenAPI info section
    info: Info,
    /// Paths collection (URL path -> PathItem)
    paths: IndexMap<String, PathItem>,
    /// Reference-type schemas of this variant
    table: ReferenceTable,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Operation description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Operation ID
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameters (path, query, header)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Request body
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: IndexMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter location (path, query, header)
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the parameter is required
    pub required: bool,
    /// Parameter description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameter schema
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Request body description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the request body is required
    pub required: bool,
    /// Content types and their schemas
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    /// Schema for this media type
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response description
    pub description: String,
    /// Response content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Schema definitions
    pub schemas: IndexMap<String, Schema>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    /// API paths
    pub paths: IndexMap<String, PathItem>,
    /// Components (schemas, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

impl PathItem {
    pub fn get_operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.slot(method).as_ref()
    }

    fn slot(&self, method: HttpMethod) -> &Option<Operation> {
        match method {
            HttpMethod::Get => &self.get,
            HttpMethod::Post => &self.post,
            HttpMethod::Put => &self.put,
            HttpMethod::Delete => &self.delete,
            HttpMethod::Patch => &self.patch,
            HttpMethod::Options => &self.options,
            HttpMethod::Head => &self.head,
        }
    }

    fn slot_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    /// All operations of this path
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.post,
            &self.put,
            &self.delete,
            &self.patch,
            &self.options,
            &self.head,
        ]
        .into_iter()
        .flatten()
    }
}

impl OpenApiDocument {
    /// A document with no paths, used when post-processing failed
    pub fn empty(info: Info) -> Self {
        Self {
            openapi: "3.0.0".to_string(),
            info,
            paths: IndexMap::new(),
            components: None,
        }
    }

    /// Every `$ref` used anywhere in the document
    pub fn references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        collect_path_refs(&self.paths, &mut refs);
        if let Some(components) = &self.components {
            for schema in components.schemas.values() {
                collect_refs(schema, &mut refs);
            }
        }
        refs
    }
}

fn collect_path_refs(paths: &IndexMap<String, PathItem>, refs: &mut Vec<String>) {
    for item in paths.values() {
        for operation in item.operations() {
            for parameter in &operation.parameters {
                collect_refs(&parameter.schema, refs);
            }
            if let Some(body) = &operation.request_body {
                for media in body.content.values() {
                    collect_refs(&media.schema, refs);
                }
            }
            for response in operation.responses.values() {
                for media in response.content.iter().flat_map(|c| c.values()) {
                    collect_refs(&media.schema, refs);
                }
            }
        }
    }
}

fn collect_refs(schema: &Schema, refs: &mut Vec<String>) {
    if let Some(reference) = &schema.reference {
        if !refs.contains(reference) {
            refs.push(reference.clone());
        }
    }
    for property in schema.properties.iter().flat_map(|p| p.values()) {
        collect_refs(property, refs);
    }
    if let Some(items) = &schema.items {
        collect_refs(items, refs);
    }
    if let Some(values) = &schema.additional_properties {
        collect_refs(values, refs);
    }
}

impl DocumentBuilder {
    /// Create a builder for a variant with default info
    pub fn new(variant: DocumentVariantInfo) -> Self {
        debug!("Initializing DocumentBuilder for variant {}", variant);
        Self {
            variant,
            info: Info::default(),
            paths: IndexMap::new(),
            table: ReferenceTable::new(),
        }
    }

    pub fn variant(&self) -> &DocumentVariantInfo {
        &self.variant
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut Info {
        &mut self.info
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ReferenceTable {
        &mut self.table
    }

    pub fn paths(&self) -> &IndexMap<String, PathItem> {
        &self.paths
    }

    /// Every `$ref` used by the operations added so far and by the schemas in the table
    pub fn references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        collect_path_refs(&self.paths, &mut refs);
        for schema in self.table.schemas().values() {
            collect_refs(schema, &mut refs);
        }
        refs
    }

    /// Add an operation under its path and method
    pub fn add_operation(
        &mut self,
        path: &str,
        method: HttpMethod,
        operation: Operation,
    ) -> Result<(), DocumentationError> {
        let openapi_path = Self::convert_path_format(path);
        debug!("Adding operation: {} {}", method.as_str(), openapi_path);

        let path_item = self.paths.entry(openapi_path.clone()).or_default();
        let slot = path_item.slot_mut(method);
        if slot.is_some() {
            return Err(DocumentationError::DuplicateOperation {
                method: method.as_str().to_string(),
                path: openapi_path,
            });
        }
        *slot = Some(operation);
        Ok(())
    }

    /// Convert path format from :param or {param} to OpenAPI {param} format
    pub fn convert_path_format(path: &str) -> String {
        path.split('/')
            .map(|part| match part.strip_prefix(':') {
                Some(name) => format!("{{{}}}", name),
                None => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Build the final OpenAPI document, with components taken from the reference table
    pub fn build(self) -> OpenApiDocument {
        debug!("Building OpenAPI document for variant {}", self.variant);

        let schemas = self.table.schemas();
        let components = if schemas.is_empty() {
            None
        } else {
            Some(Components { schemas })
        };

        OpenApiDocument {
            openapi: "3.0.0".to_string(),
            info: self.info,
            paths: self.paths,
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_generator::SchemaKey;

    fn response(description: &str) -> Response {
        Response {
            description: description.to_string(),
            content: None,
        }
    }

    fn operation(id: &str) -> Operation {
        let mut responses = IndexMap::new();
        responses.insert("200".to_string(), response("OK"));
        Operation {
            operation_id: Some(id.to_string()),
            responses,
            ..Operation::default()
        }
    }

    #[test]
    fn test_convert_path_format() {
        assert_eq!(DocumentBuilder::convert_path_format("/users/:id"), "/users/{id}");
        assert_eq!(DocumentBuilder::convert_path_format("/users/{id}"), "/users/{id}");
        assert_eq!(
            DocumentBuilder::convert_path_format("/a/:b/c/:d"),
            "/a/{b}/c/{d}"
        );
    }

    #[test]
    fn test_add_operations_to_same_path() {
        let mut builder = DocumentBuilder::new(DocumentVariantInfo::default_variant());
        builder.add_operation("/users/:id", HttpMethod::Get, operation("get")).unwrap();
        builder.add_operation("/users/{id}", HttpMethod::Delete, operation("delete")).unwrap();

        let document = builder.build();
        assert_eq!(document.paths.len(), 1);
        let item = &document.paths["/users/{id}"];
        assert!(item.get.is_some());
        assert!(item.delete.is_some());
        assert_eq!(item.operations().count(), 2);
        assert!(document.components.is_none());
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let mut builder = DocumentBuilder::new(DocumentVariantInfo::default_variant());
        builder.add_operation("/items", HttpMethod::Get, operation("a")).unwrap();
        let err = builder
            .add_operation("/items", HttpMethod::Get, operation("b"))
            .unwrap_err();
        assert_eq!(
            err,
            DocumentationError::DuplicateOperation {
                method: "GET".to_string(),
                path: "/items".to_string(),
            }
        );
        let kept = builder.paths()["/items"].get_operation(HttpMethod::Get).unwrap();
        assert_eq!(kept.operation_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_references_are_collected() {
        let mut op = operation("list");
        let mut content = IndexMap::new();
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema: Schema {
                    items: Some(Box::new(Schema::reference(&SchemaKey::for_handle(
                        &crate::type_resolver::TypeHandle {
                            name: "Ns.Item".to_string(),
                            kind: crate::type_resolver::TypeKind::Object,
                            args: Vec::new(),
                        },
                    )))),
                    ..Schema::of_type("array")
                },
                example: None,
            },
        );
        op.responses.insert("201".to_string(), Response {
            description: "Created".to_string(),
            content: Some(content),
        });

        let mut builder = DocumentBuilder::new(DocumentVariantInfo::default_variant());
        builder.add_operation("/items", HttpMethod::Post, op).unwrap();
        let document = builder.build();

        assert_eq!(document.references(), vec!["#/components/schemas/Ns.Item".to_string()]);
    }

    #[test]
    fn test_empty_document() {
        let document = OpenApiDocument::empty(Info::default());
        assert_eq!(document.openapi, "3.0.0");
        assert!(document.paths.is_empty());
        assert!(document.components.is_none());
    }
}
