use super::{OperationContext, OperationFilter};
use crate::config::GeneratorConfig;
use crate::doc_tree::{ParamTag, ResponseTag};
use crate::error::{DocumentationError, GenerationError, Result};
use crate::openapi_builder::{MediaType, Operation, Parameter, RequestBody, Response};
use crate::schema_generator::Schema;
use indexmap::IndexMap;
use log::{debug, warn};

/// Copies the operation id, summary and remarks.
pub struct SummaryFilter;

/// Builds path, query and header parameters and checks them against the URL.
pub struct ParameterFilter;

/// Builds the request body from the `in: body` parameter.
pub struct RequestBodyFilter;

/// Builds responses, one per documented status code.
pub struct ResponseFilter;

/// Attaches example values taken from static fields.
pub struct ExampleFilter;

const SUPPORTED_LOCATIONS: &[&str] = &["path", "query", "header"];

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn location_of(param: &ParamTag) -> Option<String> {
    param
        .location
        .as_deref()
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| !l.is_empty())
}

fn is_body(param: &ParamTag) -> bool {
    location_of(param).as_deref() == Some("body")
}

fn response_code(tag: &ResponseTag, config: &GeneratorConfig) -> String {
    non_empty(tag.code.as_deref()).unwrap_or_else(|| config.default_response_code.clone())
}

fn content(config: &GeneratorConfig, schema: Schema) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(
        config.content_type.clone(),
        MediaType {
            schema,
            example: None,
        },
    );
    content
}

impl OperationFilter for SummaryFilter {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn apply(&self, operation: &mut Operation, ctx: &mut OperationContext<'_>) -> Result<()> {
        operation.operation_id = non_empty(ctx.element.id.as_deref());
        operation.summary = non_empty(ctx.element.summary.as_deref());
        operation.description = non_empty(ctx.element.remarks.as_deref());
        Ok(())
    }
}

impl OperationFilter for ParameterFilter {
    fn name(&self) -> &'static str {
        "parameters"
    }

    fn apply(&self, operation: &mut Operation, ctx: &mut OperationContext<'_>) -> Result<()> {
        let element = ctx.element;
        let placeholders = element.path_placeholders();
        let mut documented_path = Vec::new();

        for param in element.params.iter().filter(|p| !is_body(p)) {
            let location = match location_of(param) {
                Some(location) if SUPPORTED_LOCATIONS.contains(&location.as_str()) => location,
                Some(location) => {
                    ctx.record(DocumentationError::UnsupportedParameterLocation {
                        name: param.name.clone(),
                        location,
                    });
                    continue;
                }
                None => {
                    let inferred = if placeholders.contains(&param.name) { "path" } else { "query" };
                    ctx.record(DocumentationError::MissingParameterLocation {
                        name: param.name.clone(),
                        inferred: inferred.to_string(),
                    });
                    inferred.to_string()
                }
            };

            let conflicts = match location.as_str() {
                "path" => operation
                    .parameters
                    .iter()
                    .any(|p| p.name == param.name && p.location == "query"),
                "query" => {
                    placeholders.contains(&param.name)
                        || operation
                            .parameters
                            .iter()
                            .any(|p| p.name == param.name && p.location == "path")
                }
                _ => false,
            };
            if conflicts {
                ctx.record(DocumentationError::ConflictingPathAndQueryParameters {
                    name: param.name.clone(),
                });
                continue;
            }

            let schema = if param.types.is_empty() {
                Schema::of_type("string")
            } else {
                match ctx.schemas.resolve_crefs(&param.types, ctx.table) {
                    Ok(schema) => schema,
                    Err(err) => {
                        ctx.record(err);
                        continue;
                    }
                }
            };

            let required = location == "path" || param.required.unwrap_or(false);
            if location == "path" {
                documented_path.push(param.name.clone());
            }

            debug!("Adding {} parameter: {}", location, param.name);
            operation.parameters.push(Parameter {
                name: param.name.clone(),
                location,
                required,
                description: non_empty(param.description.as_deref()),
                schema,
                example: None,
            });
        }

        for placeholder in placeholders {
            let conflicted = ctx.errors.iter().any(|e| {
                matches!(e, GenerationError::Documentation(
                    DocumentationError::ConflictingPathAndQueryParameters { name }
                ) if *name == placeholder)
            });
            if !documented_path.contains(&placeholder) && !conflicted {
                ctx.record(DocumentationError::UndocumentedPathParameter { name: placeholder });
            }
        }

        Ok(())
    }
}

impl OperationFilter for RequestBodyFilter {
    fn name(&self) -> &'static str {
        "request-body"
    }

    fn apply(&self, operation: &mut Operation, ctx: &mut OperationContext<'_>) -> Result<()> {
        let element = ctx.element;
        let bodies: Vec<&ParamTag> = element.params.iter().filter(|p| is_body(p)).collect();

        let body = match bodies.as_slice() {
            [] => return Ok(()),
            [body] => *body,
            _ => return Err(DocumentationError::MultipleRequestBodies.into()),
        };

        if body.types.is_empty() {
            return Err(DocumentationError::MissingParameterType {
                name: body.name.clone(),
            }
            .into());
        }

        let description = non_empty(body.description.as_deref());
        if description.is_none() {
            ctx.record(DocumentationError::MissingRequestBodyDescription);
        }

        let schema = ctx.schemas.resolve_crefs(&body.types, ctx.table)?;
        operation.request_body = Some(RequestBody {
            description,
            required: body.required.unwrap_or(true),
            content: content(ctx.config, schema),
        });
        Ok(())
    }
}

impl OperationFilter for ResponseFilter {
    fn name(&self) -> &'static str {
        "responses"
    }

    fn apply(&self, operation: &mut Operation, ctx: &mut OperationContext<'_>) -> Result<()> {
        let element = ctx.element;

        for tag in &element.responses {
            let code = response_code(tag, ctx.config);

            let Some(description) = non_empty(tag.description.as_deref()) else {
                ctx.record(DocumentationError::MissingResponseDescription { code });
                continue;
            };

            let content = if tag.types.is_empty() {
                None
            } else {
                match ctx.schemas.resolve_crefs(&tag.types, ctx.table) {
                    Ok(schema) => Some(content(ctx.config, schema)),
                    Err(err) => {
                        ctx.record(err);
                        continue;
                    }
                }
            };

            if operation.responses.contains_key(&code) {
                warn!("Response {} documented more than once; keeping the first", code);
                continue;
            }
            operation.responses.insert(code, Response { description, content });
        }

        if element.responses.is_empty() {
            operation.responses.insert(
                ctx.config.default_response_code.clone(),
                Response {
                    description: "Success".to_string(),
                    content: None,
                },
            );
        }

        Ok(())
    }
}

impl OperationFilter for ExampleFilter {
    fn name(&self) -> &'static str {
        "examples"
    }

    fn apply(&self, operation: &mut Operation, ctx: &mut OperationContext<'_>) -> Result<()> {
        let element = ctx.element;

        for param in &element.params {
            let Some(example) = &param.example else { continue };
            let value = match ctx.schemas.resolver_mut().resolve_field(example) {
                Ok((_, value)) => value,
                Err(err) => {
                    ctx.record(err);
                    continue;
                }
            };

            if is_body(param) {
                if let Some(body) = operation.request_body.as_mut() {
                    body.content.values_mut().for_each(|m| m.example = Some(value.clone()));
                }
            } else if let Some(target) = operation.parameters.iter_mut().find(|p| p.name == param.name) {
                target.example = Some(value);
            }
        }

        for tag in &element.responses {
            let Some(example) = &tag.example else { continue };
            let value = match ctx.schemas.resolver_mut().resolve_field(example) {
                Ok((_, value)) => value,
                Err(err) => {
                    ctx.record(err);
                    continue;
                }
            };

            let code = response_code(tag, ctx.config);
            let media = operation
                .responses
                .get_mut(&code)
                .and_then(|r| r.content.as_mut())
                .into_iter()
                .flat_map(|c| c.values_mut());
            for media in media {
                media.example = Some(value.clone());
            }
        }

        Ok(())
    }
}
