use super::{DocumentContext, DocumentFilter};
use crate::error::{GenerationError, Result};
use crate::openapi_builder::DocumentBuilder;
use log::debug;

/// Fills the info section from configuration and the variant.
pub struct InfoFilter;

/// Describes schema properties from separately documented members.
pub struct MemberDescriptionFilter;

/// Fails the document if any `$ref` points at a schema it does not contain.
pub struct ReferenceCheckFilter;

const SCHEMA_POINTER_PREFIX: &str = "#/components/schemas/";

impl DocumentFilter for InfoFilter {
    fn name(&self) -> &'static str {
        "info"
    }

    fn apply(&self, builder: &mut DocumentBuilder, ctx: &DocumentContext<'_>) -> Result<()> {
        let configured = &ctx.config.info;
        let variant = ctx.variant;
        let info = builder.info_mut();

        info.title = configured.title.clone();
        info.version = configured.version.clone();
        info.description = configured.description.clone();

        if !variant.is_default() {
            info.title = format!("{} ({})", configured.title, variant.title);
            if let Some(version) = variant.attributes.get("version") {
                info.version = version.clone();
            }
            if let Some(description) = variant.attributes.get("description") {
                info.description = Some(description.clone());
            }
        }
        Ok(())
    }
}

impl DocumentFilter for MemberDescriptionFilter {
    fn name(&self) -> &'static str {
        "member-descriptions"
    }

    fn apply(&self, builder: &mut DocumentBuilder, ctx: &DocumentContext<'_>) -> Result<()> {
        let doc_tree = ctx.doc_tree;
        let filled = builder.table_mut().backfill_descriptions(|member| {
            doc_tree
                .member_summary(&format!("P:{}", member))
                .or_else(|| doc_tree.member_summary(&format!("F:{}", member)))
        });
        debug!("Backfilled {} property descriptions for {}", filled, ctx.variant);
        Ok(())
    }
}

impl DocumentFilter for ReferenceCheckFilter {
    fn name(&self) -> &'static str {
        "reference-check"
    }

    fn apply(&self, builder: &mut DocumentBuilder, _ctx: &DocumentContext<'_>) -> Result<()> {
        let schemas = builder.table().schemas();
        for reference in builder.references() {
            let resolved = reference
                .strip_prefix(SCHEMA_POINTER_PREFIX)
                .is_some_and(|key| schemas.contains_key(key));
            if !resolved {
                return Err(GenerationError::Unexpected(format!(
                    "document references missing schema '{}'",
                    reference
                )));
            }
        }
        Ok(())
    }
}
