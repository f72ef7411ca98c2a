//! Source modules: type definitions read straight from Rust source code.
//!
//! Every `.rs` file under the module directory is parsed with `syn`. The module's namespace is
//! the directory name, so `struct User` in `contracts/src/user.rs` is registered as
//! `contracts.User` and a cref to it reads `T:contracts.User`.
//!
//! Mapping from Rust to type definitions:
//!
//! - named-field structs become object types; `Option<T>` fields are optional, all others
//!   always required
//! - `#[serde(skip)]` excludes a field, `#[serde(rename = "...")]` renames it
//! - `#[serde(flatten)]` fields are treated as base types, so their members are inherited
//! - enums become enum types with their variant names as members
//! - `pub const` items in inherent `impl` blocks become public static fields
//! - `///` doc comments become descriptions

use super::{
    DefinitionKind, FieldDefinition, MemberAnnotations, MemberDefinition, TypeDefinition,
    TypeModule, TypeRef,
};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A module built from a directory of Rust sources.
#[derive(Debug)]
pub struct SourceModule {
    namespace: String,
    types: IndexMap<String, TypeDefinition>,
}

impl SourceModule {
    /// Scan and parse every Rust file under `root`.
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn load(root: &Path) -> Result<Self> {
        let namespace = root
            .canonicalize()
            .with_context(|| format!("Failed to access module directory: {}", root.display()))?
            .file_name()
            .map(|n| n.to_string_lossy().replace('-', "_"))
            .unwrap_or_else(|| "crate".to_string());

        let mut files = Vec::new();
        for path in scan_rust_files(root) {
            match parse_file(&path) {
                Ok(file) => files.push(file),
                Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
            }
        }
        debug!("Parsed {} source file(s) for module {}", files.len(), namespace);

        Ok(Self::from_files(namespace, &files))
    }

    /// Build a module from already parsed files.
    pub fn from_files(namespace: String, files: &[syn::File]) -> Self {
        let mut collector = Collector::default();
        for file in files {
            collector.visit_items(&file.items);
        }

        let local: HashSet<String> = collector.types.keys().cloned().collect();
        let mut types = IndexMap::new();

        for (ident, mut definition) in collector.types {
            if let Some(fields) = collector.consts.remove(&ident) {
                definition.fields = fields;
            }
            qualify_definition(&mut definition, &namespace, &local);
            definition.full_name = qualified_name(&namespace, &ident, definition.generic_params.len());
            types.insert(definition.full_name.clone(), definition);
        }

        for ident in collector.consts.keys() {
            debug!("Ignoring constants of {} which has no type definition", ident);
        }

        Self { namespace, types }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl TypeModule for SourceModule {
    fn name(&self) -> &str {
        &self.namespace
    }

    fn find_type(&self, full_name: &str) -> Option<&TypeDefinition> {
        self.types.get(full_name)
    }

    fn type_count(&self) -> usize {
        self.types.len()
    }
}

/// Collect `.rs` files, skipping `target` and hidden directories.
fn scan_rust_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        if e.depth() == 0 {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        !name.starts_with('.') && name != "target"
    });

    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
                    files.push(path.to_path_buf());
                }
            }
            Err(e) => warn!("Failed to access path: {}", e),
        }
    }

    files.sort();
    files
}

fn parse_file(path: &Path) -> Result<syn::File> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    syn::parse_file(&content)
        .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))
}

fn qualified_name(namespace: &str, ident: &str, arity: usize) -> String {
    if arity == 0 {
        format!("{}.{}", namespace, ident)
    } else {
        format!("{}.{}`{}", namespace, ident, arity)
    }
}

/// Point references to types defined in this module at their qualified names.
fn qualify_definition(definition: &mut TypeDefinition, namespace: &str, local: &HashSet<String>) {
    let params = definition.generic_params.clone();
    let qualify = |ty: &mut TypeRef| qualify_ref(ty, namespace, local, &params);

    definition.bases.iter_mut().for_each(qualify);
    definition.members.iter_mut().for_each(|m| qualify(&mut m.ty));
    definition.fields.iter_mut().for_each(|f| qualify(&mut f.ty));
}

fn qualify_ref(ty: &mut TypeRef, namespace: &str, local: &HashSet<String>, params: &[String]) {
    if ty.as_param(params).is_none() && local.contains(&ty.name) {
        ty.name = format!("{}.{}", namespace, ty.name);
    }
    for arg in &mut ty.args {
        qualify_ref(arg, namespace, local, params);
    }
}

#[derive(Default)]
struct Collector {
    types: IndexMap<String, TypeDefinition>,
    consts: IndexMap<String, Vec<FieldDefinition>>,
}

impl Collector {
    fn visit_items(&mut self, items: &[syn::Item]) {
        for item in items {
            match item {
                syn::Item::Struct(item_struct) => self.visit_struct(item_struct),
                syn::Item::Enum(item_enum) => self.visit_enum(item_enum),
                syn::Item::Impl(item_impl) => self.visit_impl(item_impl),
                syn::Item::Mod(item_mod) => {
                    if let Some((_, nested)) = &item_mod.content {
                        self.visit_items(nested);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_struct(&mut self, item_struct: &syn::ItemStruct) {
        let ident = item_struct.ident.to_string();
        if self.types.contains_key(&ident) {
            warn!("Struct {} is defined more than once; keeping the first", ident);
            return;
        }
        debug!("Parsing struct definition: {}", ident);

        let mut definition = TypeDefinition::new(ident.clone(), DefinitionKind::Object);
        definition.generic_params = item_struct
            .generics
            .type_params()
            .map(|p| p.ident.to_string())
            .collect();
        definition.description = doc_comment(&item_struct.attrs);

        if let syn::Fields::Named(named) = &item_struct.fields {
            for field in &named.named {
                let Some(name) = field.ident.as_ref().map(|i| i.to_string()) else {
                    continue;
                };
                let serde = SerdeField::parse(&field.attrs);
                let (ty, optional) = type_ref(&field.ty);

                if serde.flatten {
                    definition.bases.push(ty);
                    continue;
                }

                definition.members.push(MemberDefinition {
                    name,
                    ty,
                    annotations: MemberAnnotations {
                        ignore: serde.skip,
                        rename: serde.rename,
                        required: !optional,
                        read_only: false,
                    },
                    description: doc_comment(&field.attrs),
                });
            }
        }

        self.types.insert(ident, definition);
    }

    fn visit_enum(&mut self, item_enum: &syn::ItemEnum) {
        let ident = item_enum.ident.to_string();
        if self.types.contains_key(&ident) {
            warn!("Enum {} is defined more than once; keeping the first", ident);
            return;
        }
        debug!("Parsing enum definition: {}", ident);

        let mut definition = TypeDefinition::new(ident.clone(), DefinitionKind::Enum);
        definition.enum_members = item_enum.variants.iter().map(|v| v.ident.to_string()).collect();
        definition.description = doc_comment(&item_enum.attrs);
        self.types.insert(ident, definition);
    }

    fn visit_impl(&mut self, item_impl: &syn::ItemImpl) {
        if item_impl.trait_.is_some() {
            return;
        }
        let syn::Type::Path(self_ty) = item_impl.self_ty.as_ref() else {
            return;
        };
        let Some(segment) = self_ty.path.segments.last() else {
            return;
        };
        let owner = segment.ident.to_string();

        for item in &item_impl.items {
            let syn::ImplItem::Const(item_const) = item else {
                continue;
            };
            let (ty, _) = type_ref(&item_const.ty);
            let value = literal_value(&item_const.expr).unwrap_or_else(|| {
                debug!("Constant {}::{} has no literal value", owner, item_const.ident);
                serde_json::Value::Null
            });

            self.consts.entry(owner.clone()).or_default().push(FieldDefinition {
                name: item_const.ident.to_string(),
                ty,
                is_public: matches!(item_const.vis, syn::Visibility::Public(_)),
                is_static: true,
                value,
            });
        }
    }
}

/// Serde attributes that affect the exposed shape of a field.
#[derive(Debug, Default)]
struct SerdeField {
    rename: Option<String>,
    skip: bool,
    flatten: bool,
}

impl SerdeField {
    fn parse(attrs: &[syn::Attribute]) -> Self {
        let mut serde = SerdeField::default();

        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            let result = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    // `rename(serialize = "..")` is left alone
                    if let Ok(value) = meta.value() {
                        let lit: syn::LitStr = value.parse()?;
                        serde.rename = Some(lit.value());
                    } else {
                        consume_rest(&meta)?;
                    }
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    serde.skip = true;
                } else if meta.path.is_ident("flatten") {
                    serde.flatten = true;
                } else {
                    consume_rest(&meta)?;
                }
                Ok(())
            });

            if let Err(e) = result {
                debug!("Ignoring unparsable serde attribute: {}", e);
            }
        }

        serde
    }
}

/// Skip over `= value` or `(...)` of a nested meta item we do not interpret.
fn consume_rest(meta: &syn::meta::ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| consume_rest(&inner))?;
    }
    Ok(())
}

/// Join `///` lines into one description.
fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect();

    let text = lines.join(" ").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Convert a field type, reporting whether it was wrapped in `Option`.
fn type_ref(ty: &syn::Type) -> (TypeRef, bool) {
    match ty {
        syn::Type::Path(type_path) => {
            let Some(segment) = type_path.path.segments.last() else {
                return (TypeRef::named("Unknown"), false);
            };
            let name = segment.ident.to_string();
            let args: Vec<TypeRef> = match &segment.arguments {
                syn::PathArguments::AngleBracketed(angle) => angle
                    .args
                    .iter()
                    .filter_map(|arg| match arg {
                        syn::GenericArgument::Type(inner) => Some(type_ref(inner).0),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };

            if name == "Option" && args.len() == 1 {
                let inner = args.into_iter().next().unwrap_or_else(|| TypeRef::named("Unknown"));
                return (inner, true);
            }
            // Smart pointers serialize as their contents
            if matches!(name.as_str(), "Box" | "Rc" | "Arc" | "Cow") {
                if let Some(inner) = args.into_iter().last() {
                    return (inner, false);
                }
                return (TypeRef::named(name), false);
            }
            (TypeRef::generic(name, args), false)
        }
        syn::Type::Reference(reference) => type_ref(&reference.elem),
        syn::Type::Paren(paren) => type_ref(&paren.elem),
        syn::Type::Group(group) => type_ref(&group.elem),
        syn::Type::Slice(slice) => {
            let (mut inner, _) = type_ref(&slice.elem);
            inner.array_rank += 1;
            (inner, false)
        }
        syn::Type::Array(array) => {
            let (mut inner, _) = type_ref(&array.elem);
            inner.array_rank += 1;
            (inner, false)
        }
        _ => (TypeRef::named("Unknown"), false),
    }
}

/// The JSON value of a literal constant expression.
fn literal_value(expr: &syn::Expr) -> Option<serde_json::Value> {
    match expr {
        syn::Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) => Some(serde_json::Value::String(s.value())),
            syn::Lit::Char(c) => Some(serde_json::Value::String(c.value().to_string())),
            syn::Lit::Bool(b) => Some(serde_json::Value::Bool(b.value)),
            syn::Lit::Int(i) => i.base10_parse::<i64>().ok().map(serde_json::Value::from),
            syn::Lit::Float(f) => f
                .base10_parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number),
            _ => None,
        },
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => match literal_value(expr)? {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(serde_json::Value::from(-i))
                } else {
                    n.as_f64()
                        .and_then(|f| serde_json::Number::from_f64(-f))
                        .map(serde_json::Value::Number)
                }
            }
            _ => None,
        },
        syn::Expr::Paren(paren) => literal_value(&paren.expr),
        syn::Expr::Group(group) => literal_value(&group.expr),
        _ => None,
    }
}
