use crate::cref::{CrefKind, CrefToken};
use crate::doc_tree::CrefRef;
use crate::error::{CrefError, ResolutionError};
use crate::module::{DefinitionKind, ModuleContext, TypeDefinition, TypeRef};
use log::{debug, warn};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, ResolutionError>;

/// Type descriptor resolver - turns crefs into type handles by searching the module context
pub struct TypeResolver {
    /// Modules searched in order, owned for the duration of the run
    context: ModuleContext,
    /// Cache of resolved crefs
    handle_cache: HashMap<String, TypeHandle>,
}

/// A resolved type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    /// Canonical full name without arity, e.g. `Contracts.Box`
    pub name: String,
    /// Structural kind
    pub kind: TypeKind,
    /// Type arguments in declaration order (element type for collections,
    /// key and value for dictionaries)
    pub args: Vec<TypeHandle>,
}

/// Type kind - represents different categories of types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A primitive mapped to a fixed type/format pair
    Primitive(PrimitiveType),
    /// An enum with symbolic members
    Enum,
    /// An array or list
    Collection,
    /// A map keyed by strings
    Dictionary,
    /// An object type without type parameters
    Object,
    /// An instantiation of a generic object type
    Generic,
}

/// Primitive types supported
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Decimal,
    Bool,
    DateTime,
    Date,
    Duration,
    Guid,
    /// Free-form value
    Object,
    /// Declared primitive with no known mapping
    Unknown(String),
}

const NULLABLE_TYPES: &[&str] = &["System.Nullable", "Option"];

const COLLECTION_TYPES: &[&str] = &[
    "System.Collections.Generic.List",
    "System.Collections.Generic.IList",
    "System.Collections.Generic.IEnumerable",
    "System.Collections.Generic.ICollection",
    "System.Collections.Generic.IReadOnlyList",
    "System.Collections.Generic.IReadOnlyCollection",
    "System.Collections.Generic.HashSet",
    "System.Collections.Generic.ISet",
    "Vec",
    "VecDeque",
    "HashSet",
    "BTreeSet",
    "IndexSet",
];

const DICTIONARY_TYPES: &[&str] = &[
    "System.Collections.Generic.Dictionary",
    "System.Collections.Generic.IDictionary",
    "System.Collections.Generic.IReadOnlyDictionary",
    "HashMap",
    "BTreeMap",
    "IndexMap",
];

impl TypeHandle {
    pub fn primitive(primitive: PrimitiveType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Primitive(primitive),
            args: Vec::new(),
        }
    }

    /// An array of `element`
    pub fn collection(element: TypeHandle) -> Self {
        Self {
            name: "Array".to_string(),
            kind: TypeKind::Collection,
            args: vec![element],
        }
    }

    /// Name of the definition in its module, e.g. `Contracts.Box`1`
    pub fn definition_name(&self) -> String {
        if self.kind == TypeKind::Generic {
            format!("{}`{}", self.name, self.args.len())
        } else {
            self.name.clone()
        }
    }

    /// Readable canonical form, e.g. `Contracts.Box{Contracts.Item}`
    pub fn canonical(&self) -> String {
        match self.kind {
            TypeKind::Collection | TypeKind::Dictionary | TypeKind::Generic => {
                let args: Vec<String> = self.args.iter().map(|a| a.canonical()).collect();
                format!("{}{{{}}}", self.name, args.join(","))
            }
            _ => self.name.clone(),
        }
    }

    /// Whether schemas for this type live in the reference table
    pub fn is_reference_type(&self) -> bool {
        matches!(self.kind, TypeKind::Object | TypeKind::Generic)
    }
}

impl TypeResolver {
    /// Create a new TypeResolver over a loaded module context
    pub fn new(context: ModuleContext) -> Self {
        debug!("Initializing TypeResolver with {} modules", context.len());
        Self {
            context,
            handle_cache: HashMap::new(),
        }
    }

    /// Resolve a documented type. The first cref names the type; when it is an open generic
    /// the following crefs are its arguments, in the order of its type parameters.
    pub fn resolve(&mut self, crefs: &[CrefRef]) -> Result<TypeHandle> {
        let cache_key = cache_key(crefs);
        if let Some(cached) = self.handle_cache.get(&cache_key) {
            debug!("Type {} found in cache", cache_key);
            return Ok(cached.clone());
        }

        let tokens = crefs
            .iter()
            .map(|c| CrefToken::parse(c.cref()).map(|t| t.binding(c.type_param())))
            .collect::<std::result::Result<Vec<_>, CrefError>>()?;

        let mut iter = tokens.iter();
        let first = iter.next().ok_or(ResolutionError::NoCref)?;
        if first.kind != CrefKind::Type {
            return Err(ResolutionError::NotAType(crefs[0].cref().to_string()));
        }

        let handle = self.resolve_token(first, &mut iter)?;

        let leftover = iter.count();
        if leftover > 0 {
            warn!("{} documented with {} unused cref(s)", handle.canonical(), leftover);
            return Err(ResolutionError::GenericArgumentCount {
                type_name: first.definition_name(),
                expected: first.arity,
                found: first.arity + leftover,
            });
        }

        debug!("Resolved {} to {}", cache_key, handle.canonical());
        self.handle_cache.insert(cache_key, handle.clone());
        Ok(handle)
    }

    /// Resolve a field cref to its type and literal value. The field must exist and be
    /// public and static.
    pub fn resolve_field(&mut self, cref: &CrefRef) -> Result<(TypeHandle, serde_json::Value)> {
        let token = CrefToken::parse(cref.cref())?;
        if token.kind != CrefKind::Field {
            return Err(ResolutionError::NotAField(cref.cref().to_string()));
        }

        let (type_name, field_name) = token.split_member().ok_or_else(|| CrefError::Malformed {
            cref: cref.cref().to_string(),
            reason: "field crefs name a declaring type and a field".to_string(),
        })?;

        let definition = self
            .context
            .find_type(type_name)
            .ok_or_else(|| ResolutionError::TypeNotFound {
                name: type_name.to_string(),
                searched: self.context.len(),
            })?;

        let field = definition
            .find_field(field_name)
            .ok_or_else(|| ResolutionError::FieldNotFound {
                type_name: type_name.to_string(),
                field: field_name.to_string(),
            })?;

        if !field.is_public || !field.is_static {
            return Err(ResolutionError::FieldNotStatic {
                type_name: type_name.to_string(),
                field: field_name.to_string(),
            });
        }

        let ty = field.ty.clone();
        let value = field.value.clone();
        let handle = self.resolve_ref(&ty, &[])?;
        Ok((handle, value))
    }

    /// Resolve a type reference found inside a definition. `bindings` maps the declaring
    /// type's parameters to the handles they are instantiated with.
    pub fn resolve_ref(&mut self, ty: &TypeRef, bindings: &[(String, TypeHandle)]) -> Result<TypeHandle> {
        let mut handle = if let Some((_, bound)) = bindings
            .iter()
            .find(|(param, _)| ty.args.is_empty() && *param == ty.name)
        {
            bound.clone()
        } else {
            let args = ty
                .args
                .iter()
                .map(|arg| self.resolve_ref(arg, bindings))
                .collect::<Result<Vec<_>>>()?;
            self.resolve_named(&ty.name, args)?
        };

        for _ in 0..ty.array_rank {
            handle = TypeHandle::collection(handle);
        }
        Ok(handle)
    }

    /// Resolve a member or base type written inside `declaring`. A parameter of
    /// `declaring` with no binding is reported as such instead of being looked up as a type.
    pub fn resolve_declared(
        &mut self,
        ty: &TypeRef,
        declaring: &TypeDefinition,
        bindings: &[(String, TypeHandle)],
    ) -> Result<TypeHandle> {
        if let Some(param) = unbound_param(ty, &declaring.generic_params, bindings) {
            return Err(ResolutionError::UnboundTypeParameter {
                type_name: declaring.full_name.clone(),
                param: param.to_string(),
            });
        }
        self.resolve_ref(ty, bindings)
    }

    /// Look up the definition behind an enum, object or generic handle
    pub fn definition(&self, handle: &TypeHandle) -> Option<&TypeDefinition> {
        self.context.find_type(&handle.definition_name())
    }

    /// Parameter bindings of a generic instantiation
    pub fn bindings(&self, handle: &TypeHandle) -> Vec<(String, TypeHandle)> {
        match self.definition(handle) {
            Some(definition) => definition
                .generic_params
                .iter()
                .cloned()
                .zip(handle.args.iter().cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Resolve one token, taking its generic arguments from `rest` when they are not inline
    fn resolve_token<'a>(
        &mut self,
        token: &CrefToken,
        rest: &mut impl Iterator<Item = &'a CrefToken>,
    ) -> Result<TypeHandle> {
        let args = if token.arity == 0 {
            Vec::new()
        } else if !token.inline_args.is_empty() {
            let mut none = std::iter::empty();
            token
                .inline_args
                .iter()
                .map(|arg| self.resolve_token(arg, &mut none))
                .collect::<Result<Vec<_>>>()?
        } else {
            let params = self.generic_params(token)?;
            let mut args = Vec::with_capacity(token.arity);

            for (position, expected) in params.iter().enumerate() {
                let Some(arg) = rest.next() else {
                    return Err(ResolutionError::GenericArgumentCount {
                        type_name: token.definition_name(),
                        expected: token.arity,
                        found: position,
                    });
                };
                if arg.kind != CrefKind::Type {
                    return Err(ResolutionError::NotAType(arg.name.clone()));
                }
                if let Some(found) = &arg.type_param {
                    if found != expected {
                        return Err(ResolutionError::UnorderedGenericArguments {
                            type_name: token.definition_name(),
                            position,
                            expected: expected.clone(),
                            found: found.clone(),
                        });
                    }
                }
                args.push(self.resolve_token(arg, rest)?);
            }
            args
        };

        let mut handle = self.resolve_named(&token.name, args)?;
        for _ in 0..token.array_rank {
            handle = TypeHandle::collection(handle);
        }
        Ok(handle)
    }

    /// Type parameter names of the open generic a token refers to
    fn generic_params(&self, token: &CrefToken) -> Result<Vec<String>> {
        let name = token.name.as_str();
        if NULLABLE_TYPES.contains(&name) || COLLECTION_TYPES.contains(&name) {
            return Ok(vec!["T".to_string()]);
        }
        if DICTIONARY_TYPES.contains(&name) {
            return Ok(vec!["TKey".to_string(), "TValue".to_string()]);
        }

        let definition = self
            .context
            .find_type(&token.definition_name())
            .ok_or_else(|| ResolutionError::TypeNotFound {
                name: token.definition_name(),
                searched: self.context.len(),
            })?;
        Ok(definition.generic_params.clone())
    }

    /// Resolve a name with already resolved arguments
    fn resolve_named(&mut self, name: &str, args: Vec<TypeHandle>) -> Result<TypeHandle> {
        let arity_error = |expected: usize, found: usize| ResolutionError::GenericArgumentCount {
            type_name: name.to_string(),
            expected,
            found,
        };

        if let Some(primitive) = Self::parse_primitive_type(name) {
            if !args.is_empty() {
                return Err(arity_error(0, args.len()));
            }
            return Ok(TypeHandle::primitive(primitive, name));
        }

        if NULLABLE_TYPES.contains(&name) {
            let found = args.len();
            return args.into_iter().next().filter(|_| found == 1).ok_or_else(|| arity_error(1, found));
        }

        if COLLECTION_TYPES.contains(&name) {
            if args.len() != 1 {
                return Err(arity_error(1, args.len()));
            }
            return Ok(TypeHandle {
                name: name.to_string(),
                kind: TypeKind::Collection,
                args,
            });
        }

        if DICTIONARY_TYPES.contains(&name) {
            if args.len() != 2 {
                return Err(arity_error(2, args.len()));
            }
            return Ok(TypeHandle {
                name: name.to_string(),
                kind: TypeKind::Dictionary,
                args,
            });
        }

        let definition_name = if args.is_empty() {
            name.to_string()
        } else {
            format!("{}`{}", name, args.len())
        };

        let Some(definition) = self.context.find_type(&definition_name) else {
            warn!("Could not resolve type: {}", definition_name);
            return Err(ResolutionError::TypeNotFound {
                name: definition_name,
                searched: self.context.len(),
            });
        };

        if definition.generic_params.len() != args.len() {
            return Err(arity_error(definition.generic_params.len(), args.len()));
        }

        let kind = match definition.kind {
            DefinitionKind::Primitive => TypeKind::Primitive(
                Self::parse_primitive_type(name).unwrap_or_else(|| PrimitiveType::Unknown(name.to_string())),
            ),
            DefinitionKind::Enum => TypeKind::Enum,
            DefinitionKind::Object if args.is_empty() => TypeKind::Object,
            DefinitionKind::Object => TypeKind::Generic,
        };

        Ok(TypeHandle {
            name: name.to_string(),
            kind,
            args,
        })
    }

    /// Map a built-in type name to its primitive
    fn parse_primitive_type(type_name: &str) -> Option<PrimitiveType> {
        let primitive = match type_name {
            "System.String" | "string" | "String" | "str" => PrimitiveType::String,
            "System.Char" | "char" => PrimitiveType::Char,
            "System.SByte" | "sbyte" | "i8" => PrimitiveType::I8,
            "System.Int16" | "short" | "i16" => PrimitiveType::I16,
            "System.Int32" | "int" | "i32" => PrimitiveType::I32,
            "System.Int64" | "long" | "i64" | "isize" => PrimitiveType::I64,
            "i128" => PrimitiveType::I128,
            "System.Byte" | "byte" | "u8" => PrimitiveType::U8,
            "System.UInt16" | "ushort" | "u16" => PrimitiveType::U16,
            "System.UInt32" | "uint" | "u32" => PrimitiveType::U32,
            "System.UInt64" | "ulong" | "u64" | "usize" => PrimitiveType::U64,
            "u128" => PrimitiveType::U128,
            "System.Single" | "float" | "f32" => PrimitiveType::F32,
            "System.Double" | "double" | "f64" => PrimitiveType::F64,
            "System.Decimal" | "decimal" | "Decimal" => PrimitiveType::Decimal,
            "System.Boolean" | "bool" => PrimitiveType::Bool,
            "System.DateTime" | "System.DateTimeOffset" | "DateTime" | "NaiveDateTime"
            | "OffsetDateTime" => PrimitiveType::DateTime,
            "System.DateOnly" | "NaiveDate" => PrimitiveType::Date,
            "System.TimeSpan" | "Duration" => PrimitiveType::Duration,
            "System.Guid" | "Uuid" => PrimitiveType::Guid,
            "System.Object" | "object" | "Value" => PrimitiveType::Object,
            _ => return None,
        };
        Some(primitive)
    }
}

fn cache_key(crefs: &[CrefRef]) -> String {
    crefs
        .iter()
        .map(|c| match c.type_param() {
            Some(param) => format!("{}@{}", c.cref().trim(), param),
            None => c.cref().trim().to_string(),
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// First parameter of `params` used in `ty` without a binding
fn unbound_param<'a>(ty: &TypeRef, params: &'a [String], bindings: &[(String, TypeHandle)]) -> Option<&'a str> {
    if let Some(param) = ty.as_param(params) {
        return (!bindings.iter().any(|(name, _)| name == param)).then_some(param);
    }
    ty.args.iter().find_map(|arg| unbound_param(arg, params, bindings))
}
