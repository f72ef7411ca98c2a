use crate::doc_tree::CrefRef;
use crate::error::SchemaError;
use crate::module::TypeDefinition;
use crate::type_resolver::{PrimitiveType, TypeHandle, TypeKind, TypeResolver};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

type Result<T> = std::result::Result<T, SchemaError>;

/// Schema generator - converts type handles to OpenAPI schemas
pub struct SchemaGenerator {
    /// Type resolver for looking up type definitions
    type_resolver: TypeResolver,
}

/// Stable identity of a reference-type schema in the reference table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaKey(String);

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "float", "double")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "readOnly", default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for map types
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    /// Enum values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One slot of the reference table
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceEntry {
    /// Reserved while the schema is being populated
    Placeholder,
    /// A finished schema, with the documented member each property came from
    Resolved {
        schema: Schema,
        origins: IndexMap<String, String>,
    },
    /// Population failed; the key stays reserved so later visits fail fast
    Failed(SchemaError),
}

/// Schemas of reference types for one document variant, keyed by [`SchemaKey`].
///
/// A resolved entry is never replaced. Only property descriptions are filled in afterwards
/// through [`ReferenceTable::backfill_descriptions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    entries: IndexMap<SchemaKey, ReferenceEntry>,
}

impl SchemaKey {
    /// Derive the key for a handle: the canonical name followed by the keys of its type
    /// arguments, with characters outside `[A-Za-z0-9._-]` replaced by `_`.
    pub fn for_handle(handle: &TypeHandle) -> Self {
        Self(key_part(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `$ref` pointer into the components section
    pub fn pointer(&self) -> String {
        format!("#/components/schemas/{}", self.0)
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn key_part(handle: &TypeHandle) -> String {
    match handle.kind {
        TypeKind::Collection => format!("ArrayOf_{}", key_part(&handle.args[0])),
        TypeKind::Dictionary => {
            let parts: Vec<String> = handle.args.iter().map(key_part).collect();
            format!("MapOf_{}", parts.join("_"))
        }
        TypeKind::Generic => {
            let mut parts = vec![sanitize(&handle.name)];
            parts.extend(handle.args.iter().map(key_part));
            parts.join("_")
        }
        _ => sanitize(&handle.name),
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    /// A `$ref` node pointing at `key`
    pub fn reference(key: &SchemaKey) -> Self {
        Self {
            reference: Some(key.pointer()),
            ..Self::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SchemaKey) -> Option<&ReferenceEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &SchemaKey) -> bool {
        self.entries.contains_key(key)
    }

    /// The finished schema under `key`, if any
    pub fn schema(&self, key: &SchemaKey) -> Option<&Schema> {
        match self.entries.get(key) {
            Some(ReferenceEntry::Resolved { schema, .. }) => Some(schema),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finished schemas in insertion order, for the components section
    pub fn schemas(&self) -> IndexMap<String, Schema> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                ReferenceEntry::Resolved { schema, .. } => Some((key.to_string(), schema.clone())),
                _ => None,
            })
            .collect()
    }

    /// Keys whose population failed, with the error
    pub fn failures(&self) -> impl Iterator<Item = (&SchemaKey, &SchemaError)> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            ReferenceEntry::Failed(err) => Some((key, err)),
            _ => None,
        })
    }

    /// Fill in missing property descriptions. `lookup` receives the documented member a
    /// property came from, e.g. `Contracts.User.Name`. Returns how many were filled.
    pub fn backfill_descriptions<'a>(&mut self, lookup: impl Fn(&str) -> Option<&'a str>) -> usize {
        let mut filled = 0;
        for entry in self.entries.values_mut() {
            let ReferenceEntry::Resolved { schema, origins } = entry else {
                continue;
            };
            let Some(properties) = schema.properties.as_mut() else {
                continue;
            };
            for (name, property) in properties.iter_mut() {
                if property.description.is_some() {
                    continue;
                }
                if let Some(description) = origins.get(name).and_then(|origin| lookup(origin)) {
                    property.description = Some(description.to_string());
                    filled += 1;
                }
            }
        }
        filled
    }

    fn reserve(&mut self, key: SchemaKey) {
        self.entries.insert(key, ReferenceEntry::Placeholder);
    }

    fn complete(&mut self, key: &SchemaKey, schema: Schema, origins: IndexMap<String, String>) {
        if let Some(entry) = self.entries.get_mut(key) {
            if matches!(entry, ReferenceEntry::Placeholder) {
                *entry = ReferenceEntry::Resolved { schema, origins };
            }
        }
    }

    /// Drop `key` and every entry added after it, then record the failure under `key`.
    /// Entries populated meanwhile may point at `key`, so none of them can stay.
    fn fail(&mut self, key: &SchemaKey, err: SchemaError) {
        if let Some(index) = self.entries.get_index_of(key) {
            let dropped = self.entries.len() - index - 1;
            if dropped > 0 {
                debug!("Rolling back {} schema(s) populated under {}", dropped, key);
            }
            self.entries.truncate(index);
        }
        self.entries.insert(key.clone(), ReferenceEntry::Failed(err));
    }
}

/// A definition in an inheritance chain with the arguments its parameters are bound to
struct Level {
    definition: TypeDefinition,
    bindings: Vec<(String, TypeHandle)>,
}

impl SchemaGenerator {
    /// Create a new SchemaGenerator with a TypeResolver
    pub fn new(type_resolver: TypeResolver) -> Self {
        debug!("Initializing SchemaGenerator");
        Self { type_resolver }
    }

    pub fn resolver_mut(&mut self) -> &mut TypeResolver {
        &mut self.type_resolver
    }

    /// Resolve documented crefs to a schema. Reference types come back as `$ref` nodes.
    pub fn resolve_crefs(&mut self, crefs: &[CrefRef], table: &mut ReferenceTable) -> Result<Schema> {
        let handle = self.type_resolver.resolve(crefs)?;
        self.resolve(&handle, table)
    }

    /// Resolve a handle to a schema. Object types are stored in `table` and returned as
    /// `$ref` nodes; resolving the same handle again returns the same reference without
    /// touching the table.
    pub fn resolve(&mut self, handle: &TypeHandle, table: &mut ReferenceTable) -> Result<Schema> {
        match &handle.kind {
            TypeKind::Primitive(primitive) => Ok(Self::primitive_to_schema(primitive)),
            TypeKind::Enum => self.enum_schema(handle),
            TypeKind::Collection => {
                let items = self.resolve(&handle.args[0], table)?;
                Ok(Schema {
                    items: Some(Box::new(items)),
                    ..Schema::of_type("array")
                })
            }
            TypeKind::Dictionary => {
                let values = self.resolve(&handle.args[1], table)?;
                Ok(Schema {
                    additional_properties: Some(Box::new(values)),
                    ..Schema::of_type("object")
                })
            }
            TypeKind::Object | TypeKind::Generic => {
                let key = SchemaKey::for_handle(handle);
                self.ensure_entry(handle, &key, table)?;
                Ok(Schema::reference(&key))
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but a top-level reference type comes back as its
    /// full definition. The table still holds it under its key.
    pub fn resolve_definition(&mut self, handle: &TypeHandle, table: &mut ReferenceTable) -> Result<Schema> {
        if !handle.is_reference_type() {
            return self.resolve(handle, table);
        }

        let key = SchemaKey::for_handle(handle);
        self.ensure_entry(handle, &key, table)?;
        Ok(table.schema(&key).cloned().unwrap_or_else(|| Schema::reference(&key)))
    }

    /// Make sure `key` has an entry, populating it on first sight
    fn ensure_entry(&mut self, handle: &TypeHandle, key: &SchemaKey, table: &mut ReferenceTable) -> Result<()> {
        match table.get(key) {
            Some(ReferenceEntry::Placeholder) | Some(ReferenceEntry::Resolved { .. }) => {
                debug!("Schema for {} already exists", key);
                return Ok(());
            }
            Some(ReferenceEntry::Failed(err)) => {
                return Err(SchemaError::Poisoned {
                    key: key.to_string(),
                    message: err.to_string(),
                });
            }
            None => {}
        }

        debug!("Generating object schema for: {}", handle.canonical());
        table.reserve(key.clone());

        match self.object_schema(handle, table) {
            Ok((schema, origins)) => {
                table.complete(key, schema, origins);
                Ok(())
            }
            Err(err) => {
                warn!("Schema generation for {} failed: {}", key, err);
                table.fail(key, err.clone());
                Err(err)
            }
        }
    }

    fn enum_schema(&self, handle: &TypeHandle) -> Result<Schema> {
        let definition = self
            .type_resolver
            .definition(handle)
            .ok_or_else(|| SchemaError::MissingDefinition(handle.definition_name()))?;

        Ok(Schema {
            enum_values: Some(definition.enum_members.clone()),
            description: definition.description.clone(),
            ..Schema::of_type("string")
        })
    }

    /// Build the object schema of a handle: inherited members first, most-derived
    /// declaration winning, ignored members dropped.
    fn object_schema(
        &mut self,
        handle: &TypeHandle,
        table: &mut ReferenceTable,
    ) -> Result<(Schema, IndexMap<String, String>)> {
        let definition = self
            .type_resolver
            .definition(handle)
            .cloned()
            .ok_or_else(|| SchemaError::MissingDefinition(handle.definition_name()))?;
        let bindings = self.type_resolver.bindings(handle);
        let description = definition.description.clone();

        let mut levels = Vec::new();
        let mut visited = HashSet::new();
        self.linearize(definition, bindings, &mut levels, &mut visited)?;

        let mut properties = IndexMap::new();
        let mut required = Vec::new();
        let mut origins = IndexMap::new();

        for level in &levels {
            for member in &level.definition.members {
                let exposed = member.annotations.rename.clone().unwrap_or_else(|| member.name.clone());

                if member.annotations.ignore {
                    properties.shift_remove(&exposed);
                    origins.shift_remove(&exposed);
                    required.retain(|r| *r != exposed);
                    continue;
                }

                let member_handle = self
                    .type_resolver
                    .resolve_declared(&member.ty, &level.definition, &level.bindings)?;
                let mut property = self.resolve(&member_handle, table)?;
                property.description = member.description.clone();
                property.read_only = member.annotations.read_only;

                required.retain(|r| *r != exposed);
                if member.annotations.required || member.annotations.read_only {
                    required.push(exposed.clone());
                }
                origins.insert(
                    exposed.clone(),
                    format!("{}.{}", level.definition.full_name, member.name),
                );
                properties.insert(exposed, property);
            }
        }

        let schema = Schema {
            description,
            properties: Some(properties),
            required: if required.is_empty() { None } else { Some(required) },
            ..Schema::of_type("object")
        };
        Ok((schema, origins))
    }

    /// Collect a definition and its bases, base-most first
    fn linearize(
        &mut self,
        definition: TypeDefinition,
        bindings: Vec<(String, TypeHandle)>,
        levels: &mut Vec<Level>,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        if !visited.insert(definition.full_name.clone()) {
            warn!("{} inherits from itself; ignoring the repeated base", definition.full_name);
            return Ok(());
        }

        for base in &definition.bases {
            let base_handle = self.type_resolver.resolve_declared(base, &definition, &bindings)?;
            let base_definition = self
                .type_resolver
                .definition(&base_handle)
                .cloned()
                .ok_or_else(|| SchemaError::MissingDefinition(base_handle.definition_name()))?;
            let base_bindings = self.type_resolver.bindings(&base_handle);
            self.linearize(base_definition, base_bindings, levels, visited)?;
        }

        levels.push(Level { definition, bindings });
        Ok(())
    }

    /// Convert a primitive type to an OpenAPI schema
    fn primitive_to_schema(primitive: &PrimitiveType) -> Schema {
        let (schema_type, format) = match primitive {
            PrimitiveType::String | PrimitiveType::Char => ("string", None),
            PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 => ("integer", Some("int32")),
            PrimitiveType::I64 | PrimitiveType::I128 => ("integer", Some("int64")),
            PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 => ("integer", Some("int32")),
            PrimitiveType::U64 | PrimitiveType::U128 => ("integer", Some("int64")),
            PrimitiveType::F32 => ("number", Some("float")),
            PrimitiveType::F64 | PrimitiveType::Decimal => ("number", Some("double")),
            PrimitiveType::Bool => ("boolean", None),
            PrimitiveType::DateTime => ("string", Some("date-time")),
            PrimitiveType::Date => ("string", Some("date")),
            PrimitiveType::Duration => ("string", None),
            PrimitiveType::Guid => ("string", Some("uuid")),
            PrimitiveType::Object => ("object", None),
            PrimitiveType::Unknown(name) => {
                debug!("Unknown primitive {}, using string", name);
                ("string", None)
            }
        };

        Schema {
            format: format.map(|s| s.to_string()),
            ..Schema::of_type(schema_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::module::metadata::MetadataModule;
    use crate::module::{ModuleContext, TypeModule};
    use pretty_assertions::assert_eq;

    const CONTRACTS: &str = r#"
types:
  - name: Ns.Entity
    members:
      - name: Id
        type: System.Int64
        required: true
      - name: Name
        type: System.String
      - name: Internal
        type: System.String
  - name: Ns.User
    base: Ns.Entity
    description: A user
    members:
      - name: Name
        type: System.Int32
        rename: displayName
      - name: Name
        type: System.String
        description: Display name
      - name: Internal
        type: System.String
        ignore: true
      - name: Created
        type: System.DateTime
        read_only: true
      - name: Role
        type: Ns.Role
  - name: Ns.Role
    kind: enum
    enum_members: [First, Second]
  - name: Ns.Node
    members:
      - name: Next
        type: Ns.Node
      - name: Children
        type: System.Collections.Generic.List{Ns.Node}
  - name: Ns.Ping
    members:
      - name: Pong
        type: Ns.Pong
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
  - name: Ns.Pong
    members:
      - name: Ping
        type: Ns.Ping
  - name: Ns.Item
  - name: Ns.Other
  - name: Ns.Box`1
    generic_params: [T]
    members:
      - name: Value
        type: T
  - name: Ns.Pair`2
    generic_params: [TFirst, TSecond]
    members:
      - name: First
        type: TFirst
      - name: Second
        type: TSecond
  - name: Ns.Page`1
    generic_params: [T]
    base: Ns.Box{T[]}
    members:
      - name: Total
        type: System.Int32
  - name: Ns.Broken
    members:
      - name: Gone
        type: Ns.Gone
  - name: Ns.Lookup
    members:
      - name: ById
        type: System.Collections.Generic.Dictionary{System.String,Ns.Item}
"#;

    fn create_generator() -> SchemaGenerator {
        let module: Box<dyn TypeModule> = Box::new(MetadataModule::from_yaml("contracts", CONTRACTS).unwrap());
        SchemaGenerator::new(TypeResolver::new(ModuleContext::from_modules(vec![module])))
    }

    fn handle(generator: &mut SchemaGenerator, crefs: &[&str]) -> TypeHandle {
        let crefs: Vec<CrefRef> = crefs.iter().map(|c| CrefRef::from(*c)).collect();
        generator.resolver_mut().resolve(&crefs).unwrap()
    }

    fn key(name: &str) -> SchemaKey {
        SchemaKey(name.to_string())
    }

    #[test]
    fn test_primitive_types() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();

        let int = handle(&mut generator, &["T:System.Int32"]);
        let schema = generator.resolve(&int, &mut table).unwrap();
        assert_eq!(schema.schema_type, Some("integer".to_string()));
        assert_eq!(schema.format, Some("int32".to_string()));

        let date = handle(&mut generator, &["T:System.DateTime"]);
        let schema = generator.resolve(&date, &mut table).unwrap();
        assert_eq!(schema.schema_type, Some("string".to_string()));
        assert_eq!(schema.format, Some("date-time".to_string()));

        let unknown = Schema::of_type("string");
        assert_eq!(
            SchemaGenerator::primitive_to_schema(&PrimitiveType::Unknown("Ns.Blob".to_string())),
            unknown
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_enum_schema_generation() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let role = handle(&mut generator, &["T:Ns.Role"]);

        let schema = generator.resolve(&role, &mut table).unwrap();
        assert_eq!(schema.schema_type, Some("string".to_string()));
        assert_eq!(
            schema.enum_values,
            Some(vec!["First".to_string(), "Second".to_string()])
        );
    }

    #[test]
    fn test_collection_and_dictionary() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();

        let list = handle(&mut generator, &["T:Ns.Item[]"]);
        let schema = generator.resolve(&list, &mut table).unwrap();
        assert_eq!(schema.schema_type, Some("array".to_string()));
        assert_eq!(
            schema.items.unwrap().reference,
            Some("#/components/schemas/Ns.Item".to_string())
        );

        let lookup = handle(&mut generator, &["T:Ns.Lookup"]);
        generator.resolve(&lookup, &mut table).unwrap();
        let by_id = &table.schema(&key("Ns.Lookup")).unwrap().properties.as_ref().unwrap()["ById"];
        assert_eq!(by_id.schema_type, Some("object".to_string()));
        assert!(by_id.additional_properties.as_ref().unwrap().is_reference());
    }

    #[test]
    fn test_inheritance_and_annotations() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let user = handle(&mut generator, &["T:Ns.User"]);

        let schema = generator.resolve_definition(&user, &mut table).unwrap();
        let properties = schema.properties.as_ref().unwrap();

        let names: Vec<&str> = properties.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Id", "Name", "displayName", "Created", "Role"]);

        // Derived declaration wins over the base one
        assert_eq!(properties["Name"].description, Some("Display name".to_string()));
        assert_eq!(properties["displayName"].format, Some("int32".to_string()));
        assert!(properties["Created"].read_only);
        assert!(!properties["Id"].read_only);
        // Read-only members are required as well as flagged
        assert_eq!(
            schema.required,
            Some(vec!["Id".to_string(), "Created".to_string()])
        );
        assert_eq!(schema.description, Some("A user".to_string()));
        assert_eq!(properties["Role"].enum_values.as_ref().unwrap().len(), 2);

        assert_eq!(table.schema(&key("Ns.User")), Some(&schema));
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let node = handle(&mut generator, &["T:Ns.Node"]);

        let schema = generator.resolve(&node, &mut table).unwrap();
        assert_eq!(schema.reference, Some("#/components/schemas/Ns.Node".to_string()));
        assert_eq!(table.len(), 1);

        let stored = table.schema(&key("Ns.Node")).unwrap();
        let properties = stored.properties.as_ref().unwrap();
        assert_eq!(properties["Next"], Schema::reference(&key("Ns.Node")));
        assert_eq!(
            properties["Children"].items.as_deref(),
            Some(&Schema::reference(&key("Ns.Node")))
        );
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let ping = handle(&mut generator, &["T:Ns.Ping"]);

        generator.resolve(&ping, &mut table).unwrap();
        let keys: Vec<String> = table.schemas().keys().cloned().collect();
        assert_eq!(keys, vec!["Ns.Ping".to_string(), "Ns.Pong".to_string()]);
    }

    #[test]
    fn test_resolving_twice_leaves_table_unchanged() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let user = handle(&mut generator, &["T:Ns.User"]);

        let first = generator.resolve(&user, &mut table).unwrap();
        let snapshot = table.clone();
        let second = generator.resolve(&user, &mut table).unwrap();

        assert_eq!(first, second);
        assert_eq!(table, snapshot);
    }

    #[test]
    fn test_generic_instantiations_get_distinct_keys() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();

        let box_item = handle(&mut generator, &["T:Ns.Box`1", "T:Ns.Item"]);
        let box_other = handle(&mut generator, &["T:Ns.Box{Ns.Other}"]);
        let box_item_again = handle(&mut generator, &["T:Ns.Box{Ns.Item}"]);

        assert_eq!(SchemaKey::for_handle(&box_item), key("Ns.Box_Ns.Item"));
        assert_eq!(SchemaKey::for_handle(&box_other), key("Ns.Box_Ns.Other"));
        assert_eq!(SchemaKey::for_handle(&box_item), SchemaKey::for_handle(&box_item_again));

        let a = generator.resolve(&box_item, &mut table).unwrap();
        let b = generator.resolve(&box_item_again, &mut table).unwrap();
        assert_eq!(a, b);

        let nested = handle(&mut generator, &["T:Ns.Pair`2", "T:Ns.Item", "T:Ns.Box`1", "T:Ns.Other"]);
        assert_eq!(
            SchemaKey::for_handle(&nested),
            key("Ns.Pair_Ns.Item_Ns.Box_Ns.Other")
        );

        let value = &table.schema(&key("Ns.Box_Ns.Item")).unwrap().properties.as_ref().unwrap()["Value"];
        assert_eq!(value.reference, Some("#/components/schemas/Ns.Item".to_string()));
    }

    #[test]
    fn test_generic_base_binds_parameters() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let page = handle(&mut generator, &["T:Ns.Page{Ns.Item}"]);

        let schema = generator.resolve_definition(&page, &mut table).unwrap();
        let properties = schema.properties.unwrap();
        assert_eq!(properties["Value"].schema_type, Some("array".to_string()));
        assert_eq!(
            properties["Value"].items.as_ref().unwrap().reference,
            Some("#/components/schemas/Ns.Item".to_string())
        );
        assert_eq!(properties["Total"].format, Some("int32".to_string()));
    }

    #[test]
    fn test_out_of_order_generic_adds_no_entry() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let crefs = vec![
            CrefRef::from("T:Ns.Pair`2"),
            CrefRef::Bound {
                cref: "T:Ns.Other".to_string(),
                typeparam: Some("TSecond".to_string()),
            },
            CrefRef::Bound {
                cref: "T:Ns.Item".to_string(),
                typeparam: Some("TFirst".to_string()),
            },
        ];

        let err = generator.resolve_crefs(&crefs, &mut table).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Resolution(ResolutionError::UnorderedGenericArguments { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_failed_population_records_error_entry() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let broken = handle(&mut generator, &["T:Ns.Broken"]);

        let err = generator.resolve(&broken, &mut table).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Resolution(ResolutionError::TypeNotFound { .. })
        ));
        assert!(matches!(table.get(&key("Ns.Broken")), Some(ReferenceEntry::Failed(_))));
        assert!(table.schemas().is_empty());
        assert_eq!(table.failures().count(), 1);

        let again = generator.resolve(&broken, &mut table).unwrap_err();
        assert!(matches!(again, SchemaError::Poisoned { .. }));
    }

    #[test]
    fn test_failure_inside_cycle_rolls_back_members() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let user = handle(&mut generator, &["T:Ns.User"]);
        generator.resolve(&user, &mut table).unwrap();

        // Back finishes with a $ref to Cyclic before Cyclic fails on Gone
        let cyclic = handle(&mut generator, &["T:Ns.Cyclic"]);
        let err = generator.resolve(&cyclic, &mut table).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Resolution(ResolutionError::TypeNotFound { .. })
        ));

        assert!(matches!(table.get(&key("Ns.Cyclic")), Some(ReferenceEntry::Failed(_))));
        assert!(!table.contains(&key("Ns.Back")));
        let keys: Vec<String> = table.schemas().keys().cloned().collect();
        assert_eq!(keys, vec!["Ns.User".to_string()]);

        let failed: Vec<String> = table.failures().map(|(key, _)| key.to_string()).collect();
        assert_eq!(failed, vec!["Ns.Cyclic".to_string()]);

        // Back alone fails too, since its member is poisoned
        let back = handle(&mut generator, &["T:Ns.Back"]);
        let err = generator.resolve(&back, &mut table).unwrap_err();
        assert!(matches!(err, SchemaError::Poisoned { .. }));
        assert!(table.schemas().values().all(|s| s.properties.is_some()));
    }

    #[test]
    fn test_backfill_descriptions() {
        let mut generator = create_generator();
        let mut table = ReferenceTable::new();
        let user = handle(&mut generator, &["T:Ns.User"]);
        generator.resolve(&user, &mut table).unwrap();

        let filled = table.backfill_descriptions(|member| match member {
            "Ns.Entity.Id" => Some("Identifier"),
            "Ns.User.Name" => Some("ignored, already documented"),
            _ => None,
        });

        assert_eq!(filled, 1);
        let properties = table.schema(&key("Ns.User")).unwrap().properties.clone().unwrap();
        assert_eq!(properties["Id"].description, Some("Identifier".to_string()));
        assert_eq!(properties["Name"].description, Some("Display name".to_string()));
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize("Ns.Outer+Inner"), "Ns.Outer_Inner");
        assert_eq!(sanitize("my-api.Thing"), "my-api.Thing");
    }
}
