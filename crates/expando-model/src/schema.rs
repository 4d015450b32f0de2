//! Type descriptors
//!
//! Per-type field descriptor tables that stand in for runtime reflection.
//! Every walker drives off [`TypeRegistry`]: a field's declared [`FieldType`]
//! tells it whether to treat the slot as a terminal, a composite reference, an
//! ordered sequence or a keyed map.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};

use crate::graph::Value;
use crate::scalar::{KeyKind, Scalar, TerminalKind};

/// Stable index of a type in a [`TypeRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(u32);

impl TypeKey {
    /// Create key from a raw registry index
    #[inline]
    #[must_use]
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Registry index
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Storage shape of a declared sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqShape {
    /// Growable list
    List,
    /// Fixed-size array, replaced wholesale when its length changes
    Array,
    /// Abstract/interface collection, materialized as a list
    Abstract,
}

/// Declared type of a field, sequence element or map value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Terminal { kind: TerminalKind, nullable: bool },
    Composite(TypeKey),
    Sequence { element: Box<FieldType>, shape: SeqShape },
    Map { key: KeyKind, value: Box<FieldType> },
}

impl FieldType {
    /// Non-nullable terminal
    #[inline]
    #[must_use]
    pub fn terminal(kind: TerminalKind) -> Self {
        Self::Terminal {
            kind,
            nullable: false,
        }
    }

    /// Nullable terminal
    #[inline]
    #[must_use]
    pub fn nullable(kind: TerminalKind) -> Self {
        Self::Terminal {
            kind,
            nullable: true,
        }
    }

    /// Nullable text, the usual shape of a string field
    #[inline]
    #[must_use]
    pub fn text() -> Self {
        Self::nullable(TerminalKind::Text)
    }

    /// Reference to a composite type
    #[inline]
    #[must_use]
    pub fn composite(ty: TypeKey) -> Self {
        Self::Composite(ty)
    }

    /// Enumeration member
    #[inline]
    #[must_use]
    pub fn enumeration(ty: TypeKey) -> Self {
        Self::terminal(TerminalKind::Enum(ty))
    }

    /// Growable list of `element`
    #[inline]
    #[must_use]
    pub fn list(element: FieldType) -> Self {
        Self::Sequence {
            element: Box::new(element),
            shape: SeqShape::List,
        }
    }

    /// Fixed-size array of `element`
    #[inline]
    #[must_use]
    pub fn array(element: FieldType) -> Self {
        Self::Sequence {
            element: Box::new(element),
            shape: SeqShape::Array,
        }
    }

    /// Abstract collection of `element`
    #[inline]
    #[must_use]
    pub fn collection(element: FieldType) -> Self {
        Self::Sequence {
            element: Box::new(element),
            shape: SeqShape::Abstract,
        }
    }

    /// Text-keyed map of `value`
    #[inline]
    #[must_use]
    pub fn map(value: FieldType) -> Self {
        Self::keyed_map(KeyKind::Text, value)
    }

    /// Map keyed by `key` of `value`
    #[inline]
    #[must_use]
    pub fn keyed_map(key: KeyKind, value: FieldType) -> Self {
        Self::Map {
            key,
            value: Box::new(value),
        }
    }

    /// Whether values of this type are leaves
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }

    /// Whether this is a sequence or map
    #[inline]
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Sequence { .. } | Self::Map { .. })
    }

    /// Element type of a sequence, value type of a map
    #[must_use]
    pub fn element(&self) -> Option<&FieldType> {
        match self {
            Self::Sequence { element, .. } => Some(element),
            Self::Map { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Initial slot value of a freshly constructed instance
    ///
    /// Non-nullable terminals start at their zero value; everything else
    /// starts absent.
    #[must_use]
    pub fn initial_value(&self) -> Value {
        match self {
            Self::Terminal {
                kind,
                nullable: false,
            } => Value::Scalar(Scalar::zero(*kind)),
            _ => Value::Absent,
        }
    }

    /// Registry types named directly by this declaration
    ///
    /// Walks through sequence elements and map values; enumerations are
    /// reported through their terminal kind.
    pub fn referenced_types(&self, out: &mut Vec<TypeKey>) {
        match self {
            Self::Terminal {
                kind: TerminalKind::Enum(ty),
                ..
            }
            | Self::Composite(ty) => out.push(*ty),
            Self::Terminal { .. } => {}
            Self::Sequence { element, .. } => element.referenced_types(out),
            Self::Map { value, .. } => value.referenced_types(out),
        }
    }

    /// Human readable form, e.g. `List<LineItem>` or `int32?`
    #[must_use]
    pub fn display_name(&self, registry: &TypeRegistry) -> String {
        match self {
            Self::Terminal {
                kind: TerminalKind::Enum(ty),
                nullable,
            } => format!("{}{}", registry.name_of(*ty), if *nullable { "?" } else { "" }),
            Self::Terminal { kind, nullable } => {
                format!("{kind}{}", if *nullable { "?" } else { "" })
            }
            Self::Composite(ty) => registry.name_of(*ty).to_string(),
            Self::Sequence { element, shape } => {
                let inner = element.display_name(registry);
                match shape {
                    SeqShape::List => format!("List<{inner}>"),
                    SeqShape::Array => format!("{inner}[]"),
                    SeqShape::Abstract => format!("Collection<{inner}>"),
                }
            }
            Self::Map { key, value } => {
                format!("Map<{}, {}>", key.name(), value.display_name(registry))
            }
        }
    }
}

/// One entry of a type's field descriptor table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    pub readable: bool,
    pub writable: bool,
}

impl FieldDescriptor {
    /// Readable and writable field
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            readable: true,
            writable: true,
        }
    }

    /// Field the walkers may both read and replace
    #[inline]
    #[must_use]
    pub fn is_read_write(&self) -> bool {
        self.readable && self.writable
    }
}

/// What a registered type describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Object with named fields
    Composite,
    /// Enumeration with named members
    Enum,
    /// Type-system machinery (descriptors, handles); never catalogued
    Metadata,
}

/// Named member of an enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub ordinal: i64,
}

/// Descriptor table of one registered type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    key: TypeKey,
    name: String,
    kind: TypeKind,
    fields: Vec<FieldDescriptor>,
    variants: Vec<EnumVariant>,
    nested: Vec<TypeKey>,
    generic_args: Vec<TypeKey>,
    supertypes: Vec<TypeKey>,
    constructible: bool,
    is_abstract: bool,
}

impl TypeDescriptor {
    fn placeholder(key: TypeKey, name: String, kind: TypeKind) -> Self {
        Self {
            key,
            name,
            kind,
            fields: Vec::new(),
            variants: Vec::new(),
            nested: Vec::new(),
            generic_args: Vec::new(),
            supertypes: Vec::new(),
            constructible: kind == TypeKind::Composite,
            is_abstract: false,
        }
    }

    /// Registry key
    #[inline]
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Qualified name (`Billing.Invoice`)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without namespace
    #[must_use]
    pub fn simple_name(&self) -> &str {
        let after_path = self.name.rsplit("::").next().unwrap_or(&self.name);
        after_path.rsplit('.').next().unwrap_or(after_path)
    }

    /// Type kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Field descriptor table in declaration order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    /// Enumeration members
    #[inline]
    #[must_use]
    pub fn variants(&self) -> &[EnumVariant] {
        &self.variants
    }

    /// Enumeration member by name, exact match first then ASCII case-insensitive
    #[must_use]
    pub fn variant_by_name(&self, name: &str) -> Option<&EnumVariant> {
        self.variants
            .iter()
            .find(|v| v.name == name)
            .or_else(|| self.variants.iter().find(|v| v.name.eq_ignore_ascii_case(name)))
    }

    /// Enumeration member by ordinal
    #[must_use]
    pub fn variant_by_ordinal(&self, ordinal: i64) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.ordinal == ordinal)
    }

    /// Nested type declarations
    #[inline]
    #[must_use]
    pub fn nested(&self) -> &[TypeKey] {
        &self.nested
    }

    /// Generic type arguments of a closed generic type
    #[inline]
    #[must_use]
    pub fn generic_args(&self) -> &[TypeKey] {
        &self.generic_args
    }

    /// Direct supertypes (base types and implemented interfaces)
    #[inline]
    #[must_use]
    pub fn supertypes(&self) -> &[TypeKey] {
        &self.supertypes
    }

    /// Whether the type is abstract
    #[inline]
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Whether a default instance can be constructed without arguments
    #[inline]
    #[must_use]
    pub fn is_instantiable(&self) -> bool {
        self.kind == TypeKind::Composite && self.constructible && !self.is_abstract
    }
}

/// Registry of all type descriptors a graph may reference
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeKey>,
}

impl TypeRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a key for `name` so that fields may reference it before it is defined
    ///
    /// # Errors
    /// Returns error if the name is empty or already registered
    pub fn declare(&mut self, name: &str, kind: TypeKind) -> Result<TypeKey, SchemaError> {
        if name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.by_name.contains_key(name) {
            return Err(SchemaError::DuplicateType(name.to_string()));
        }
        let index = u32::try_from(self.types.len()).map_err(|_| SchemaError::RegistryFull)?;
        let key = TypeKey(index);
        self.types
            .push(TypeDescriptor::placeholder(key, name.to_string(), kind));
        self.by_name.insert(name.to_string(), key);
        Ok(key)
    }

    /// Start defining a previously declared type
    ///
    /// # Errors
    /// Returns error if `key` is not registered
    pub fn define(&mut self, key: TypeKey) -> Result<TypeBuilder<'_>, SchemaError> {
        if key.index() >= self.types.len() {
            return Err(SchemaError::UnknownType(key));
        }
        Ok(TypeBuilder {
            registry: self,
            key,
            fields: Vec::new(),
        })
    }

    /// Declare and start defining a composite type
    ///
    /// # Errors
    /// Returns error if the name is empty or already registered
    pub fn composite(&mut self, name: &str) -> Result<TypeBuilder<'_>, SchemaError> {
        let key = self.declare(name, TypeKind::Composite)?;
        self.define(key)
    }

    /// Register an enumeration; members get ordinals 0, 1, 2, …
    ///
    /// # Errors
    /// Returns error if the name is taken or a member name repeats
    pub fn enumeration(&mut self, name: &str, members: &[&str]) -> Result<TypeKey, SchemaError> {
        let variants = members
            .iter()
            .zip(0_i64..)
            .map(|(name, ordinal)| EnumVariant {
                name: (*name).to_string(),
                ordinal,
            })
            .collect();
        self.enumeration_with(name, variants)
    }

    /// Register an enumeration with explicit ordinals
    ///
    /// # Errors
    /// Returns error if the name is taken or a member name repeats
    pub fn enumeration_with(
        &mut self,
        name: &str,
        variants: Vec<EnumVariant>,
    ) -> Result<TypeKey, SchemaError> {
        let mut seen = HashSet::new();
        for variant in &variants {
            if !seen.insert(variant.name.as_str()) {
                return Err(SchemaError::DuplicateMember {
                    ty: name.to_string(),
                    member: variant.name.clone(),
                });
            }
        }
        let key = self.declare(name, TypeKind::Enum)?;
        self.types[key.index()].variants = variants;
        Ok(key)
    }

    /// Register a type-system metadata type
    ///
    /// # Errors
    /// Returns error if the name is empty or already registered
    pub fn metadata(&mut self, name: &str) -> Result<TypeKey, SchemaError> {
        self.declare(name, TypeKind::Metadata)
    }

    /// Descriptor by key
    #[inline]
    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<&TypeDescriptor> {
        self.types.get(key.index())
    }

    /// Descriptor by key
    ///
    /// # Errors
    /// Returns error if `key` is not registered
    #[inline]
    pub fn descriptor(&self, key: TypeKey) -> Result<&TypeDescriptor, SchemaError> {
        self.get(key).ok_or(SchemaError::UnknownType(key))
    }

    /// Key by qualified name
    #[inline]
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeKey> {
        self.by_name.get(name).copied()
    }

    /// Qualified name, or `?` for unknown keys
    #[must_use]
    pub fn name_of(&self, key: TypeKey) -> &str {
        self.get(key).map_or("?", TypeDescriptor::name)
    }

    /// Whether a value of type `from` may be stored where `to` is declared
    #[must_use]
    pub fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(desc) = self.get(current) {
                stack.extend_from_slice(&desc.supertypes);
            }
        }
        false
    }

    /// All descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    /// Number of registered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Builder filling in a declared type's descriptor table
///
/// Fields are collected and validated on [`TypeBuilder::finish`].
#[must_use = "a type definition takes effect only after finish()"]
pub struct TypeBuilder<'r> {
    registry: &'r mut TypeRegistry,
    key: TypeKey,
    fields: Vec<FieldDescriptor>,
}

impl TypeBuilder<'_> {
    /// Key of the type under construction
    #[inline]
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Add a read/write field
    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.push(FieldDescriptor::new(name, ty));
        self
    }

    /// Add a field the walkers may read but never replace
    pub fn read_only(mut self, name: &str, ty: FieldType) -> Self {
        let mut field = FieldDescriptor::new(name, ty);
        field.writable = false;
        self.fields.push(field);
        self
    }

    /// Add a field the walkers may replace but never read
    pub fn write_only(mut self, name: &str, ty: FieldType) -> Self {
        let mut field = FieldDescriptor::new(name, ty);
        field.readable = false;
        self.fields.push(field);
        self
    }

    /// Record a nested type declaration
    pub fn nested(self, ty: TypeKey) -> Self {
        self.registry.types[self.key.index()].nested.push(ty);
        self
    }

    /// Record a generic type argument
    pub fn generic_arg(self, ty: TypeKey) -> Self {
        self.registry.types[self.key.index()].generic_args.push(ty);
        self
    }

    /// Record a supertype the type is assignable to
    pub fn supertype(self, ty: TypeKey) -> Self {
        self.registry.types[self.key.index()].supertypes.push(ty);
        self
    }

    /// Mark the type as lacking a parameterless constructor
    pub fn without_default_constructor(self) -> Self {
        self.registry.types[self.key.index()].constructible = false;
        self
    }

    /// Mark the type abstract
    pub fn abstract_type(self) -> Self {
        self.registry.types[self.key.index()].is_abstract = true;
        self
    }

    /// Install the field table
    ///
    /// # Errors
    /// Returns error on duplicate field names or fields on a non-composite type
    pub fn finish(self) -> Result<TypeKey, SchemaError> {
        let desc = &mut self.registry.types[self.key.index()];
        if desc.kind != TypeKind::Composite && !self.fields.is_empty() {
            return Err(SchemaError::FieldsOnNonComposite(desc.name.clone()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    ty: desc.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        desc.fields = self.fields;
        Ok(self.key)
    }
}

/// Errors raised while building a registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("type name must not be empty")]
    EmptyName,

    #[error("type already registered: {0}")]
    DuplicateType(String),

    #[error("unknown type: {0}")]
    UnknownType(TypeKey),

    #[error("duplicate field '{field}' on type {ty}")]
    DuplicateField { ty: String, field: String },

    #[error("duplicate member '{member}' on enumeration {ty}")]
    DuplicateMember { ty: String, member: String },

    #[error("type {0} is not a composite and cannot declare fields")]
    FieldsOnNonComposite(String),

    #[error("type registry is full")]
    RegistryFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_define_allows_self_reference() {
        let mut registry = TypeRegistry::new();
        let person = registry.declare("Person", TypeKind::Composite).unwrap();
        registry
            .define(person)
            .unwrap()
            .field("name", FieldType::text())
            .field("bestFriend", FieldType::composite(person))
            .finish()
            .unwrap();

        let desc = registry.descriptor(person).unwrap();
        assert_eq!(desc.fields().len(), 2);
        assert_eq!(desc.field("bestFriend").unwrap().0, 1);
        assert!(desc.is_instantiable());
    }

    #[test]
    fn duplicate_type_rejected() {
        let mut registry = TypeRegistry::new();
        registry.composite("A").unwrap().finish().unwrap();
        let result = registry.declare("A", TypeKind::Composite);
        assert!(matches!(result, Err(SchemaError::DuplicateType(_))));
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut registry = TypeRegistry::new();
        let result = registry
            .composite("A")
            .unwrap()
            .field("x", FieldType::text())
            .field("x", FieldType::text())
            .finish();
        assert!(matches!(result, Err(SchemaError::DuplicateField { .. })));
    }

    #[test]
    fn enum_members_and_lookup() {
        let mut registry = TypeRegistry::new();
        let color = registry.enumeration("Color", &["None", "Red", "Green"]).unwrap();
        let desc = registry.descriptor(color).unwrap();
        assert_eq!(desc.variant_by_name("red").unwrap().ordinal, 1);
        assert_eq!(desc.variant_by_ordinal(2).unwrap().name, "Green");
        assert!(!desc.is_instantiable());
    }

    #[test]
    fn assignability_follows_supertypes() {
        let mut registry = TypeRegistry::new();
        let shape = registry.composite("Shape").unwrap().abstract_type().finish().unwrap();
        let polygon = registry.composite("Polygon").unwrap().supertype(shape).finish().unwrap();
        let square = registry.composite("Square").unwrap().supertype(polygon).finish().unwrap();

        assert!(registry.is_assignable(square, shape));
        assert!(registry.is_assignable(square, square));
        assert!(!registry.is_assignable(shape, square));
    }

    #[test]
    fn simple_name_strips_namespace() {
        let mut registry = TypeRegistry::new();
        let a = registry.composite("Billing.Qiif.Invoice").unwrap().finish().unwrap();
        let b = registry.composite("billing::Receipt").unwrap().finish().unwrap();
        assert_eq!(registry.descriptor(a).unwrap().simple_name(), "Invoice");
        assert_eq!(registry.descriptor(b).unwrap().simple_name(), "Receipt");
    }

    #[test]
    fn display_names() {
        let mut registry = TypeRegistry::new();
        let item = registry.composite("LineItem").unwrap().finish().unwrap();
        assert_eq!(
            FieldType::list(FieldType::composite(item)).display_name(&registry),
            "List<LineItem>"
        );
        assert_eq!(
            FieldType::nullable(TerminalKind::I32).display_name(&registry),
            "int32?"
        );
        assert_eq!(
            FieldType::keyed_map(KeyKind::Int, FieldType::text()).display_name(&registry),
            "Map<int, text?>"
        );
    }
}
