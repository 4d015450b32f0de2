//! Typed object arena
//!
//! Composite instances live in an [`ObjectGraph`] and are addressed by stable
//! [`ObjectId`]s, which double as the identity used by the walkers' cycle
//! guards. Each record stores one [`Value`] slot per field of its type's
//! descriptor table; writes are validated against the declared [`FieldType`].

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::scalar::{MapKey, Scalar};
use crate::schema::{FieldType, SchemaError, TypeDescriptor, TypeKey, TypeKind, TypeRegistry};

/// Stable identity of an object in an [`ObjectGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Arena index
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content of a field slot
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Absent,
    Scalar(Scalar),
    Object(ObjectId),
    Seq(Vec<Value>),
    Map(IndexMap<MapKey, Value>),
}

impl Value {
    /// Whether the slot is unset
    #[inline]
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Borrow the scalar, if any
    #[inline]
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Object reference, if any
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Borrow sequence elements, if any
    #[inline]
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow map entries, if any
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<MapKey, Value>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Number of elements of a collection, `None` for anything else
    #[must_use]
    pub fn collection_len(&self) -> Option<usize> {
        match self {
            Self::Seq(items) => Some(items.len()),
            Self::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Variant name used in diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Scalar(s) => s.type_name(),
            Self::Object(_) => "object",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "map",
        }
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::Object(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Seq(items)
    }
}

#[derive(Debug, Clone)]
struct Record {
    ty: TypeKey,
    fields: Vec<Value>,
}

/// Arena of typed composite instances
#[derive(Debug, Clone)]
pub struct ObjectGraph {
    registry: Arc<TypeRegistry>,
    records: Vec<Record>,
}

/// Handle shared between a converter and the hooks it attaches
pub type SharedGraph = Arc<RwLock<ObjectGraph>>;

impl ObjectGraph {
    /// Create empty graph over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            records: Vec::new(),
        }
    }

    /// Type registry the graph is typed against
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Shared handle to the registry
    #[inline]
    #[must_use]
    pub fn registry_arc(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Default-construct an instance of `ty`
    ///
    /// Non-nullable terminal fields start at their zero value, everything else
    /// absent.
    ///
    /// # Errors
    /// Returns error if the type is unknown, not a composite, abstract or has no
    /// parameterless constructor
    pub fn instantiate(&mut self, ty: TypeKey) -> Result<ObjectId, GraphError> {
        let desc = self.registry.descriptor(ty)?;
        if desc.kind() != TypeKind::Composite {
            return Err(GraphError::NotComposite(desc.name().to_string()));
        }
        if !desc.is_instantiable() {
            return Err(GraphError::NotConstructible(desc.name().to_string()));
        }
        let fields = desc.fields().iter().map(|f| f.ty.initial_value()).collect();
        let id = ObjectId(u32::try_from(self.records.len()).map_err(|_| GraphError::ArenaFull)?);
        self.records.push(Record { ty, fields });
        Ok(id)
    }

    fn record(&self, id: ObjectId) -> Result<&Record, GraphError> {
        self.records
            .get(id.index())
            .ok_or(GraphError::UnknownObject(id))
    }

    /// Whether `id` belongs to this graph
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        id.index() < self.records.len()
    }

    /// Runtime type of an object
    ///
    /// # Errors
    /// Returns error if `id` does not belong to this graph
    pub fn type_of(&self, id: ObjectId) -> Result<TypeKey, GraphError> {
        self.record(id).map(|r| r.ty)
    }

    /// Descriptor of an object's runtime type
    ///
    /// # Errors
    /// Returns error if `id` does not belong to this graph
    pub fn descriptor_of(&self, id: ObjectId) -> Result<&TypeDescriptor, GraphError> {
        let ty = self.type_of(id)?;
        Ok(self.registry.descriptor(ty)?)
    }

    /// Index of a named field on an object's type
    ///
    /// # Errors
    /// Returns error if the object or field is unknown
    pub fn field_index(&self, id: ObjectId, name: &str) -> Result<usize, GraphError> {
        self.descriptor_of(id)?
            .field(name)
            .map(|(index, _)| index)
            .ok_or_else(|| GraphError::UnknownField(name.to_string()))
    }

    /// Borrow a field slot by index
    ///
    /// # Errors
    /// Returns error if the object or field is unknown
    pub fn get(&self, id: ObjectId, field: usize) -> Result<&Value, GraphError> {
        self.record(id)?
            .fields
            .get(field)
            .ok_or_else(|| GraphError::UnknownField(format!("#{field}")))
    }

    /// Borrow a field slot by name
    ///
    /// # Errors
    /// Returns error if the object or field is unknown
    pub fn get_by_name(&self, id: ObjectId, name: &str) -> Result<&Value, GraphError> {
        let index = self.field_index(id, name)?;
        self.get(id, index)
    }

    /// Move a field's value out, leaving the slot absent
    ///
    /// Used by walkers that rebuild a collection and store it back with
    /// [`ObjectGraph::set`].
    ///
    /// # Errors
    /// Returns error if the object or field is unknown
    pub fn take(&mut self, id: ObjectId, field: usize) -> Result<Value, GraphError> {
        let slot = self
            .records
            .get_mut(id.index())
            .ok_or(GraphError::UnknownObject(id))?
            .fields
            .get_mut(field)
            .ok_or_else(|| GraphError::UnknownField(format!("#{field}")))?;
        Ok(std::mem::take(slot))
    }

    /// Replace a field slot by index
    ///
    /// The value is validated against the declared field type. Setting a
    /// non-nullable terminal absent stores its zero value instead.
    ///
    /// # Errors
    /// Returns error if the object or field is unknown or the value does not
    /// match the declared type
    pub fn set(&mut self, id: ObjectId, field: usize, value: Value) -> Result<(), GraphError> {
        let desc = self.descriptor_of(id)?;
        let declared = desc
            .fields()
            .get(field)
            .ok_or_else(|| GraphError::UnknownField(format!("#{field}")))?;
        let value = match (&declared.ty, value) {
            (ty @ FieldType::Terminal { nullable: false, .. }, Value::Absent) => ty.initial_value(),
            (_, value) => value,
        };
        if let Err(found) = self.check_value(&declared.ty, &value) {
            debug!(object = %id, field = %declared.name, %found, "value rejected");
            return Err(GraphError::TypeMismatch {
                field: declared.name.clone(),
                expected: declared.ty.display_name(&self.registry),
                found,
            });
        }
        self.records[id.index()].fields[field] = value;
        Ok(())
    }

    /// Replace a field slot by name
    ///
    /// # Errors
    /// Same as [`ObjectGraph::set`]
    pub fn set_by_name(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), GraphError> {
        let index = self.field_index(id, name)?;
        self.set(id, index, value)
    }

    /// Check `value` against a declared type, describing the offending part on failure
    ///
    /// # Errors
    /// Returns a short description of the first mismatching value
    pub fn check_value(&self, ty: &FieldType, value: &Value) -> Result<(), String> {
        match (ty, value) {
            (FieldType::Terminal { nullable: false, .. }, Value::Absent) => Err("null".to_string()),
            (_, Value::Absent) => Ok(()),
            (FieldType::Terminal { kind, .. }, Value::Scalar(s)) if s.fits(*kind) => Ok(()),
            (FieldType::Composite(expected), Value::Object(id)) => {
                let actual = self.type_of(*id).map_err(|e| e.to_string())?;
                if self.registry.is_assignable(actual, *expected) {
                    Ok(())
                } else {
                    Err(self.registry.name_of(actual).to_string())
                }
            }
            (FieldType::Sequence { element, .. }, Value::Seq(items)) => items
                .iter()
                .try_for_each(|item| self.check_value(element, item)),
            (FieldType::Map { key, value: inner }, Value::Map(entries)) => {
                entries.iter().try_for_each(|(k, v)| {
                    if k.kind() == *key {
                        self.check_value(inner, v)
                    } else {
                        Err(format!("{} key", k.kind().name()))
                    }
                })
            }
            (_, other) => Err(other.kind_name().to_string()),
        }
    }

    /// Number of objects in the arena
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the arena is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wrap into a shared handle
    #[inline]
    #[must_use]
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }
}

/// Errors raised by graph access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No live object has this id
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    /// The object's type declares no such field
    #[error("unknown field {0}")]
    UnknownField(String),

    /// The value does not fit the declared field type
    #[error("field '{field}' expects {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Abstract type or one without a parameterless constructor
    #[error("type {0} has no parameterless constructor")]
    NotConstructible(String),

    /// Enums and metadata types cannot be instantiated as objects
    #[error("type {0} is not a composite")]
    NotComposite(String),

    /// Object ids are exhausted
    #[error("object arena is full")]
    ArenaFull,

    /// Type lookup failed in the registry
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
