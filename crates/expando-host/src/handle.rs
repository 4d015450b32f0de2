//! Inspectable type handles
//!
//! A [`TypeHandle`] is what a host sees of a catalogued type: an identifier
//! it can bind, a summary of fields or enum members, and a way to create
//! fresh instances in the live graph.

use std::collections::HashSet;

use expando_model::{
    DynList, DynMap, DynValue, Scalar, SharedGraph, TypeDescriptor, TypeKey, TypeKind, TypeRegistry,
};
use expando_walk::TypeCatalog;
use tracing::debug;

use crate::error::HostError;
use crate::ident::host_identifier;

/// One field of a handle's type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSummary {
    pub name: String,
    /// Declared type in display form, e.g. `List<Qiif.LineItem>`
    pub ty: String,
    pub readable: bool,
    pub writable: bool,
}

/// Host-facing view of a registered type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHandle {
    identifier: String,
    key: TypeKey,
    name: String,
    kind: TypeKind,
    fields: Vec<FieldSummary>,
    variants: Vec<String>,
    instantiable: bool,
}

impl TypeHandle {
    /// Create handle for `desc`, exposed as `identifier`
    #[must_use]
    pub fn new(identifier: impl Into<String>, desc: &TypeDescriptor, registry: &TypeRegistry) -> Self {
        let fields = desc
            .fields()
            .iter()
            .map(|f| FieldSummary {
                name: f.name.clone(),
                ty: f.ty.display_name(registry),
                readable: f.readable,
                writable: f.writable,
            })
            .collect();
        Self {
            identifier: identifier.into(),
            key: desc.key(),
            name: desc.name().to_string(),
            kind: desc.kind(),
            fields,
            variants: desc.variants().iter().map(|v| v.name.clone()).collect(),
            instantiable: desc.is_instantiable(),
        }
    }

    /// Name the host binds this handle under
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Registry key of the described type
    #[inline]
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Qualified type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Composite, enum or metadata
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Declared fields in declaration order; empty for enums
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldSummary] {
        &self.fields
    }

    /// Member names of an enumeration, in declaration order
    #[inline]
    #[must_use]
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Whether [`Self::instantiate`] can succeed
    #[inline]
    #[must_use]
    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    /// Create a default instance in `graph`, returned as a typed reference
    ///
    /// # Errors
    /// Returns [`HostError::NotInstantiable`] for enums, abstract types and
    /// types without a parameterless constructor
    pub fn instantiate(&self, graph: &SharedGraph) -> Result<DynValue, HostError> {
        if !self.instantiable {
            return Err(HostError::NotInstantiable(self.name.clone()));
        }
        let id = graph.write().instantiate(self.key)?;
        debug!(ty = %self.name, object = %id, "instance created for host");
        Ok(DynValue::Typed(id))
    }

    /// Dynamic description for host-side inspection
    ///
    /// `{Name, Identifier, Kind, Instantiable, Fields: [{Name, Type, Readable, Writable}], Variants}`
    #[must_use]
    pub fn describe(&self) -> DynValue {
        let map = DynMap::new();
        map.insert("Name", DynValue::text(&self.name));
        map.insert("Identifier", DynValue::text(&self.identifier));
        map.insert("Kind", DynValue::text(kind_name(self.kind)));
        map.insert("Instantiable", DynValue::Scalar(Scalar::Bool(self.instantiable)));

        let fields = self
            .fields
            .iter()
            .map(|f| {
                let field = DynMap::new();
                field.insert("Name", DynValue::text(&f.name));
                field.insert("Type", DynValue::text(&f.ty));
                field.insert("Readable", DynValue::Scalar(Scalar::Bool(f.readable)));
                field.insert("Writable", DynValue::Scalar(Scalar::Bool(f.writable)));
                DynValue::Map(field)
            })
            .collect();
        map.insert("Fields", DynValue::List(DynList::from_items(fields)));

        if self.kind == TypeKind::Enum {
            let variants = self.variants.iter().map(DynValue::text).collect();
            map.insert("Variants", DynValue::List(DynList::from_items(variants)));
        }
        DynValue::Map(map)
    }
}

fn kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Composite => "composite",
        TypeKind::Enum => "enum",
        TypeKind::Metadata => "metadata",
    }
}

/// Handles for every catalogued type, keyed by host identifier
///
/// Identifiers derive from simple type names; a clash with an earlier handle
/// gets the first free `_N` suffix.
#[must_use]
pub fn handles(catalog: &TypeCatalog, registry: &TypeRegistry) -> Vec<TypeHandle> {
    let mut taken = HashSet::new();
    let mut out = Vec::with_capacity(catalog.len());
    for key in catalog.iter() {
        let Some(desc) = registry.get(key) else {
            continue;
        };
        let base = host_identifier(desc.simple_name());
        let identifier = if taken.contains(&base) {
            (1_usize..)
                .map(|n| format!("{base}_{n}"))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_else(|| base.clone())
        } else {
            base
        };
        taken.insert(identifier.clone());
        out.push(TypeHandle::new(identifier, desc, registry));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use expando_model::{FieldType, ObjectGraph, TerminalKind};
    use expando_test_utils::{invoice_types, person_types};
    use expando_walk::discover_from_type;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn invoice_catalog_handles() {
        let types = invoice_types();
        let catalog = discover_from_type(&types.registry, types.root);
        let handles = handles(&catalog, &types.registry);
        let ids: Vec<&str> = handles.iter().map(TypeHandle::identifier).collect();

        assert_eq!(ids[0], "QiifDataObject");
        assert!(ids.contains(&"LineItem"));
        assert!(ids.contains(&"Language"));
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn clashing_simple_names_suffixed() {
        let mut registry = TypeRegistry::new();
        let a = registry.composite("Billing.Address").unwrap().finish().unwrap();
        let b = registry.composite("Shipping.Address").unwrap().finish().unwrap();
        let root = registry
            .composite("Order")
            .unwrap()
            .field("Billing", FieldType::composite(a))
            .field("Shipping", FieldType::composite(b))
            .finish()
            .unwrap();
        let catalog = discover_from_type(&registry, root);
        let ids: Vec<String> = handles(&catalog, &registry)
            .iter()
            .map(|h| h.identifier().to_string())
            .collect();
        assert_eq!(ids, vec!["Order", "Address", "Address_1"]);
    }

    #[test]
    fn field_summaries_and_description() {
        let types = person_types();
        let desc = types.registry.descriptor(types.person).unwrap();
        let handle = TypeHandle::new("Person", desc, &types.registry);

        let friends = handle.fields().iter().find(|f| f.name == "Friends").unwrap();
        assert_eq!(friends.ty, "List<People.Person>");
        let badge = handle.fields().iter().find(|f| f.name == "Badge").unwrap();
        assert!(badge.readable && !badge.writable);

        let DynValue::Map(described) = handle.describe() else {
            panic!("description is not a map");
        };
        assert_eq!(described.get("Kind"), Some(DynValue::text("composite")));
        assert_eq!(
            described.get("Fields").unwrap().as_list().unwrap().len(),
            handle.fields().len()
        );
    }

    #[test]
    fn enum_handle_lists_variants() {
        let types = person_types();
        let desc = types.registry.descriptor(types.mood).unwrap();
        let handle = TypeHandle::new("Mood", desc, &types.registry);
        assert_eq!(handle.variants(), ["Neutral", "Happy", "Grumpy"]);
        assert!(!handle.is_instantiable());
    }

    #[test]
    fn instantiate_respects_constructibility() {
        let types = person_types();
        let graph = ObjectGraph::new(Arc::clone(&types.registry)).into_shared();

        let person = TypeHandle::new("Person", types.registry.descriptor(types.person).unwrap(), &types.registry);
        let created = person.instantiate(&graph).unwrap();
        let id = created.as_typed().unwrap();
        assert_eq!(graph.read().type_of(id).unwrap(), types.person);
        assert_eq!(
            graph.read().get_by_name(id, "Age").unwrap().as_scalar(),
            Some(&Scalar::zero(TerminalKind::I32))
        );

        let pet = TypeHandle::new("Pet", types.registry.descriptor(types.pet).unwrap(), &types.registry);
        assert!(matches!(pet.instantiate(&graph), Err(HostError::NotInstantiable(_))));
    }
}
