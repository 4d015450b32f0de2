//! Type discovery
//!
//! [`discover`] collects the closed set of registry types structurally
//! reachable from a root instance. Only declarations are inspected; no
//! instance beyond the root is touched.

use std::collections::HashSet;

use expando_model::{ObjectGraph, ObjectId, TypeKey, TypeKind, TypeRegistry};
use indexmap::IndexSet;
use tracing::trace;

/// Ordered set of discovered types, in first-visit order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCatalog {
    types: IndexSet<TypeKey>,
}

impl TypeCatalog {
    /// Whether `ty` was discovered
    #[inline]
    #[must_use]
    pub fn contains(&self, ty: TypeKey) -> bool {
        self.types.contains(&ty)
    }

    /// Number of discovered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing was discovered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Discovered types in first-visit order
    pub fn iter(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.types.iter().copied()
    }

    /// Qualified names of the discovered types
    #[must_use]
    pub fn names<'r>(&self, registry: &'r TypeRegistry) -> Vec<&'r str> {
        self.iter().map(|ty| registry.name_of(ty)).collect()
    }
}

/// Discover every type reachable from the runtime type of `root`
///
/// An absent or unknown root yields an empty catalog.
#[must_use]
pub fn discover(graph: &ObjectGraph, root: Option<ObjectId>) -> TypeCatalog {
    match root.map(|id| graph.type_of(id)) {
        Some(Ok(ty)) => discover_from_type(graph.registry(), ty),
        _ => TypeCatalog::default(),
    }
}

/// Discover every type reachable from `root`
///
/// Visits generic arguments, nested declarations and the declared types of
/// all fields (sequence elements and map values included). Metadata types
/// are neither catalogued nor descended into.
#[must_use]
pub fn discover_from_type(registry: &TypeRegistry, root: TypeKey) -> TypeCatalog {
    let mut seen = HashSet::new();
    let mut catalog = TypeCatalog::default();
    visit(registry, root, &mut seen, &mut catalog.types);
    catalog
}

fn visit(
    registry: &TypeRegistry,
    ty: TypeKey,
    seen: &mut HashSet<TypeKey>,
    out: &mut IndexSet<TypeKey>,
) {
    if !seen.insert(ty) {
        return;
    }
    let Some(desc) = registry.get(ty) else {
        return;
    };
    if desc.kind() == TypeKind::Metadata {
        trace!(ty = desc.name(), "skipping metadata type");
        return;
    }
    out.insert(ty);

    for &arg in desc.generic_args() {
        visit(registry, arg, seen, out);
    }
    for &nested in desc.nested() {
        visit(registry, nested, seen, out);
    }
    let mut referenced = Vec::new();
    for field in desc.fields() {
        referenced.clear();
        field.ty.referenced_types(&mut referenced);
        for &next in &referenced {
            visit(registry, next, seen, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expando_model::FieldType;
    use std::sync::Arc;

    #[test]
    fn discovers_through_collections_and_generics() {
        let mut registry = TypeRegistry::new();
        let tag = registry.composite("Tag").unwrap().finish().unwrap();
        let inner = registry.composite("Outer.Inner").unwrap().finish().unwrap();
        let arg = registry.composite("Arg").unwrap().finish().unwrap();
        let meta = registry.metadata("System.Type").unwrap();
        let color = registry.enumeration("Color", &["Red"]).unwrap();
        let outer = registry
            .composite("Outer")
            .unwrap()
            .field("Tags", FieldType::map(FieldType::list(FieldType::composite(tag))))
            .field("Color", FieldType::enumeration(color))
            .field("Meta", FieldType::composite(meta))
            .nested(inner)
            .generic_arg(arg)
            .finish()
            .unwrap();

        let catalog = discover_from_type(&registry, outer);
        assert_eq!(catalog.names(&registry), vec!["Outer", "Arg", "Outer.Inner", "Tag", "Color"]);
        assert!(!catalog.contains(meta));
    }

    #[test]
    fn self_reference_terminates() {
        let mut registry = TypeRegistry::new();
        let node = registry.declare("Node", TypeKind::Composite).unwrap();
        registry
            .define(node)
            .unwrap()
            .field("Next", FieldType::composite(node))
            .finish()
            .unwrap();
        assert_eq!(discover_from_type(&registry, node).len(), 1);
    }

    #[test]
    fn absent_root_is_empty() {
        let graph = ObjectGraph::new(Arc::new(TypeRegistry::new()));
        assert!(discover(&graph, None).is_empty());
    }
}
