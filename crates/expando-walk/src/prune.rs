//! Default pruning
//!
//! Bottom-up walk that strips default-like content: collection elements that
//! prune to default are dropped, emptied collections are optionally set
//! absent, composite children that prune to default are set absent. Each call
//! reports whether the subtree it visited is itself default-like.

use std::sync::Arc;

use expando_model::{
    FieldType, GraphError, ObjectGraph, ObjectId, TypeRegistry, Value, WalkConfig,
};
use tracing::{trace, warn};

use crate::visit::PathGuard;

/// Prune default-like content below `root`
///
/// Returns true when `root` is absent or is itself default-like after pruning.
/// Only fields that are both readable and writable are inspected. An object
/// already on the current path counts as non-default, as does anything past
/// `max_depth`; neither is ever removed. Graph errors abort the walk and are
/// reported as "not default".
pub fn prune_defaults(
    graph: &mut ObjectGraph,
    root: Option<ObjectId>,
    null_empty_collections: bool,
    max_depth: usize,
) -> bool {
    let Some(root) = root else {
        return true;
    };
    let mut pruner = Pruner {
        registry: graph.registry_arc(),
        graph,
        guard: PathGuard::default(),
        null_empty_collections,
        max_depth,
    };
    match pruner.prune_object(root, 0) {
        Ok(is_default) => is_default,
        Err(err) => {
            warn!(error = %err, "pruning aborted");
            false
        }
    }
}

/// [`prune_defaults`] with settings taken from `config`
pub fn prune_defaults_with(graph: &mut ObjectGraph, root: Option<ObjectId>, config: &WalkConfig) -> bool {
    prune_defaults(graph, root, config.null_empty_collections, config.max_depth)
}

struct Pruner<'g> {
    graph: &'g mut ObjectGraph,
    registry: Arc<TypeRegistry>,
    guard: PathGuard,
    null_empty_collections: bool,
    max_depth: usize,
}

impl Pruner<'_> {
    fn prune_object(&mut self, id: ObjectId, depth: usize) -> Result<bool, GraphError> {
        if depth > self.max_depth {
            warn!(object = %id, depth, "depth cap reached; keeping subtree");
            return Ok(false);
        }
        if !self.guard.enter(id) {
            return Ok(false);
        }
        let registry = Arc::clone(&self.registry);
        let desc = registry.descriptor(self.graph.type_of(id)?)?;
        trace!(object = %id, ty = desc.name(), depth, "pruning");

        let mut all_default = true;
        for (index, field) in desc.fields().iter().enumerate() {
            if !field.is_read_write() {
                continue;
            }
            match &field.ty {
                FieldType::Terminal { .. } => {
                    if !is_default_terminal(self.graph.get(id, index)?) {
                        all_default = false;
                    }
                }
                FieldType::Composite(_) => match self.graph.get(id, index)?.clone() {
                    Value::Absent => {}
                    Value::Object(child) => {
                        if self.prune_object(child, depth + 1)? {
                            self.graph.set(id, index, Value::Absent)?;
                        } else {
                            all_default = false;
                        }
                    }
                    _ => all_default = false,
                },
                FieldType::Sequence { .. } | FieldType::Map { .. } => {
                    let current = self.graph.take(id, index)?;
                    if current.is_absent() {
                        continue;
                    }
                    let pruned = self.prune_collection(&field.ty, current, depth)?;
                    let stored = if pruned.collection_len() == Some(0) && self.null_empty_collections {
                        Value::Absent
                    } else {
                        pruned
                    };
                    if stored.collection_len().is_some_and(|len| len > 0) {
                        all_default = false;
                    }
                    self.graph.set(id, index, stored)?;
                }
            }
        }

        self.guard.leave(id);
        Ok(all_default)
    }

    /// Drop elements that prune to default; returns the rebuilt collection
    fn prune_collection(&mut self, ty: &FieldType, current: Value, depth: usize) -> Result<Value, GraphError> {
        match (ty, current) {
            (FieldType::Sequence { element, .. }, Value::Seq(items)) => {
                let mut keep = Vec::with_capacity(items.len());
                for mut item in items {
                    if !self.prune_element(element, &mut item, depth + 1)? {
                        keep.push(item);
                    }
                }
                Ok(Value::Seq(keep))
            }
            (FieldType::Map { value, .. }, Value::Map(entries)) => {
                let mut keep = entries;
                let mut dropped = Vec::new();
                for (key, item) in &mut keep {
                    if self.prune_element(value, item, depth + 1)? {
                        dropped.push(key.clone());
                    }
                }
                for key in dropped {
                    keep.shift_remove(&key);
                }
                Ok(Value::Map(keep))
            }
            (_, other) => Ok(other),
        }
    }

    /// Prune one element in place; returns whether it is default-like
    fn prune_element(&mut self, element: &FieldType, item: &mut Value, depth: usize) -> Result<bool, GraphError> {
        match item {
            Value::Absent => Ok(true),
            Value::Scalar(scalar) => Ok(scalar.is_default_like()),
            Value::Object(child) => {
                let child = *child;
                self.prune_object(child, depth)
            }
            Value::Seq(_) | Value::Map(_) => {
                let current = std::mem::take(item);
                *item = self.prune_collection(element, current, depth)?;
                Ok(item.collection_len() == Some(0))
            }
        }
    }
}

fn is_default_terminal(value: &Value) -> bool {
    match value {
        Value::Absent => true,
        Value::Scalar(scalar) => scalar.is_default_like(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expando_model::{MapKey, Scalar, TerminalKind};
    use indexmap::IndexMap;

    struct Fixture {
        graph: ObjectGraph,
        parent: ObjectId,
        child: ObjectId,
    }

    fn fixture() -> Fixture {
        let mut registry = TypeRegistry::new();
        let child = registry
            .composite("Child")
            .unwrap()
            .field("Text", FieldType::text())
            .field("Number", FieldType::terminal(TerminalKind::I32))
            .finish()
            .unwrap();
        let parent = registry
            .composite("Parent")
            .unwrap()
            .field("Child", FieldType::composite(child))
            .field("Items", FieldType::list(FieldType::text()))
            .field("Lookup", FieldType::map(FieldType::terminal(TerminalKind::I32)))
            .field("Matrix", FieldType::array(FieldType::list(FieldType::terminal(TerminalKind::I32))))
            .read_only("Fixed", FieldType::text())
            .finish()
            .unwrap();
        let mut graph = ObjectGraph::new(Arc::new(registry));
        let child_id = graph.instantiate(child).unwrap();
        let parent_id = graph.instantiate(parent).unwrap();
        graph.set_by_name(parent_id, "Child", Value::Object(child_id)).unwrap();
        Fixture {
            graph,
            parent: parent_id,
            child: child_id,
        }
    }

    #[test]
    fn default_child_nulled_and_parent_default() {
        let Fixture { mut graph, parent, child } = fixture();
        graph.set_by_name(child, "Text", "   ".into()).unwrap();

        assert!(prune_defaults(&mut graph, Some(parent), true, 64));
        assert!(graph.get_by_name(parent, "Child").unwrap().is_absent());
    }

    #[test]
    fn significant_child_kept() {
        let Fixture { mut graph, parent, child } = fixture();
        graph.set_by_name(child, "Number", 3.into()).unwrap();

        assert!(!prune_defaults(&mut graph, Some(parent), true, 64));
        assert_eq!(graph.get_by_name(parent, "Child").unwrap().as_object(), Some(child));
    }

    #[test]
    fn collection_elements_filtered() {
        let Fixture { mut graph, parent, .. } = fixture();
        graph
            .set_by_name(parent, "Items", Value::Seq(vec!["".into(), "keep".into(), Value::Absent]))
            .unwrap();
        let mut lookup = IndexMap::new();
        lookup.insert(MapKey::text("zero"), Value::Scalar(Scalar::Int(0)));
        lookup.insert(MapKey::text("one"), Value::Scalar(Scalar::Int(1)));
        graph.set_by_name(parent, "Lookup", Value::Map(lookup)).unwrap();

        assert!(!prune_defaults(&mut graph, Some(parent), true, 64));
        assert_eq!(
            graph.get_by_name(parent, "Items").unwrap(),
            &Value::Seq(vec!["keep".into()])
        );
        let lookup = graph.get_by_name(parent, "Lookup").unwrap().as_map().unwrap();
        assert_eq!(lookup.len(), 1);
        assert!(lookup.contains_key(&MapKey::text("one")));
    }

    #[test]
    fn emptied_collections_nulled_or_kept() {
        let Fixture { mut graph, parent, .. } = fixture();
        graph.set_by_name(parent, "Items", Value::Seq(vec!["".into()])).unwrap();
        assert!(prune_defaults(&mut graph, Some(parent), true, 64));
        assert!(graph.get_by_name(parent, "Items").unwrap().is_absent());

        graph.set_by_name(parent, "Items", Value::Seq(vec!["".into()])).unwrap();
        assert!(prune_defaults(&mut graph, Some(parent), false, 64));
        assert_eq!(graph.get_by_name(parent, "Items").unwrap(), &Value::Seq(vec![]));
    }

    #[test]
    fn nested_empty_collections_removed() {
        let Fixture { mut graph, parent, .. } = fixture();
        let matrix = Value::Seq(vec![
            Value::Seq(vec![Value::Scalar(Scalar::Int(0))]),
            Value::Seq(vec![Value::Scalar(Scalar::Int(5))]),
        ]);
        graph.set_by_name(parent, "Matrix", matrix).unwrap();

        assert!(!prune_defaults(&mut graph, Some(parent), true, 64));
        assert_eq!(
            graph.get_by_name(parent, "Matrix").unwrap(),
            &Value::Seq(vec![Value::Seq(vec![Value::Scalar(Scalar::Int(5))])])
        );
    }

    #[test]
    fn read_only_fields_ignored() {
        let Fixture { mut graph, parent, .. } = fixture();
        graph.set_by_name(parent, "Fixed", "set".into()).unwrap();
        assert!(prune_defaults(&mut graph, Some(parent), true, 64));
        assert_eq!(graph.get_by_name(parent, "Fixed").unwrap(), &Value::from("set"));
    }

    #[test]
    fn absent_root_is_default() {
        let Fixture { mut graph, .. } = fixture();
        assert!(prune_defaults(&mut graph, None, true, 64));
    }

    #[test]
    fn depth_cap_keeps_subtree() {
        let Fixture { mut graph, parent, child } = fixture();
        assert!(!prune_defaults(&mut graph, Some(parent), true, 0));
        assert_eq!(graph.get_by_name(parent, "Child").unwrap().as_object(), Some(child));
    }
}
