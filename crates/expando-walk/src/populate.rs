//! Collection population
//!
//! Top-down walk guaranteeing every reachable collection field holds at least
//! one element. Absent collections are created, empty ones receive a single
//! default element, non-empty ones are left as they are and descended into.

use std::collections::HashSet;
use std::sync::Arc;

use expando_model::{
    FieldType, GraphError, MapKey, ObjectGraph, ObjectId, Scalar, SeqShape, TypeKey,
    TypeRegistry, Value, WalkConfig,
};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::error::WalkError;

/// Ensure every collection reachable from `root` is non-empty
///
/// Absent composite fields are default-constructed and descended into.
/// Terminal fields are left untouched, as are fields that are not both
/// readable and writable. Types without a parameterless constructor are
/// skipped.
///
/// Inside an instance this walk synthesized, a slot of that instance's own
/// type links back to it instead of constructing another one. Recursive
/// schemas therefore stay finite, and a second call finds nothing to fill.
/// Every object is populated once per call, however many paths reach it.
///
/// # Errors
/// Returns [`WalkError::MissingRoot`] when `root` is `None`, or a graph error
/// when `root` does not belong to `graph`
pub fn ensure_non_empty(
    graph: &mut ObjectGraph,
    root: Option<ObjectId>,
    max_depth: usize,
) -> Result<(), WalkError> {
    let root = root.ok_or(WalkError::MissingRoot)?;
    graph.type_of(root)?;

    let mut populator = Populator {
        registry: graph.registry_arc(),
        graph,
        visited: HashSet::new(),
        synthesizing: Vec::new(),
        max_depth,
    };
    populator.visit_object(root, 0)?;
    Ok(())
}

/// [`ensure_non_empty`] with the depth cap taken from `config`
///
/// # Errors
/// Same as [`ensure_non_empty`]
pub fn ensure_non_empty_with(
    graph: &mut ObjectGraph,
    root: Option<ObjectId>,
    config: &WalkConfig,
) -> Result<(), WalkError> {
    ensure_non_empty(graph, root, config.max_depth)
}

/// Outcome of asking for an instance of a type
enum Synthesized {
    /// Newly constructed; still to be populated
    Fresh(ObjectId),
    /// Already being populated further up the current path
    Ancestor(ObjectId),
}

struct Populator<'g> {
    graph: &'g mut ObjectGraph,
    registry: Arc<TypeRegistry>,
    visited: HashSet<ObjectId>,
    /// Instances this walk created, along the current path
    synthesizing: Vec<(TypeKey, ObjectId)>,
    max_depth: usize,
}

impl Populator<'_> {
    fn visit_object(&mut self, id: ObjectId, depth: usize) -> Result<(), GraphError> {
        if depth > self.max_depth {
            warn!(object = %id, depth, "depth cap reached; not populating further");
            return Ok(());
        }
        if !self.visited.insert(id) {
            return Ok(());
        }
        let registry = Arc::clone(&self.registry);
        let desc = registry.descriptor(self.graph.type_of(id)?)?;
        trace!(object = %id, ty = desc.name(), depth, "populating");

        for (index, field) in desc.fields().iter().enumerate() {
            if !field.is_read_write() {
                continue;
            }
            match &field.ty {
                FieldType::Terminal { .. } => {}
                FieldType::Composite(ty) => match self.graph.get(id, index)?.clone() {
                    Value::Object(child) => self.visit_object(child, depth + 1)?,
                    Value::Absent => match self.synthesize(*ty)? {
                        Some(Synthesized::Fresh(child)) => {
                            self.graph.set(id, index, Value::Object(child))?;
                            self.visit_synthesized(child, *ty, depth + 1)?;
                        }
                        Some(Synthesized::Ancestor(owner)) => {
                            self.graph.set(id, index, Value::Object(owner))?;
                        }
                        None => {}
                    },
                    _ => {}
                },
                FieldType::Sequence { .. } | FieldType::Map { .. } => {
                    let current = self.graph.take(id, index)?;
                    let filled = self.fill(&field.ty, current, depth)?;
                    self.graph.set(id, index, filled)?;
                }
            }
        }

        Ok(())
    }

    fn fill(&mut self, ty: &FieldType, current: Value, depth: usize) -> Result<Value, GraphError> {
        match ty {
            FieldType::Sequence { element, shape } => {
                let mut items = match current {
                    Value::Seq(items) => items,
                    Value::Absent => {
                        if *shape == SeqShape::Abstract {
                            debug!("materializing abstract collection as a list");
                        }
                        Vec::new()
                    }
                    other => return Ok(other),
                };
                if items.is_empty() {
                    items.extend(self.default_element(element, depth)?);
                } else {
                    for item in &mut items {
                        self.descend(element, item, depth)?;
                    }
                }
                Ok(Value::Seq(items))
            }
            FieldType::Map { key, value } => {
                let mut entries = match current {
                    Value::Map(entries) => entries,
                    Value::Absent => IndexMap::new(),
                    other => return Ok(other),
                };
                if entries.is_empty() {
                    if let Some(item) = self.default_element(value, depth)? {
                        entries.insert(MapKey::zero(*key), item);
                    }
                } else {
                    for item in entries.values_mut() {
                        self.descend(value, item, depth)?;
                    }
                }
                Ok(Value::Map(entries))
            }
            _ => Ok(current),
        }
    }

    fn default_element(
        &mut self,
        element: &FieldType,
        depth: usize,
    ) -> Result<Option<Value>, GraphError> {
        match element {
            FieldType::Terminal { kind, .. } => Ok(Some(Value::Scalar(Scalar::zero(*kind)))),
            FieldType::Composite(ty) => match self.synthesize(*ty)? {
                Some(Synthesized::Fresh(child)) => {
                    self.visit_synthesized(child, *ty, depth + 1)?;
                    Ok(Some(Value::Object(child)))
                }
                Some(Synthesized::Ancestor(owner)) => Ok(Some(Value::Object(owner))),
                None => Ok(None),
            },
            FieldType::Sequence { .. } | FieldType::Map { .. } => {
                if depth >= self.max_depth {
                    return Ok(None);
                }
                self.fill(element, Value::Absent, depth + 1).map(Some)
            }
        }
    }

    fn descend(&mut self, element: &FieldType, item: &mut Value, depth: usize) -> Result<(), GraphError> {
        match item {
            Value::Object(child) => {
                let child = *child;
                self.visit_object(child, depth + 1)
            }
            Value::Seq(_) | Value::Map(_) => {
                let current = std::mem::take(item);
                *item = self.fill(element, current, depth + 1)?;
                Ok(())
            }
            Value::Absent | Value::Scalar(_) => Ok(()),
        }
    }

    fn synthesize(&mut self, ty: TypeKey) -> Result<Option<Synthesized>, GraphError> {
        if let Some(&(_, owner)) = self.synthesizing.iter().rev().find(|(t, _)| *t == ty) {
            trace!(ty = self.registry.name_of(ty), object = %owner, "linking recursive slot to synthesized ancestor");
            return Ok(Some(Synthesized::Ancestor(owner)));
        }
        match self.graph.instantiate(ty) {
            Ok(id) => Ok(Some(Synthesized::Fresh(id))),
            Err(GraphError::NotConstructible(name) | GraphError::NotComposite(name)) => {
                debug!(ty = %name, "no parameterless constructor; skipping");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn visit_synthesized(&mut self, id: ObjectId, ty: TypeKey, depth: usize) -> Result<(), GraphError> {
        self.synthesizing.push((ty, id));
        let result = self.visit_object(id, depth);
        self.synthesizing.pop();
        result
    }
}
