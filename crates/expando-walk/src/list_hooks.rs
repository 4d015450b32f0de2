//! Append hooks on converted sequence fields
//!
//! For a sequence field `F` the owning attribute map receives
//! `AddTo_F(item)` and `AddDefaultTo_F()`. Both append to the live graph and
//! mirror the appended element into the dynamic list the host already holds.

use std::sync::Arc;

use expando_model::{
    coerce, DynList, DynMap, DynValue, FieldType, Hook, HookError, NodePath, ObjectGraph,
    ObjectId, Scalar, SharedGraph, Value,
};
use tracing::{debug, trace};

use crate::apply;
use crate::convert::DynamicConverter;

/// A sequence field of a converted object, captured by its hooks
pub(crate) struct ListField {
    pub(crate) graph: SharedGraph,
    pub(crate) converter: DynamicConverter,
    pub(crate) owner: ObjectId,
    pub(crate) field: usize,
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) mirror: DynList,
    pub(crate) path: NodePath,
    pub(crate) item_depth: usize,
}

/// Attach `AddTo_{name}` and `AddDefaultTo_{name}` to `map`
pub(crate) fn attach(map: &DynMap, field: ListField) {
    let field = Arc::new(field);
    let add_name = format!("AddTo_{}", field.name);
    let default_name = format!("AddDefaultTo_{}", field.name);

    let add = {
        let field = Arc::clone(&field);
        Hook::unary(add_name.as_str(), move |item| field.append(item))
    };
    let add_default = {
        let add = add.clone();
        Hook::action(default_name.as_str(), move || {
            let item = field.default_item()?;
            add.invoke(&[item])
        })
    };

    let add_key = map.insert_unique(&add_name, DynValue::Hook(add));
    let default_key = map.insert_unique(&default_name, DynValue::Hook(add_default));
    trace!(add = %add_key, add_default = %default_key, "list hooks attached");
}

impl ListField {
    fn element(&self) -> Result<&FieldType, HookError> {
        self.ty
            .element()
            .ok_or_else(|| HookError::InvalidOperation(format!("{} is not a sequence", self.name)))
    }

    /// Validate, store and mirror one element
    fn append(&self, item: &DynValue) -> Result<DynValue, HookError> {
        let element = self.element()?;
        let (index, stored) = {
            let mut graph = self.graph.write();
            let stored = self.accept(&mut graph, element, item)?;
            let mut items = match graph.get(self.owner, self.field)? {
                Value::Seq(items) => items.clone(),
                _ => Vec::new(),
            };
            items.push(stored.clone());
            let index = items.len() - 1;
            graph.set(self.owner, self.field, Value::Seq(items))?;
            (index, stored)
        };

        let graph = self.graph.read();
        let converted = self.converter.convert_at(
            &graph,
            &stored,
            Some(element),
            &self.path.index(index),
            self.item_depth,
        );
        self.mirror.push(converted);
        debug!(path = %self.path, index, "element appended");
        Ok(DynValue::Null)
    }

    /// Turn `item` into an element of the field's type or fail without side effects on the field
    fn accept(&self, graph: &mut ObjectGraph, element: &FieldType, item: &DynValue) -> Result<Value, HookError> {
        let registry = graph.registry_arc();
        let mismatch = || {
            HookError::InvalidOperation(format!(
                "Cannot add item of type {} to {}",
                item.type_name(),
                self.ty.display_name(&registry)
            ))
        };
        match (element, item) {
            (FieldType::Terminal { nullable: false, .. }, DynValue::Null) => Err(mismatch()),
            (_, DynValue::Null) => Ok(Value::Absent),
            (FieldType::Terminal { kind, .. }, DynValue::Scalar(raw)) => {
                match coerce(raw, *kind, graph.registry()) {
                    Ok(coerced) => Ok(Value::Scalar(coerced)),
                    Err(_) => Err(mismatch()),
                }
            }
            (FieldType::Composite(ty), DynValue::Typed(id)) => {
                let assignable = graph
                    .type_of(*id)
                    .is_ok_and(|actual| graph.registry().is_assignable(actual, *ty));
                if assignable {
                    Ok(Value::Object(*id))
                } else {
                    Err(mismatch())
                }
            }
            (
                FieldType::Composite(_) | FieldType::Sequence { .. } | FieldType::Map { .. },
                DynValue::Map(_) | DynValue::List(_),
            ) => {
                let max_depth = self.converter.config().max_depth;
                apply::materialize(graph, element, item, max_depth).ok_or_else(mismatch)
            }
            _ => Err(mismatch()),
        }
    }

    /// Default element: zero terminal, fresh instance or empty collection
    fn default_item(&self) -> Result<DynValue, HookError> {
        match self.element()? {
            FieldType::Terminal { kind, .. } => Ok(DynValue::Scalar(Scalar::zero(*kind))),
            FieldType::Composite(ty) => {
                let mut graph = self.graph.write();
                graph.instantiate(*ty).map(DynValue::Typed).map_err(|_| {
                    HookError::InvalidOperation(format!(
                        "Type {} has no parameterless constructor",
                        graph.registry().name_of(*ty)
                    ))
                })
            }
            FieldType::Sequence { .. } => Ok(DynValue::List(DynList::new())),
            FieldType::Map { .. } => Ok(DynValue::Map(DynMap::new())),
        }
    }
}
