//! Dynamic attribute maps → typed graph
//!
//! Writes a (possibly host-mutated) dynamic tree back onto a typed object.
//! Every writable field is reconciled against the source entry of the same
//! name: a missing or null entry clears the field, terminals are coerced,
//! collections are cleared and rebuilt, nested composites are updated in
//! place or created. Mismatches are absorbed and logged; a field that cannot
//! take the incoming value keeps its previous content.

use std::sync::Arc;

use expando_model::{
    coerce, DynList, DynMap, DynValue, FieldType, GraphError, KeyKind, MapKey, ObjectGraph,
    ObjectId, Scalar, TypeKey, TypeRegistry, Value, WalkConfig,
};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::visit::PathGuard;

/// Apply `source` onto `target` with default settings
///
/// No-op when either side is absent or when `source` is neither a map nor a
/// typed object.
pub fn apply_dynamic(graph: &mut ObjectGraph, target: Option<ObjectId>, source: Option<&DynValue>) {
    apply_dynamic_with(graph, target, source, &WalkConfig::default());
}

/// Apply `source` onto `target`, descending at most `config.max_depth` levels
pub fn apply_dynamic_with(
    graph: &mut ObjectGraph,
    target: Option<ObjectId>,
    source: Option<&DynValue>,
    config: &WalkConfig,
) {
    let (Some(target), Some(source)) = (target, source) else {
        return;
    };
    let mut mapper = Mapper::new(graph, config.max_depth);
    if let Err(err) = mapper.apply(target, source, 0) {
        warn!(object = %target, error = %err, "mapping aborted");
    }
}

/// Build a collection element of type `element` from `item`
///
/// Returns `None` when the item cannot be turned into such an element.
pub(crate) fn materialize(
    graph: &mut ObjectGraph,
    element: &FieldType,
    item: &DynValue,
    max_depth: usize,
) -> Option<Value> {
    let mut mapper = Mapper::new(graph, max_depth);
    match mapper.element(element, item, 0) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "element construction failed");
            None
        }
    }
}

/// Where field values are read from
enum Source {
    Map(DynMap),
    Typed(ObjectId),
}

struct Mapper<'g> {
    graph: &'g mut ObjectGraph,
    registry: Arc<TypeRegistry>,
    guard: PathGuard,
    max_depth: usize,
}

impl<'g> Mapper<'g> {
    fn new(graph: &'g mut ObjectGraph, max_depth: usize) -> Self {
        Self {
            registry: graph.registry_arc(),
            graph,
            guard: PathGuard::default(),
            max_depth,
        }
    }

    fn apply(&mut self, target: ObjectId, source: &DynValue, depth: usize) -> Result<(), GraphError> {
        if depth > self.max_depth {
            warn!(object = %target, depth, "depth cap reached; not mapping further");
            return Ok(());
        }
        let source = match source {
            DynValue::Map(map) => Source::Map(map.clone()),
            DynValue::Typed(id) => Source::Typed(*id),
            _ => return Ok(()),
        };
        if !self.guard.enter(target) {
            return Ok(());
        }
        let registry = Arc::clone(&self.registry);
        let desc = registry.descriptor(self.graph.type_of(target)?)?;
        trace!(object = %target, ty = desc.name(), depth, "mapping");

        for (index, field) in desc.fields().iter().enumerate() {
            if !field.writable {
                continue;
            }
            let incoming = self.lookup(&source, &field.name);
            self.assign(target, index, &field.ty, incoming, depth)?;
        }

        self.guard.leave(target);
        Ok(())
    }

    /// Source entry for `name`; missing entries and hooks read as null
    fn lookup(&self, source: &Source, name: &str) -> DynValue {
        let found = match source {
            Source::Map(map) => map.get(name),
            Source::Typed(id) => self.graph.get_by_name(*id, name).ok().map(|v| shallow(self.graph, v)),
        };
        match found {
            Some(DynValue::Hook(_)) | None => DynValue::Null,
            Some(value) => value,
        }
    }

    fn assign(
        &mut self,
        target: ObjectId,
        index: usize,
        ty: &FieldType,
        incoming: DynValue,
        depth: usize,
    ) -> Result<(), GraphError> {
        match (ty, incoming) {
            (_, DynValue::Null) => self.graph.set(target, index, Value::Absent),
            (FieldType::Terminal { kind, .. }, DynValue::Scalar(raw)) => {
                let value = match coerce(&raw, *kind, &self.registry) {
                    Ok(coerced) => coerced,
                    Err(err) => {
                        debug!(object = %target, field = index, error = %err, "coercion failed; passing raw value");
                        raw
                    }
                };
                self.store(target, index, Value::Scalar(value))
            }
            (FieldType::Sequence { element, .. }, incoming) => {
                let items = match &incoming {
                    DynValue::List(list) => self.elements(element, list, depth + 1)?,
                    _ => Vec::new(),
                };
                self.store(target, index, Value::Seq(items))
            }
            (FieldType::Map { key, value }, incoming) => {
                let entries = self.entries(*key, value, &incoming, depth + 1)?;
                self.store(target, index, Value::Map(entries))
            }
            (FieldType::Composite(ty), incoming @ (DynValue::Map(_) | DynValue::Typed(_))) => {
                if !self.accepts(*ty, &incoming) {
                    debug!(object = %target, field = index, "incompatible object; field unchanged");
                    return Ok(());
                }
                if depth + 1 > self.max_depth {
                    warn!(object = %target, depth, "depth cap reached; nested object not mapped");
                    return Ok(());
                }
                let existing = self.graph.get(target, index)?.as_object();
                let nested = match existing {
                    Some(id) => id,
                    None => match self.construct(*ty)? {
                        Some(id) => {
                            self.graph.set(target, index, Value::Object(id))?;
                            id
                        }
                        None => return Ok(()),
                    },
                };
                self.apply(nested, &incoming, depth + 1)
            }
            (_, other) => {
                debug!(object = %target, field = index, found = other.type_name(), "incompatible source; field unchanged");
                Ok(())
            }
        }
    }

    /// Set a field, leaving it unchanged when the value is rejected
    fn store(&mut self, target: ObjectId, index: usize, value: Value) -> Result<(), GraphError> {
        match self.graph.set(target, index, value) {
            Err(GraphError::TypeMismatch { field, expected, found }) => {
                debug!(object = %target, %field, %expected, %found, "value rejected; field unchanged");
                Ok(())
            }
            other => other,
        }
    }

    fn elements(&mut self, element: &FieldType, list: &DynList, depth: usize) -> Result<Vec<Value>, GraphError> {
        let mut items = Vec::with_capacity(list.len());
        for item in list.items() {
            if let Some(value) = self.element(element, &item, depth)? {
                items.push(value);
            }
        }
        Ok(items)
    }

    /// Rebuild map entries from an attribute map or a `{Key, Value}` pair list
    fn entries(
        &mut self,
        key: KeyKind,
        value: &FieldType,
        incoming: &DynValue,
        depth: usize,
    ) -> Result<IndexMap<MapKey, Value>, GraphError> {
        let mut entries = IndexMap::new();
        match incoming {
            DynValue::Map(map) => {
                for (name, item) in map.entries() {
                    if item.as_hook().is_some() {
                        continue;
                    }
                    let Some(parsed) = MapKey::parse(key, &name) else {
                        debug!(key = %name, expected = key.name(), "unparsable key; entry dropped");
                        continue;
                    };
                    if let Some(converted) = self.element(value, &item, depth)? {
                        entries.insert(parsed, converted);
                    }
                }
            }
            DynValue::List(pairs) => {
                for pair in pairs.items() {
                    let Some(pair) = pair.as_map() else {
                        continue;
                    };
                    let parsed = pair
                        .get("Key")
                        .and_then(|k| k.as_scalar().and_then(|s| MapKey::from_scalar(key, s)));
                    let Some(parsed) = parsed else {
                        debug!(expected = key.name(), "pair without usable key; entry dropped");
                        continue;
                    };
                    let item = pair.get("Value").unwrap_or_default();
                    if let Some(converted) = self.element(value, &item, depth)? {
                        entries.insert(parsed, converted);
                    }
                }
            }
            _ => {}
        }
        Ok(entries)
    }

    fn element(&mut self, element: &FieldType, item: &DynValue, depth: usize) -> Result<Option<Value>, GraphError> {
        if depth > self.max_depth {
            warn!(depth, "depth cap reached; element dropped");
            return Ok(None);
        }
        let value = match (element, item) {
            (FieldType::Terminal { nullable: false, .. }, DynValue::Null) => {
                debug!("null for non-nullable element dropped");
                None
            }
            (_, DynValue::Null) => Some(Value::Absent),
            (FieldType::Terminal { kind, .. }, DynValue::Scalar(raw)) => match coerce(raw, *kind, &self.registry) {
                Ok(coerced) => Some(Value::Scalar(coerced)),
                Err(err) => {
                    debug!(error = %err, "coercion failed; element dropped");
                    None
                }
            },
            (FieldType::Composite(ty), DynValue::Map(_) | DynValue::Typed(_)) if self.accepts(*ty, item) => {
                match self.construct(*ty)? {
                    Some(id) => {
                        self.apply(id, item, depth)?;
                        Some(Value::Object(id))
                    }
                    None => None,
                }
            }
            (FieldType::Sequence { element, .. }, DynValue::List(list)) => {
                Some(Value::Seq(self.elements(element, list, depth + 1)?))
            }
            (FieldType::Map { key, value }, DynValue::Map(_) | DynValue::List(_)) => {
                Some(Value::Map(self.entries(*key, value, item, depth + 1)?))
            }
            (_, other) => {
                debug!(found = other.type_name(), "incompatible element dropped");
                None
            }
        };
        Ok(value)
    }

    /// Whether a composite of type `ty` can be filled from `source`
    fn accepts(&self, ty: TypeKey, source: &DynValue) -> bool {
        match source {
            DynValue::Map(_) => true,
            DynValue::Typed(id) => self
                .graph
                .type_of(*id)
                .is_ok_and(|actual| self.registry.is_assignable(actual, ty)),
            _ => false,
        }
    }

    fn construct(&mut self, ty: TypeKey) -> Result<Option<ObjectId>, GraphError> {
        match self.graph.instantiate(ty) {
            Ok(id) => Ok(Some(id)),
            Err(GraphError::NotConstructible(name) | GraphError::NotComposite(name)) => {
                debug!(ty = %name, "cannot construct; skipping");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// One-level dynamic view of a typed field value
///
/// Objects stay typed references; keyed collections with non-text keys become
/// `{Key, Value}` pair lists.
fn shallow(graph: &ObjectGraph, value: &Value) -> DynValue {
    match value {
        Value::Absent => DynValue::Null,
        Value::Scalar(scalar) => DynValue::Scalar(scalar.clone()),
        Value::Object(id) => DynValue::Typed(*id),
        Value::Seq(items) => DynValue::List(DynList::from_items(
            items.iter().map(|item| shallow(graph, item)).collect(),
        )),
        Value::Map(entries) => {
            if entries.keys().all(|k| k.kind() == KeyKind::Text) {
                let map = DynMap::new();
                for (key, item) in entries {
                    map.insert(key.to_string(), shallow(graph, item));
                }
                DynValue::Map(map)
            } else {
                let pairs = entries
                    .iter()
                    .map(|(key, item)| {
                        let pair = DynMap::new();
                        pair.insert("Key", DynValue::Scalar(key_scalar(key)));
                        pair.insert("Value", shallow(graph, item));
                        DynValue::Map(pair)
                    })
                    .collect();
                DynValue::List(DynList::from_items(pairs))
            }
        }
    }
}

fn key_scalar(key: &MapKey) -> Scalar {
    match key {
        MapKey::Text(s) => Scalar::Text(s.clone()),
        MapKey::Int(v) => Scalar::Int(*v),
        MapKey::UInt(v) => Scalar::UInt(*v),
        MapKey::Char(c) => Scalar::Char(*c),
        MapKey::Bool(b) => Scalar::Bool(*b),
        MapKey::Uuid(u) => Scalar::Uuid(*u),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expando_model::{EnumValue, TerminalKind};
    use expando_test_utils::{graph_for, person, person_types, rich_person, PersonTypes};
    use pretty_assertions::assert_eq;

    fn source(entries: &[(&str, DynValue)]) -> DynValue {
        let map = DynMap::new();
        for (k, v) in entries {
            map.insert(*k, v.clone());
        }
        DynValue::Map(map)
    }

    fn setup() -> (PersonTypes, ObjectGraph, ObjectId) {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let id = rich_person(&mut graph, &types);
        (types, graph, id)
    }

    #[test]
    fn terminals_coerced() {
        let (types, mut graph, id) = setup();
        let src = source(&[
            ("Name", DynValue::text("Dora")),
            ("Age", DynValue::text("52")),
            ("Mood", DynValue::text("grumpy")),
        ]);
        apply_dynamic(&mut graph, Some(id), Some(&src));

        assert_eq!(graph.get_by_name(id, "Name").unwrap(), &Value::from("Dora"));
        assert_eq!(graph.get_by_name(id, "Age").unwrap(), &Value::Scalar(Scalar::Int(52)));
        assert_eq!(
            graph.get_by_name(id, "Mood").unwrap(),
            &Value::Scalar(Scalar::Enum(EnumValue::new(types.mood, 2)))
        );
    }

    #[test]
    fn missing_keys_clear_fields() {
        let (_, mut graph, id) = setup();
        apply_dynamic(&mut graph, Some(id), Some(&source(&[("Name", DynValue::text("Eve"))])));

        assert!(graph.get_by_name(id, "Nicknames").unwrap().is_absent());
        assert!(graph.get_by_name(id, "Labels").unwrap().is_absent());
        // non-nullable terminal falls back to zero
        assert_eq!(graph.get_by_name(id, "Age").unwrap(), &Value::Scalar(Scalar::Int(0)));
    }

    #[test]
    fn failed_coercion_leaves_field_unchanged() {
        let (_, mut graph, id) = setup();
        let src = source(&[("Name", DynValue::text("Cleo")), ("Age", DynValue::text("old"))]);
        apply_dynamic(&mut graph, Some(id), Some(&src));
        assert_eq!(graph.get_by_name(id, "Age").unwrap(), &Value::Scalar(Scalar::Int(44)));
    }

    #[test]
    fn read_only_fields_skipped() {
        let (_, mut graph, id) = setup();
        graph.set_by_name(id, "Badge", "gold".into()).unwrap();
        apply_dynamic(&mut graph, Some(id), Some(&source(&[])));
        assert_eq!(graph.get_by_name(id, "Badge").unwrap(), &Value::from("gold"));
    }

    #[test]
    fn lists_rebuilt() {
        let (_, mut graph, id) = setup();
        let nicknames = DynList::from_items(vec![DynValue::text("X"), DynValue::from(7_i64)]);
        let friends = DynList::from_items(vec![source(&[("Name", DynValue::text("Fay"))])]);
        let src = source(&[
            ("Nicknames", DynValue::List(nicknames)),
            ("Friends", DynValue::List(friends)),
            ("Pets", DynValue::text("not a list")),
        ]);
        apply_dynamic(&mut graph, Some(id), Some(&src));

        assert_eq!(
            graph.get_by_name(id, "Nicknames").unwrap(),
            &Value::Seq(vec!["X".into(), "7".into()])
        );
        let friends = graph.get_by_name(id, "Friends").unwrap().as_seq().unwrap().to_vec();
        assert_eq!(friends.len(), 1);
        let fay = friends[0].as_object().unwrap();
        assert_eq!(graph.get_by_name(fay, "Name").unwrap(), &Value::from("Fay"));
        assert_eq!(graph.get_by_name(id, "Pets").unwrap(), &Value::Seq(vec![]));
    }

    #[test]
    fn null_elements_dropped_for_non_nullable_terminals() {
        let mut registry = TypeRegistry::new();
        let ty = registry
            .composite("Tally")
            .unwrap()
            .field("Counts", FieldType::list(FieldType::terminal(TerminalKind::I32)))
            .field("Maybe", FieldType::list(FieldType::nullable(TerminalKind::I32)))
            .field("ById", FieldType::keyed_map(KeyKind::Int, FieldType::terminal(TerminalKind::I32)))
            .finish()
            .unwrap();
        let mut graph = ObjectGraph::new(Arc::new(registry));
        let id = graph.instantiate(ty).unwrap();

        let items = || DynList::from_items(vec![DynValue::from(1_i64), DynValue::Null]);
        let by_id = DynMap::new();
        by_id.insert("1", DynValue::Null);
        by_id.insert("2", DynValue::from(2_i64));
        let src = source(&[
            ("Counts", DynValue::List(items())),
            ("Maybe", DynValue::List(items())),
            ("ById", DynValue::Map(by_id)),
        ]);
        apply_dynamic(&mut graph, Some(id), Some(&src));

        assert_eq!(
            graph.get_by_name(id, "Counts").unwrap(),
            &Value::Seq(vec![Value::Scalar(Scalar::Int(1))])
        );
        assert_eq!(
            graph.get_by_name(id, "Maybe").unwrap(),
            &Value::Seq(vec![Value::Scalar(Scalar::Int(1)), Value::Absent])
        );
        let by_id = graph.get_by_name(id, "ById").unwrap().as_map().unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id.get(&MapKey::Int(2)), Some(&Value::Scalar(Scalar::Int(2))));
    }

    #[test]
    fn maps_rebuilt_from_maps_and_pairs() {
        let (_, mut graph, id) = setup();
        let labels = DynMap::new();
        labels.insert("tier", DynValue::text("gold"));
        let pair = DynMap::new();
        pair.insert("Key", DynValue::text("3"));
        pair.insert("Value", DynValue::text("4.5"));
        let bad = DynMap::new();
        bad.insert("Key", DynValue::text("three"));
        bad.insert("Value", DynValue::text("1"));
        let src = source(&[
            ("Labels", DynValue::Map(labels)),
            ("Scores", DynValue::List(DynList::from_items(vec![DynValue::Map(pair), DynValue::Map(bad)]))),
        ]);
        apply_dynamic(&mut graph, Some(id), Some(&src));

        let labels = graph.get_by_name(id, "Labels").unwrap().as_map().unwrap();
        assert_eq!(labels.get(&MapKey::text("tier")), Some(&Value::from("gold")));
        let scores = graph.get_by_name(id, "Scores").unwrap().as_map().unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get(&MapKey::Int(3)), Some(&Value::Scalar(Scalar::Float(4.5))));
    }

    #[test]
    fn nested_composite_updated_in_place() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let owner = person(&mut graph, &types, "Gus", 9);
        let friend = person(&mut graph, &types, "Hal", 10);
        graph.set_by_name(owner, "BestFriend", Value::Object(friend)).unwrap();

        let src = source(&[("BestFriend", source(&[("Name", DynValue::text("Hank"))]))]);
        apply_dynamic(&mut graph, Some(owner), Some(&src));

        assert_eq!(graph.get_by_name(owner, "BestFriend").unwrap().as_object(), Some(friend));
        assert_eq!(graph.get_by_name(friend, "Name").unwrap(), &Value::from("Hank"));
    }

    #[test]
    fn nested_composite_created() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let owner = person(&mut graph, &types, "Ida", 3);
        let src = source(&[("BestFriend", source(&[("Age", DynValue::from(4_i64))]))]);
        apply_dynamic(&mut graph, Some(owner), Some(&src));

        let friend = graph.get_by_name(owner, "BestFriend").unwrap().as_object().unwrap();
        assert_eq!(graph.get_by_name(friend, "Age").unwrap(), &Value::Scalar(Scalar::Int(4)));
    }

    #[test]
    fn typed_source_copied_field_by_field() {
        let (types, mut graph, source_id) = setup();
        let target = graph.instantiate(types.person).unwrap();
        apply_dynamic(&mut graph, Some(target), Some(&DynValue::Typed(source_id)));

        for field in ["Name", "Age", "Nicknames", "Scores", "Labels"] {
            assert_eq!(
                graph.get_by_name(target, field).unwrap(),
                graph.get_by_name(source_id, field).unwrap(),
                "{field}"
            );
        }
    }

    #[test]
    fn hooks_ignored_and_absent_sides_noop() {
        let (_, mut graph, id) = setup();
        let src = source(&[
            ("Name", DynValue::text("Jo")),
            ("Run", DynValue::Hook(expando_model::Hook::action("Run", || Ok(DynValue::Null)))),
        ]);
        apply_dynamic(&mut graph, Some(id), Some(&src));
        assert_eq!(graph.get_by_name(id, "Name").unwrap(), &Value::from("Jo"));

        apply_dynamic(&mut graph, None, Some(&src));
        apply_dynamic(&mut graph, Some(id), None);
        apply_dynamic(&mut graph, Some(id), Some(&DynValue::text("scalar")));
        assert_eq!(graph.get_by_name(id, "Name").unwrap(), &Value::from("Jo"));
    }

    #[test]
    fn self_referencing_source_bounded() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let target = graph.instantiate(types.person).unwrap();
        let looped = DynMap::new();
        looped.insert("Name", DynValue::text("Loop"));
        looped.insert("BestFriend", DynValue::Map(looped.clone()));

        let config = WalkConfig::new().with_max_depth(5);
        apply_dynamic_with(&mut graph, Some(target), Some(&DynValue::Map(looped.clone())), &config);

        // target plus one nested person per level up to the cap
        assert_eq!(graph.len(), 6);
        looped.remove("BestFriend");
    }

    #[test]
    fn element_materialized_from_map() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let item = source(&[("Name", DynValue::text("Kai"))]);
        let value = materialize(&mut graph, &FieldType::composite(types.person), &item, 64).unwrap();
        let id = value.as_object().unwrap();
        assert_eq!(graph.get_by_name(id, "Name").unwrap(), &Value::from("Kai"));

        assert!(materialize(
            &mut graph,
            &FieldType::terminal(TerminalKind::I32),
            &DynValue::text("nope"),
            64
        )
        .is_none());
    }
}
