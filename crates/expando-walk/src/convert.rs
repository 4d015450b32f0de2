//! Typed graph → dynamic attribute maps
//!
//! Terminals pass through, composites and text-keyed maps become attribute
//! maps carrying a per-node hook, other keyed maps become lists of
//! `{Key, Value}` pairs, sequences become lists. Re-entering an object on the
//! current path yields [`CYCLE_SENTINEL`], passing the depth cap yields
//! [`DEPTH_SENTINEL`].

use std::fmt;
use std::sync::Arc;

use expando_model::{
    DynList, DynMap, DynValue, FieldType, Hook, KeyKind, MapKey, NodePath, ObjectGraph, ObjectId,
    SharedGraph, Value, WalkConfig, CYCLE_SENTINEL, DEPTH_SENTINEL,
};
use indexmap::IndexMap;
use tracing::{debug, info, trace, warn};

use crate::list_hooks::{self, ListField};
use crate::visit::PathGuard;

/// Where a node hook is being attached
#[derive(Debug, Clone, Copy)]
pub struct HookSite<'a> {
    /// Path of the node the hook is attached to
    pub path: &'a NodePath,
    /// The typed object behind the node, when there is one
    pub object: Option<ObjectId>,
    /// Declared or runtime type name of the node
    pub type_name: &'a str,
    /// Desired attribute name of the hook
    pub hook_name: &'a str,
}

/// Produces the hook attached to every converted node
pub trait HookFactory: Send + Sync {
    /// Create the hook for one node
    fn create(&self, site: &HookSite<'_>) -> Hook;
}

impl<F> HookFactory for F
where
    F: Fn(&HookSite<'_>) -> Hook + Send + Sync,
{
    fn create(&self, site: &HookSite<'_>) -> Hook {
        self(site)
    }
}

/// Hook factory whose hooks log the node path and type when invoked
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHookFactory;

impl HookFactory for LoggingHookFactory {
    fn create(&self, site: &HookSite<'_>) -> Hook {
        let path = site.path.to_string();
        let type_name = site.type_name.to_string();
        Hook::action(site.hook_name.to_string(), move || {
            info!("[{path}] hook invoked on {type_name}");
            Ok(DynValue::Null)
        })
    }
}

/// Converts typed graphs into dynamic attribute trees
///
/// Node hooks are attached only when a [`HookFactory`] is configured. With
/// list hooks enabled every sequence field additionally receives
/// `AddTo_{Field}` and `AddDefaultTo_{Field}` hooks that append to the live
/// graph behind the [`SharedGraph`].
#[derive(Clone)]
pub struct DynamicConverter {
    config: WalkConfig,
    node_hooks: Option<Arc<dyn HookFactory>>,
    list_hooks: Option<SharedGraph>,
}

impl DynamicConverter {
    /// Create converter without hooks
    #[must_use]
    pub fn new(config: WalkConfig) -> Self {
        Self {
            config,
            node_hooks: None,
            list_hooks: None,
        }
    }

    /// With a per-node hook factory
    #[must_use]
    pub fn with_node_hooks(mut self, factory: Arc<dyn HookFactory>) -> Self {
        self.node_hooks = Some(factory);
        self
    }

    /// With append hooks on sequence fields, mutating `graph` when invoked
    #[must_use]
    pub fn with_list_hooks(mut self, graph: SharedGraph) -> Self {
        self.list_hooks = Some(graph);
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Convert `root`; a result that is not a map is wrapped as `{Value}`
    #[must_use]
    pub fn convert(&self, graph: &ObjectGraph, root: &Value) -> DynMap {
        let path = NodePath::root();
        match self.convert_at(graph, root, None, &path, 0) {
            DynValue::Map(map) => map,
            other => {
                let wrapper = DynMap::new();
                wrapper.insert("Value", other);
                let type_name = match root {
                    Value::Absent => "<null>",
                    value => value.kind_name(),
                };
                self.attach_node_hook(&wrapper, &path, None, type_name);
                wrapper
            }
        }
    }

    /// Convert the object `root`
    #[must_use]
    pub fn convert_object(&self, graph: &ObjectGraph, root: ObjectId) -> DynMap {
        self.convert(graph, &Value::Object(root))
    }

    /// Convert `root` while holding a read lock on `graph`
    #[must_use]
    pub fn convert_shared(&self, graph: &SharedGraph, root: Option<ObjectId>) -> DynMap {
        let guard = graph.read();
        self.convert(&guard, &root.map_or(Value::Absent, Value::Object))
    }

    /// Convert a value found at `path` and `depth`, typed by `hint` when known
    pub(crate) fn convert_at(
        &self,
        graph: &ObjectGraph,
        value: &Value,
        hint: Option<&FieldType>,
        path: &NodePath,
        depth: usize,
    ) -> DynValue {
        let mut conversion = Conversion {
            converter: self,
            graph,
            guard: PathGuard::default(),
        };
        conversion.node(value, hint, path, depth)
    }

    fn attach_node_hook(&self, map: &DynMap, path: &NodePath, object: Option<ObjectId>, type_name: &str) {
        if let Some(factory) = &self.node_hooks {
            let site = HookSite {
                path,
                object,
                type_name,
                hook_name: &self.config.hook_name,
            };
            let hook = factory.create(&site);
            let key = map.insert_unique(&self.config.hook_name, DynValue::Hook(hook));
            trace!(%path, key = %key, "node hook attached");
        }
    }
}

impl fmt::Debug for DynamicConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicConverter")
            .field("config", &self.config)
            .field("node_hooks", &self.node_hooks.is_some())
            .field("list_hooks", &self.list_hooks.is_some())
            .finish()
    }
}

/// Convert `root` with node hooks from `factory`, or logging hooks when `None`
#[must_use]
pub fn to_dynamic(
    graph: &ObjectGraph,
    root: Option<ObjectId>,
    config: &WalkConfig,
    factory: Option<Arc<dyn HookFactory>>,
) -> DynMap {
    let factory = factory.unwrap_or_else(|| Arc::new(LoggingHookFactory));
    DynamicConverter::new(config.clone())
        .with_node_hooks(factory)
        .convert(graph, &root.map_or(Value::Absent, Value::Object))
}

/// Convert `root` with append hooks on every sequence field
///
/// The hooks hold `graph` and take its write lock when invoked, so the caller
/// must not hold a lock at that point.
#[must_use]
pub fn to_dynamic_with_list_hooks(
    graph: &SharedGraph,
    root: Option<ObjectId>,
    config: &WalkConfig,
) -> DynMap {
    DynamicConverter::new(config.clone())
        .with_list_hooks(Arc::clone(graph))
        .convert_shared(graph, root)
}

/// State of one conversion call
struct Conversion<'c, 'g> {
    converter: &'c DynamicConverter,
    graph: &'g ObjectGraph,
    guard: PathGuard,
}

impl Conversion<'_, '_> {
    fn node(&mut self, value: &Value, hint: Option<&FieldType>, path: &NodePath, depth: usize) -> DynValue {
        if depth > self.converter.config.max_depth {
            warn!(%path, depth, "depth cap reached");
            return DynValue::text(DEPTH_SENTINEL);
        }
        match value {
            Value::Absent => DynValue::Null,
            Value::Scalar(scalar) => DynValue::Scalar(scalar.clone()),
            Value::Object(id) => self.object(*id, path, depth),
            Value::Seq(items) => {
                let element = hint.and_then(FieldType::element);
                let list = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.node(item, element, &path.index(i), depth + 1))
                    .collect();
                DynValue::List(DynList::from_items(list))
            }
            Value::Map(entries) => self.map(entries, hint, path, depth),
        }
    }

    fn object(&mut self, id: ObjectId, path: &NodePath, depth: usize) -> DynValue {
        if !self.guard.enter(id) {
            trace!(%path, object = %id, "cycle");
            return DynValue::text(CYCLE_SENTINEL);
        }
        let graph = self.graph;
        let desc = match graph.descriptor_of(id) {
            Ok(desc) => desc,
            Err(err) => {
                debug!(%path, error = %err, "unknown object; emitting null");
                self.guard.leave(id);
                return DynValue::Null;
            }
        };
        let include_nulls = self.converter.config.include_nulls;

        let map = DynMap::new();
        for (index, field) in desc.fields().iter().enumerate() {
            if !field.readable {
                continue;
            }
            let Ok(value) = graph.get(id, index) else {
                continue;
            };
            let child_path = path.field(field.name.as_str());
            let converted = self.node(value, Some(&field.ty), &child_path, depth + 1);

            if let (Some(shared), FieldType::Sequence { .. }) = (&self.converter.list_hooks, &field.ty) {
                let mirror = match converted {
                    DynValue::List(list) => list,
                    DynValue::Null => DynList::new(),
                    other => {
                        map.insert(field.name.clone(), other);
                        continue;
                    }
                };
                map.insert(field.name.clone(), DynValue::List(mirror.clone()));
                list_hooks::attach(
                    &map,
                    ListField {
                        graph: Arc::clone(shared),
                        converter: self.converter.clone(),
                        owner: id,
                        field: index,
                        name: field.name.clone(),
                        ty: field.ty.clone(),
                        mirror,
                        path: child_path,
                        item_depth: depth + 2,
                    },
                );
                continue;
            }

            if converted.is_null() && !include_nulls {
                continue;
            }
            map.insert(field.name.clone(), converted);
        }

        self.converter.attach_node_hook(&map, path, Some(id), desc.name());
        self.guard.leave(id);
        DynValue::Map(map)
    }

    fn map(
        &mut self,
        entries: &IndexMap<MapKey, Value>,
        hint: Option<&FieldType>,
        path: &NodePath,
        depth: usize,
    ) -> DynValue {
        let (key_kind, value_ty) = match hint {
            Some(FieldType::Map { key, value }) => (*key, Some(value.as_ref())),
            _ => (
                entries.keys().next().map_or(KeyKind::Text, MapKey::kind),
                None,
            ),
        };
        let type_name = hint.map_or_else(|| "Map".to_string(), |ty| ty.display_name(self.graph.registry()));

        if key_kind == KeyKind::Text {
            let include_nulls = self.converter.config.include_nulls;
            let map = DynMap::new();
            for (key, item) in entries {
                let key = key.to_string();
                let converted = self.node(item, value_ty, &path.field(key.as_str()), depth + 1);
                if converted.is_null() && !include_nulls {
                    continue;
                }
                map.insert(key, converted);
            }
            self.converter.attach_node_hook(&map, path, None, &type_name);
            return DynValue::Map(map);
        }

        let pairs = DynList::new();
        for (key, item) in entries {
            let pair_path = path.key(key);
            let pair = DynMap::new();
            pair.insert("Key", DynValue::text(key.to_string()));
            pair.insert("Value", self.node(item, value_ty, &pair_path, depth + 1));
            self.converter.attach_node_hook(&pair, &pair_path, None, &type_name);
            pairs.push(DynValue::Map(pair));
        }
        DynValue::List(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expando_model::{Scalar, TerminalKind, TypeRegistry};
    use expando_test_utils::{best_friends, graph_for, person, person_types, rich_person};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn plain() -> DynamicConverter {
        DynamicConverter::new(WalkConfig::default())
    }

    #[test]
    fn composite_fields_converted() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let id = rich_person(&mut graph, &types);
        let map = plain().convert_object(&graph, id);

        assert_eq!(map.get("Name"), Some(DynValue::text("Cleo")));
        assert_eq!(map.get("Age"), Some(DynValue::Scalar(Scalar::Int(44))));
        assert_eq!(
            map.lookup("Nicknames").unwrap().as_list().unwrap().items(),
            vec![DynValue::text("C"), DynValue::text("Clee")]
        );
        assert_eq!(map.lookup("Labels.team"), Some(DynValue::text("blue")));
        // absent children dropped without include_nulls
        assert!(!map.contains_key("BestFriend"));
        assert!(!map.contains_key("Run"));
    }

    #[test]
    fn non_text_keyed_maps_become_pairs() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let id = rich_person(&mut graph, &types);
        let map = plain().convert_object(&graph, id);

        let scores = map.get("Scores").unwrap();
        let pairs = scores.as_list().unwrap().items();
        assert_eq!(pairs.len(), 2);
        let first = pairs[0].as_map().unwrap();
        assert_eq!(first.get("Key"), Some(DynValue::text("1")));
        assert_eq!(first.get("Value"), Some(DynValue::Scalar(Scalar::Float(9.5))));
    }

    #[test]
    fn include_nulls_keeps_absent_fields() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let id = person(&mut graph, &types, "Dee", 5);
        let converter = DynamicConverter::new(WalkConfig::new().with_include_nulls(true));
        let map = converter.convert_object(&graph, id);
        assert_eq!(map.get("BestFriend"), Some(DynValue::Null));
        assert_eq!(map.get("Friends"), Some(DynValue::Null));
    }

    #[test]
    fn cycle_yields_sentinel() {
        let (_, graph, a, _) = best_friends();
        let map = plain().convert_object(&graph, a);
        assert_eq!(map.lookup("BestFriend.Name"), Some(DynValue::text("Bob")));
        assert!(map.lookup("BestFriend.BestFriend").unwrap().is_cycle_sentinel());
    }

    #[test]
    fn shared_object_converted_on_each_path() {
        let types = person_types();
        let mut graph = graph_for(&types.registry);
        let shared = person(&mut graph, &types, "Sam", 8);
        let owner = person(&mut graph, &types, "Olga", 40);
        graph.set_by_name(owner, "BestFriend", Value::Object(shared)).unwrap();
        graph
            .set_by_name(owner, "Friends", Value::Seq(vec![Value::Object(shared)]))
            .unwrap();

        let map = plain().convert_object(&graph, owner);
        let friends = map.get("Friends").unwrap().as_list().unwrap().items();
        assert_eq!(friends[0].as_map().unwrap().get("Name"), Some(DynValue::text("Sam")));
        assert_eq!(map.lookup("BestFriend.Name"), Some(DynValue::text("Sam")));
    }

    #[test]
    fn depth_cap_yields_sentinel() {
        let (_, graph, a, _) = best_friends();
        let converter = DynamicConverter::new(WalkConfig::new().with_max_depth(1));
        let map = converter.convert_object(&graph, a);
        assert!(map.lookup("BestFriend.BestFriend").unwrap().is_depth_sentinel());
    }

    #[test]
    fn node_hooks_attached_with_unique_names() {
        let mut registry = TypeRegistry::new();
        let ty = registry
            .composite("Clash")
            .unwrap()
            .field("Run", FieldType::text())
            .finish()
            .unwrap();
        let mut graph = ObjectGraph::new(Arc::new(registry));
        let id = graph.instantiate(ty).unwrap();
        graph.set_by_name(id, "Run", "data".into()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let factory = move |site: &HookSite<'_>| {
            record.lock().push((site.path.to_string(), site.type_name.to_string()));
            Hook::action(site.hook_name.to_string(), || Ok(DynValue::Null))
        };
        let map = to_dynamic(&graph, Some(id), &WalkConfig::default(), Some(Arc::new(factory)));

        assert_eq!(map.get("Run"), Some(DynValue::text("data")));
        assert!(map.get("Run_1").unwrap().as_hook().is_some());
        assert_eq!(seen.lock().clone(), vec![("Root".to_string(), "Clash".to_string())]);
    }

    #[test]
    fn hooks_on_nested_nodes_see_paths() {
        let (_, graph, a, _) = best_friends();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let factory = move |site: &HookSite<'_>| {
            record.lock().push(site.path.to_string());
            Hook::action("noop", || Ok(DynValue::Null))
        };
        let map = to_dynamic(&graph, Some(a), &WalkConfig::default(), Some(Arc::new(factory)));

        assert!(map.call("Run", &[]).is_ok());
        assert_eq!(seen.lock().clone(), vec!["Root.BestFriend", "Root"]);
    }

    #[test]
    fn absent_root_wrapped() {
        let types = person_types();
        let graph = graph_for(&types.registry);
        let map = to_dynamic(&graph, None, &WalkConfig::default(), None);
        assert_eq!(map.get("Value"), Some(DynValue::Null));
        assert!(map.get("Run").unwrap().as_hook().is_some());
    }

    #[test]
    fn scalar_root_wrapped() {
        let graph = graph_for(&person_types().registry);
        let root = Value::Scalar(Scalar::zero(TerminalKind::I32));
        let map = plain().convert(&graph, &root);
        assert_eq!(map.keys(), vec!["Value"]);
    }
}
