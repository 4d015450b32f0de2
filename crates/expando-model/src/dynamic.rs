//! Dynamic attribute maps
//!
//! The untyped tree handed to a host environment: [`DynValue`] is a tagged
//! variant over scalars, ordered lists, ordered string-keyed maps and callable
//! hooks. Lists and maps are shared handles so that a hook invoked later can
//! mirror its mutation into the very tree the host is holding.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{json, Map as JsonMap, Number, Value as JsonValue};

use crate::graph::{GraphError, ObjectId};
use crate::scalar::Scalar;

/// Placeholder emitted where a walk re-enters an object already on its path
pub const CYCLE_SENTINEL: &str = "[[CircularReference]]";

/// Placeholder emitted where a walk exceeds its depth cap
pub const DEPTH_SENTINEL: &str = "[[MaxDepthReached]]";

const JSON_DEPTH_LIMIT: usize = 128;

/// Value in a dynamic attribute tree
#[derive(Clone, Default)]
pub enum DynValue {
    #[default]
    Null,
    Scalar(Scalar),
    List(DynList),
    Map(DynMap),
    Hook(Hook),
    /// Live reference to an object in the typed graph
    Typed(ObjectId),
}

impl DynValue {
    /// Text value
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(value.into()))
    }

    /// Whether this is `Null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
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

    /// Borrow as text
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_text)
    }

    /// List handle, if any
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&DynList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Map handle, if any
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&DynMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Hook, if any
    #[inline]
    #[must_use]
    pub fn as_hook(&self) -> Option<&Hook> {
        match self {
            Self::Hook(hook) => Some(hook),
            _ => None,
        }
    }

    /// Typed object reference, if any
    #[inline]
    #[must_use]
    pub fn as_typed(&self) -> Option<ObjectId> {
        match self {
            Self::Typed(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether this is the cycle placeholder
    #[must_use]
    pub fn is_cycle_sentinel(&self) -> bool {
        self.as_text() == Some(CYCLE_SENTINEL)
    }

    /// Whether this is the depth placeholder
    #[must_use]
    pub fn is_depth_sentinel(&self) -> bool {
        self.as_text() == Some(DEPTH_SENTINEL)
    }

    /// Variant name used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Scalar(s) => s.type_name(),
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Hook(_) => "hook",
            Self::Typed(_) => "object",
        }
    }

    /// Lossy JSON export for diagnostics
    ///
    /// Hooks render as `"<hook name/arity>"`, typed references as
    /// `"<object #n>"`. Self-containing trees are cut at a fixed depth.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        self.to_json_at(0)
    }

    fn to_json_at(&self, depth: usize) -> JsonValue {
        if depth > JSON_DEPTH_LIMIT {
            return JsonValue::String(DEPTH_SENTINEL.to_string());
        }
        match self {
            Self::Null => JsonValue::Null,
            Self::Scalar(s) => scalar_to_json(s),
            Self::List(list) => JsonValue::Array(
                list.items()
                    .iter()
                    .map(|item| item.to_json_at(depth + 1))
                    .collect(),
            ),
            Self::Map(map) => {
                let mut out = JsonMap::new();
                for (key, value) in map.entries() {
                    out.insert(key, value.to_json_at(depth + 1));
                }
                JsonValue::Object(out)
            }
            Self::Hook(hook) => json!(format!("<hook {}/{}>", hook.name(), hook.arity())),
            Self::Typed(id) => json!(format!("<object {id}>")),
        }
    }
}

fn scalar_to_json(scalar: &Scalar) -> JsonValue {
    match scalar {
        Scalar::Bool(b) => JsonValue::Bool(*b),
        Scalar::Int(v) => JsonValue::Number(Number::from(*v)),
        Scalar::UInt(v) => JsonValue::Number(Number::from(*v)),
        Scalar::Float(v) => Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
        other => JsonValue::String(other.to_string()),
    }
}

impl PartialEq for DynValue {
    fn eq(&self, other: &Self) -> bool {
        value_eq(self, other, &mut Vec::new())
    }
}

/// Structural equality over possibly cyclic trees
///
/// `open` holds the container pairs currently being compared; meeting one
/// again means the cycle matched so far, so it counts as equal.
fn value_eq(a: &DynValue, b: &DynValue, open: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (DynValue::Null, DynValue::Null) => true,
        (DynValue::Scalar(a), DynValue::Scalar(b)) => a == b,
        (DynValue::List(a), DynValue::List(b)) => list_eq(a, b, open),
        (DynValue::Map(a), DynValue::Map(b)) => map_eq(a, b, open),
        (DynValue::Hook(a), DynValue::Hook(b)) => a.same(b),
        (DynValue::Typed(a), DynValue::Typed(b)) => a == b,
        _ => false,
    }
}

fn map_eq(a: &DynMap, b: &DynMap, open: &mut Vec<(usize, usize)>) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    let pair = (a.addr(), b.addr());
    if open.contains(&pair) {
        return true;
    }
    let (left, right) = (a.entries(), b.entries());
    if left.len() != right.len() {
        return false;
    }
    open.push(pair);
    let equal = left
        .iter()
        .zip(&right)
        .all(|((ka, va), (kb, vb))| ka == kb && value_eq(va, vb, open));
    open.pop();
    equal
}

fn list_eq(a: &DynList, b: &DynList, open: &mut Vec<(usize, usize)>) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    let pair = (a.addr(), b.addr());
    if open.contains(&pair) {
        return true;
    }
    let (left, right) = (a.items(), b.items());
    if left.len() != right.len() {
        return false;
    }
    open.push(pair);
    let equal = left.iter().zip(&right).all(|(x, y)| value_eq(x, y, open));
    open.pop();
    equal
}

impl fmt::Debug for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Scalar(s) => write!(f, "{s:?}"),
            Self::List(list) => f.debug_list().entries(list.items()).finish(),
            Self::Map(map) => f.debug_map().entries(map.entries()).finish(),
            Self::Hook(hook) => write!(f, "{hook:?}"),
            Self::Typed(id) => write!(f, "Typed({id})"),
        }
    }
}

impl From<Scalar> for DynValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for DynValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<i64> for DynValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<DynMap> for DynValue {
    fn from(value: DynMap) -> Self {
        Self::Map(value)
    }
}

impl From<DynList> for DynValue {
    fn from(value: DynList) -> Self {
        Self::List(value)
    }
}

impl From<Hook> for DynValue {
    fn from(value: Hook) -> Self {
        Self::Hook(value)
    }
}

/// Shared, ordered, string-keyed attribute map
///
/// Clones share storage.
#[derive(Clone, Default)]
pub struct DynMap(Arc<RwLock<IndexMap<String, DynValue>>>);

impl DynMap {
    /// Create empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the value under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<DynValue> {
        self.0.read().get(key).cloned()
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&self, key: impl Into<String>, value: DynValue) -> Option<DynValue> {
        self.0.write().insert(key.into(), value)
    }

    /// Remove a key, preserving the order of the rest
    pub fn remove(&self, key: &str) -> Option<DynValue> {
        self.0.write().shift_remove(key)
    }

    /// Whether `key` is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    /// Keys in insertion order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// Snapshot of all entries in insertion order
    #[must_use]
    pub fn entries(&self) -> Vec<(String, DynValue)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether the map has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Whether both handles share storage
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// First free key among `desired`, `desired_1`, `desired_2`, …
    #[must_use]
    pub fn unique_key(&self, desired: &str) -> String {
        let guard = self.0.read();
        if !guard.contains_key(desired) {
            return desired.to_string();
        }
        (1_usize..)
            .map(|n| format!("{desired}_{n}"))
            .find(|candidate| !guard.contains_key(candidate))
            .unwrap_or_else(|| desired.to_string())
    }

    /// Insert under the first free key derived from `desired`, returning the key used
    pub fn insert_unique(&self, desired: &str, value: DynValue) -> String {
        let mut guard = self.0.write();
        let key = if guard.contains_key(desired) {
            (1_usize..)
                .map(|n| format!("{desired}_{n}"))
                .find(|candidate| !guard.contains_key(candidate))
                .unwrap_or_else(|| desired.to_string())
        } else {
            desired.to_string()
        };
        guard.insert(key.clone(), value);
        key
    }

    /// Follow a dotted key path through nested maps (`Invoice.Seller.Name`)
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<DynValue> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_map()?.get(part)?;
        }
        Some(current)
    }

    /// Invoke the hook stored under `name`
    ///
    /// # Errors
    /// Returns error if the key is missing, does not hold a hook or the hook fails
    pub fn call(&self, name: &str, args: &[DynValue]) -> Result<DynValue, HookError> {
        match self.get(name) {
            Some(DynValue::Hook(hook)) => hook.invoke(args),
            Some(_) => Err(HookError::NotAHook(name.to_string())),
            None => Err(HookError::Missing(name.to_string())),
        }
    }
}

impl PartialEq for DynMap {
    fn eq(&self, other: &Self) -> bool {
        map_eq(self, other, &mut Vec::new())
    }
}

impl fmt::Debug for DynMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

/// Shared, ordered list
///
/// Clones share storage.
#[derive(Clone, Default)]
pub struct DynList(Arc<RwLock<Vec<DynValue>>>);

impl DynList {
    /// Create empty list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create list from items
    #[must_use]
    pub fn from_items(items: Vec<DynValue>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    /// Append an item
    pub fn push(&self, value: DynValue) {
        self.0.write().push(value);
    }

    /// Clone of the item at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<DynValue> {
        self.0.read().get(index).cloned()
    }

    /// Replace the item at `index`; returns false when out of bounds
    pub fn set(&self, index: usize, value: DynValue) -> bool {
        match self.0.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all items
    #[must_use]
    pub fn items(&self) -> Vec<DynValue> {
        self.0.read().clone()
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Remove all items
    pub fn clear(&self) {
        self.0.write().clear();
    }

    /// Whether both handles share storage
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl PartialEq for DynList {
    fn eq(&self, other: &Self) -> bool {
        list_eq(self, other, &mut Vec::new())
    }
}

impl fmt::Debug for DynList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items()).finish()
    }
}

type HookFn = dyn Fn(&[DynValue]) -> Result<DynValue, HookError> + Send + Sync;

/// Named callable attached to a dynamic map
#[derive(Clone)]
pub struct Hook {
    name: Arc<str>,
    arity: usize,
    f: Arc<HookFn>,
}

impl Hook {
    /// Create hook taking `arity` arguments
    pub fn new<F>(name: impl Into<Arc<str>>, arity: usize, f: F) -> Self
    where
        F: Fn(&[DynValue]) -> Result<DynValue, HookError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            f: Arc::new(f),
        }
    }

    /// Zero-argument hook
    pub fn action<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn() -> Result<DynValue, HookError> + Send + Sync + 'static,
    {
        Self::new(name, 0, move |_| f())
    }

    /// One-argument hook
    pub fn unary<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&DynValue) -> Result<DynValue, HookError> + Send + Sync + 'static,
    {
        Self::new(name, 1, move |args: &[DynValue]| f(&args[0]))
    }

    /// Hook name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments the hook takes
    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Call the hook
    ///
    /// # Errors
    /// Returns error on an argument count mismatch or when the hook itself fails
    pub fn invoke(&self, args: &[DynValue]) -> Result<DynValue, HookError> {
        if args.len() != self.arity {
            return Err(HookError::Arity {
                name: self.name.to_string(),
                expected: self.arity,
                found: args.len(),
            });
        }
        (self.f)(args)
    }

    /// Whether both hooks share the same callable
    #[inline]
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({}/{})", self.name, self.arity)
    }
}

/// Errors raised by hook invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// The operation is not valid for the captured state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Wrong number of arguments for the hook
    #[error("hook '{name}' takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    /// The entry exists but holds a plain value
    #[error("'{0}' is not a hook")]
    NotAHook(String),

    /// No entry under this name
    #[error("no hook named '{0}'")]
    Missing(String),

    /// The hook's write to the graph failed
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unique_key_suffixes() {
        let map = DynMap::new();
        assert_eq!(map.unique_key("Run"), "Run");
        map.insert("Run", DynValue::Null);
        assert_eq!(map.unique_key("Run"), "Run_1");
        map.insert("Run_1", DynValue::Null);
        assert_eq!(map.unique_key("Run"), "Run_2");
    }

    #[test]
    fn insert_unique_never_overwrites() {
        let map = DynMap::new();
        map.insert("Run", "data".into());
        let key = map.insert_unique("Run", DynValue::Null);
        assert_eq!(key, "Run_1");
        assert_eq!(map.get("Run"), Some(DynValue::text("data")));
    }

    #[test]
    fn self_containing_maps_compare_structurally() {
        let a = DynMap::new();
        a.insert("Name", DynValue::text("loop"));
        a.insert("Self", DynValue::Map(a.clone()));
        let b = DynMap::new();
        b.insert("Name", DynValue::text("loop"));
        b.insert("Self", DynValue::Map(b.clone()));
        assert!(a == b);

        let c = DynMap::new();
        c.insert("Name", DynValue::text("other"));
        c.insert("Self", DynValue::Map(c.clone()));
        assert!(a != c);

        let list = DynList::new();
        list.push(DynValue::List(list.clone()));
        let twin = DynList::new();
        twin.push(DynValue::List(twin.clone()));
        assert!(list == twin);
    }

    #[test]
    fn clones_share_storage() {
        let map = DynMap::new();
        let alias = map.clone();
        alias.insert("x", 1.into());
        assert_eq!(map.get("x"), Some(DynValue::from(1)));

        let list = DynList::new();
        let alias = list.clone();
        alias.push("a".into());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn lookup_follows_nested_maps() {
        let inner = DynMap::new();
        inner.insert("City", "Oslo".into());
        let root = DynMap::new();
        root.insert("Address", inner.into());
        assert_eq!(root.lookup("Address.City"), Some(DynValue::text("Oslo")));
        assert_eq!(root.lookup("Address.Zip"), None);
    }

    #[test]
    fn hook_arity_checked() {
        let hook = Hook::unary("Echo", |v| Ok(v.clone()));
        assert_eq!(hook.invoke(&["x".into()]).unwrap(), DynValue::text("x"));
        assert!(matches!(hook.invoke(&[]), Err(HookError::Arity { .. })));
    }

    #[test]
    fn call_reports_missing_and_non_hook() {
        let map = DynMap::new();
        map.insert("Name", "x".into());
        map.insert("Run", Hook::action("Run", || Ok(DynValue::Null)).into());
        assert!(matches!(map.call("Nope", &[]), Err(HookError::Missing(_))));
        assert!(matches!(map.call("Name", &[]), Err(HookError::NotAHook(_))));
        assert_eq!(map.call("Run", &[]).unwrap(), DynValue::Null);
    }

    #[test]
    fn sentinels_detected() {
        assert!(DynValue::text(CYCLE_SENTINEL).is_cycle_sentinel());
        assert!(DynValue::text(DEPTH_SENTINEL).is_depth_sentinel());
        assert!(!DynValue::text("x").is_cycle_sentinel());
    }

    #[test]
    fn json_export() {
        let map = DynMap::new();
        map.insert("Name", "Ada".into());
        map.insert("Age", 36.into());
        map.insert("Tags", DynList::from_items(vec!["a".into()]).into());
        map.insert("Run", Hook::action("Run", || Ok(DynValue::Null)).into());
        assert_eq!(
            DynValue::Map(map).to_json(),
            json!({"Name": "Ada", "Age": 36, "Tags": ["a"], "Run": "<hook Run/0>"})
        );
    }

    #[test]
    fn json_export_cuts_self_containing_map() {
        let map = DynMap::new();
        map.insert("Self", map.clone().into());
        let exported = DynValue::Map(map).to_json();
        assert!(exported.get("Self").is_some());
    }
}
