//! expando data model
//!
//! Typed object graphs described by per-type descriptor tables, and the
//! dynamic attribute maps they are converted to and from.
//!
//! # Core Concepts
//!
//! - [`TypeRegistry`]: descriptor tables (fields, access, declared type tags)
//! - [`ObjectGraph`]: arena of typed composite instances addressed by [`ObjectId`]
//! - [`Value`] / [`Scalar`]: field slot contents and terminal leaves
//! - [`DynValue`] / [`DynMap`]: the untyped tree a host environment consumes
//! - [`WalkConfig`]: depth cap, hook naming and null handling for the walkers
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use expando_model::{FieldType, ObjectGraph, TypeRegistry, Value};
//!
//! let mut registry = TypeRegistry::new();
//! let city = registry
//!     .composite("City")
//!     .unwrap()
//!     .field("Name", FieldType::text())
//!     .finish()
//!     .unwrap();
//!
//! let mut graph = ObjectGraph::new(Arc::new(registry));
//! let oslo = graph.instantiate(city).unwrap();
//! graph.set_by_name(oslo, "Name", Value::from("Oslo")).unwrap();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod coerce;
mod config;
mod dynamic;
mod graph;
mod path;
mod scalar;
mod schema;

pub use coerce::{coerce, to_text, CoercionError};
pub use config::{ConfigError, WalkConfig, DEFAULT_HOOK_NAME, DEFAULT_MAX_DEPTH};
pub use dynamic::{
    DynList, DynMap, DynValue, Hook, HookError, CYCLE_SENTINEL, DEPTH_SENTINEL,
};
pub use graph::{GraphError, ObjectGraph, ObjectId, SharedGraph, Value};
pub use path::{NodePath, PathError, Segment, ROOT};
pub use scalar::{EnumValue, KeyKind, MapKey, Scalar, TerminalKind};
pub use schema::{
    EnumVariant, FieldDescriptor, FieldType, SchemaError, SeqShape, TypeBuilder,
    TypeDescriptor, TypeKey, TypeKind, TypeRegistry,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
