//! expando graph walkers
//!
//! Cycle-safe, depth-capped traversals over an [`ObjectGraph`].
//!
//! # Walkers
//!
//! - [`discover`]: closed set of types reachable from a root
//! - [`ensure_non_empty`]: top-down, every reachable collection gets an element
//! - [`prune_defaults`]: bottom-up, default-like content is stripped
//! - [`to_dynamic`] / [`to_dynamic_with_list_hooks`]: typed graph → [`DynMap`]
//! - [`apply_dynamic`]: [`DynValue`] tree → typed graph
//!
//! Every call starts with a fresh path guard and depth counter. Objects
//! reachable along two paths are visited on each; only a cycle on the current
//! path is cut. The populator is the exception and fills each object once.
//!
//! [`ObjectGraph`]: expando_model::ObjectGraph
//! [`DynMap`]: expando_model::DynMap
//! [`DynValue`]: expando_model::DynValue

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod apply;
mod catalog;
mod convert;
mod error;
mod list_hooks;
mod populate;
mod prune;
mod visit;

pub use apply::{apply_dynamic, apply_dynamic_with};
pub use catalog::{discover, discover_from_type, TypeCatalog};
pub use convert::{
    to_dynamic, to_dynamic_with_list_hooks, DynamicConverter, HookFactory, HookSite,
    LoggingHookFactory,
};
pub use error::WalkError;
pub use populate::{ensure_non_empty, ensure_non_empty_with};
pub use prune::{prune_defaults, prune_defaults_with};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
