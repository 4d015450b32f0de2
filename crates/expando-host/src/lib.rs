//! expando host boundary
//!
//! Exposes typed graphs to a scripting host through [`ScriptHost`].
//!
//! An [`InteropSession`] binds type handles and converted attribute maps into
//! the host, runs scripts, and maps host edits back onto the typed objects.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod handle;
mod ident;
mod session;

pub use error::HostError;
pub use handle::{handles, FieldSummary, TypeHandle};
pub use ident::host_identifier;
pub use session::{HostBinding, InteropSession, ScriptHost};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
