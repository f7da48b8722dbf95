//! pm-core: stable foundation for the prognostics model workspace.
//!
//! Contains:
//! - keys (ordered, duplicate-free identifier sets)
//! - values (named scalar maps used for states, inputs, outputs, events)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod keys;
pub mod numeric;
pub mod values;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use keys::KeySet;
pub use numeric::*;
pub use values::NamedValues;
