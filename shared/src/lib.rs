//! Shared types for the idea generation engine
//!
//! Contains the data model visible to both the engine and its observers,
//! the error taxonomy, and tracing setup. Engine-internal types stay in
//! the engine crate.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
