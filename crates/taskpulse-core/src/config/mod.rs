//! Configuration for the assistant core
//!
//! Plain serde types with defaults. Reading files and resolving environment
//! variables is the job of the embedding application.

pub mod types;

pub use types::*;
