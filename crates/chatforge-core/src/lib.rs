//! # ChatForge Core
//!
//! Shared types, traits, configuration, and errors for the ChatForge
//! knowledge-retrieval engine.
//!
//! Everything the other crates agree on lives here: the knowledge data
//! model (items, chunks, leads), the chat message shapes, the tool
//! declaration union, and the narrow trait seams to the external
//! collaborators (embedding provider, streaming chat provider, vector
//! store, lead sink).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ChatForgeError, Result};
