//! Core graph logic: types, parsing, registry, graph model, loading.

pub mod error;
pub mod graph;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod types;
