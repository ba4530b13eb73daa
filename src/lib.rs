//! mlsgen: compiler from visual pipeline graphs to Python step modules.
//!
//! Templates feed a registry, the loader builds a step/node graph from an
//! exported pipeline, and the generator walks that graph in readiness order
//! to emit one module per step plus an entry point.

pub mod cli;
pub mod codegen;
pub mod core;
