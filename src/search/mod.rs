//! Question routing and multi-category legal research.

pub mod classify;
pub mod engine;
pub mod intent;
mod prompt;

pub use classify::{QueryKind, Service, classify};
pub use intent::analyze;
