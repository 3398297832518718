//! Module loading system
//!
//! Resolves the entry point behind a manifest into a runnable module instance.

pub mod loader;

pub use loader::{EntryFactory, EntryRegistry};
