//! Module system tests
//!
//! Tests for discovery, dependency resolution, the module lifecycle, the
//! capability registry and the configuration store.

pub mod api_tests;
pub mod lifecycle_tests;
