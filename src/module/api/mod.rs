//! Capability registry for modules
//!
//! Holds the api objects modules publish for each other and for the host.

pub mod hub;

pub use hub::ApiHub;
