//! Modules shipped with the host

pub mod heartbeat;

pub use heartbeat::{HeartbeatApi, HeartbeatModule, HeartbeatSettings, HEARTBEAT_MODULE_ID};

use crate::module::loader::EntryRegistry;

/// Register every built-in entry point
pub fn register_builtin(entries: &mut EntryRegistry) -> &mut EntryRegistry {
    entries.register_default::<HeartbeatModule>(HEARTBEAT_MODULE_ID)
}
