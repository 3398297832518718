//! Lock utilities for async contexts
//!
//! Helpers for scoped `RwLock` access with automatic release.

use tokio::sync::RwLock;

/// Execute a closure with a read lock, automatically releasing it
///
/// # Example
/// ```rust,ignore
/// use crate::utils::with_read_lock;
///
/// let len = with_read_lock(&document, |doc| doc.len()).await;
/// ```
pub async fn with_read_lock<T, F, R>(rwlock: &RwLock<T>, f: F) -> R
where
    F: FnOnce(&T) -> R,
{
    let guard = rwlock.read().await;
    f(&guard)
}

/// Execute a closure with a write lock, automatically releasing it
///
/// # Example
/// ```rust,ignore
/// use crate::utils::with_write_lock;
///
/// with_write_lock(&apis, |apis| apis.clear()).await;
/// ```
pub async fn with_write_lock<T, F, R>(rwlock: &RwLock<T>, f: F) -> R
where
    F: FnOnce(&mut T) -> R,
{
    let mut guard = rwlock.write().await;
    f(&mut guard)
}
