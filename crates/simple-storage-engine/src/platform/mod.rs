//! Platform-specific tree stores
//!
//! On Android, removable volumes are reached through the Storage Access
//! Framework ([`android::SafProvider`]). Other platforms have no tree
//! provider of their own; [`default_provider`] returns an empty grant table
//! there, so every non-primary volume fails closed until something is granted.

#[cfg(target_os = "android")]
pub mod android;

use crate::grants::TreeProvider;
use std::sync::Arc;

/// The tree provider backed by the platform's own grant store.
#[cfg(target_os = "android")]
pub fn default_provider() -> Arc<dyn TreeProvider> {
    Arc::new(android::SafProvider)
}

/// The tree provider backed by the platform's own grant store.
#[cfg(not(target_os = "android"))]
pub fn default_provider() -> Arc<dyn TreeProvider> {
    Arc::new(crate::grants::GrantTable::new())
}

/// Run `body` on `handle`, then `close` it whatever `body` returned.
#[cfg_attr(not(target_os = "android"), allow(dead_code))]
pub(crate) fn close_after<H, T, E>(
    handle: &mut H,
    body: impl FnOnce(&mut H) -> Result<T, E>,
    close: impl FnOnce(&mut H),
) -> Result<T, E> {
    let result = body(handle);
    close(handle);
    result
}


#[cfg(all(test, not(target_os = "android")))]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_default_provider_fails_closed() {
        let provider = default_provider();
        let result = provider.open_tree("6881-2249", "content://x/tree/6881-2249%3A");
        assert!(matches!(result, Err(StoreError::PermissionDenied(_))));
    }
}
