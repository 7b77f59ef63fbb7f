//! Access grants for non-primary storage volumes.
//!
//! A [`TreeProvider`] turns a tree URI into a store, or refuses to. The engine
//! never asks for a grant itself; it consumes whatever the provider holds and
//! fails closed otherwise.

use crate::store::{StoreError, TreeStore};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

pub trait TreeProvider: fmt::Debug + Send + Sync {
    /// Open the store behind `tree_uri`, failing with
    /// [`StoreError::PermissionDenied`] when no grant covers it.
    fn open_tree(&self, storage_id: &str, tree_uri: &str)
    -> Result<Arc<dyn TreeStore>, StoreError>;
}

/// In-process grant table keyed by tree URI.
#[derive(Debug, Default)]
pub struct GrantTable {
    grants: RwLock<HashMap<String, Arc<dyn TreeStore>>>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant access to `store` under `tree_uri`, replacing any earlier grant.
    pub fn grant(&self, tree_uri: impl Into<String>, store: Arc<dyn TreeStore>) {
        let tree_uri = tree_uri.into();
        log::debug!("Granting access to {tree_uri}");
        self.grants
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tree_uri, store);
    }

    /// Revoke a grant. Returns whether one existed.
    pub fn revoke(&self, tree_uri: &str) -> bool {
        log::debug!("Revoking access to {tree_uri}");
        self.grants
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(tree_uri)
            .is_some()
    }

    pub fn is_granted(&self, tree_uri: &str) -> bool {
        self.grants
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(tree_uri)
    }

    pub fn len(&self) -> usize {
        self.grants.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TreeProvider for GrantTable {
    fn open_tree(
        &self,
        storage_id: &str,
        tree_uri: &str,
    ) -> Result<Arc<dyn TreeStore>, StoreError> {
        self.grants
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(tree_uri)
            .cloned()
            .ok_or_else(|| StoreError::PermissionDenied(format!("{storage_id} ({tree_uri})")))
    }
}
