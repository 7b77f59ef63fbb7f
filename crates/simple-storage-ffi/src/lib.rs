//! UniFFI bindings for simple-storage mobile apps
//!
//! Lets the Kotlin Android app resolve and create folders and files on
//! primary storage and on removable volumes it holds a tree grant for.

use simple_storage_engine::{
    AccessError, GrantTable, LocalStore, Node, SpaceInfo, StorageAccess, StoragePath,
    platform, uri,
};
use std::collections::HashMap;
use std::sync::Arc;

uniffi::setup_scaffolding!();

// ============ Errors ============

/// Errors that can cross the FFI boundary
/// Note: Field is named `reason` not `message` to avoid conflict with Throwable.message in Kotlin
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FfiError {
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },
    #[error("Path conflict: {reason}")]
    PathConflict { reason: String },
    #[error("Not found: {reason}")]
    NotFound { reason: String },
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
    #[error("Storage error: {reason}")]
    Storage { reason: String },
}

impl From<AccessError> for FfiError {
    fn from(error: AccessError) -> Self {
        let reason = error.to_string();
        match error {
            e if e.is_permission_denied() => FfiError::PermissionDenied { reason },
            AccessError::PathConflict { .. } => FfiError::PathConflict { reason },
            AccessError::NotFound { .. } => FfiError::NotFound { reason },
            AccessError::InvalidArgument(_) => FfiError::InvalidArgument { reason },
            _ => FfiError::Storage { reason },
        }
    }
}

// ============ Storage Handle ============

/// A handle to the storage access service.
///
/// Holds configuration only; every call goes to the stores directly.
#[derive(uniffi::Object)]
pub struct StorageAccessHandle {
    inner: StorageAccess,
}

#[uniffi::export]
impl StorageAccessHandle {
    /// Service over the platform's own grants (the SAF on Android).
    #[uniffi::constructor]
    pub fn new(primary_root: String, app_directory: Option<String>) -> Self {
        let mut inner = StorageAccess::new(primary_root, platform::default_provider());
        if let Some(app_directory) = app_directory {
            inner = inner.with_app_directory(app_directory);
        }
        Self { inner }
    }

    /// Service whose removable volumes are local directories, keyed by
    /// storage id.
    #[uniffi::constructor]
    pub fn with_local_volumes(primary_root: String, volumes: HashMap<String, String>) -> Self {
        let grants = Arc::new(GrantTable::new());
        let inner = StorageAccess::new(primary_root, grants.clone());
        for (storage_id, root) in volumes {
            grants.grant(inner.tree_uri(&storage_id, ""), Arc::new(LocalStore::new(root)));
        }
        Self { inner }
    }

    pub fn resolve_root(&self, storage_id: String) -> Option<NodeDto> {
        self.inner.resolve_root(&storage_id).map(NodeDto::from_engine)
    }

    pub fn resolve(&self, storage_id: String, path: String) -> Option<NodeDto> {
        self.inner.resolve(&storage_id, &path).map(NodeDto::from_engine)
    }

    /// Find or create every folder of `path`.
    pub fn materialize(&self, storage_id: String, path: String) -> Option<NodeDto> {
        self.inner
            .materialize(&storage_id, &path)
            .map(NodeDto::from_engine)
    }

    pub fn create_file(
        &self,
        storage_id: String,
        path: String,
        mime_type: Option<String>,
    ) -> Option<NodeDto> {
        self.inner
            .create_file(&storage_id, &path, mime_type.as_deref())
            .map(NodeDto::from_engine)
    }

    pub fn recreate_file(
        &self,
        storage_id: String,
        path: String,
        mime_type: Option<String>,
    ) -> Option<NodeDto> {
        self.inner
            .recreate_file(&storage_id, &path, mime_type.as_deref())
            .map(NodeDto::from_engine)
    }

    /// Direct children of the folder at `path`.
    pub fn list_children(&self, storage_id: String, path: String) -> Result<Vec<NodeDto>, FfiError> {
        let node = self.inner.try_resolve(&storage_id, &path)?;
        let children = node.children().map_err(|e| FfiError::from(AccessError::from(e)))?;
        Ok(children.into_iter().map(NodeDto::from_engine).collect())
    }

    pub fn space(&self, storage_id: String) -> SpaceDto {
        SpaceDto::from_engine(self.inner.space(&storage_id))
    }

    pub fn free_space(&self, storage_id: String) -> u64 {
        self.inner.free_space(&storage_id)
    }

    pub fn used_space(&self, storage_id: String) -> u64 {
        self.inner.used_space(&storage_id)
    }

    pub fn capacity(&self, storage_id: String) -> u64 {
        self.inner.capacity(&storage_id)
    }

    /// Tree URI the app must hold a grant for to reach `storage_id`.
    pub fn tree_uri(&self, storage_id: String, path: String) -> String {
        self.inner.tree_uri(&storage_id, &path)
    }
}

// ============ DTOs ============

/// A resolved file or folder.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct NodeDto {
    pub storage_id: String,
    /// Store-specific document id
    pub id: String,
    pub name: String,
    pub is_directory: bool,
    /// MIME type reported for files, None for folders
    pub mime_type: Option<String>,
    pub uri: String,
}

impl NodeDto {
    fn from_engine(node: Node) -> Self {
        Self {
            storage_id: node.storage_id().to_string(),
            id: node.id().to_string(),
            name: node.name().to_string(),
            is_directory: node.is_directory(),
            mime_type: node.mime_type().map(str::to_string),
            uri: node.uri(),
        }
    }
}

/// One snapshot of a volume's space, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct SpaceDto {
    pub capacity: u64,
    pub free: u64,
    pub used: u64,
}

impl SpaceDto {
    fn from_engine(space: SpaceInfo) -> Self {
        Self {
            capacity: space.capacity,
            free: space.free,
            used: space.used(),
        }
    }
}

// ============ Standalone Functions ============

/// Normalized segments of a slash-delimited path.
#[uniffi::export]
pub fn normalize_path(path: String) -> Vec<String> {
    StoragePath::parse(&path).segments().to_vec()
}

/// Tree URI for `storage_id` under the external storage provider.
#[uniffi::export]
pub fn tree_uri(storage_id: String, path: String) -> String {
    uri::tree_uri(uri::EXTERNAL_STORAGE_AUTHORITY, &storage_id, &path)
}

/// Last path segment of a percent-encoded URL.
#[uniffi::export]
pub fn file_name_from_url(url: String) -> String {
    uri::file_name_from_url(&url)
}

/// Route engine logs to logcat on Android, stderr elsewhere. Safe to call
/// more than once.
#[uniffi::export]
pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("SimpleStorage"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        let _ = env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .try_init();
    }

    log::info!("simple-storage logging initialized");
}
