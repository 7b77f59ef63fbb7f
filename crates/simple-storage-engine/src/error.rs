use crate::store::StoreError;

/// Why an access operation produced no result.
///
/// The `Option`/`u64` entry points of [`crate::StorageAccess`] collapse all of
/// these into "absent"; the `try_` entry points return them.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("No access granted to storage {storage_id}")]
    PermissionDenied { storage_id: String },
    #[error("Path conflict at {path:?}: a file is in the way")]
    PathConflict { path: String },
    #[error("Not found: {path:?}")]
    NotFound { path: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccessError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::InvalidName(name) => {
                AccessError::InvalidArgument(format!("invalid path segment {name:?}"))
            }
            other => AccessError::Store(other),
        }
    }
}

impl AccessError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            AccessError::PermissionDenied { .. } | AccessError::Store(StoreError::PermissionDenied(_))
        )
    }
}
