pub mod access;
pub mod error;
pub mod grants;
pub mod node;
pub mod path;
pub mod platform;
pub mod space;
pub mod store;
pub mod uri;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use access::{CollisionPolicy, StorageAccess};
pub use error::AccessError;
pub use grants::{GrantTable, TreeProvider};
pub use node::Node;
pub use path::StoragePath;
pub use space::SpaceInfo;
pub use store::{Document, DocumentId, FsStats, LocalStore, MemoryStore, NodeKind, StoreError, TreeStore};
pub use uri::{PRIMARY, file_name_from_url, tree_uri};
