//! Path resolution and directory materialization across storage volumes.
//!
//! [`StorageAccess`] holds configuration only. Every call re-fetches the
//! storage root, because grants can be revoked between calls, and then walks
//! the tree one segment at a time. Failures never panic. The plain entry
//! points return `None` and log the reason at debug level. The `try_` entry
//! points hand back an [`AccessError`].

use crate::error::AccessError;
use crate::grants::TreeProvider;
use crate::node::Node;
use crate::path::{StoragePath, raw_file_name};
use crate::store::{Document, LocalStore, StoreError, TreeStore};
use crate::uri::{EXTERNAL_STORAGE_AUTHORITY, PRIMARY, is_primary, mime_type_or_default, tree_uri};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What materializing does when a path segment names an existing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Stop with [`AccessError::PathConflict`].
    #[default]
    Fail,
    /// Create a directory with the same name next to the file and continue
    /// into it. Only stores that allow duplicate names can do this; primary
    /// storage always fails.
    CreateSibling,
}

#[derive(Debug, Clone)]
pub struct StorageAccess {
    primary: Arc<LocalStore>,
    app_directory: Option<PathBuf>,
    authority: String,
    collision_policy: CollisionPolicy,
    provider: Arc<dyn TreeProvider>,
}

impl StorageAccess {
    pub fn new(primary_root: impl Into<PathBuf>, provider: Arc<dyn TreeProvider>) -> Self {
        Self {
            primary: Arc::new(LocalStore::new(primary_root)),
            app_directory: None,
            authority: EXTERNAL_STORAGE_AUTHORITY.to_string(),
            collision_policy: CollisionPolicy::default(),
            provider,
        }
    }

    /// Directory whose mount point is measured for primary storage space.
    pub fn with_app_directory(mut self, app_directory: impl Into<PathBuf>) -> Self {
        self.app_directory = Some(app_directory.into());
        self
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub fn with_collision_policy(mut self, collision_policy: CollisionPolicy) -> Self {
        self.collision_policy = collision_policy;
        self
    }

    pub fn primary_root(&self) -> &Path {
        self.primary.root_path()
    }

    pub fn app_directory(&self) -> Option<&Path> {
        self.app_directory.as_deref()
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn collision_policy(&self) -> CollisionPolicy {
        self.collision_policy
    }

    pub(crate) fn primary_store(&self) -> &LocalStore {
        &self.primary
    }

    /// Tree URI a grant for `storage_id` (optionally narrowed to `path`) lives under.
    pub fn tree_uri(&self, storage_id: &str, path: &str) -> String {
        tree_uri(&self.authority, storage_id, path)
    }

    pub fn resolve_root(&self, storage_id: &str) -> Option<Node> {
        absent("resolve_root", storage_id, "", self.try_resolve_root(storage_id))
    }

    pub fn try_resolve_root(&self, storage_id: &str) -> Result<Node, AccessError> {
        if is_primary(storage_id) {
            let document = self.primary.root()?;
            let store: Arc<dyn TreeStore> = self.primary.clone();
            return Ok(Node::new(PRIMARY, document, store));
        }

        let tree_uri = self.tree_uri(storage_id, "");
        let store = self
            .provider
            .open_tree(storage_id, &tree_uri)
            .map_err(|e| denied(storage_id, e))?;
        let document = store.root().map_err(|e| denied(storage_id, e))?;
        Ok(Node::new(storage_id, document, store))
    }

    /// Find an existing node. An empty path is the root itself.
    pub fn resolve(&self, storage_id: &str, path: &str) -> Option<Node> {
        absent("resolve", storage_id, path, self.try_resolve(storage_id, path))
    }

    pub fn try_resolve(&self, storage_id: &str, path: &str) -> Result<Node, AccessError> {
        let path = StoragePath::parse(path);
        let root = self.try_resolve_root(storage_id)?;
        walk(root, &path)
    }

    /// Find or create every directory of `path` (`mkdirs`).
    ///
    /// Not transactional: when a create fails halfway, the directories made
    /// before it stay.
    pub fn materialize(&self, storage_id: &str, path: &str) -> Option<Node> {
        absent("materialize", storage_id, path, self.try_materialize(storage_id, path))
    }

    pub fn try_materialize(&self, storage_id: &str, path: &str) -> Result<Node, AccessError> {
        self.materialize_path(storage_id, &StoragePath::parse(path))
    }

    /// Create a file, materializing its parent directories first. Name
    /// collisions are up to the store.
    pub fn create_file(
        &self,
        storage_id: &str,
        path: &str,
        mime_type: Option<&str>,
    ) -> Option<Node> {
        absent(
            "create_file",
            storage_id,
            path,
            self.try_create_file(storage_id, path, mime_type),
        )
    }

    pub fn try_create_file(
        &self,
        storage_id: &str,
        path: &str,
        mime_type: Option<&str>,
    ) -> Result<Node, AccessError> {
        let (path, name) = split_file_path(path)?;
        let directory = self.materialize_path(storage_id, &path.parent().unwrap_or_default())?;

        let document = if is_primary(storage_id) {
            self.primary
                .create_file_at(&path)
                .map_err(|e| conflict(e, &path))?
        } else {
            directory.store().create_file(
                directory.id(),
                &name,
                mime_type_or_default(mime_type),
            )?
        };
        Ok(directory.sibling_handle(document))
    }

    /// Replace a file: any file already carrying the exact name is deleted
    /// before the new one is created.
    pub fn recreate_file(
        &self,
        storage_id: &str,
        path: &str,
        mime_type: Option<&str>,
    ) -> Option<Node> {
        absent(
            "recreate_file",
            storage_id,
            path,
            self.try_recreate_file(storage_id, path, mime_type),
        )
    }

    pub fn try_recreate_file(
        &self,
        storage_id: &str,
        path: &str,
        mime_type: Option<&str>,
    ) -> Result<Node, AccessError> {
        let (path, name) = split_file_path(path)?;
        let directory = self.materialize_path(storage_id, &path.parent().unwrap_or_default())?;

        if is_primary(storage_id) {
            let document = self
                .primary
                .recreate_file_at(&path)
                .map_err(|e| conflict(e, &path))?;
            return Ok(directory.sibling_handle(document));
        }

        let store = directory.store();
        let existing = store.find_children(directory.id(), &name)?;
        if existing.iter().any(Document::is_directory) {
            return Err(AccessError::PathConflict {
                path: path.to_string(),
            });
        }
        for file in &existing {
            log::debug!("Deleting {} before recreating it", file.id);
            store.delete(&file.id)?;
        }

        let document = store.create_file(directory.id(), &name, mime_type_or_default(mime_type))?;
        if document.name != name {
            log::warn!(
                "Store renamed recreated file {path} to {:?}",
                document.name
            );
        }
        Ok(directory.sibling_handle(document))
    }

    fn materialize_path(&self, storage_id: &str, path: &StoragePath) -> Result<Node, AccessError> {
        let root = self.try_resolve_root(storage_id)?;

        if is_primary(storage_id) {
            let document = self
                .primary
                .create_dir_all(path)
                .map_err(|e| conflict(e, path))?;
            return Ok(root.sibling_handle(document));
        }

        let segments = path.segments();
        let mut current = root;
        for (index, segment) in segments.iter().enumerate() {
            let matches = current.store().find_children(current.id(), segment)?;

            if let Some(directory) = matches.iter().find(|d| d.is_directory()) {
                current = current.sibling_handle(directory.clone());
                continue;
            }

            if !matches.is_empty() {
                let conflicting = prefix(segments, index + 1);
                match self.collision_policy {
                    CollisionPolicy::Fail => {
                        return Err(AccessError::PathConflict { path: conflicting });
                    }
                    CollisionPolicy::CreateSibling => {
                        log::warn!(
                            "{storage_id}:{conflicting} is a file, creating a directory with the same name"
                        );
                    }
                }
            }

            let created = current
                .store()
                .create_directory(current.id(), segment)
                .map_err(|e| {
                    let created = prefix(segments, index + 1);
                    log::debug!("Creating {storage_id}:{created} failed: {e}");
                    conflict(e, created)
                })?;
            current = current.sibling_handle(created);
        }
        Ok(current)
    }
}

fn walk(root: Node, path: &StoragePath) -> Result<Node, AccessError> {
    let segments = path.segments();
    let mut current = root;

    for (index, segment) in segments.iter().enumerate() {
        if !current.is_directory() {
            return Err(AccessError::PathConflict {
                path: prefix(segments, index),
            });
        }

        // A directory wins over a same-named file while there is more to walk.
        let descending = index + 1 < segments.len();
        let mut matches = current.store().find_children(current.id(), segment)?;
        let position = if descending {
            matches.iter().position(Document::is_directory).unwrap_or(0)
        } else {
            0
        };
        if matches.is_empty() {
            return Err(AccessError::NotFound {
                path: prefix(segments, index + 1),
            });
        }
        current = current.sibling_handle(matches.swap_remove(position));
    }
    Ok(current)
}

/// Split a raw file path into its normalized form and its file name.
fn split_file_path(raw: &str) -> Result<(StoragePath, String), AccessError> {
    let name = raw_file_name(raw);
    if name.is_empty() {
        return Err(AccessError::InvalidArgument(format!(
            "path {raw:?} has no file name"
        )));
    }
    Ok((StoragePath::parse(raw), name.to_string()))
}

fn prefix(segments: &[String], len: usize) -> String {
    segments[..len].join("/")
}

fn denied(storage_id: &str, error: StoreError) -> AccessError {
    match error {
        StoreError::PermissionDenied(_) => AccessError::PermissionDenied {
            storage_id: storage_id.to_string(),
        },
        other => other.into(),
    }
}

fn conflict(error: StoreError, path: impl std::fmt::Display) -> AccessError {
    match error {
        StoreError::NotADirectory(_) | StoreError::AlreadyExists(_) => AccessError::PathConflict {
            path: path.to_string(),
        },
        other => other.into(),
    }
}

fn absent<T>(
    operation: &str,
    storage_id: &str,
    path: &str,
    result: Result<T, AccessError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("{operation}({storage_id:?}, {path:?}) gave no result: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grants::GrantTable;
    use crate::store::{MemoryStore, NodeKind};
    use crate::tests::{create_test_file, create_test_root};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SD: &str = "6881-2249";

    struct Fixture {
        _primary: TempDir,
        access: StorageAccess,
        grants: Arc<GrantTable>,
        sd: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let primary = create_test_root();
        let grants = Arc::new(GrantTable::new());
        let access = StorageAccess::new(primary.path(), grants.clone());
        let sd = Arc::new(MemoryStore::new("SD card"));
        grants.grant(access.tree_uri(SD, ""), sd.clone());
        Fixture {
            _primary: primary,
            access,
            grants,
            sd,
        }
    }

    fn names(node: &Node) -> Vec<String> {
        node.children()
            .unwrap()
            .iter()
            .map(|child| format!("{}:{:?}", child.name(), child.kind()))
            .collect()
    }

    #[test]
    fn test_resolve_root_primary() {
        let f = fixture();
        let root = f.access.resolve_root(PRIMARY).unwrap();
        assert_eq!(root.storage_id(), PRIMARY);
        assert!(root.is_directory());
    }

    #[test]
    fn test_resolve_root_without_grant_is_absent() {
        let f = fixture();
        assert!(f.access.resolve_root("ABCD-0000").is_none());
        assert!(matches!(
            f.access.try_resolve_root("ABCD-0000"),
            Err(AccessError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_resolve_root_after_revoke_is_absent() {
        let f = fixture();
        assert!(f.access.resolve_root(SD).is_some());

        f.grants.revoke(&f.access.tree_uri(SD, ""));

        assert!(f.access.resolve_root(SD).is_none());
    }

    #[test]
    fn test_resolve_empty_path_is_root() {
        let f = fixture();
        for raw in ["", "/", " // "] {
            assert_eq!(f.access.resolve(SD, raw), f.access.resolve_root(SD));
            assert_eq!(f.access.resolve(PRIMARY, raw), f.access.resolve_root(PRIMARY));
        }
    }

    #[test]
    fn test_resolve_missing_segment() {
        let f = fixture();
        f.access.materialize(SD, "Downloads").unwrap();

        let result = f.access.try_resolve(SD, "Downloads/missing/x");

        match result {
            Err(AccessError::NotFound { path }) => assert_eq!(path, "Downloads/missing"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_through_file_is_conflict() {
        let f = fixture();
        f.access.create_file(SD, "a/b.txt", None).unwrap();

        let result = f.access.try_resolve(SD, "a/b.txt/c");

        assert!(matches!(result, Err(AccessError::PathConflict { .. })));
        assert!(f.access.resolve(SD, "a/b.txt").unwrap().is_file());
    }

    #[test]
    fn test_resolve_prefers_directory_when_descending() {
        // Given a file and a directory sharing a name, file listed first
        let f = fixture();
        let root = f.access.resolve_root(SD).unwrap();
        f.sd.create_file(root.id(), "Music", MIME_TYPE).unwrap();
        let dir = f.sd.create_directory(root.id(), "Music").unwrap();
        f.sd.create_directory(&dir.id, "Live").unwrap();

        // Then the last segment resolves to the first match, the middle one to the directory
        assert!(f.access.resolve(SD, "Music").unwrap().is_file());
        assert_eq!(f.access.resolve(SD, "Music/Live").unwrap().name(), "Live");
    }

    const MIME_TYPE: &str = "application/octet-stream";

    #[test]
    fn test_materialize_creates_nested_directories() {
        let f = fixture();

        let sports = f.access.materialize(SD, "Downloads/Video/Sports").unwrap();

        assert_eq!(sports.name(), "Sports");
        assert_eq!(sports.kind(), NodeKind::Directory);
        assert_eq!(f.access.resolve(SD, "Downloads/Video/Sports"), Some(sports));
        assert_eq!(f.sd.len(), 4);
    }

    #[test]
    fn test_materialize_reuses_existing_directories() {
        let f = fixture();
        let first = f.access.materialize(SD, "Downloads/Video").unwrap();

        let second = f.access.materialize(SD, "/Downloads//Video/").unwrap();

        assert_eq!(first, second);
        assert_eq!(f.sd.len(), 3);
    }

    #[test]
    fn test_materialize_file_collision_fails_by_default() {
        let f = fixture();
        f.access.create_file(SD, "Downloads", None).unwrap();

        let result = f.access.try_materialize(SD, "Downloads/Video");

        match result {
            Err(AccessError::PathConflict { path }) => assert_eq!(path, "Downloads"),
            other => panic!("expected PathConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_materialize_file_collision_creates_sibling_when_allowed() {
        // Given the legacy policy and a file named like the directory we want
        let mut f = fixture();
        f.access = f
            .access
            .clone()
            .with_collision_policy(CollisionPolicy::CreateSibling);
        f.access.create_file(SD, "Downloads", None).unwrap();

        // When materializing through it
        let video = f.access.materialize(SD, "Downloads/Video").unwrap();

        // Then a same-named directory sits next to the file
        let root = f.access.resolve_root(SD).unwrap();
        assert_eq!(names(&root), vec!["Downloads:File", "Downloads:Directory"]);
        assert_eq!(video.name(), "Video");
        assert_eq!(f.access.resolve(SD, "Downloads/Video"), Some(video));
    }

    #[test]
    fn test_materialize_failure_keeps_ancestors() {
        let f = fixture();
        f.sd.fail_creates_after(2);

        let result = f.access.try_materialize(SD, "a/b/c/d");

        assert!(matches!(result, Err(AccessError::Store(StoreError::Io(_)))));
        assert!(f.access.resolve(SD, "a/b").unwrap().is_directory());
        assert!(f.access.resolve(SD, "a/b/c").is_none());
    }

    #[test]
    fn test_materialize_without_grant_is_permission_denied() {
        let f = fixture();
        let error = f.access.try_materialize("ABCD-0000", "x").unwrap_err();
        assert!(error.is_permission_denied());
    }

    #[test]
    fn test_materialize_primary_through_file_is_conflict() {
        let f = fixture();
        create_test_file(&f._primary, "Downloads", "data");

        let result = f.access.try_materialize(PRIMARY, "Downloads/Video");

        assert!(matches!(result, Err(AccessError::PathConflict { .. })));
    }

    #[test]
    fn test_materialize_primary_rejects_parent_segments() {
        let f = fixture();
        let result = f.access.try_materialize(PRIMARY, "../outside");
        assert!(matches!(result, Err(AccessError::InvalidArgument(_))));
    }

    #[test]
    fn test_create_file_builds_parents() {
        let f = fixture();

        let file = f.access.create_file(SD, "a/b/c.txt", Some("text/plain")).unwrap();

        assert_eq!(file.name(), "c.txt");
        assert_eq!(file.mime_type(), Some("text/plain"));
        assert!(f.access.resolve(SD, "a/b").unwrap().is_directory());
    }

    #[test]
    fn test_create_file_defaults_mime_type() {
        let f = fixture();
        let file = f.access.create_file(SD, "x.bin", None).unwrap();
        assert_eq!(file.mime_type(), Some(crate::uri::MIME_TYPE_UNKNOWN));
    }

    #[test]
    fn test_create_file_at_root() {
        let f = fixture();
        let file = f.access.create_file(SD, "top.txt", None).unwrap();
        let root = f.access.resolve_root(SD).unwrap();
        assert_eq!(root.find("top.txt").unwrap(), Some(file));
    }

    #[test]
    fn test_create_file_without_name_is_invalid() {
        let f = fixture();
        for raw in ["", "a/b/", "a/ "] {
            assert!(matches!(
                f.access.try_create_file(SD, raw, None),
                Err(AccessError::InvalidArgument(_))
            ));
        }
        assert_eq!(f.sd.len(), 1);
    }

    #[test]
    fn test_create_file_collision_left_to_store() {
        let f = fixture();
        f.access.create_file(SD, "dir/song.mp3", None).unwrap();

        let second = f.access.create_file(SD, "dir/song.mp3", None).unwrap();

        assert_eq!(second.name(), "song (1).mp3");
    }

    #[test]
    fn test_create_file_primary() {
        let f = fixture();

        let file = f.access.create_file(PRIMARY, "a/b/c.txt", None).unwrap();

        assert_eq!(file.name(), "c.txt");
        assert!(f._primary.path().join("a/b/c.txt").is_file());
    }

    #[test]
    fn test_recreate_file_leaves_single_file() {
        let f = fixture();
        let original = f.access.create_file(SD, "dir/log.txt", None).unwrap();
        f.access.create_file(SD, "dir/log.txt", None).unwrap();
        let dir = f.access.resolve(SD, "dir").unwrap();

        let file = f.access.recreate_file(SD, "dir/log.txt", None).unwrap();

        assert_ne!(file, original);
        assert_eq!(names(&dir), vec!["log (1).txt:File", "log.txt:File"]);
        let same_name: Vec<_> = dir
            .children()
            .unwrap()
            .into_iter()
            .filter(|c| c.name() == "log.txt")
            .collect();
        assert_eq!(same_name, vec![file.clone()]);
        assert_eq!(f.access.resolve(SD, "dir/log.txt"), Some(file));
    }

    #[test]
    fn test_recreate_file_over_directory_is_conflict() {
        let f = fixture();
        f.access.materialize(SD, "dir/log.txt").unwrap();

        let result = f.access.try_recreate_file(SD, "dir/log.txt", None);

        assert!(matches!(result, Err(AccessError::PathConflict { .. })));
    }

    #[test]
    fn test_recreate_file_primary_truncates() {
        let f = fixture();
        std::fs::create_dir(f._primary.path().join("dir")).unwrap();
        create_test_file(&f._primary, "dir/log.txt", "old");

        let file = f.access.recreate_file(PRIMARY, "dir/log.txt", None).unwrap();

        assert!(file.is_file());
        assert_eq!(
            std::fs::read_to_string(f._primary.path().join("dir/log.txt")).unwrap(),
            ""
        );
    }

    #[test]
    fn test_materialize_over_local_file_with_sibling_policy_is_conflict() {
        // Given a directory-backed volume holding a file where a folder is wanted
        let f = fixture();
        let card = create_test_root();
        f.grants.grant(f.access.tree_uri(SD, ""), Arc::new(LocalStore::new(card.path())));
        let access = f.access.clone().with_collision_policy(CollisionPolicy::CreateSibling);
        create_test_file(&card, "Photos", "not a folder");

        // When materializing through it, the store cannot hold both names
        let result = access.try_materialize(SD, "Photos/2024");

        // Then the failure names the conflicting prefix
        match result {
            Err(AccessError::PathConflict { path }) => assert_eq!(path, "Photos"),
            other => panic!("expected a path conflict, got {other:?}"),
        }
        assert!(card.path().join("Photos").is_file());
    }

    #[test]
    fn test_custom_authority_changes_grant_lookup() {
        let f = fixture();
        let access = f.access.clone().with_authority("org.example.docs");

        assert!(access.resolve_root(SD).is_none());
        f.grants.grant(access.tree_uri(SD, ""), f.sd.clone());
        assert!(access.resolve_root(SD).is_some());
    }
}
