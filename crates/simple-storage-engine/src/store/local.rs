//! A tree store backed by a directory on the local filesystem.

use super::{
    Document, DocumentId, FsStats, NodeKind, StoreError, TreeStore, disambiguated_name,
    validate_name,
};
use crate::path::StoragePath;
use relative_path::{RelativePath, RelativePathBuf};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const MAX_DISAMBIGUATION_ATTEMPTS: usize = 1000;

/// Document ids are paths relative to the store root; the root is `""`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &DocumentId) -> PathBuf {
        RelativePath::new(id.as_str()).to_path(&self.root)
    }

    pub fn document_at(&self, relative: &RelativePath) -> Result<Document, StoreError> {
        let absolute = relative.to_path(&self.root);
        let metadata = fs::metadata(&absolute).map_err(|e| map_io_error(e, &absolute))?;
        let name = match relative.file_name() {
            Some(name) => name.to_string(),
            None => self
                .root
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        let kind = if metadata.is_dir() {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        Ok(Document {
            id: DocumentId::new(relative.as_str()),
            name,
            kind,
            mime_type: None,
        })
    }

    /// Recursively create the directories of `path` in one native call.
    ///
    /// Fails with [`StoreError::NotADirectory`] when some prefix of `path` is
    /// an existing file.
    pub fn create_dir_all(&self, path: &StoragePath) -> Result<Document, StoreError> {
        let relative = checked_relative(path)?;
        self.ensure_no_file_prefix(&relative)?;

        let absolute = relative.to_path(&self.root);
        fs::create_dir_all(&absolute).map_err(|e| map_io_error(e, &absolute))?;

        let document = self.document_at(&relative)?;
        if !document.is_directory() {
            return Err(StoreError::NotADirectory(absolute.display().to_string()));
        }
        Ok(document)
    }

    /// Create an empty file at `path`; an already existing empty file counts
    /// as created. The parent directory must exist.
    pub fn create_file_at(&self, path: &StoragePath) -> Result<Document, StoreError> {
        let relative = checked_relative(path)?;
        let absolute = relative.to_path(&self.root);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute)
        {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let metadata = fs::metadata(&absolute).map_err(|e| map_io_error(e, &absolute))?;
                if !(metadata.is_file() && metadata.len() == 0) {
                    return Err(StoreError::AlreadyExists(absolute.display().to_string()));
                }
            }
            Err(e) => return Err(map_io_error(e, &absolute)),
        }

        self.document_at(&relative)
    }

    /// Delete whatever file sits at `path`, then create it again empty.
    pub fn recreate_file_at(&self, path: &StoragePath) -> Result<Document, StoreError> {
        let relative = checked_relative(path)?;
        let absolute = relative.to_path(&self.root);

        match fs::metadata(&absolute) {
            Ok(metadata) if metadata.is_dir() => {
                return Err(StoreError::AlreadyExists(absolute.display().to_string()));
            }
            Ok(_) => fs::remove_file(&absolute).map_err(|e| map_io_error(e, &absolute))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(map_io_error(e, &absolute)),
        }

        self.create_file_at(path)
    }

    fn ensure_no_file_prefix(&self, relative: &RelativePath) -> Result<(), StoreError> {
        let mut prefix = RelativePathBuf::new();
        for component in relative.components() {
            prefix.push(component.as_str());
            let absolute = prefix.to_path(&self.root);
            match fs::metadata(&absolute) {
                Ok(metadata) if metadata.is_file() => {
                    return Err(StoreError::NotADirectory(absolute.display().to_string()));
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(map_io_error(e, &absolute)),
            }
        }
        Ok(())
    }

    fn child_relative(&self, parent: &DocumentId, name: &str) -> RelativePathBuf {
        RelativePath::new(parent.as_str()).join(name)
    }
}

impl TreeStore for LocalStore {
    fn root(&self) -> Result<Document, StoreError> {
        let root = self.document_at(RelativePath::new(""))?;
        if !root.is_directory() {
            return Err(StoreError::NotADirectory(self.root.display().to_string()));
        }
        Ok(root)
    }

    fn children(&self, parent: &DocumentId) -> Result<Vec<Document>, StoreError> {
        let absolute = self.path_of(parent);
        let entries = fs::read_dir(&absolute).map_err(|e| map_io_error(e, &absolute))?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| map_io_error(e, &absolute))?;
            let name = entry.file_name().to_string_lossy().to_string();
            children.push(self.document_at(&self.child_relative(parent, &name))?);
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn find_children(&self, parent: &DocumentId, name: &str) -> Result<Vec<Document>, StoreError> {
        validate_name(name)?;
        match self.document_at(&self.child_relative(parent, name)) {
            Ok(document) => Ok(vec![document]),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn create_directory(&self, parent: &DocumentId, name: &str) -> Result<Document, StoreError> {
        validate_name(name)?;
        let relative = self.child_relative(parent, name);
        let absolute = relative.to_path(&self.root);
        fs::create_dir(&absolute).map_err(|e| map_io_error(e, &absolute))?;
        self.document_at(&relative)
    }

    fn create_file(
        &self,
        parent: &DocumentId,
        name: &str,
        _mime_type: &str,
    ) -> Result<Document, StoreError> {
        validate_name(name)?;
        for attempt in 0..MAX_DISAMBIGUATION_ATTEMPTS {
            let candidate = match attempt {
                0 => name.to_string(),
                n => disambiguated_name(name, n),
            };
            let relative = self.child_relative(parent, &candidate);
            let absolute = relative.to_path(&self.root);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&absolute)
            {
                Ok(_) => return self.document_at(&relative),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(map_io_error(e, &absolute)),
            }
        }
        Err(StoreError::AlreadyExists(name.to_string()))
    }

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        if id.as_str().is_empty() {
            return Err(StoreError::Unsupported("cannot delete the store root".into()));
        }
        let absolute = self.path_of(id);
        let metadata = fs::metadata(&absolute).map_err(|e| map_io_error(e, &absolute))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&absolute)
        } else {
            fs::remove_file(&absolute)
        }
        .map_err(|e| map_io_error(e, &absolute))
    }

    fn stat_fs(&self) -> Result<FsStats, StoreError> {
        disk_stats(&self.root)
    }

    fn document_uri(&self, id: &DocumentId) -> String {
        format!("file://{}", self.path_of(id).display())
    }
}

/// Block statistics of the filesystem holding `path`.
#[cfg(unix)]
pub fn disk_stats(path: &Path) -> Result<FsStats, StoreError> {
    let stats = rustix::fs::statvfs(path)
        .map_err(|errno| map_io_error(std::io::Error::from(errno), path))?;
    Ok(FsStats {
        block_size: stats.f_frsize,
        blocks: stats.f_blocks,
        available_blocks: stats.f_bavail,
    })
}

#[cfg(not(unix))]
pub fn disk_stats(path: &Path) -> Result<FsStats, StoreError> {
    Err(StoreError::Unsupported(format!(
        "no filesystem statistics for {} on this platform",
        path.display()
    )))
}

fn checked_relative(path: &StoragePath) -> Result<RelativePathBuf, StoreError> {
    for segment in path.segments() {
        validate_name(segment)?;
    }
    Ok(path.to_relative_path_buf())
}

fn map_io_error(error: std::io::Error, path: &Path) -> StoreError {
    match error.kind() {
        ErrorKind::NotFound => StoreError::not_found(path),
        ErrorKind::PermissionDenied => StoreError::PermissionDenied(path.display().to_string()),
        ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.display().to_string()),
        _ => StoreError::Io(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{create_test_file, create_test_root};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root_is_directory() {
        let root = create_test_root();
        let store = LocalStore::new(root.path());

        let document = store.root().unwrap();

        assert!(document.is_directory());
        assert_eq!(document.id.as_str(), "");
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let store = LocalStore::new("/this/path/does/not/exist");
        assert!(matches!(store.root(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_create_dir_all_nested() {
        // Given an empty root
        let root = create_test_root();
        let store = LocalStore::new(root.path());

        // When creating a nested path in one go
        let document = store
            .create_dir_all(&StoragePath::parse("Downloads/Video/Sports"))
            .unwrap();

        // Then every level exists and the leaf is returned
        assert_eq!(document.name, "Sports");
        assert_eq!(document.id.as_str(), "Downloads/Video/Sports");
        assert!(root.path().join("Downloads/Video/Sports").is_dir());
    }

    #[test]
    fn test_create_dir_all_through_file_fails() {
        let root = create_test_root();
        create_test_file(&root, "Downloads", "not a folder");
        let store = LocalStore::new(root.path());

        let result = store.create_dir_all(&StoragePath::parse("Downloads/Video"));

        assert!(matches!(result, Err(StoreError::NotADirectory(_))));
    }

    #[test]
    fn test_create_dir_all_rejects_traversal() {
        let root = create_test_root();
        let store = LocalStore::new(root.path().join("inner"));

        let result = store.create_dir_all(&StoragePath::parse("../escaped"));

        assert!(matches!(result, Err(StoreError::InvalidName(_))));
        assert!(!root.path().join("escaped").exists());
    }

    #[test]
    fn test_create_file_at_accepts_existing_empty_file() {
        let root = create_test_root();
        create_test_file(&root, "empty.txt", "");
        let store = LocalStore::new(root.path());

        let document = store.create_file_at(&StoragePath::parse("empty.txt")).unwrap();

        assert!(document.is_file());
        assert_eq!(document.name, "empty.txt");
    }

    #[test]
    fn test_create_file_at_rejects_existing_content() {
        let root = create_test_root();
        create_test_file(&root, "notes.txt", "keep me");
        let store = LocalStore::new(root.path());

        let result = store.create_file_at(&StoragePath::parse("notes.txt"));

        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
        assert_eq!(
            std::fs::read_to_string(root.path().join("notes.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_recreate_file_at_truncates() {
        let root = create_test_root();
        create_test_file(&root, "notes.txt", "old content");
        let store = LocalStore::new(root.path());

        let document = store.recreate_file_at(&StoragePath::parse("notes.txt")).unwrap();

        assert!(document.is_file());
        assert_eq!(std::fs::metadata(root.path().join("notes.txt")).unwrap().len(), 0);
    }

    #[test]
    fn test_children_sorted_by_name() {
        let root = create_test_root();
        create_test_file(&root, "b.txt", "");
        create_test_file(&root, "a.txt", "");
        std::fs::create_dir(root.path().join("c")).unwrap();
        let store = LocalStore::new(root.path());

        let children = store.children(&store.root().unwrap().id).unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["a.txt", "b.txt", "c"]);
        assert_eq!(children[2].kind, NodeKind::Directory);
    }

    #[test]
    fn test_find_children_missing_is_empty() {
        let root = create_test_root();
        let store = LocalStore::new(root.path());
        let root_id = store.root().unwrap().id;

        assert!(store.find_children(&root_id, "missing").unwrap().is_empty());
    }

    #[test]
    fn test_create_file_disambiguates_taken_name() {
        let root = create_test_root();
        create_test_file(&root, "report.pdf", "v1");
        let store = LocalStore::new(root.path());
        let root_id = store.root().unwrap().id;

        let document = store
            .create_file(&root_id, "report.pdf", "application/pdf")
            .unwrap();

        assert_eq!(document.name, "report (1).pdf");
    }

    #[test]
    fn test_delete_refuses_root() {
        let root = create_test_root();
        let store = LocalStore::new(root.path());
        let result = store.delete(&DocumentId::new(""));
        assert!(matches!(result, Err(StoreError::Unsupported(_))));
    }

    #[test]
    fn test_delete_directory_recursively() {
        let root = create_test_root();
        let store = LocalStore::new(root.path());
        let dir = store.create_dir_all(&StoragePath::parse("a/b")).unwrap();
        create_test_file(&root, "a/b/c.txt", "x");

        store.delete(&DocumentId::new("a")).unwrap();

        assert!(!root.path().join("a").exists());
        assert_eq!(dir.name, "b");
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_stats_reads_the_filesystem_of_the_path() {
        // Given an existing directory
        let root = create_test_root();

        // When its statistics are read
        let stats = disk_stats(root.path()).unwrap();

        // Then they are the statvfs numbers of that very path
        let expected = rustix::fs::statvfs(root.path()).unwrap();
        assert!(stats.blocks > 0);
        assert_eq!(stats.block_size, expected.f_frsize);
        assert_eq!(stats.blocks, expected.f_blocks);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_disk_stats_of_tmpfs_mount_is_not_the_root_disk() {
        let shm = Path::new("/dev/shm");
        if !shm.is_dir() {
            return;
        }

        let stats = disk_stats(shm).unwrap();

        let expected = rustix::fs::statvfs(shm).unwrap();
        assert_eq!(stats.block_size, expected.f_frsize);
        assert_eq!(stats.blocks, expected.f_blocks);
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_stats_of_missing_path_is_not_found() {
        let root = create_test_root();
        let missing = root.path().join("gone");

        assert!(matches!(disk_stats(&missing), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_document_uri_is_file_url() {
        let root = create_test_root();
        let store = LocalStore::new(root.path());
        let uri = store.document_uri(&DocumentId::new("a/b"));
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("a/b"));
    }
}
