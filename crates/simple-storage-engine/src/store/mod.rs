//! Tree-structured document stores.
//!
//! A [`TreeStore`] is one storage volume seen as a tree of documents: child
//! lookup, child creation, deletion and filesystem statistics. Stores address
//! documents by an opaque [`DocumentId`]; names are not unique keys.

pub mod local;
pub mod memory;

use std::fmt;
use std::path::PathBuf;

pub use local::LocalStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Invalid document name: {0:?}")]
    InvalidName(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Platform error: {0}")]
    Platform(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into().display().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    File,
}

/// A document as reported by a store at the time of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub kind: NodeKind,
    pub mime_type: Option<String>,
}

impl Document {
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Filesystem statistics in `statvfs` terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub block_size: u64,
    pub blocks: u64,
    pub available_blocks: u64,
}

pub trait TreeStore: fmt::Debug + Send + Sync {
    /// The root document. Fails when the volume is gone or access was revoked.
    fn root(&self) -> Result<Document, StoreError>;

    /// Direct children of `parent` in the store's enumeration order.
    fn children(&self, parent: &DocumentId) -> Result<Vec<Document>, StoreError>;

    /// Direct children of `parent` named exactly `name`.
    fn find_children(&self, parent: &DocumentId, name: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .children(parent)?
            .into_iter()
            .filter(|child| child.name == name)
            .collect())
    }

    fn create_directory(&self, parent: &DocumentId, name: &str) -> Result<Document, StoreError>;

    /// Create a file under `parent`. When `name` is taken the store decides
    /// what happens: it may fail or pick a disambiguated name.
    fn create_file(
        &self,
        parent: &DocumentId,
        name: &str,
        mime_type: &str,
    ) -> Result<Document, StoreError>;

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError>;

    fn stat_fs(&self) -> Result<FsStats, StoreError>;

    fn document_uri(&self, id: &DocumentId) -> String;
}

/// Reject names that cannot be a single path segment.
pub(crate) fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// `"report.pdf"` with `n = 2` becomes `"report (2).pdf"`.
pub(crate) fn disambiguated_name(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("report.pdf", 1, "report (1).pdf")]
    #[case("archive.tar.gz", 2, "archive.tar (2).gz")]
    #[case("README", 3, "README (3)")]
    #[case(".hidden", 1, ".hidden (1)")]
    fn test_disambiguated_name(#[case] name: &str, #[case] n: usize, #[case] expected: &str) {
        assert_eq!(disambiguated_name(name, n), expected);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    fn test_validate_name_rejects(#[case] name: &str) {
        assert!(matches!(validate_name(name), Err(StoreError::InvalidName(_))));
    }

    #[rstest]
    #[case("Downloads")]
    #[case("c.txt")]
    #[case("...")]
    #[case("My Music")]
    fn test_validate_name_accepts(#[case] name: &str) {
        assert!(validate_name(name).is_ok());
    }
}
