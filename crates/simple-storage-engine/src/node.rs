use crate::store::{Document, DocumentId, NodeKind, StoreError, TreeStore};
use std::fmt;
use std::sync::Arc;

/// A resolved document together with the store it lives in.
///
/// Two nodes are equal when they name the same document of the same storage
/// volume, whatever their cached name or kind say.
#[derive(Clone)]
pub struct Node {
    storage_id: String,
    document: Document,
    store: Arc<dyn TreeStore>,
}

impl Node {
    pub fn new(storage_id: impl Into<String>, document: Document, store: Arc<dyn TreeStore>) -> Self {
        Self {
            storage_id: storage_id.into(),
            document,
            store,
        }
    }

    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    pub fn id(&self) -> &DocumentId {
        &self.document.id
    }

    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn kind(&self) -> NodeKind {
        self.document.kind
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.document.mime_type.as_deref()
    }

    pub fn is_directory(&self) -> bool {
        self.document.is_directory()
    }

    pub fn is_file(&self) -> bool {
        self.document.is_file()
    }

    pub fn uri(&self) -> String {
        self.store.document_uri(&self.document.id)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Wrap another document of the same store.
    pub(crate) fn sibling_handle(&self, document: Document) -> Node {
        Node {
            storage_id: self.storage_id.clone(),
            document,
            store: Arc::clone(&self.store),
        }
    }

    /// Direct children in the store's enumeration order.
    pub fn children(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .store
            .children(&self.document.id)?
            .into_iter()
            .map(|document| self.sibling_handle(document))
            .collect())
    }

    /// First direct child named exactly `name`.
    pub fn find(&self, name: &str) -> Result<Option<Node>, StoreError> {
        Ok(self
            .store
            .find_children(&self.document.id, name)?
            .into_iter()
            .next()
            .map(|document| self.sibling_handle(document)))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.storage_id == other.storage_id && self.document.id == other.document.id
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("storage_id", &self.storage_id)
            .field("id", &self.document.id)
            .field("name", &self.document.name)
            .field("kind", &self.document.kind)
            .finish()
    }
}
