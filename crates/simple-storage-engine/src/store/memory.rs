//! An in-memory tree store.
//!
//! Behaves like a document provider rather than a POSIX filesystem: sibling
//! directories may share a name, while a new file whose name is taken gets a
//! `"name (n).ext"` suffix.

use super::{
    Document, DocumentId, FsStats, NodeKind, StoreError, TreeStore, disambiguated_name,
    validate_name,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const DEFAULT_STATS: FsStats = FsStats {
    block_size: 4096,
    blocks: 262_144,
    available_blocks: 131_072,
};

#[derive(Debug)]
pub struct MemoryStore {
    label: String,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    root: Uuid,
    entries: HashMap<Uuid, Entry>,
    stats: FsStats,
    /// Remaining successful creates before every create fails; `None` is unlimited.
    create_budget: Option<usize>,
}

#[derive(Debug)]
struct Entry {
    name: String,
    kind: NodeKind,
    mime_type: Option<String>,
    parent: Option<Uuid>,
    children: Vec<Uuid>,
}

impl MemoryStore {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let root = Uuid::new_v4();
        let mut entries = HashMap::new();
        entries.insert(
            root,
            Entry {
                name: label.clone(),
                kind: NodeKind::Directory,
                mime_type: None,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            label,
            inner: Mutex::new(Inner {
                root,
                entries,
                stats: DEFAULT_STATS,
                create_budget: None,
            }),
        }
    }

    pub fn with_stats(self, stats: FsStats) -> Self {
        self.lock().stats = stats;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Let the next `successes` creates through, then fail every create with
    /// an I/O error.
    pub fn fail_creates_after(&self, successes: usize) {
        self.lock().create_budget = Some(successes);
    }

    /// Total number of documents, root included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Recover from poisoned mutex (another thread panicked while holding lock)
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn create(
        &self,
        parent: &DocumentId,
        name: &str,
        kind: NodeKind,
        mime_type: Option<&str>,
    ) -> Result<Document, StoreError> {
        validate_name(name)?;
        let mut inner = self.lock();
        let parent_id = inner.directory(parent)?;

        if let Some(budget) = inner.create_budget.as_mut() {
            if *budget == 0 {
                return Err(StoreError::Io(std::io::Error::other(format!(
                    "simulated create failure for {name:?}"
                ))));
            }
            *budget -= 1;
        }

        let name = match kind {
            NodeKind::Directory => name.to_string(),
            NodeKind::File => inner.free_name(parent_id, name),
        };

        let id = Uuid::new_v4();
        inner.entries.insert(
            id,
            Entry {
                name,
                kind,
                mime_type: mime_type.map(str::to_string),
                parent: Some(parent_id),
                children: Vec::new(),
            },
        );
        if let Some(parent) = inner.entries.get_mut(&parent_id) {
            parent.children.push(id);
        }
        Ok(inner.document(id))
    }
}

impl Inner {
    fn lookup(&self, id: &DocumentId) -> Result<Uuid, StoreError> {
        Uuid::parse_str(id.as_str())
            .ok()
            .filter(|uuid| self.entries.contains_key(uuid))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn directory(&self, id: &DocumentId) -> Result<Uuid, StoreError> {
        let uuid = self.lookup(id)?;
        match self.entries.get(&uuid) {
            Some(entry) if entry.kind == NodeKind::Directory => Ok(uuid),
            _ => Err(StoreError::NotADirectory(id.to_string())),
        }
    }

    fn document(&self, id: Uuid) -> Document {
        let entry = &self.entries[&id];
        Document {
            id: DocumentId::new(id.to_string()),
            name: entry.name.clone(),
            kind: entry.kind,
            mime_type: entry.mime_type.clone(),
        }
    }

    fn free_name(&self, parent: Uuid, name: &str) -> String {
        let taken = |candidate: &str| {
            self.entries[&parent]
                .children
                .iter()
                .any(|child| self.entries[child].name == candidate)
        };
        if !taken(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| disambiguated_name(name, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn remove_subtree(&mut self, id: Uuid) {
        if let Some(entry) = self.entries.remove(&id) {
            for child in entry.children {
                self.remove_subtree(child);
            }
        }
    }
}

impl TreeStore for MemoryStore {
    fn root(&self) -> Result<Document, StoreError> {
        let inner = self.lock();
        Ok(inner.document(inner.root))
    }

    fn children(&self, parent: &DocumentId) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock();
        let parent = inner.directory(parent)?;
        Ok(inner.entries[&parent]
            .children
            .iter()
            .map(|child| inner.document(*child))
            .collect())
    }

    fn create_directory(&self, parent: &DocumentId, name: &str) -> Result<Document, StoreError> {
        self.create(parent, name, NodeKind::Directory, None)
    }

    fn create_file(
        &self,
        parent: &DocumentId,
        name: &str,
        mime_type: &str,
    ) -> Result<Document, StoreError> {
        self.create(parent, name, NodeKind::File, Some(mime_type))
    }

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let uuid = inner.lookup(id)?;
        if uuid == inner.root {
            return Err(StoreError::Unsupported("cannot delete the store root".into()));
        }
        if let Some(parent) = inner.entries[&uuid].parent
            && let Some(parent) = inner.entries.get_mut(&parent)
        {
            parent.children.retain(|child| *child != uuid);
        }
        inner.remove_subtree(uuid);
        Ok(())
    }

    fn stat_fs(&self) -> Result<FsStats, StoreError> {
        Ok(self.lock().stats)
    }

    fn document_uri(&self, id: &DocumentId) -> String {
        format!("memory://{}/{id}", self.label)
    }
}
