use std::path::PathBuf;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::io::lock::LockError;
use crate::model::mode::Mode;
use crate::model::snapshot::Snapshot;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize store: {0}")]
    SerializeError(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Which kind of node a mutation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Project,
    Section,
    Task,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Project => "project",
            NodeKind::Section => "section",
            NodeKind::Task => "task",
        }
    }
}

/// Address of a node in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub id: String,
}

impl NodeKey {
    pub fn project(id: &str) -> Self {
        NodeKey {
            kind: NodeKind::Project,
            id: id.to_string(),
        }
    }

    pub fn section(id: &str) -> Self {
        NodeKey {
            kind: NodeKind::Section,
            id: id.to_string(),
        }
    }

    pub fn task(id: &str) -> Self {
        NodeKey {
            kind: NodeKind::Task,
            id: id.to_string(),
        }
    }
}

/// Fields to change on one node. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_tag: Option<bool>,
}

impl NodeUpdate {
    /// Fold a later update into this one; later values win.
    pub fn merge(&mut self, later: NodeUpdate) {
        if later.labels.is_some() {
            self.labels = later.labels;
        }
        if later.checked.is_some() {
            self.checked = later.checked;
        }
        if later.in_history.is_some() {
            self.in_history = later.in_history;
        }
        if later.due_date.is_some() {
            self.due_date = later.due_date;
        }
        if later.last_due_date.is_some() {
            self.last_due_date = later.last_due_date;
        }
        if later.mode.is_some() {
            self.mode = later.mode;
        }
        if later.recurrence_tag.is_some() {
            self.recurrence_tag = later.recurrence_tag;
        }
    }
}

/// The backing task store.
///
/// Mutations are queued by `mutate` and only applied by `commit`.
pub trait TaskStore {
    /// Fetch the complete current state.
    fn fetch_snapshot(&mut self) -> Result<Snapshot, StoreError>;

    /// Queue a change to one node. Updates to the same node merge.
    fn mutate(&mut self, key: NodeKey, update: NodeUpdate);

    /// Number of nodes with queued changes
    fn pending(&self) -> usize;

    /// Apply every queued change and return how many nodes were updated.
    fn commit(&mut self) -> Result<usize, StoreError>;
}

/// Queue shared by the store implementations
#[derive(Debug, Default)]
pub struct MutationQueue {
    entries: IndexMap<NodeKey, NodeUpdate>,
}

impl MutationQueue {
    pub fn push(&mut self, key: NodeKey, update: NodeUpdate) {
        match self.entries.get_mut(&key) {
            Some(existing) => existing.merge(update),
            None => {
                self.entries.insert(key, update);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &NodeUpdate)> {
        self.entries.iter()
    }

    pub fn drain(&mut self) -> Vec<(NodeKey, NodeUpdate)> {
        self.entries.drain(..).collect()
    }
}

/// Apply one update to a snapshot. Returns false if the node is gone.
pub fn apply_update(snapshot: &mut Snapshot, key: &NodeKey, update: &NodeUpdate) -> bool {
    match key.kind {
        NodeKind::Project => match snapshot.projects.iter_mut().find(|p| p.id == key.id) {
            Some(project) => {
                if let Some(mode) = update.mode {
                    project.mode = Some(mode);
                }
                true
            }
            None => false,
        },
        NodeKind::Section => match snapshot.sections.iter_mut().find(|s| s.id == key.id) {
            Some(section) => {
                if let Some(mode) = update.mode {
                    section.mode = Some(mode);
                }
                true
            }
            None => false,
        },
        NodeKind::Task => match snapshot.tasks.iter_mut().find(|t| t.id == key.id) {
            Some(task) => {
                if let Some(ref labels) = update.labels {
                    task.labels = labels.clone();
                }
                if let Some(checked) = update.checked {
                    task.checked = checked;
                }
                if let Some(in_history) = update.in_history {
                    task.in_history = in_history;
                }
                if let (Some(date), Some(due)) = (update.due_date, task.due.as_mut()) {
                    due.date = date;
                }
                if let Some(date) = update.last_due_date {
                    task.last_due_date = Some(date);
                }
                if let Some(mode) = update.mode {
                    task.mode = Some(mode);
                }
                if let Some(tag) = update.recurrence_tag {
                    task.recurrence_tag = tag;
                }
                true
            }
            None => false,
        },
    }
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub snapshot: Snapshot,
    queue: MutationQueue,
    /// Every committed batch, oldest first
    pub commits: Vec<Vec<(NodeKey, NodeUpdate)>>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        MemoryStore {
            snapshot,
            queue: MutationQueue::default(),
            commits: Vec::new(),
        }
    }

    /// Mutations queued but not yet committed
    pub fn queued(&self) -> impl Iterator<Item = (&NodeKey, &NodeUpdate)> {
        self.queue.iter()
    }
}

impl TaskStore for MemoryStore {
    fn fetch_snapshot(&mut self) -> Result<Snapshot, StoreError> {
        Ok(self.snapshot.clone())
    }

    fn mutate(&mut self, key: NodeKey, update: NodeUpdate) {
        self.queue.push(key, update);
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn commit(&mut self) -> Result<usize, StoreError> {
        let batch = self.queue.drain();
        let mut applied = 0;
        for (key, update) in &batch {
            if apply_update(&mut self.snapshot, key, update) {
                applied += 1;
            } else {
                log::warn!("{} {} vanished before commit", key.kind.as_str(), key.id);
            }
        }
        self.commits.push(batch);
        Ok(applied)
    }
}
