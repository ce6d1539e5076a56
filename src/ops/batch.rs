use indexmap::IndexMap;

use crate::io::store::{NodeKey, NodeUpdate, TaskStore};
use crate::model::task::Task;

#[derive(Debug, Clone)]
struct LabelDelta {
    /// +1 per add, -1 per remove
    net: i32,
    /// Label set after the latest change
    labels: Vec<String>,
}

/// Net label changes for one cycle.
///
/// Every label edit goes through here. A task that ends the cycle with the
/// same labels it started with produces no store call, however often it
/// was toggled in between.
#[derive(Debug, Default)]
pub struct ChangeBatch {
    entries: IndexMap<String, LabelDelta>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `label` to the task. Returns false if it was already there.
    pub fn add_label(&mut self, task: &mut Task, label: &str) -> bool {
        if task.has_label(label) {
            return false;
        }
        log::debug!("Labeling '{}'", task.content);
        task.labels.push(label.to_string());
        self.record(task, 1);
        true
    }

    /// Remove `label` from the task. Returns false if it wasn't there.
    pub fn remove_label(&mut self, task: &mut Task, label: &str) -> bool {
        if !task.has_label(label) {
            return false;
        }
        log::debug!("Removing label from '{}'", task.content);
        task.labels.retain(|l| l != label);
        self.record(task, -1);
        true
    }

    fn record(&mut self, task: &Task, step: i32) {
        let entry = self
            .entries
            .entry(task.id.clone())
            .or_insert_with(|| LabelDelta {
                net: 0,
                labels: Vec::new(),
            });
        entry.net += step;
        entry.labels = task.labels.clone();
    }

    /// Tasks whose labels differ from the start of the cycle, with their
    /// final label sets, in first-touched order.
    pub fn changed(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .filter(|(_, d)| d.net != 0)
            .map(|(id, d)| (id.as_str(), d.labels.as_slice()))
    }

    pub fn changed_count(&self) -> usize {
        self.changed().count()
    }

    /// Queue one label mutation per changed task. Returns how many.
    pub fn flush(self, store: &mut dyn TaskStore) -> usize {
        let mut queued = 0;
        for (id, delta) in self.entries {
            if delta.net == 0 {
                continue;
            }
            store.mutate(
                NodeKey::task(&id),
                NodeUpdate {
                    labels: Some(delta.labels),
                    ..Default::default()
                },
            );
            queued += 1;
        }
        queued
    }
}
