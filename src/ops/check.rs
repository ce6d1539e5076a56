use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::io::store::NodeKind;
use crate::model::snapshot::Snapshot;
use crate::model::task::Task;

/// Structured result from `nm check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A store problem the engine cannot work around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// Two nodes of the same kind share an id
    #[serde(rename = "duplicate_id")]
    DuplicateId { kind: NodeKind, id: String },
    /// A task belongs to a project that doesn't exist
    #[serde(rename = "unknown_project")]
    UnknownProject { task_id: String, project_id: String },
    /// The configured label is not defined in the store
    #[serde(rename = "missing_label")]
    MissingLabel { label: String },
}

/// Something the engine tolerates but that is probably a mistake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Parent id points at no task; the task is walked as a detached subtree
    #[serde(rename = "dangling_parent")]
    DanglingParent { task_id: String, parent_id: String },
    /// Section id points at no section of the task's project
    #[serde(rename = "unknown_section")]
    UnknownSection { task_id: String, section_id: String },
    /// Parent lives in another project or section
    #[serde(rename = "cross_group_parent")]
    CrossGroupParent { task_id: String, parent_id: String },
    /// Following parent ids from this task leads back to it
    #[serde(rename = "parent_cycle")]
    ParentCycle { task_id: String },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a snapshot. Read-only.
///
/// Checks performed:
/// 1. Ids are unique per node kind
/// 2. Every task's project exists
/// 3. The label to manage is defined (when one is configured)
/// 4. Parent and section references resolve within the task's group
/// 5. Parent chains terminate
pub fn check_snapshot(snapshot: &Snapshot, label: Option<&str>) -> CheckResult {
    let mut result = CheckResult::default();

    find_duplicates(snapshot, &mut result.errors);

    let projects: HashSet<&str> = snapshot.projects.iter().map(|p| p.id.as_str()).collect();
    let sections: HashMap<&str, &str> = snapshot
        .sections
        .iter()
        .map(|s| (s.id.as_str(), s.project_id.as_str()))
        .collect();
    let tasks: HashMap<&str, &Task> = snapshot.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    if let Some(label) = label
        && !snapshot.has_label(label)
    {
        result.errors.push(CheckError::MissingLabel {
            label: label.to_string(),
        });
    }

    for task in &snapshot.tasks {
        if !projects.contains(task.project_id.as_str()) {
            result.errors.push(CheckError::UnknownProject {
                task_id: task.id.clone(),
                project_id: task.project_id.clone(),
            });
        }

        if let Some(sid) = task.section_id.as_deref()
            && sections.get(sid) != Some(&task.project_id.as_str())
        {
            result.warnings.push(CheckWarning::UnknownSection {
                task_id: task.id.clone(),
                section_id: sid.to_string(),
            });
        }

        if let Some(pid) = task.parent() {
            match tasks.get(pid) {
                None => result.warnings.push(CheckWarning::DanglingParent {
                    task_id: task.id.clone(),
                    parent_id: pid.to_string(),
                }),
                Some(parent)
                    if parent.project_id != task.project_id
                        || parent.section_id != task.section_id =>
                {
                    result.warnings.push(CheckWarning::CrossGroupParent {
                        task_id: task.id.clone(),
                        parent_id: pid.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        if in_parent_cycle(task, &tasks) {
            result.warnings.push(CheckWarning::ParentCycle {
                task_id: task.id.clone(),
            });
        }
    }

    result.valid = result.errors.is_empty();
    result
}

fn find_duplicates(snapshot: &Snapshot, errors: &mut Vec<CheckError>) {
    let ids = snapshot
        .projects
        .iter()
        .map(|p| (NodeKind::Project, p.id.as_str()))
        .chain(
            snapshot
                .sections
                .iter()
                .map(|s| (NodeKind::Section, s.id.as_str())),
        )
        .chain(
            snapshot
                .tasks
                .iter()
                .map(|t| (NodeKind::Task, t.id.as_str())),
        );

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for (kind, id) in ids {
        if !seen.insert((kind, id)) && reported.insert((kind, id)) {
            errors.push(CheckError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
}

/// Whether walking up from `task` ever returns to it
fn in_parent_cycle(task: &Task, tasks: &HashMap<&str, &Task>) -> bool {
    let mut visited = HashSet::new();
    let mut current = task.parent();
    while let Some(pid) = current {
        if pid == task.id {
            return true;
        }
        if !visited.insert(pid) {
            // Loops above this task without passing through it
            return false;
        }
        current = tasks.get(pid).and_then(|t| t.parent());
    }
    false
}
