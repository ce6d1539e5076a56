use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::mode::Mode;

/// Due date of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Due {
    pub date: NaiveDate,
    #[serde(default)]
    pub is_recurring: bool,
    /// Human recurrence rule, e.g. `every day` (informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
}

/// A single task as held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque identifier, stable across cycles
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Owning section (`None` = unsectioned)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    /// Parent task (`None` or empty = top-level)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Display text
    pub content: String,
    /// Sibling ordering key
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub checked: bool,
    /// Whether the task is listed in the completion history
    #[serde(default)]
    pub in_history: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<Due>,

    // --- Annotations persisted across cycles ---
    /// Last resolved mode (`None` = never observed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Due date seen on the previous rollover check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_due_date: Option<NaiveDate>,
    /// Revival mark left behind by an interrupted run
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recurrence_tag: bool,
}

impl Task {
    /// Create an open, unlabeled top-level task
    pub fn new(id: &str, project_id: &str, content: &str) -> Self {
        Task {
            id: id.to_string(),
            project_id: project_id.to_string(),
            section_id: None,
            parent_id: None,
            content: content.to_string(),
            order: 0,
            checked: false,
            in_history: false,
            labels: Vec::new(),
            due: None,
            mode: None,
            last_due_date: None,
            recurrence_tag: false,
        }
    }

    /// Parent reference with empty strings normalized to root
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }

    pub fn is_top_level(&self) -> bool {
        self.parent().is_none()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn is_recurring(&self) -> bool {
        self.due.as_ref().is_some_and(|d| d.is_recurring)
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due.as_ref().map(|d| d.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_parent_is_root() {
        let mut task = Task::new("1", "p", "Task");
        task.parent_id = Some(String::new());
        assert!(task.is_top_level());
        task.parent_id = Some("0".into());
        assert_eq!(task.parent(), Some("0"));
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let task: Task =
            serde_json::from_str(r#"{"id":"7","project_id":"p","content":"Buy milk"}"#).unwrap();
        assert!(!task.checked);
        assert!(task.labels.is_empty());
        assert!(task.mode.is_none());
        assert!(task.last_due_date.is_none());
        assert!(!task.recurrence_tag);
        assert!(!task.is_recurring());
    }

    #[test]
    fn annotations_are_omitted_until_set() {
        let task = Task::new("7", "p", "Buy milk");
        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("mode"));
        assert!(!json.contains("recurrence_tag"));
        assert!(!json.contains("last_due_date"));
    }
}
