use serde::{Deserialize, Serialize};

use super::mode::Mode;

/// A top-level task container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    /// Last resolved mode (`None` = never observed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

/// A named group of tasks inside one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    /// Last resolved mode (`None` = never observed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl Project {
    pub fn new(id: &str, name: &str) -> Self {
        Project {
            id: id.to_string(),
            name: name.to_string(),
            order: 0,
            mode: None,
        }
    }
}

impl Section {
    pub fn new(id: &str, project_id: &str, name: &str) -> Self {
        Section {
            id: id.to_string(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            order: 0,
            mode: None,
        }
    }
}
