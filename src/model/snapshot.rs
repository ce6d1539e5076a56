use serde::{Deserialize, Serialize};

use super::project::{Project, Section};
use super::task::Task;

/// Full store state as fetched at the start of a cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Label names known to the store
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Snapshot {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Projects ordered by `(order, id)`
    pub fn ordered_projects(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.projects.len()).collect();
        idx.sort_by(|&a, &b| {
            let (pa, pb) = (&self.projects[a], &self.projects[b]);
            pa.order.cmp(&pb.order).then_with(|| pa.id.cmp(&pb.id))
        });
        idx
    }

    /// Sections of one project ordered by `(order, id)`
    pub fn ordered_sections(&self, project_id: &str) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.sections.len())
            .filter(|&i| self.sections[i].project_id == project_id)
            .collect();
        idx.sort_by(|&a, &b| {
            let (sa, sb) = (&self.sections[a], &self.sections[b]);
            sa.order.cmp(&sb.order).then_with(|| sa.id.cmp(&sb.id))
        });
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_sorted_by_order_then_id() {
        let mut a = Project::new("b", "Second");
        a.order = 2;
        let mut b = Project::new("z", "First");
        b.order = 1;
        let mut c = Project::new("a", "Also second");
        c.order = 2;
        let snap = Snapshot {
            projects: vec![a, b, c],
            ..Default::default()
        };
        let names: Vec<&str> = snap
            .ordered_projects()
            .into_iter()
            .map(|i| snap.projects[i].name.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Also second", "Second"]);
    }

    #[test]
    fn sections_filtered_by_project() {
        let snap = Snapshot {
            sections: vec![
                Section::new("s1", "p1", "Mine"),
                Section::new("s2", "p2", "Other"),
            ],
            ..Default::default()
        };
        assert_eq!(snap.ordered_sections("p1"), vec![0]);
        assert!(snap.ordered_sections("p3").is_empty());
    }
}
