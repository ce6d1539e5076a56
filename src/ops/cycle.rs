use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::io::store::{MemoryStore, NodeKey, NodeUpdate, StoreError, TaskStore};
use crate::model::config::EngineConfig;
use crate::model::mode::Mode;
use crate::model::project::Section;
use crate::model::snapshot::Snapshot;
use crate::model::task::Task;
use crate::ops::batch::ChangeBatch;
use crate::ops::hierarchy::Hierarchy;
use crate::ops::mode::{ModeResolver, NameKind};
use crate::ops::propagate::{GroupModes, PassState, Propagator};
use crate::ops::recurrence::{self, RecurrenceStats};
use crate::ops::visibility::VisibilityFilter;

/// Summary of one fetch-process-commit cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub projects: usize,
    pub tasks_seen: usize,
    /// Unchecked tasks outside checked subtrees, when labeling is on
    pub open_tasks: usize,
    /// Labels withheld because the task starts or is due later
    pub hidden: usize,
    /// Tasks whose label set changed
    pub label_changes: usize,
    /// Nodes updated by the store commit (0 if nothing was sent)
    pub mutations_committed: usize,
    /// Recurring tasks seen for the first time
    pub first_seen: usize,
    pub rollovers: usize,
    /// Due dates pulled back to today by the end-of-day rule
    pub shifted: usize,
    pub revived: usize,
}

/// One queued change, flattened for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMutation {
    #[serde(flatten)]
    pub key: NodeKey,
    #[serde(flatten)]
    pub update: NodeUpdate,
}

/// What a cycle would send, without sending it
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub report: CycleReport,
    pub mutations: Vec<PlannedMutation>,
}

/// The labeling and recurrence engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

/// One project or section group of a snapshot
struct Group {
    /// Index into `snapshot.sections`, `None` for the unsectioned tasks
    section: Option<usize>,
    members: Vec<usize>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch, process every project, and commit queued mutations.
    ///
    /// The commit is skipped entirely when nothing changed.
    pub fn run_cycle(
        &self,
        store: &mut dyn TaskStore,
        now: NaiveDateTime,
    ) -> Result<CycleReport, StoreError> {
        let mut snapshot = store.fetch_snapshot()?;
        let mut report = self.process(&mut snapshot, store, now);
        if store.pending() > 0 {
            report.mutations_committed = store.commit()?;
        }
        Ok(report)
    }

    /// Process a copy of `snapshot` and return the mutations a cycle would
    /// queue.
    pub fn plan(&self, snapshot: &Snapshot, now: NaiveDateTime) -> Plan {
        let mut working = snapshot.clone();
        let mut store = MemoryStore::default();
        let report = self.process(&mut working, &mut store, now);
        let mutations = store
            .queued()
            .map(|(key, update)| PlannedMutation {
                key: key.clone(),
                update: update.clone(),
            })
            .collect();
        Plan { report, mutations }
    }

    fn process(
        &self,
        snapshot: &mut Snapshot,
        store: &mut dyn TaskStore,
        now: NaiveDateTime,
    ) -> CycleReport {
        let cfg = &self.config;
        let mut report = CycleReport::default();
        let mut batch = ChangeBatch::new();

        let resolver = ModeResolver::new(&cfg.suffixes, cfg.inbox);
        let propagator = cfg.label.as_deref().map(|label| {
            Propagator::new(
                label,
                ModeResolver::new(&cfg.suffixes, cfg.inbox),
                VisibilityFilter::new(cfg.hide_future, &cfg.start_format),
                now.date(),
            )
        });

        let project_order = snapshot.ordered_projects();
        let section_orders: Vec<Vec<usize>> = project_order
            .iter()
            .map(|&pi| snapshot.ordered_sections(&snapshot.projects[pi].id))
            .collect();
        let Snapshot {
            projects,
            sections,
            tasks,
            ..
        } = snapshot;

        let mut regenerated = RecurrenceStats::default();
        for (&pi, section_order) in project_order.iter().zip(&section_orders) {
            report.projects += 1;
            let project = &mut projects[pi];

            let mut project_mode = Mode::None;
            let mut project_changed = false;
            if propagator.is_some() {
                let res = resolver.resolve_into(
                    &project.name,
                    NameKind::Project,
                    None,
                    &mut project.mode,
                );
                if res.changed {
                    log::info!("Project '{}' is now {}", project.name, res.mode);
                    store.mutate(
                        NodeKey::project(&project.id),
                        NodeUpdate {
                            mode: Some(res.mode),
                            ..Default::default()
                        },
                    );
                }
                project_mode = res.mode;
                project_changed = res.changed;
            }

            let groups = group_tasks(&project.id, section_order, sections, tasks);
            let mut project_slot = false;

            for group in groups {
                let hierarchy = Hierarchy::build(tasks, &group.members, &cfg.inert_prefix);
                report.tasks_seen += hierarchy.len();

                let mut section_mode = Mode::None;
                let mut section_changed = false;
                if propagator.is_some()
                    && let Some(si) = group.section
                {
                    let section = &mut sections[si];
                    let res = resolver.resolve_into(
                        &section.name,
                        NameKind::Section,
                        None,
                        &mut section.mode,
                    );
                    if res.changed {
                        log::info!("Section '{}' is now {}", section.name, res.mode);
                        store.mutate(
                            NodeKey::section(&section.id),
                            NodeUpdate {
                                mode: Some(res.mode),
                                ..Default::default()
                            },
                        );
                    }
                    section_mode = res.mode;
                    section_changed = res.changed;
                }

                if let Some(prop) = &propagator
                    && (project_changed || section_changed)
                {
                    prop.invalidate(tasks, &hierarchy, &mut batch);
                }

                if hierarchy.is_empty() {
                    continue;
                }

                regenerated.add(recurrence::regenerate(tasks, &hierarchy, cfg, now, store));

                if let Some(prop) = &propagator {
                    let mut state = PassState::new(&mut project_slot, &hierarchy);
                    let modes = GroupModes {
                        project: project_mode,
                        section: section_mode,
                    };
                    let pass = prop.run(tasks, &hierarchy, modes, &mut state, &mut batch, store);
                    report.open_tasks += pass.visited;
                    report.hidden += pass.hidden;
                }
            }
        }

        report.first_seen = regenerated.first_seen;
        report.rollovers = regenerated.rollovers;
        report.shifted = regenerated.shifted;
        report.revived = regenerated.revived;
        report.label_changes = batch.flush(store);
        report
    }
}

/// Split a project's tasks into the unsectioned group followed by one group
/// per section. Tasks pointing at a section that doesn't exist in the
/// project count as unsectioned.
fn group_tasks(
    project_id: &str,
    section_order: &[usize],
    sections: &[Section],
    tasks: &[Task],
) -> Vec<Group> {
    let known: HashSet<&str> = section_order
        .iter()
        .map(|&si| sections[si].id.as_str())
        .collect();

    let mut groups = Vec::with_capacity(section_order.len() + 1);
    groups.push(Group {
        section: None,
        members: tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                t.project_id == project_id
                    && t.section_id
                        .as_deref()
                        .is_none_or(|sid| !known.contains(sid))
            })
            .map(|(i, _)| i)
            .collect(),
    });
    for &si in section_order {
        let sid = sections[si].id.as_str();
        groups.push(Group {
            section: Some(si),
            members: tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.project_id == project_id && t.section_id.as_deref() == Some(sid))
                .map(|(i, _)| i)
                .collect(),
        });
    }
    groups
}
