use std::collections::HashMap;

use chrono::NaiveDate;

use crate::io::store::{NodeKey, NodeUpdate, TaskStore};
use crate::model::mode::{Discipline, Mode};
use crate::model::task::Task;
use crate::ops::batch::ChangeBatch;
use crate::ops::hierarchy::Hierarchy;
use crate::ops::mode::{ModeResolver, NameKind, Resolution};
use crate::ops::visibility::VisibilityFilter;

/// Modes of the containers above one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupModes {
    pub project: Mode,
    /// `Mode::None` for the unsectioned group
    pub section: Mode,
}

/// State that lives for one pass over one group.
///
/// The project-wide sequential slot outlives the pass; the caller owns it
/// and hands it in so every group of a project shares it.
#[derive(Debug)]
pub struct PassState<'p> {
    project_slot: &'p mut bool,
    section_slot: bool,
    /// Modes pushed from parent to child, by arena node
    inherited: HashMap<usize, Mode>,
    /// Nodes under a checked ancestor
    skipped: Vec<bool>,
}

impl<'p> PassState<'p> {
    pub fn new(project_slot: &'p mut bool, hierarchy: &Hierarchy) -> Self {
        PassState {
            project_slot,
            section_slot: false,
            inherited: HashMap::new(),
            skipped: vec![false; hierarchy.len()],
        }
    }

    /// Claim the first sequential slot. Returns true for the first caller.
    fn claim(&mut self, use_section: bool) -> bool {
        let slot = if use_section {
            &mut self.section_slot
        } else {
            &mut *self.project_slot
        };
        if *slot {
            false
        } else {
            *slot = true;
            true
        }
    }
}

/// Counts for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Open tasks visited
    pub visited: usize,
    /// Labels withheld by the visibility filter
    pub hidden: usize,
}

/// Decides which tasks of a group carry the label.
pub struct Propagator<'a> {
    label: &'a str,
    resolver: ModeResolver<'a>,
    visibility: VisibilityFilter<'a>,
    today: NaiveDate,
}

impl<'a> Propagator<'a> {
    pub fn new(
        label: &'a str,
        resolver: ModeResolver<'a>,
        visibility: VisibilityFilter<'a>,
        today: NaiveDate,
    ) -> Self {
        Propagator {
            label,
            resolver,
            visibility,
            today,
        }
    }

    /// Strip the label from every task in the group. Used when the
    /// project's or section's mode changed since the last cycle.
    pub fn invalidate(&self, tasks: &mut [Task], hierarchy: &Hierarchy, batch: &mut ChangeBatch) {
        for &node in hierarchy.walk() {
            batch.remove_label(&mut tasks[hierarchy.task(node)], self.label);
        }
    }

    /// Walk the group once, parents before children.
    pub fn run(
        &self,
        tasks: &mut [Task],
        hierarchy: &Hierarchy,
        modes: GroupModes,
        state: &mut PassState<'_>,
        batch: &mut ChangeBatch,
        store: &mut dyn TaskStore,
    ) -> PassStats {
        let mut stats = PassStats::default();

        for &node in hierarchy.walk() {
            let idx = hierarchy.task(node);
            if let Some(parent) = hierarchy.parent(node)
                && state.skipped[parent]
            {
                state.skipped[node] = true;
            }
            if tasks[idx].checked {
                state.skipped[node] = true;
            }
            if state.skipped[node] {
                continue;
            }
            stats.visited += 1;

            let inherited = state.inherited.get(&node).copied();
            let own = self.resolve_task(&mut tasks[idx], inherited, store);
            let group = modes.section.or(modes.project);
            let effective = own.mode.or(group);

            if hierarchy.is_top_level(node) {
                self.label_top_level(&mut tasks[idx], own.mode, effective, modes, state, batch);
            } else if inherited.is_none() && group.is_none() && !own.mode.is_none() {
                // Tagged under an untagged parent with no mode above: nothing
                // orders it, so it starts a chain of its own
                batch.add_label(&mut tasks[idx], self.label);
            }

            let open = hierarchy.open_children(tasks, node);
            if !open.is_empty() {
                if own.changed {
                    for &child in &open {
                        batch.remove_label(&mut tasks[hierarchy.task(child)], self.label);
                    }
                }
                self.hand_down(tasks, hierarchy, node, &open, effective, state, batch);
            }

            if let Some(reason) = self.visibility.check(&tasks[idx], self.today)
                && batch.remove_label(&mut tasks[idx], self.label)
            {
                log::debug!("Hiding '{}': {}", tasks[idx].content, reason);
                stats.hidden += 1;
            }
        }

        stats
    }

    fn resolve_task(
        &self,
        task: &mut Task,
        inherited: Option<Mode>,
        store: &mut dyn TaskStore,
    ) -> Resolution {
        let res = self
            .resolver
            .resolve_into(&task.content, NameKind::Task, inherited, &mut task.mode);
        if res.changed {
            log::debug!("'{}' is now {}", task.content, res.mode);
            store.mutate(
                NodeKey::task(&task.id),
                NodeUpdate {
                    mode: Some(res.mode),
                    ..Default::default()
                },
            );
        }
        res
    }

    fn label_top_level(
        &self,
        task: &mut Task,
        own: Mode,
        effective: Mode,
        modes: GroupModes,
        state: &mut PassState<'_>,
        batch: &mut ChangeBatch,
    ) {
        match effective.level() {
            Discipline::Parallel => {
                batch.add_label(task, self.label);
            }
            // An explicit suffix overrides the group's order
            Discipline::Sequential if !own.is_none() => {
                batch.add_label(task, self.label);
            }
            Discipline::Sequential => {
                if state.claim(!modes.section.is_none()) {
                    batch.add_label(task, self.label);
                } else {
                    batch.remove_label(task, self.label);
                }
            }
            Discipline::None => {
                if own.is_none() {
                    batch.remove_label(task, self.label);
                } else {
                    batch.add_label(task, self.label);
                }
            }
        }
    }

    /// Pass the task's mode and label on to its open children.
    #[allow(clippy::too_many_arguments)]
    fn hand_down(
        &self,
        tasks: &mut [Task],
        hierarchy: &Hierarchy,
        node: usize,
        open: &[usize],
        effective: Mode,
        state: &mut PassState<'_>,
        batch: &mut ChangeBatch,
    ) {
        let idx = hierarchy.task(node);
        let holds = tasks[idx].has_label(self.label);

        match effective.children() {
            Discipline::Sequential => {
                for (i, &child) in open.iter().enumerate() {
                    state.inherited.insert(child, effective);
                    let task = &mut tasks[hierarchy.task(child)];
                    if holds && i == 0 {
                        batch.add_label(task, self.label);
                    } else {
                        batch.remove_label(task, self.label);
                    }
                }
                if holds {
                    batch.remove_label(&mut tasks[idx], self.label);
                }
            }
            Discipline::Parallel => {
                for &child in open {
                    state.inherited.insert(child, effective);
                    let task = &mut tasks[hierarchy.task(child)];
                    if holds {
                        batch.add_label(task, self.label);
                    } else {
                        batch.remove_label(task, self.label);
                    }
                }
                if holds {
                    batch.remove_label(&mut tasks[idx], self.label);
                }
            }
            Discipline::None => {
                for &child in open {
                    batch.remove_label(&mut tasks[hierarchy.task(child)], self.label);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use crate::model::config::Suffixes;
    use crate::model::snapshot::Snapshot;
    use crate::model::task::Due;

    const LABEL: &str = "next";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn task(id: &str, content: &str, parent: Option<&str>, order: i64) -> Task {
        let mut t = Task::new(id, "p", content);
        t.parent_id = parent.map(|p| p.to_string());
        t.order = order;
        t
    }

    struct Outcome {
        tasks: Vec<Task>,
        batch: ChangeBatch,
        store: MemoryStore,
    }

    fn pass(mut tasks: Vec<Task>, modes: GroupModes) -> Outcome {
        let suffixes = Suffixes::default();
        let prop = Propagator::new(
            LABEL,
            ModeResolver::new(&suffixes, None),
            VisibilityFilter::new(7, "%d-%m-%Y"),
            today(),
        );
        let members: Vec<usize> = (0..tasks.len()).collect();
        let h = Hierarchy::build(&tasks, &members, "*");
        let mut slot = false;
        let mut state = PassState::new(&mut slot, &h);
        let mut batch = ChangeBatch::new();
        let mut store = MemoryStore::new(Snapshot::default());
        prop.run(&mut tasks, &h, modes, &mut state, &mut batch, &mut store);
        Outcome {
            tasks,
            batch,
            store,
        }
    }

    fn labeled(tasks: &[Task]) -> Vec<&str> {
        tasks
            .iter()
            .filter(|t| t.has_label(LABEL))
            .map(|t| t.id.as_str())
            .collect()
    }

    fn project(mode: Mode) -> GroupModes {
        GroupModes {
            project: mode,
            section: Mode::None,
        }
    }

    #[test]
    fn sequential_labels_first_open_only() {
        let mut done = task("a", "Book flights", None, 0);
        done.checked = true;
        let tasks = vec![
            done,
            task("b", "Book hotel", None, 1),
            task("c", "Pack", None, 2),
        ];
        let out = pass(tasks, project(Mode::Sequential));
        assert_eq!(labeled(&out.tasks), vec!["b"]);
    }

    #[test]
    fn parallel_labels_every_open_task() {
        let mut done = task("c", "Stamps", None, 2);
        done.checked = true;
        let tasks = vec![
            task("a", "Milk", None, 0),
            task("b", "Bread", None, 1),
            done,
        ];
        let out = pass(tasks, project(Mode::Parallel));
        assert_eq!(labeled(&out.tasks), vec!["a", "b"]);
    }

    #[test]
    fn no_mode_means_no_labels() {
        let mut stale = task("a", "Read", None, 0);
        stale.labels.push(LABEL.into());
        let out = pass(vec![stale], project(Mode::None));
        assert!(labeled(&out.tasks).is_empty());
        assert_eq!(out.batch.changed_count(), 1);
    }

    #[test]
    fn own_suffix_beats_project_mode() {
        let tasks = vec![task("a", "Chores //", None, 0)];
        let out = pass(tasks, project(Mode::None));
        assert_eq!(labeled(&out.tasks), vec!["a"]);
    }

    #[test]
    fn sequential_label_moves_down_to_first_leaf() {
        let tasks = vec![
            task("p", "Move house", None, 0),
            task("c1", "Find flat", Some("p"), 0),
            task("c2", "Sign lease", Some("p"), 1),
            task("g1", "Browse listings", Some("c1"), 0),
            task("g2", "Visit", Some("c1"), 1),
        ];
        let out = pass(tasks, project(Mode::Sequential));
        assert_eq!(labeled(&out.tasks), vec!["g1"]);
    }

    #[test]
    fn parallel_children_all_labeled() {
        let tasks = vec![
            task("p", "Party", None, 0),
            task("c1", "Invite", Some("p"), 0),
            task("c2", "Cake", Some("p"), 1),
        ];
        let out = pass(tasks, project(Mode::Parallel));
        assert_eq!(labeled(&out.tasks), vec!["c1", "c2"]);
    }

    #[test]
    fn hybrid_switches_at_one_boundary() {
        // Parallel among top-level tasks, sequential beneath them
        let tasks = vec![
            task("a", "Kitchen", None, 0),
            task("a1", "Strip", Some("a"), 0),
            task("a2", "Paint", Some("a"), 1),
            task("b", "Garden", None, 1),
            task("b1", "Mow", Some("b"), 0),
            task("b2", "Weed", Some("b"), 1),
        ];
        let out = pass(tasks, project(Mode::ParallelSequential));
        assert_eq!(labeled(&out.tasks), vec!["a1", "b1"]);
    }

    #[test]
    fn sequential_parallel_hybrid() {
        let tasks = vec![
            task("a", "Phase one", None, 0),
            task("a1", "Draft", Some("a"), 0),
            task("a2", "Sketch", Some("a"), 1),
            task("b", "Phase two", None, 1),
            task("b1", "Review", Some("b"), 0),
        ];
        let out = pass(tasks, project(Mode::SequentialParallel));
        assert_eq!(labeled(&out.tasks), vec!["a1", "a2"]);
    }

    #[test]
    fn parent_never_keeps_label_with_open_children() {
        let tasks = vec![
            task("p", "Trip //", None, 0),
            task("c", "Pack", Some("p"), 0),
        ];
        let out = pass(tasks, project(Mode::None));
        assert_eq!(labeled(&out.tasks), vec!["c"]);
    }

    #[test]
    fn tagged_subtask_under_plain_parent_labels_its_children() {
        let tasks = vec![
            task("p", "Stuff", None, 0),
            task("c", "Sub //", Some("p"), 0),
            task("g1", "Sweep", Some("c"), 0),
            task("g2", "Mop", Some("c"), 1),
            task("d", "Sub --", Some("p"), 1),
            task("h1", "Wash", Some("d"), 0),
            task("h2", "Dry", Some("d"), 1),
        ];
        let out = pass(tasks, project(Mode::None));
        assert_eq!(labeled(&out.tasks), vec!["g1", "g2", "h1"]);
    }

    #[test]
    fn tagged_leaf_under_plain_parent_is_labeled() {
        let tasks = vec![
            task("p", "Stuff", None, 0),
            task("c", "Call bank //", Some("p"), 0),
            task("d", "Someday", Some("p"), 1),
        ];
        let out = pass(tasks, project(Mode::None));
        assert_eq!(labeled(&out.tasks), vec!["c"]);
    }

    #[test]
    fn tagged_subtask_below_sequential_chain_waits() {
        let tasks = vec![
            task("p", "Launch", None, 0),
            task("c1", "Design", Some("p"), 0),
            task("c2", "Build //", Some("p"), 1),
            task("g1", "Frontend", Some("c2"), 0),
            task("g2", "Backend", Some("c2"), 1),
        ];
        let out = pass(tasks, project(Mode::Sequential));
        assert_eq!(labeled(&out.tasks), vec!["c1"]);
    }

    #[test]
    fn tagged_top_level_task_skips_sequential_slot() {
        let tasks = vec![
            task("a", "Draft", None, 0),
            task("b", "Errands --", None, 1),
            task("c", "Review", None, 2),
        ];
        let out = pass(tasks, project(Mode::Sequential));
        assert_eq!(labeled(&out.tasks), vec!["a", "b"]);
    }

    #[test]
    fn tagged_first_task_leaves_slot_for_next() {
        let tasks = vec![
            task("a", "Errands --", None, 0),
            task("a1", "Bank", Some("a"), 0),
            task("a2", "Post", Some("a"), 1),
            task("b", "Draft", None, 1),
            task("c", "Review", None, 2),
        ];
        let out = pass(tasks, project(Mode::Sequential));
        assert_eq!(labeled(&out.tasks), vec!["a1", "b"]);
    }

    #[test]
    fn checked_parent_blocks_subtree() {
        let mut done = task("p", "Old plan", None, 0);
        done.checked = true;
        let mut child = task("c", "Leftover", Some("p"), 0);
        child.labels.push(LABEL.into());
        let out = pass(vec![done, child], project(Mode::Parallel));
        // Left exactly as it was
        assert_eq!(labeled(&out.tasks), vec!["c"]);
        assert_eq!(out.batch.changed_count(), 0);
    }

    #[test]
    fn untagged_subtask_inherits_pushed_mode() {
        let tasks = vec![
            task("p", "Errand run --", None, 0),
            task("c", "Shop", Some("p"), 0),
            task("g1", "Milk", Some("c"), 0),
            task("g2", "Eggs", Some("c"), 1),
        ];
        let out = pass(tasks, project(Mode::None));
        assert_eq!(labeled(&out.tasks), vec!["g1"]);
        assert_eq!(out.tasks[1].mode, Some(Mode::Sequential));
    }

    #[test]
    fn far_future_task_is_hidden() {
        let mut far = task("a", "Renew passport", None, 0);
        far.due = Some(Due {
            date: today() + chrono::Duration::days(10),
            is_recurring: false,
            string: None,
        });
        let mut near = task("b", "Pay rent", None, 1);
        near.due = Some(Due {
            date: today() + chrono::Duration::days(3),
            is_recurring: false,
            string: None,
        });
        let out = pass(vec![far, near], project(Mode::Parallel));
        assert_eq!(labeled(&out.tasks), vec!["b"]);
        // Added then hidden within one pass: nothing to send
        assert_eq!(out.batch.changed_count(), 1);
    }

    #[test]
    fn section_mode_takes_section_slot() {
        let suffixes = Suffixes::default();
        let prop = Propagator::new(
            LABEL,
            ModeResolver::new(&suffixes, None),
            VisibilityFilter::new(0, "%d-%m-%Y"),
            today(),
        );
        let mut batch = ChangeBatch::new();
        let mut store = MemoryStore::new(Snapshot::default());
        let mut project_slot = false;

        // Two sequential sections of one project each get a first task
        for _ in 0..2 {
            let mut tasks = vec![task("a", "One", None, 0), task("b", "Two", None, 1)];
            let h = Hierarchy::build(&tasks, &[0, 1], "*");
            let mut state = PassState::new(&mut project_slot, &h);
            let modes = GroupModes {
                project: Mode::None,
                section: Mode::Sequential,
            };
            prop.run(&mut tasks, &h, modes, &mut state, &mut batch, &mut store);
            assert_eq!(labeled(&tasks), vec!["a"]);
        }
        assert!(!project_slot);
    }

    #[test]
    fn project_slot_spans_unmoded_groups() {
        let suffixes = Suffixes::default();
        let prop = Propagator::new(
            LABEL,
            ModeResolver::new(&suffixes, None),
            VisibilityFilter::new(0, "%d-%m-%Y"),
            today(),
        );
        let mut batch = ChangeBatch::new();
        let mut store = MemoryStore::new(Snapshot::default());
        let mut project_slot = false;
        let modes = project(Mode::Sequential);

        let mut first = vec![task("a", "One", None, 0)];
        let h = Hierarchy::build(&first, &[0], "*");
        let mut state = PassState::new(&mut project_slot, &h);
        prop.run(&mut first, &h, modes, &mut state, &mut batch, &mut store);

        let mut second = vec![task("b", "Two", None, 0)];
        let h = Hierarchy::build(&second, &[0], "*");
        let mut state = PassState::new(&mut project_slot, &h);
        prop.run(&mut second, &h, modes, &mut state, &mut batch, &mut store);

        assert_eq!(labeled(&first), vec!["a"]);
        assert!(labeled(&second).is_empty());
    }

    #[test]
    fn task_mode_changes_are_queued_once() {
        let tasks = vec![task("a", "Plan --", None, 0)];
        let out = pass(tasks, project(Mode::None));
        let (key, update) = out.store.queued().next().unwrap();
        assert_eq!(key, &NodeKey::task("a"));
        assert_eq!(update.mode, Some(Mode::Sequential));

        let mut seen = task("a", "Plan --", None, 0);
        seen.mode = Some(Mode::Sequential);
        seen.labels.push(LABEL.into());
        let again = pass(vec![seen], project(Mode::None));
        assert_eq!(again.store.pending(), 0);
        assert_eq!(again.batch.changed_count(), 0);
    }

    #[test]
    fn renamed_parent_strips_children_first() {
        // Was parallel, now sequential: the second child must lose its label
        let mut parent = task("p", "Trip --", None, 0);
        parent.mode = Some(Mode::Parallel);
        let mut c1 = task("c1", "Pack", Some("p"), 0);
        c1.labels.push(LABEL.into());
        let mut c2 = task("c2", "Go", Some("p"), 1);
        c2.labels.push(LABEL.into());
        let out = pass(vec![parent, c1, c2], project(Mode::None));
        assert_eq!(labeled(&out.tasks), vec!["c1"]);
    }

    #[test]
    fn invalidate_strips_whole_group() {
        let suffixes = Suffixes::default();
        let prop = Propagator::new(
            LABEL,
            ModeResolver::new(&suffixes, None),
            VisibilityFilter::new(0, "%d-%m-%Y"),
            today(),
        );
        let mut a = task("a", "One", None, 0);
        a.labels.push(LABEL.into());
        let mut b = task("b", "Two", Some("a"), 0);
        b.labels.push(LABEL.into());
        let mut tasks = vec![a, b];
        let h = Hierarchy::build(&tasks, &[0, 1], "*");
        let mut batch = ChangeBatch::new();
        prop.invalidate(&mut tasks, &h, &mut batch);
        assert!(labeled(&tasks).is_empty());
        assert_eq!(batch.changed_count(), 2);
    }
}
