use std::collections::HashSet;

use chrono::{NaiveDateTime, Timelike};

use crate::io::store::{NodeKey, NodeUpdate, TaskStore};
use crate::model::config::EngineConfig;
use crate::model::task::Task;
use crate::ops::hierarchy::Hierarchy;

/// What the recurrence pass did to one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecurrenceStats {
    /// Recurring parents seen for the first time
    pub first_seen: usize,
    /// Recurring parents whose due date moved
    pub rollovers: usize,
    /// Due dates pulled back to today by the end-of-day rule
    pub shifted: usize,
    /// Sub-tasks reopened
    pub revived: usize,
}

impl RecurrenceStats {
    pub fn add(&mut self, other: RecurrenceStats) {
        self.first_seen += other.first_seen;
        self.rollovers += other.rollovers;
        self.shifted += other.shifted;
        self.revived += other.revived;
    }
}

/// Detect recurrence rollovers in one group and reopen the sub-tasks of
/// every recurring parent that moved on.
///
/// Runs over the whole group before labeling so revived sub-tasks take part
/// in the same cycle's labeling. Revival marks live in a pass-local set and
/// travel down the walk, so a rollover reopens the entire subtree.
pub fn regenerate(
    tasks: &mut [Task],
    hierarchy: &Hierarchy,
    engine: &EngineConfig,
    now: NaiveDateTime,
    store: &mut dyn TaskStore,
) -> RecurrenceStats {
    let mut stats = RecurrenceStats::default();

    if !engine.recurring {
        clear_stale_tags(tasks, hierarchy, store);
    }
    if !engine.recurrence_active() {
        return stats;
    }

    let mut tagged: HashSet<usize> = HashSet::new();
    for &node in hierarchy.walk() {
        let idx = hierarchy.task(node);

        if hierarchy.is_top_level(node) {
            if tasks[idx].recurrence_tag {
                clear_tag(&mut tasks[idx], store);
            }
            if check_rollover(&mut tasks[idx], engine, now, store, &mut stats) && engine.recurring {
                tagged.extend(hierarchy.children(node).iter().copied());
            }
            continue;
        }

        if !engine.recurring {
            continue;
        }
        let persisted = tasks[idx].recurrence_tag;
        if !tagged.contains(&node) && !persisted {
            continue;
        }

        let task = &mut tasks[idx];
        let mut update = NodeUpdate::default();
        if task.checked || task.in_history {
            log::debug!("Reviving '{}'", task.content);
            task.checked = false;
            task.in_history = false;
            update.checked = Some(false);
            update.in_history = Some(false);
            stats.revived += 1;
        }
        if persisted {
            task.recurrence_tag = false;
            update.recurrence_tag = Some(false);
        }
        if update != NodeUpdate::default() {
            store.mutate(NodeKey::task(&task.id), update);
        }
        tagged.extend(hierarchy.children(node).iter().copied());
    }

    stats
}

/// Returns true when the task rolled over to a new due date.
fn check_rollover(
    task: &mut Task,
    engine: &EngineConfig,
    now: NaiveDateTime,
    store: &mut dyn TaskStore,
    stats: &mut RecurrenceStats,
) -> bool {
    if !task.is_recurring() {
        return false;
    }
    let Some(due) = task.due.as_mut() else {
        return false;
    };

    let Some(old) = task.last_due_date else {
        log::debug!("New recurring task detected: '{}'", task.content);
        task.last_due_date = Some(due.date);
        store.mutate(
            NodeKey::task(&task.id),
            NodeUpdate {
                last_due_date: Some(due.date),
                ..Default::default()
            },
        );
        stats.first_seen += 1;
        return false;
    };
    if old == due.date {
        return false;
    }

    let mut update = NodeUpdate::default();
    if let Some(end) = engine.end_of_day
        && now.hour() < end
    {
        // A daily task completed after midnight but before the end of the
        // day jumps to tomorrow; pull it back to today.
        let today = now.date();
        let ahead = (due.date - today).num_days();
        let overdue = (today - old).num_days();
        if ahead == 1 && overdue >= 1 {
            log::debug!(
                "Shifting '{}' from {} back to {}",
                task.content,
                due.date,
                today
            );
            due.date = today;
            update.due_date = Some(today);
            stats.shifted += 1;
        }
    }

    log::debug!("'{}' rolled over from {} to {}", task.content, old, due.date);
    task.last_due_date = Some(due.date);
    update.last_due_date = Some(due.date);
    store.mutate(NodeKey::task(&task.id), update);
    stats.rollovers += 1;
    true
}

/// Revival marks are meaningless with recurrence off; drop any left behind.
fn clear_stale_tags(tasks: &mut [Task], hierarchy: &Hierarchy, store: &mut dyn TaskStore) {
    for &node in hierarchy.walk() {
        let task = &mut tasks[hierarchy.task(node)];
        if task.recurrence_tag {
            clear_tag(task, store);
        }
    }
}

fn clear_tag(task: &mut Task, store: &mut dyn TaskStore) {
    task.recurrence_tag = false;
    store.mutate(
        NodeKey::task(&task.id),
        NodeUpdate {
            recurrence_tag: Some(false),
            ..Default::default()
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use crate::model::snapshot::Snapshot;
    use crate::model::task::Due;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
        day.and_hms_opt(hour, 30, 0).unwrap()
    }

    fn recurring(id: &str, due: NaiveDate, last: Option<NaiveDate>) -> Task {
        let mut t = Task::new(id, "p", id);
        t.due = Some(Due {
            date: due,
            is_recurring: true,
            string: Some("every day".into()),
        });
        t.last_due_date = last;
        t
    }

    fn child(id: &str, parent: &str, order: i64, checked: bool) -> Task {
        let mut t = Task::new(id, "p", id);
        t.parent_id = Some(parent.into());
        t.order = order;
        t.checked = checked;
        t.in_history = checked;
        t
    }

    fn run(tasks: &mut [Task], engine: &EngineConfig, now: NaiveDateTime) -> (RecurrenceStats, MemoryStore) {
        let members: Vec<usize> = (0..tasks.len()).collect();
        let h = Hierarchy::build(tasks, &members, "*");
        let mut store = MemoryStore::new(Snapshot::default());
        let stats = regenerate(tasks, &h, engine, now, &mut store);
        (stats, store)
    }

    fn recurring_engine() -> EngineConfig {
        EngineConfig {
            recurring: true,
            ..Default::default()
        }
    }

    #[test]
    fn first_sighting_records_date_only() {
        let today = date(2026, 5, 4);
        let mut tasks = vec![recurring("r", today, None), child("c", "r", 0, true)];
        let (stats, store) = run(&mut tasks, &recurring_engine(), at(today, 9));
        assert_eq!(stats.first_seen, 1);
        assert_eq!(stats.revived, 0);
        assert_eq!(tasks[0].last_due_date, Some(today));
        assert!(tasks[1].checked);
        assert_eq!(store.pending(), 1);
    }

    #[test]
    fn rollover_revives_whole_subtree() {
        let today = date(2026, 5, 4);
        let mut tasks = vec![
            recurring("r", date(2026, 5, 5), Some(today)),
            child("c1", "r", 0, true),
            child("c2", "r", 1, false),
            child("g1", "c1", 0, true),
            child("gg1", "g1", 0, true),
        ];
        let (stats, _) = run(&mut tasks, &recurring_engine(), at(today, 18));
        assert_eq!(stats.rollovers, 1);
        assert_eq!(stats.revived, 3);
        assert!(tasks.iter().all(|t| !t.checked && !t.in_history));
        assert_eq!(tasks[0].last_due_date, Some(date(2026, 5, 5)));
    }

    #[test]
    fn unchanged_due_date_does_nothing() {
        let today = date(2026, 5, 4);
        let mut tasks = vec![recurring("r", today, Some(today)), child("c", "r", 0, true)];
        let (stats, store) = run(&mut tasks, &recurring_engine(), at(today, 9));
        assert_eq!(stats, RecurrenceStats::default());
        assert!(tasks[1].checked);
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn non_recurring_parent_is_ignored() {
        let today = date(2026, 5, 4);
        let mut parent = recurring("r", today, Some(date(2026, 5, 1)));
        parent.due.as_mut().unwrap().is_recurring = false;
        let mut tasks = vec![parent, child("c", "r", 0, true)];
        let (stats, _) = run(&mut tasks, &recurring_engine(), at(today, 9));
        assert_eq!(stats.rollovers, 0);
        assert!(tasks[1].checked);
    }

    #[test]
    fn end_of_day_pulls_daily_task_back_to_today() {
        // Completed at 02:30 on the 5th for the 4th; the service moved it to the 6th
        let today = date(2026, 5, 5);
        let engine = EngineConfig {
            recurring: true,
            end_of_day: Some(4),
            ..Default::default()
        };
        let mut tasks = vec![recurring("r", date(2026, 5, 6), Some(date(2026, 5, 4)))];
        let (stats, store) = run(&mut tasks, &engine, at(today, 2));
        assert_eq!(stats.shifted, 1);
        assert_eq!(tasks[0].due_date(), Some(today));
        assert_eq!(tasks[0].last_due_date, Some(today));
        let (_, update) = store.queued().next().unwrap();
        assert_eq!(update.due_date, Some(today));
    }

    #[test]
    fn end_of_day_not_applied_after_cutoff() {
        let today = date(2026, 5, 5);
        let engine = EngineConfig {
            end_of_day: Some(4),
            ..Default::default()
        };
        let mut tasks = vec![recurring("r", date(2026, 5, 6), Some(date(2026, 5, 4)))];
        let (stats, _) = run(&mut tasks, &engine, at(today, 4));
        assert_eq!(stats.shifted, 0);
        assert_eq!(stats.rollovers, 1);
        assert_eq!(tasks[0].due_date(), Some(date(2026, 5, 6)));
    }

    #[test]
    fn end_of_day_only_for_daily_steps() {
        let today = date(2026, 5, 5);
        let engine = EngineConfig {
            end_of_day: Some(4),
            ..Default::default()
        };
        // Weekly task: new date a week out
        let mut tasks = vec![recurring("r", date(2026, 5, 11), Some(date(2026, 5, 4)))];
        let (stats, _) = run(&mut tasks, &engine, at(today, 1));
        assert_eq!(stats.shifted, 0);
    }

    #[test]
    fn end_of_day_alone_does_not_revive() {
        let today = date(2026, 5, 5);
        let engine = EngineConfig {
            end_of_day: Some(4),
            ..Default::default()
        };
        let mut tasks = vec![
            recurring("r", date(2026, 5, 6), Some(date(2026, 5, 4))),
            child("c", "r", 0, true),
        ];
        let (stats, _) = run(&mut tasks, &engine, at(today, 1));
        assert_eq!(stats.revived, 0);
        assert!(tasks[1].checked);
    }

    #[test]
    fn stale_tags_cleared_when_disabled() {
        let today = date(2026, 5, 5);
        let mut stale = child("c", "r", 0, true);
        stale.recurrence_tag = true;
        let mut tasks = vec![recurring("r", today, Some(today)), stale];
        let (stats, store) = run(&mut tasks, &EngineConfig::default(), at(today, 9));
        assert_eq!(stats, RecurrenceStats::default());
        assert!(!tasks[1].recurrence_tag);
        assert!(tasks[1].checked);
        let (key, update) = store.queued().next().unwrap();
        assert_eq!(key, &NodeKey::task("c"));
        assert_eq!(update.recurrence_tag, Some(false));
        assert_eq!(update.checked, None);
    }

    #[test]
    fn persisted_tag_resumes_interrupted_revival() {
        let today = date(2026, 5, 5);
        let mut marked = child("c", "r", 0, true);
        marked.recurrence_tag = true;
        let mut tasks = vec![
            recurring("r", today, Some(today)),
            marked,
            child("g", "c", 0, true),
        ];
        let (stats, _) = run(&mut tasks, &recurring_engine(), at(today, 9));
        assert_eq!(stats.revived, 2);
        assert!(!tasks[1].recurrence_tag);
        assert!(!tasks[2].checked);
    }
}
