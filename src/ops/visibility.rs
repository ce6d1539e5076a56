use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

use crate::model::task::Task;

static START_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)start=(\S+)").expect("valid regex"));

static RELATIVE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^due-(\d+)([dw])$").expect("valid regex"));

/// Why a task may not carry the label yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hidden {
    /// Due at least `hide_future` days from today
    FarFuture { days: i64 },
    /// `start=` date has not arrived
    NotStarted { start: NaiveDate },
    /// `start=` value could not be parsed
    MalformedStart(String),
}

impl std::fmt::Display for Hidden {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hidden::FarFuture { days } => write!(f, "due in {} days", days),
            Hidden::NotStarted { start } => write!(f, "starts {}", start),
            Hidden::MalformedStart(raw) => write!(f, "unreadable start date '{}'", raw),
        }
    }
}

/// Suppresses labels on tasks outside the visibility window.
pub struct VisibilityFilter<'a> {
    hide_future: u32,
    start_format: &'a str,
}

impl<'a> VisibilityFilter<'a> {
    pub fn new(hide_future: u32, start_format: &'a str) -> Self {
        VisibilityFilter {
            hide_future,
            start_format,
        }
    }

    /// `Some(reason)` if the task must not hold the label today.
    pub fn check(&self, task: &Task, today: NaiveDate) -> Option<Hidden> {
        if self.hide_future > 0
            && let Some(due) = task.due_date()
        {
            let days = (due - today).num_days();
            if days >= i64::from(self.hide_future) {
                return Some(Hidden::FarFuture { days });
            }
        }

        let raw = START_MARKER.captures(&task.content)?.get(1)?.as_str();
        match self.start_date(raw, task) {
            Ok(Some(start)) if start > today => Some(Hidden::NotStarted { start }),
            Ok(_) => None,
            Err(()) => {
                log::warn!(
                    "Can't read start date '{}' of '{}', expected format {}",
                    raw,
                    task.content,
                    self.start_format
                );
                Some(Hidden::MalformedStart(raw.to_string()))
            }
        }
    }

    /// Absolute dates use the configured format. `due-<n>d` and `due-<n>w`
    /// count back from the due date and are ignored without one.
    fn start_date(&self, raw: &str, task: &Task) -> Result<Option<NaiveDate>, ()> {
        if let Some(caps) = RELATIVE_START.captures(raw) {
            let amount: i64 = caps[1].parse().map_err(|_| ())?;
            let days = if &caps[2] == "w" { amount * 7 } else { amount };
            return Ok(task
                .due_date()
                .and_then(|due| due.checked_sub_signed(Duration::days(days))));
        }
        NaiveDate::parse_from_str(raw, self.start_format)
            .map(Some)
            .map_err(|_| ())
    }
}
