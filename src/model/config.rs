use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::mode::Mode;

/// Configuration from `nextmark.toml`, overlaid by command-line flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the JSON store file
    #[serde(default)]
    pub store: Option<PathBuf>,
    /// Seconds to sleep between cycles
    #[serde(default = "default_delay")]
    pub delay: u64,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: None,
            delay: default_delay(),
            engine: EngineConfig::default(),
        }
    }
}

/// Everything the labeling engine reads during a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Label to manage (`None` = labeling disabled)
    #[serde(default)]
    pub label: Option<String>,
    /// Revive completed sub-tasks when a recurring parent rolls over
    #[serde(default)]
    pub recurring: bool,
    /// Alternative end-of-day hour (1-24)
    #[serde(default)]
    pub end_of_day: Option<u32>,
    #[serde(default)]
    pub suffixes: Suffixes,
    /// Hide labels on tasks due this many days out or later (0 = never)
    #[serde(default = "default_hide_future")]
    pub hide_future: u32,
    /// chrono format of `start=<date>` markers
    #[serde(default = "default_start_format")]
    pub start_format: String,
    /// Mode applied to the project named `Inbox`
    #[serde(default)]
    pub inbox: Option<Mode>,
    /// Tasks whose content starts with this are ignored
    #[serde(default = "default_inert_prefix")]
    pub inert_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            label: None,
            recurring: false,
            end_of_day: None,
            suffixes: Suffixes::default(),
            hide_future: default_hide_future(),
            start_format: default_start_format(),
            inbox: None,
            inert_prefix: default_inert_prefix(),
        }
    }
}

impl EngineConfig {
    /// Whether the recurrence pass has anything to do
    pub fn recurrence_active(&self) -> bool {
        self.recurring || self.end_of_day.is_some()
    }

    /// Whether any functionality is switched on at all
    pub fn any_enabled(&self) -> bool {
        self.label.is_some() || self.recurrence_active()
    }
}

/// Name suffixes that select a mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffixes {
    #[serde(default = "default_parallel_suffix")]
    pub parallel: String,
    #[serde(default = "default_sequential_suffix")]
    pub sequential: String,
    #[serde(default = "default_parallel_sequential_suffix")]
    pub parallel_sequential: String,
    #[serde(default = "default_sequential_parallel_suffix")]
    pub sequential_parallel: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Suffixes {
            parallel: default_parallel_suffix(),
            sequential: default_sequential_suffix(),
            parallel_sequential: default_parallel_sequential_suffix(),
            sequential_parallel: default_sequential_parallel_suffix(),
        }
    }
}

impl Suffixes {
    /// Suffixes paired with their mode, in match priority order
    pub fn in_priority(&self) -> [(&str, Mode); 4] {
        [
            (self.parallel.as_str(), Mode::Parallel),
            (self.sequential.as_str(), Mode::Sequential),
            (self.parallel_sequential.as_str(), Mode::ParallelSequential),
            (self.sequential_parallel.as_str(), Mode::SequentialParallel),
        ]
    }
}

fn default_delay() -> u64 {
    5
}

fn default_hide_future() -> u32 {
    7
}

fn default_start_format() -> String {
    "%d-%m-%Y".to_string()
}

fn default_inert_prefix() -> String {
    "*".to_string()
}

fn default_parallel_suffix() -> String {
    "//".to_string()
}

fn default_sequential_suffix() -> String {
    "--".to_string()
}

fn default_parallel_sequential_suffix() -> String {
    "/-".to_string()
}

fn default_sequential_parallel_suffix() -> String {
    "-/".to_string()
}
