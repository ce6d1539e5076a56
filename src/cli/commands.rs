use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::config::Config;
use crate::model::mode::Mode;

#[derive(Parser)]
#[command(name = "nm", about = concat!("nextmark v", env!("CARGO_PKG_VERSION"), " - a next-action label that follows your task tree"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: ./nextmark.toml if it exists)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log every label decision
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Keep the store labeled, polling until interrupted
    Run(RunArgs),
    /// Show what one cycle would change, without writing anything
    Plan,
    /// Validate the configuration and the store
    Check,
}

#[derive(Args)]
pub struct RunArgs {
    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

/// Settings that override the config file
#[derive(Args, Default)]
pub struct EngineArgs {
    /// JSON store file
    #[arg(short = 's', long, global = true, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Label marking the next actionable tasks
    #[arg(short = 'l', long, global = true)]
    pub label: Option<String>,

    /// Reopen sub-tasks when a recurring parent rolls over
    #[arg(short = 'r', long, global = true)]
    pub recurring: bool,

    /// Hour (1-24) at which the day ends for recurring tasks
    #[arg(short = 'e', long = "end", global = true, value_name = "HOUR")]
    pub end_of_day: Option<u32>,

    /// Seconds between cycles
    #[arg(short = 'd', long, global = true, value_name = "SECONDS")]
    pub delay: Option<u64>,

    /// Suffix for parallel lists
    #[arg(long, global = true, value_name = "SUFFIX", allow_hyphen_values = true)]
    pub pp_suffix: Option<String>,

    /// Suffix for sequential lists
    #[arg(long, global = true, value_name = "SUFFIX", allow_hyphen_values = true)]
    pub ss_suffix: Option<String>,

    /// Suffix for parallel lists with sequential sub-tasks
    #[arg(long, global = true, value_name = "SUFFIX", allow_hyphen_values = true)]
    pub ps_suffix: Option<String>,

    /// Suffix for sequential lists with parallel sub-tasks
    #[arg(long, global = true, value_name = "SUFFIX", allow_hyphen_values = true)]
    pub sp_suffix: Option<String>,

    /// Hide labels on tasks due this many days out or later (0 = never)
    #[arg(long, global = true, value_name = "DAYS")]
    pub hide_future: Option<u32>,

    /// Date format of `start=` markers
    #[arg(long, global = true, value_name = "FORMAT")]
    pub start_format: Option<String>,

    /// Mode for the project named Inbox (parallel, sequential or none)
    #[arg(long, global = true, value_parser = parse_inbox_mode)]
    pub inbox: Option<Mode>,
}

impl EngineArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut Config) {
        let engine = &mut config.engine;
        if let Some(ref store) = self.store {
            config.store = Some(store.clone());
        }
        if let Some(delay) = self.delay {
            config.delay = delay;
        }
        if let Some(ref label) = self.label {
            engine.label = Some(label.clone());
        }
        if self.recurring {
            engine.recurring = true;
        }
        if let Some(hour) = self.end_of_day {
            engine.end_of_day = Some(hour);
        }
        if let Some(ref s) = self.pp_suffix {
            engine.suffixes.parallel = s.clone();
        }
        if let Some(ref s) = self.ss_suffix {
            engine.suffixes.sequential = s.clone();
        }
        if let Some(ref s) = self.ps_suffix {
            engine.suffixes.parallel_sequential = s.clone();
        }
        if let Some(ref s) = self.sp_suffix {
            engine.suffixes.sequential_parallel = s.clone();
        }
        if let Some(days) = self.hide_future {
            engine.hide_future = days;
        }
        if let Some(ref format) = self.start_format {
            engine.start_format = format.clone();
        }
        if let Some(mode) = self.inbox {
            engine.inbox = Some(mode);
        }
    }
}

fn parse_inbox_mode(s: &str) -> Result<Mode, String> {
    match s.parse::<Mode>()? {
        mode @ (Mode::None | Mode::Parallel | Mode::Sequential) => Ok(mode),
        other => Err(format!(
            "inbox mode must be parallel, sequential or none, got {}",
            other
        )),
    }
}
