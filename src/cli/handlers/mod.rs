use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, ConfigError};
use crate::io::json_store::JsonStore;
use crate::io::store::{StoreError, TaskStore};
use crate::logging;
use crate::model::config::Config;
use crate::model::snapshot::Snapshot;
use crate::ops::check;
use crate::ops::cycle::Engine;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(cli.debug);
    let json = cli.json;

    let mut config = config_io::read_config(cli.config.as_deref())?;
    cli.engine.apply(&mut config);
    config_io::validate(&config.engine)?;

    match cli.command {
        Commands::Run(args) => cmd_run(&config, args, json),
        Commands::Plan => cmd_plan(&config, json),
        Commands::Check => cmd_check(&config, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn store_path(config: &Config) -> Result<PathBuf, ConfigError> {
    config.store.clone().ok_or(ConfigError::MissingStore)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Fetch the first snapshot. Outside run-once mode a failing store is
/// retried after the delay instead of ending the process.
fn initial_snapshot(
    store: &mut JsonStore,
    delay: Duration,
    retry: bool,
) -> Result<Snapshot, StoreError> {
    loop {
        match store.fetch_snapshot() {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if retry => {
                log::error!("{}; retrying in {}s", e, delay.as_secs());
                thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_run(config: &Config, args: RunArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !config.engine.any_enabled() {
        log::info!(
            "Nothing to do: enable labeling with --label, or recurrence with --recurring or --end. See `nm --help`."
        );
        return Ok(());
    }

    let path = store_path(config)?;
    let delay = Duration::from_secs(config.delay);
    let mut store = JsonStore::open(&path);

    let snapshot = initial_snapshot(&mut store, delay, !args.once)?;
    config_io::validate_label(&config.engine, &snapshot)?;

    let engine = Engine::new(config.engine.clone());
    log::info!(
        "Watching {} (label: {}, recurring: {})",
        path.display(),
        config.engine.label.as_deref().unwrap_or("off"),
        config.engine.recurring
    );

    loop {
        match engine.run_cycle(&mut store, now()) {
            Ok(report) => {
                if args.once {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("{}", format_report(&report));
                    }
                    return Ok(());
                }
                if report.mutations_committed > 0 {
                    log::info!("{}", format_report(&report));
                } else {
                    log::debug!("{}", format_report(&report));
                }
            }
            Err(e) => {
                log::error!("Cycle failed: {}", e);
                if args.once {
                    return Err(e.into());
                }
            }
        }
        thread::sleep(delay);
    }
}

fn cmd_plan(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = store_path(config)?;
    let snapshot = JsonStore::open(&path).fetch_snapshot()?;
    config_io::validate_label(&config.engine, &snapshot)?;

    let plan = Engine::new(config.engine.clone()).plan(&snapshot, now());
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        for line in format_plan(&plan) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_check(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !config.engine.any_enabled() {
        log::warn!("Neither labeling nor recurrence is enabled; `nm run` would exit immediately");
    }
    let path = store_path(config)?;
    let snapshot = JsonStore::open(&path).fetch_snapshot()?;
    let result = check::check_snapshot(&snapshot, config.engine.label.as_deref());

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_check(&result) {
            println!("{}", line);
        }
    }

    if result.valid {
        Ok(())
    } else {
        Err(format!("{} problem(s) found in {}", result.errors.len(), path.display()).into())
    }
}
