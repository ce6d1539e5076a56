use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};

use crate::model::config::{Config, EngineConfig};
use crate::model::snapshot::Snapshot;

/// Error type for configuration problems. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no store file set; pass --store <FILE> or set `store` in the config file")]
    MissingStore,
    #[error("end-of-day hour must be a number from 1 to 24, got {0}")]
    InvalidEndOfDay(u32),
    #[error("invalid start date format '{0}'")]
    InvalidStartFormat(String),
    #[error(
        "label '{0}' doesn't exist in the store; create it or pick an existing label with --label <LABEL>"
    )]
    UnknownLabel(String),
}

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "nextmark.toml";

/// Read a config file. A missing default file yields the default config;
/// a missing file that was asked for explicitly is an error.
pub fn read_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if !explicit && !path.exists() {
        return Ok(Config::default());
    }
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError { path, source: e })
}

/// Check the engine settings that can be checked without the store.
pub fn validate(engine: &EngineConfig) -> Result<(), ConfigError> {
    if let Some(hour) = engine.end_of_day
        && !(1..=24).contains(&hour)
    {
        return Err(ConfigError::InvalidEndOfDay(hour));
    }
    if engine.start_format.trim().is_empty()
        || StrftimeItems::new(&engine.start_format).any(|item| matches!(item, Item::Error))
    {
        return Err(ConfigError::InvalidStartFormat(engine.start_format.clone()));
    }
    Ok(())
}

/// Check that the configured label exists in the store.
pub fn validate_label(engine: &EngineConfig, snapshot: &Snapshot) -> Result<(), ConfigError> {
    match engine.label {
        Some(ref label) if !snapshot.has_label(label) => {
            Err(ConfigError::UnknownLabel(label.clone()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = read_config(Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn reads_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nextmark.toml");
        fs::write(&path, "label = \"next\"\nhide_future = 3\n").unwrap();
        let config = read_config(Some(&path)).unwrap();
        assert_eq!(config.engine.label.as_deref(), Some("next"));
        assert_eq!(config.engine.hide_future, 3);
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nextmark.toml");
        fs::write(&path, "hide_future = \"soon\"").unwrap();
        assert!(matches!(
            read_config(Some(&path)),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn end_of_day_must_be_an_hour() {
        let mut engine = EngineConfig::default();
        for hour in [1, 12, 24] {
            engine.end_of_day = Some(hour);
            assert!(validate(&engine).is_ok());
        }
        for hour in [0, 25] {
            engine.end_of_day = Some(hour);
            assert!(matches!(
                validate(&engine),
                Err(ConfigError::InvalidEndOfDay(h)) if h == hour
            ));
        }
    }

    #[test]
    fn bad_start_format_is_rejected() {
        let engine = EngineConfig {
            start_format: "%d-%Q".into(),
            ..Default::default()
        };
        assert!(matches!(
            validate(&engine),
            Err(ConfigError::InvalidStartFormat(_))
        ));
    }

    #[test]
    fn label_must_exist_when_labeling() {
        let snapshot = Snapshot {
            labels: vec!["next_action".into()],
            ..Default::default()
        };
        let mut engine = EngineConfig::default();
        assert!(validate_label(&engine, &snapshot).is_ok());

        engine.label = Some("next_action".into());
        assert!(validate_label(&engine, &snapshot).is_ok());

        engine.label = Some("missing".into());
        assert!(matches!(
            validate_label(&engine, &snapshot),
            Err(ConfigError::UnknownLabel(l)) if l == "missing"
        ));
    }
}
