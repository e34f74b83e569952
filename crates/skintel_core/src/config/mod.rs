use crate::clock::local_offset;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::UtcOffset;
use time::macros::format_description;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "SKINTEL_CONFIG_PATH";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// `"+HH:MM"`, `"utc"` or `"local"`; calendar days are cut in this offset.
    #[serde(default)]
    pub day_offset: Option<String>,
    #[serde(default)]
    pub planner_command: Option<String>,
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Config {
    pub fn day_offset(&self) -> Result<UtcOffset, EngineError> {
        match self.day_offset.as_deref() {
            Some(raw) => parse_day_offset(raw),
            None => Ok(UtcOffset::UTC),
        }
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter
            .as_deref()
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<EngineError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub day_offset: Option<String>,
    pub planner_command: Option<String>,
    pub log_filter: Option<String>,
}

pub fn parse_day_offset(raw: &str) -> Result<UtcOffset, EngineError> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "local" => return Ok(local_offset()),
        "utc" | "z" | "" => return Ok(UtcOffset::UTC),
        _ => {}
    }

    let padded = if trimmed.len() == 3 {
        format!("{trimmed}:00")
    } else {
        trimmed.to_string()
    };
    UtcOffset::parse(
        &padded,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| {
        EngineError::invalid_input(format!(
            "day offset '{trimmed}' must look like +HH:MM, utc or local"
        ))
    })
}

pub fn config_path() -> Result<PathBuf, EngineError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| EngineError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("skintel")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| EngineError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("skintel")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, EngineError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| EngineError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        EngineError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    config.day_offset().map_err(|err| {
        EngineError::invalid_data(format!("{}: {}", path.display(), err.message()))
    })?;
    Ok(normalize_config(config))
}

fn normalize_config(mut config: Config) -> Config {
    config.day_offset = normalize_value(config.day_offset);
    config.planner_command = normalize_value(config.planner_command);
    config.log_filter = normalize_value(config.log_filter);
    config
}

fn normalize_value(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(day_offset) = normalize_value(overrides.day_offset.clone()) {
        merged.day_offset = Some(day_offset);
    }
    if let Some(planner_command) = normalize_value(overrides.planner_command.clone()) {
        merged.planner_command = Some(planner_command);
    }
    if let Some(log_filter) = normalize_value(overrides.log_filter.clone()) {
        merged.log_filter = Some(log_filter);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, load_config_from_path, load_config_with_fallback_from_path,
        merge_overrides, parse_day_offset,
    };
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::UtcOffset;
    use time::macros::offset;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("skintel-{nanos}-{file_name}"))
    }

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let path = temp_path("missing-config.json");
        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let path = temp_path("invalid-config.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.map(|err| err.code()), Some("invalid_data"));
    }

    #[test]
    fn load_config_rejects_bad_day_offset() {
        let path = temp_path("offset-config.json");
        fs::write(&path, r#"{"day_offset": "tomorrow"}"#).unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_some());
    }

    #[test]
    fn load_config_reads_valid_file() {
        let path = temp_path("valid-config.json");
        let content = serde_json::json!({
            "day_offset": " +05:30 ",
            "planner_command": "skintel-planner --json",
            "log_filter": "skintel_core=debug"
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.day_offset().unwrap(), offset!(+5:30));
        assert_eq!(
            loaded.planner_command.as_deref(),
            Some("skintel-planner --json")
        );
        assert_eq!(loaded.log_filter(), "skintel_core=debug");
    }

    #[test]
    fn defaults_use_utc_and_warn() {
        let config = Config::default();

        assert_eq!(config.day_offset().unwrap(), UtcOffset::UTC);
        assert_eq!(config.log_filter(), "warn");
    }

    #[test]
    fn parse_day_offset_accepts_common_forms() {
        assert_eq!(parse_day_offset("-08:00").unwrap(), offset!(-8));
        assert_eq!(parse_day_offset("+02").unwrap(), offset!(+2));
        assert_eq!(parse_day_offset("UTC").unwrap(), UtcOffset::UTC);
        assert!(parse_day_offset("local").is_ok());
        assert_eq!(
            parse_day_offset("0800").unwrap_err().code(),
            "invalid_input"
        );
    }

    #[test]
    fn merge_overrides_replaces_only_given_fields() {
        let base = Config {
            day_offset: Some("+01:00".into()),
            planner_command: Some("planner-a".into()),
            log_filter: None,
        };
        let overrides = ConfigOverrides {
            planner_command: Some("planner-b".into()),
            log_filter: Some("  ".into()),
            ..ConfigOverrides::default()
        };

        let merged = merge_overrides(&base, &overrides);

        assert_eq!(merged.day_offset.as_deref(), Some("+01:00"));
        assert_eq!(merged.planner_command.as_deref(), Some("planner-b"));
        assert_eq!(merged.log_filter, None);
        assert_eq!(base.planner_command.as_deref(), Some("planner-a"));
    }

    #[test]
    fn merge_overrides_with_empty_overrides_returns_clone() {
        let base = Config {
            day_offset: Some("local".into()),
            ..Config::default()
        };

        assert_eq!(merge_overrides(&base, &ConfigOverrides::default()), base);
    }
}
