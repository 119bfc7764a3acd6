use super::types::*;
use crate::source::timestamp::TimestampPattern;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.timestamps.is_empty() {
        errors.push("timestamps must contain at least one pattern".to_string());
    }

    for (i, timestamp) in config.timestamps.iter().enumerate() {
        if timestamp.pattern.is_empty() {
            errors.push(format!("timestamps[{}]: pattern cannot be empty", i));
            continue;
        }
        if let Err(e) = TimestampPattern::new(&timestamp.pattern, timestamp.format.as_deref()) {
            errors.push(format!("timestamps[{}]: {}", i, e));
        }
        if matches!(timestamp.format.as_deref(), Some("")) {
            errors.push(format!(
                "timestamps[{}]: format cannot be empty (omit it to skip date parsing)",
                i
            ));
        }
    }

    if config.scan.overrun_bytes == 0 {
        errors.push("scan.overrun_bytes must be greater than 0".to_string());
    }

    if config.report.slow_queries == 0 {
        errors.push("report.slow_queries must be greater than 0".to_string());
    }

    if config.report.slow_load_times == 0 {
        errors.push("report.slow_load_times must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
