use super::{AppConfig, ConfigError};

const VALID_LOG_LEVELS: &[&str] = &[
    "TRACE", "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "DISABLED",
];

/// Upper bound for replay fragments; larger values defeat the point of streaming.
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_log_level(config)?;
    validate_replay(config)?;
    validate_output(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {}, got '{}'",
            VALID_LOG_LEVELS.join(", "),
            config.log_level
        )));
    }
    Ok(())
}

fn validate_replay(config: &AppConfig) -> Result<(), ConfigError> {
    let chunk_size = config.replay.chunk_size;
    if chunk_size == 0 {
        return Err(validation_err("replay.chunk_size must be greater than 0"));
    }
    if chunk_size > MAX_CHUNK_SIZE {
        return Err(validation_err(format!(
            "replay.chunk_size must be at most {MAX_CHUNK_SIZE}"
        )));
    }
    Ok(())
}

fn validate_output(config: &AppConfig) -> Result<(), ConfigError> {
    if !config.output.events && !config.output.snapshot {
        return Err(validation_err(
            "output.events and output.snapshot cannot both be disabled",
        ));
    }
    Ok(())
}
