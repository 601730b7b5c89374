use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Engine paths are set and the grace period and limits are positive
/// - The format catalog holds its invariants
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Engine validation
    if config.engine.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffmpeg_path cannot be empty".to_string(),
        ));
    }
    if config.engine.ffprobe_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffprobe_path cannot be empty".to_string(),
        ));
    }
    if config.engine.terminate_grace_ms == 0 {
        return Err(ConfigError::ValidationError(
            "engine.terminate_grace_ms must be greater than 0".to_string(),
        ));
    }
    if config.engine.probe_limit_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "engine.probe_limit_bytes must be greater than 0".to_string(),
        ));
    }

    // Extractor validation
    if config.extractor.program.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "extractor.program cannot be empty".to_string(),
        ));
    }

    if config.fetch.max_source_bytes == Some(0) {
        return Err(ConfigError::ValidationError(
            "fetch.max_source_bytes must be greater than 0 when set".to_string(),
        ));
    }

    config
        .catalog()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    Ok(())
}
