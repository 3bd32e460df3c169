use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Discord token is present
/// - Intake timings are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.discord.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "discord.token cannot be empty".to_string(),
        ));
    }

    if config.intake.selector_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "intake.selector_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.intake.cleanup_delay_secs == 0 {
        return Err(ConfigError::ValidationError(
            "intake.cleanup_delay_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
