use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
}

/// Discord API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    /// Bot token used for the REST API.
    pub token: String,
    /// API base URL override (default: https://discord.com/api/v10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("deskbot.db")
}

/// Ticket intake timings.
///
/// The defaults mirror the original command behavior: a 30 second category
/// prompt, one reaction marker added per second, transient responses removed
/// after 15 seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntakeConfig {
    /// How long the category selection prompt accepts reactions.
    #[serde(default = "default_selector_timeout_secs")]
    pub selector_timeout_secs: u64,
    /// Delay between adding consecutive reaction markers (rate-limit pacing).
    #[serde(default = "default_marker_delay_ms")]
    pub marker_delay_ms: u64,
    /// Delay before transient response messages are deleted.
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            selector_timeout_secs: default_selector_timeout_secs(),
            marker_delay_ms: default_marker_delay_ms(),
            cleanup_delay_secs: default_cleanup_delay_secs(),
        }
    }
}

fn default_selector_timeout_secs() -> u64 {
    30
}

fn default_marker_delay_ms() -> u64 {
    1000
}

fn default_cleanup_delay_secs() -> u64 {
    15
}

/// Sanitized config for diagnostics output (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub discord: SanitizedDiscordConfig,
    pub database: DatabaseConfig,
    pub intake: IntakeConfig,
}

/// Sanitized Discord config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDiscordConfig {
    pub token_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            discord: SanitizedDiscordConfig {
                token_configured: !config.discord.token.is_empty(),
                api_base: config.discord.api_base.clone(),
                timeout_secs: config.discord.timeout_secs,
            },
            database: config.database.clone(),
            intake: config.intake.clone(),
        }
    }
}
