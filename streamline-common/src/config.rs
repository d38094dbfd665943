//! Configuration loading and resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every key is optional:
//! missing keys fall back to compiled defaults, and a missing file is a warning,
//! not an error.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `STREAMLINE_CONFIG` environment variable
//! 3. User config directory (`<config_dir>/streamline/config.toml`)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "STREAMLINE_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Byte-range proxy endpoint (receives `?url=<asset>`)
    #[serde(default = "default_proxy_endpoint")]
    pub proxy_endpoint: String,

    /// Live transcoding endpoint (receives `?url=&time=&r=[&audioIndex=]`)
    #[serde(default = "default_transcode_endpoint")]
    pub transcode_endpoint: String,

    /// Controller timing and buffer policy
    #[serde(default)]
    pub playback: PlaybackSettings,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Controller timing and buffer policy
///
/// Durations are stored in the units they are written in the TOML file;
/// use the accessor methods to get `Duration`s.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Delay between a waiting/stalled signal and the stall check
    pub stall_delay_ms: u64,

    /// Debounce window for seeks in transcode mode
    pub seek_debounce_ms: u64,

    /// Keyframe grid the transcoder can always start cleanly from
    pub keyframe_interval_secs: f64,

    /// Distance kept from the end of a stream when clamping seeks
    pub end_guard_secs: f64,

    /// In-place transcode recoveries allowed before the session fails
    pub max_recovery_attempts: u32,

    /// Grace period before the proxy watchdog escalates a silent decoder
    pub proxy_watchdog_ms: u64,

    /// Delay before retrying an append no eviction tier could make room for
    pub quota_retry_delay_ms: u64,

    /// Delayed quota retries tolerated before treating the segment as failed.
    /// `None` retries forever.
    pub quota_retry_limit: Option<u32>,

    /// Pending chunk count at which network reads stop being accepted
    pub queue_high_water: usize,

    /// Capacity of the channel between the network read loop and the buffer
    pub channel_capacity: usize,

    /// Minimum spacing between periodic buffer cleanups
    pub cleanup_interval_ms: u64,

    /// Already-played material kept for rewinding
    pub retention_backward_secs: f64,

    /// Material allowed ahead of the playback position
    pub retention_forward_secs: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            stall_delay_ms: 4000,
            seek_debounce_ms: 150,
            keyframe_interval_secs: 2.0,
            end_guard_secs: 0.25,
            max_recovery_attempts: 2,
            proxy_watchdog_ms: 8000,
            quota_retry_delay_ms: 1000,
            quota_retry_limit: None,
            queue_high_water: 32,
            channel_capacity: 8,
            cleanup_interval_ms: 10_000,
            retention_backward_secs: 300.0,
            retention_forward_secs: 30.0,
        }
    }
}

impl PlaybackSettings {
    pub fn stall_delay(&self) -> Duration {
        Duration::from_millis(self.stall_delay_ms)
    }

    pub fn seek_debounce(&self) -> Duration {
        Duration::from_millis(self.seek_debounce_ms)
    }

    pub fn proxy_watchdog(&self) -> Duration {
        Duration::from_millis(self.proxy_watchdog_ms)
    }

    pub fn quota_retry_delay(&self) -> Duration {
        Duration::from_millis(self.quota_retry_delay_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// Reject values the controller cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.keyframe_interval_secs.is_finite() && self.keyframe_interval_secs > 0.0) {
            return Err(Error::Config(format!(
                "keyframe_interval_secs must be positive, got {}",
                self.keyframe_interval_secs
            )));
        }
        if !(self.end_guard_secs.is_finite() && self.end_guard_secs >= 0.0) {
            return Err(Error::Config(format!(
                "end_guard_secs must be non-negative, got {}",
                self.end_guard_secs
            )));
        }
        if self.queue_high_water == 0 || self.channel_capacity == 0 {
            return Err(Error::Config(
                "queue_high_water and channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.retention_forward_secs < 0.0 || self.retention_backward_secs < 0.0 {
            return Err(Error::Config("retention windows must be non-negative".to_string()));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            proxy_endpoint: default_proxy_endpoint(),
            transcode_endpoint: default_transcode_endpoint(),
            playback: PlaybackSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_proxy_endpoint() -> String {
    "http://127.0.0.1:3000/api/proxy".to_string()
}

fn default_transcode_endpoint() -> String {
    "http://127.0.0.1:3000/api/transcode".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.playback.validate()?;
        Ok(config)
    }

    /// Resolve and load the config, degrading to defaults when no file is found.
    ///
    /// A file that exists but fails to parse is still an error: silently ignoring
    /// a typo would run the player with settings the user did not ask for.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Find the config file following the priority order in the module docs.
///
/// An explicit CLI or environment path is returned even if it does not exist,
/// so the caller reports the missing file instead of quietly using defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    user_config_path().filter(|p| p.exists())
}

/// Platform user config location (`~/.config/streamline/config.toml` on Linux)
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("streamline").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_controller_constants() {
        let settings = PlaybackSettings::default();
        assert_eq!(settings.stall_delay(), Duration::from_secs(4));
        assert_eq!(settings.seek_debounce(), Duration::from_millis(150));
        assert_eq!(settings.keyframe_interval_secs, 2.0);
        assert_eq!(settings.max_recovery_attempts, 2);
        assert_eq!(settings.quota_retry_delay(), Duration::from_secs(1));
        assert!(settings.quota_retry_limit.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_playback_section_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            proxy_endpoint = "http://proxy.local/p"

            [playback]
            stall_delay_ms = 2500
            quota_retry_limit = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.proxy_endpoint, "http://proxy.local/p");
        assert_eq!(config.transcode_endpoint, default_transcode_endpoint());
        assert_eq!(config.playback.stall_delay_ms, 2500);
        assert_eq!(config.playback.quota_retry_limit, Some(5));
        assert_eq!(config.playback.seek_debounce_ms, 150);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.playback, PlaybackSettings::default());
    }

    #[test]
    fn test_invalid_keyframe_interval_rejected() {
        let result = TomlConfig::from_toml_str("[playback]\nkeyframe_interval_secs = 0.0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_high_water_rejected() {
        let result = TomlConfig::from_toml_str("[playback]\nqueue_high_water = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = TomlConfig::from_toml_str("proxy_endpoint = [");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_cli_argument_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
