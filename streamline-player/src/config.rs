//! streamline-player runtime configuration
//!
//! Validated form of the TOML bootstrap config: endpoint strings become parsed
//! URLs so no code path past startup has to handle a malformed endpoint.

use crate::error::{Error, Result};
use streamline_common::config::{PlaybackSettings, TomlConfig};
use url::Url;

/// Player configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Byte-range proxy endpoint
    pub proxy_endpoint: Url,

    /// Live transcoding endpoint
    pub transcode_endpoint: Url,

    /// Timing and buffer policy
    pub playback: PlaybackSettings,
}

impl PlayerConfig {
    pub fn new(proxy_endpoint: &str, transcode_endpoint: &str, playback: PlaybackSettings) -> Result<Self> {
        playback.validate()?;

        let proxy_endpoint = parse_endpoint("proxy_endpoint", proxy_endpoint)?;
        let transcode_endpoint = parse_endpoint("transcode_endpoint", transcode_endpoint)?;

        Ok(Self {
            proxy_endpoint,
            transcode_endpoint,
            playback,
        })
    }

    /// Build from the TOML bootstrap config
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        Self::new(
            &config.proxy_endpoint,
            &config.transcode_endpoint,
            config.playback.clone(),
        )
    }
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("{} '{}' is not a valid URL: {}", name, value, e)))?;

    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("{} '{}' must be a hierarchical URL", name, value)));
    }

    Ok(url)
}
