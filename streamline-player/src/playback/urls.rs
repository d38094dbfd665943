//! Decoder source URLs for each playback mode

use crate::config::PlayerConfig;
use url::Url;

/// Builds the URL handed to the decoder (or segment source) in each mode
#[derive(Debug, Clone)]
pub struct SourceUrls {
    proxy_endpoint: Url,
    transcode_endpoint: Url,
}

impl SourceUrls {
    pub fn new(proxy_endpoint: Url, transcode_endpoint: Url) -> Self {
        Self {
            proxy_endpoint,
            transcode_endpoint,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.proxy_endpoint.clone(), config.transcode_endpoint.clone())
    }

    /// Raw asset URL
    pub fn direct(&self, asset: &Url) -> Url {
        asset.clone()
    }

    /// `<proxy>?url=<asset>`
    pub fn proxy(&self, asset: &Url) -> Url {
        let mut url = self.proxy_endpoint.clone();
        url.query_pairs_mut().append_pair("url", asset.as_str());
        url
    }

    /// `<transcode>?url=<asset>&time=<anchor>&r=<revision>[&audioIndex=<n>]`
    pub fn transcode(&self, asset: &Url, anchor: f64, revision: u64, audio_track: Option<u32>) -> Url {
        let mut url = self.transcode_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("url", asset.as_str())
                .append_pair("time", &format_time_param(anchor))
                .append_pair("r", &revision.to_string());
            if let Some(index) = audio_track {
                query.append_pair("audioIndex", &index.to_string());
            }
        }
        url
    }
}

/// Seconds rounded to milliseconds, without trailing zeros ("42", "42.5")
pub fn format_time_param(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let rounded = (secs * 1000.0).round() / 1000.0;
    format!("{}", rounded)
}
