//! Proxy diagnostic probe
//!
//! Only used when escalating out of proxy mode, to turn "the decoder gave up" into a
//! reason a human can act on. A probe never blocks escalation: network errors
//! degrade to a generic description.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RANGE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;

/// Byte range requested by the probe
pub const PROBE_RANGE: &str = "bytes=0-1023";

/// Longest plain-text error body kept in a probe outcome
pub const MAX_ERROR_TEXT_CHARS: usize = 200;

const PROBE_TIMEOUT_SECS: u64 = 5;

/// What the probe learned about the proxy endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Proxy served the range; the decoder could not use the bytes
    Reachable { status: u16 },

    /// Proxy answered with a non-2xx status
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Request did not complete
    Unreachable { reason: String },
}

impl ProbeOutcome {
    /// Human-readable reason for the status line
    pub fn describe(&self) -> String {
        match self {
            ProbeOutcome::Reachable { .. } => "proxied stream could not be decoded".to_string(),
            ProbeOutcome::Rejected {
                status,
                code: Some(code),
                message,
            } => format!("proxy returned HTTP {} ({}: {})", status, code, message),
            ProbeOutcome::Rejected {
                status,
                code: None,
                message,
            } if message.is_empty() => format!("proxy returned HTTP {}", status),
            ProbeOutcome::Rejected { status, message, .. } => {
                format!("proxy returned HTTP {} ({})", status, message)
            }
            ProbeOutcome::Unreachable { .. } => "proxy playback failed".to_string(),
        }
    }
}

/// Runs the diagnostic probe against a proxy URL
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &Url) -> ProbeOutcome;
}

/// Prober issuing a small ranged GET with reqwest
#[derive(Debug, Clone)]
pub struct HttpProber {
    http_client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("streamline/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &Url) -> ProbeOutcome {
        debug!(url = %url, "Probing proxy endpoint");

        let response = match self
            .http_client
            .get(url.clone())
            .header(RANGE, PROBE_RANGE)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Proxy probe request failed");
                return ProbeOutcome::Unreachable {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, status = status.as_u16(), "Proxy probe succeeded");
            return ProbeOutcome::Reachable {
                status: status.as_u16(),
            };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not read proxy error body");
                String::new()
            }
        };

        let outcome = parse_error_body(status.as_u16(), content_type.as_deref(), &body);
        debug!(url = %url, ?outcome, "Proxy probe rejected");
        outcome
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
}

/// Interpret a non-2xx probe response body
///
/// JSON bodies (`{code, message}`) are used when the content type says JSON;
/// anything else is kept as truncated plain text.
pub fn parse_error_body(status: u16, content_type: Option<&str>, body: &str) -> ProbeOutcome {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    if is_json {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            let code = parsed.code.and_then(|code| match code {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            });
            return ProbeOutcome::Rejected {
                status,
                code,
                message: parsed.message.unwrap_or_default(),
            };
        }
    }

    ProbeOutcome::Rejected {
        status,
        code: None,
        message: truncate_chars(body.trim(), MAX_ERROR_TEXT_CHARS),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}
