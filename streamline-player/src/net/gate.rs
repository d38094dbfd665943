//! URL-safety gate
//!
//! Consulted before the player causes any upstream fetch of an asset. Real
//! deployments plug in their own validator; `HttpSchemeGate` is the minimal one.

use crate::error::{Error, Result};
use url::Url;

pub trait UrlGate: Send + Sync {
    /// Accept or reject an asset URL before it is fetched upstream
    fn check(&self, url: &Url) -> Result<()>;
}

/// Accepts absolute http(s) URLs with a host and no embedded credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpSchemeGate;

impl UrlGate for HttpSchemeGate {
    fn check(&self, url: &Url) -> Result<()> {
        let reject = |reason: &str| {
            Err(Error::UnsafeUrl {
                url: url.to_string(),
                reason: reason.to_string(),
            })
        };

        if !matches!(url.scheme(), "http" | "https") {
            return reject("only http and https URLs can be streamed");
        }
        if url.host_str().map_or(true, str::is_empty) {
            return reject("URL has no host");
        }
        if !url.username().is_empty() || url.password().is_some() {
            return reject("URL must not embed credentials");
        }

        Ok(())
    }
}
