//! Subscription retrieval and body normalization.
//!
//! The remote body is either base64 of a newline-separated URI list or the
//! plain list itself. Anything else is a fetch error: a malformed
//! subscription must never reach the decoders as garbage lines.

use std::time::Duration;

use base64::Engine;
use tracing::debug;
use url::Url;

use crate::error::ImportError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self, ImportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("clashsub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImportError::SubscriptionFetch(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetch the subscription body and normalize it to URI lines.
    pub async fn fetch(&self, url: &str) -> Result<Vec<String>, ImportError> {
        let url = Url::parse(url)
            .map_err(|e| ImportError::SubscriptionFetch(format!("invalid URL {url:?}: {e}")))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ImportError::SubscriptionFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ImportError::SubscriptionFetch(format!(
                "server returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ImportError::SubscriptionFetch(e.to_string()))?;

        let lines = normalize(&body)?;
        debug!(count = lines.len(), %url, "fetched subscription lines");
        Ok(lines)
    }
}

/// Turn a raw subscription body into URI lines.
///
/// Tries base64 first; accepts the decoded text only if it actually contains
/// a `://` scheme separator. Falls back to the raw body under the same check.
pub fn normalize(body: &str) -> Result<Vec<String>, ImportError> {
    if let Some(decoded) = decode_base64(body) {
        if decoded.contains("://") {
            return Ok(to_lines(&decoded));
        }
    }
    if body.contains("://") {
        return Ok(to_lines(body));
    }
    Err(ImportError::SubscriptionFetch(
        "body is neither base64 of a URI list nor a URI list".to_string(),
    ))
}

fn to_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_base64(s: &str) -> Option<String> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let engines = [
        base64::engine::general_purpose::STANDARD,
        base64::engine::general_purpose::STANDARD_NO_PAD,
        base64::engine::general_purpose::URL_SAFE,
        base64::engine::general_purpose::URL_SAFE_NO_PAD,
    ];
    for engine in engines {
        if let Ok(bytes) = engine.decode(&compact) {
            return String::from_utf8(bytes).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base64_body() {
        let plain = "trojan://pwd@a.com:443#A\nvless://u@b.com:443#B\n";
        let body = base64::engine::general_purpose::STANDARD.encode(plain);
        let lines = normalize(&body).unwrap();
        assert_eq!(
            lines,
            vec!["trojan://pwd@a.com:443#A", "vless://u@b.com:443#B"]
        );
    }

    #[test]
    fn test_normalize_plain_body() {
        let body = "trojan://pwd@a.com:443#A\n\n  vless://u@b.com:443#B  \n";
        let lines = normalize(body).unwrap();
        assert_eq!(
            lines,
            vec!["trojan://pwd@a.com:443#A", "vless://u@b.com:443#B"]
        );
    }

    #[test]
    fn test_normalize_base64_without_uris_falls_through() {
        // Valid base64, but the decoded text has no scheme separator.
        let body = base64::engine::general_purpose::STANDARD.encode("hello world");
        assert!(matches!(
            normalize(&body),
            Err(ImportError::SubscriptionFetch(_))
        ));
    }

    #[test]
    fn test_normalize_garbage_is_fetch_error() {
        assert!(matches!(
            normalize("<!DOCTYPE html><html>nope</html>"),
            Err(ImportError::SubscriptionFetch(_))
        ));
    }
}
