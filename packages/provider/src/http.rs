//! HTTP client construction and single-shot JSON fetches.
//!
//! Unlike a bulk ingestion pipeline, a location engine answering a user
//! should fail fast, so nothing here retries: one request, one answer.

use std::time::Duration;

use crate::ProviderError;

/// User agent sent with every provider request.
pub const USER_AGENT: &str = concat!("waypoint/", env!("CARGO_PKG_VERSION"));

/// Builds a client whose requests are bounded by `timeout`.
///
/// # Errors
///
/// Returns [`ProviderError::Http`] if the TLS backend cannot be
/// initialised.
pub fn client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Sends `request` and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`ProviderError::Status`] for any non-2xx response,
/// [`ProviderError::Timeout`] if the client's timeout elapsed,
/// [`ProviderError::Http`] for other transport failures, and
/// [`ProviderError::Parse`] if the body is not JSON.
pub async fn fetch_json(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<serde_json::Value, ProviderError> {
    let resp = request.send().await.map_err(|e| classify(e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        log::warn!("Provider request to {} returned {status}", resp.url());
        return Err(ProviderError::Status {
            status: status.as_u16(),
        });
    }

    let text = resp.text().await.map_err(|e| classify(e, timeout))?;
    serde_json::from_str(&text).map_err(|e| ProviderError::parse(format!("invalid JSON body: {e}")))
}

fn classify(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout { timeout }
    } else {
        ProviderError::Http(e)
    }
}

/// Joins a base URL and a path without doubling or dropping the slash.
#[must_use]
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_urls() {
        assert_eq!(
            join_url("http://localhost:5000/", "/v1/route"),
            "http://localhost:5000/v1/route"
        );
        assert_eq!(join_url("http://h", "weather"), "http://h/weather");
    }

    #[test]
    fn builds_client() {
        assert!(client(Duration::from_secs(5)).is_ok());
    }
}
