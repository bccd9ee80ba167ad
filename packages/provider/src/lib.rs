#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Plumbing shared by the routing, weather, and POI provider clients.
//!
//! Providers are request/response services whose latency, field coverage,
//! and status codes the engine does not control. Transport errors,
//! non-success statuses, missing or mistyped fields and slow responses all
//! fold into a single [`ProviderError`]. Nothing here retries.

pub mod http;
pub mod json;

use std::time::Duration;

use thiserror::Error;

/// Errors from an external data provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status code.
    #[error("Provider returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed or a required field was missing.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider did not answer within the request timeout.
    #[error("Provider did not respond within {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// No provider is configured for this service.
    #[error("No {service} provider configured")]
    NotConfigured {
        /// Which service was requested (e.g. `"weather"`).
        service: &'static str,
    },
}

impl ProviderError {
    /// Convenience constructor for [`ProviderError::Parse`].
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// Bounds a provider call with a timeout.
///
/// # Errors
///
/// Returns [`ProviderError::Timeout`] if `call` does not finish within
/// `timeout`, or whatever error `call` itself produces.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
        log::warn!("Provider call timed out after {timeout:?}");
        Err(ProviderError::Timeout { timeout })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let result: Result<(), _> = with_timeout(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(ProviderError::Timeout { timeout }) if timeout == Duration::from_secs(1)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_call_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn inner_error_is_preserved() {
        let result: Result<(), _> = with_timeout(Duration::from_secs(1), async {
            Err(ProviderError::Status { status: 503 })
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Status { status: 503 })));
    }
}
