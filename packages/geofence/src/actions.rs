//! Collaborators for the `webhook` and `analytics` trigger actions.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use waypoint_geofence_models::VisitEvent;

/// Errors from delivering a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned status {status}")]
    Status { status: u16 },
}

/// Sends geofence events to external endpoints.
#[async_trait::async_trait]
pub trait WebhookClient: Send + Sync {
    /// Posts `event` to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError`] if delivery fails.
    async fn post(&self, url: &str, event: &VisitEvent) -> Result<(), WebhookError>;
}

/// Posts events as JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    /// Creates a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Http`] if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait::async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post(&self, url: &str, event: &VisitEvent) -> Result<(), WebhookError> {
        let resp = self.client.post(url).json(event).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WebhookError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Stores visit events for later reporting.
#[async_trait::async_trait]
pub trait VisitRecorder: Send + Sync {
    async fn record(&self, event: VisitEvent);
}

/// Keeps visits in memory.
#[derive(Debug, Default)]
pub struct MemoryVisitRecorder {
    visits: Mutex<Vec<VisitEvent>>,
}

impl MemoryVisitRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded visit, oldest first.
    #[must_use]
    pub fn visits(&self) -> Vec<VisitEvent> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Visits recorded for one zone.
    #[must_use]
    pub fn visits_for(&self, zone_id: &str) -> Vec<VisitEvent> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|v| v.zone_id == zone_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl VisitRecorder for MemoryVisitRecorder {
    async fn record(&self, event: VisitEvent) {
        log::debug!("Recorded {} visit to zone {}", event.event, event.zone_id);
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
