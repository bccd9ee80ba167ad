#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! User-facing notification channel.
//!
//! Geofence triggers and position-tracking failures both surface to the
//! user through a [`NotificationSink`]. The platform's notification
//! capability may be missing or unauthorized; [`FallbackSink`] wraps any
//! sink so such failures degrade to a log line instead of an error.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// What raised a notification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    /// A geofence trigger fired.
    Geofence,
    /// The position source reported an error.
    Tracking,
}

/// A single user-facing alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Source of the alert.
    pub kind: NotificationKind,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Errors a platform notification sink may report.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The platform has no notification capability.
    #[error("Notifications unavailable: {message}")]
    Unavailable {
        /// Description of what is missing.
        message: String,
    },

    /// The user has not granted notification permission.
    #[error("Notifications not authorized")]
    Unauthorized,
}

/// A channel that shows alerts to the user.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers `notification`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the platform cannot show it.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes every notification to the log at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        log::info!(
            "[{}] {}: {}",
            notification.kind,
            notification.title,
            notification.body
        );
        Ok(())
    }
}

/// Wraps a platform sink and falls back to [`LogSink`] when delivery fails.
///
/// Never returns an error.
pub struct FallbackSink {
    primary: Arc<dyn NotificationSink>,
}

impl FallbackSink {
    /// Wraps `primary`.
    #[must_use]
    pub fn new(primary: Arc<dyn NotificationSink>) -> Self {
        Self { primary }
    }
}

#[async_trait::async_trait]
impl NotificationSink for FallbackSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Err(e) = self.primary.notify(notification).await {
            log::warn!("Notification sink failed ({e}); logging instead");
            LogSink.notify(notification).await?;
        }
        Ok(())
    }
}

/// Keeps every delivered notification in memory.
///
/// Used by the CLI to print what a replay produced, and by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Notification>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything delivered so far, oldest first.
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DeniedSink;

    #[async_trait::async_trait]
    impl NotificationSink for DeniedSink {
        async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Unauthorized)
        }
    }

    fn sample() -> Notification {
        Notification::new(NotificationKind::Geofence, "Home", "You've arrived at Home")
    }

    #[tokio::test]
    async fn fallback_swallows_unauthorized() {
        let sink = FallbackSink::new(Arc::new(DeniedSink));
        assert!(sink.notify(&sample()).await.is_ok());
    }

    #[tokio::test]
    async fn fallback_forwards_to_working_sink() {
        let memory = Arc::new(MemorySink::new());
        let sink = FallbackSink::new(memory.clone());
        sink.notify(&sample()).await.unwrap();
        assert_eq!(memory.delivered(), vec![sample()]);
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(NotificationKind::Tracking.to_string(), "tracking");
    }
}
