//! A [`PositionSource`] that replays recorded fixes.
//!
//! Used by the CLI `replay` command and by tests that drive the engine
//! without a live GPS. A recording is a JSON array whose entries are
//! either a [`Position`] object or an error marker:
//!
//! ```json
//! [
//!   {"latitude": 52.37, "longitude": 4.89, "accuracy": 5.0, "timestamp": "2024-05-01T08:00:00Z"},
//!   {"error": "timeout"}
//! ]
//! ```

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use waypoint_geo_models::Position;

use crate::{FixStream, PositionError, PositionOptions, PositionSource};

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ErrorMarker {
    PermissionDenied,
    Unavailable,
    Timeout,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Error { error: ErrorMarker },
    Fix(Position),
}

impl From<Entry> for Result<Position, PositionError> {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Fix(position) => Ok(position),
            Entry::Error { error } => Err(match error {
                ErrorMarker::PermissionDenied => PositionError::PermissionDenied,
                ErrorMarker::Unavailable => PositionError::Unavailable {
                    message: "recorded outage".to_string(),
                },
                ErrorMarker::Timeout => PositionError::Timeout,
            }),
        }
    }
}

/// Replays a fixed list of fixes and errors.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    entries: Vec<Result<Position, PositionError>>,
    interval: Duration,
}

impl ReplaySource {
    /// Creates a source that emits `entries` in order, `interval` apart.
    #[must_use]
    pub const fn new(entries: Vec<Result<Position, PositionError>>, interval: Duration) -> Self {
        Self { entries, interval }
    }

    /// Parses a JSON recording.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the text is not a recording.
    pub fn from_json(text: &str, interval: Duration) -> Result<Self, serde_json::Error> {
        let entries: Vec<Entry> = serde_json::from_str(text)?;
        Ok(Self::new(
            entries.into_iter().map(Into::into).collect(),
            interval,
        ))
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the recording is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl PositionSource for ReplaySource {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Position, PositionError> {
        self.entries
            .iter()
            .find_map(|entry| entry.as_ref().ok().cloned())
            .ok_or_else(|| PositionError::Unavailable {
                message: "recording contains no fixes".to_string(),
            })
    }

    fn watch(&self, _options: &PositionOptions) -> FixStream {
        let (tx, rx) = mpsc::channel(1);
        let entries = self.entries.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            for (i, entry) in entries.into_iter().enumerate() {
                if i > 0 && !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if tx.send(entry).await.is_err() {
                    log::debug!("Replay subscriber went away after {i} entries");
                    return;
                }
            }
            log::debug!("Replay finished");
        });

        rx
    }
}
