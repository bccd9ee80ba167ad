//! One-shot and continuous position tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use waypoint_geo_models::Position;
use waypoint_notification::{Notification, NotificationKind, NotificationSink};

use crate::{FixHandler, PositionError, PositionOptions, PositionSource};

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// A running continuous-tracking subscription.
///
/// Cancel it with [`PositionTracker::stop_tracking`] or [`Self::cancel`].
/// Dropping the handle also ends the subscription.
#[derive(Debug)]
pub struct TrackingHandle {
    id: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TrackingHandle {
    /// Identifier used in log lines.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Stops delivering fixes. Safe to call repeatedly.
    ///
    /// A fix already being processed finishes first.
    pub fn cancel(&self) {
        if !self.cancel.send_replace(true) {
            log::info!("Stopped position tracking (subscription {})", self.id);
        }
    }

    /// Returns `true` once the subscription task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the subscription task to exit.
    pub async fn finished(self) {
        let Self { task, cancel, .. } = self;
        if let Err(e) = task.await {
            log::warn!("Tracking task ended abnormally: {e}");
        }
        drop(cancel);
    }
}

/// Wraps a [`PositionSource`] with the engine's tracking policy.
pub struct PositionTracker {
    source: Arc<dyn PositionSource>,
    notifier: Arc<dyn NotificationSink>,
    handler: Option<Arc<dyn FixHandler>>,
    last_known: Arc<RwLock<Option<Position>>>,
    one_shot: PositionOptions,
    continuous: PositionOptions,
}

impl PositionTracker {
    /// Creates a tracker using the default option profiles.
    #[must_use]
    pub fn new(source: Arc<dyn PositionSource>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            source,
            notifier,
            handler: None,
            last_known: Arc::new(RwLock::new(None)),
            one_shot: PositionOptions::one_shot(),
            continuous: PositionOptions::continuous(),
        }
    }

    /// Overrides the option profiles.
    #[must_use]
    pub const fn with_options(mut self, one_shot: PositionOptions, continuous: PositionOptions) -> Self {
        self.one_shot = one_shot;
        self.continuous = continuous;
        self
    }

    /// Registers the handler that sees every tracked fix before the
    /// caller's callback.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn FixHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// The most recent fix seen by either read mode.
    #[must_use]
    pub fn last_known_position(&self) -> Option<Position> {
        self.last_known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reads a single fix.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] from the source, or
    /// [`PositionError::Timeout`] if the source takes longer than the
    /// one-shot timeout.
    pub async fn current_position(&self) -> Result<Position, PositionError> {
        let options = self.one_shot;
        let position = tokio::time::timeout(options.timeout, self.source.current_position(&options))
            .await
            .unwrap_or(Err(PositionError::Timeout))?;

        *self
            .last_known
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(position.clone());

        Ok(position)
    }

    /// Starts continuous tracking.
    ///
    /// Each fix updates the last-known position, runs the registered
    /// [`FixHandler`], then calls `on_fix`. Fixes are handled strictly in
    /// order, one at a time. Source errors are turned into tracking
    /// notifications and never end the subscription; it ends when the
    /// handle is cancelled or the source closes its stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_tracking<F>(&self, on_fix: F) -> TrackingHandle
    where
        F: Fn(&Position) + Send + Sync + 'static,
    {
        let id = NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed);
        let (cancel, mut cancelled) = watch::channel(false);

        let mut fixes = self.source.watch(&self.continuous);
        let handler = self.handler.clone();
        let notifier = Arc::clone(&self.notifier);
        let last_known = Arc::clone(&self.last_known);

        log::info!("Started position tracking (subscription {id})");

        let task = tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    biased;
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            break;
                        }
                        continue;
                    }
                    item = fixes.recv() => item,
                };

                let Some(item) = item else {
                    log::info!("Position source closed subscription {id}");
                    break;
                };

                match item {
                    Ok(position) => {
                        *last_known.write().unwrap_or_else(PoisonError::into_inner) =
                            Some(position.clone());
                        if let Some(handler) = &handler {
                            handler.on_fix(&position).await;
                        }
                        on_fix(&position);
                    }
                    Err(e) => report_error(notifier.as_ref(), &e).await,
                }
            }
        });

        TrackingHandle { id, cancel, task }
    }

    /// Cancels a subscription. Idempotent.
    pub fn stop_tracking(&self, handle: &TrackingHandle) {
        handle.cancel();
    }
}

async fn report_error(notifier: &dyn NotificationSink, error: &PositionError) {
    log::warn!("Position tracking error: {error}");

    let body = match error {
        PositionError::PermissionDenied => {
            "Location access is turned off. Enable it to keep tracking your position."
        }
        PositionError::Unavailable { .. } => {
            "Your position is temporarily unavailable. Tracking will resume automatically."
        }
        PositionError::Timeout => "Waiting for a GPS signal. Tracking will resume automatically.",
    };
    let notification = Notification::new(NotificationKind::Tracking, "Location", body);

    if let Err(e) = notifier.notify(&notification).await {
        log::warn!("Could not deliver tracking notification: {e}");
    }
}
