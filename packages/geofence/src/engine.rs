//! The geofence engine: zone set, evaluation, and trigger dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tokio::sync::Mutex;
use waypoint_geo::{haversine_distance, point_in_polygon};
use waypoint_geo_models::Position;
use waypoint_geofence_models::{
    GeofenceTrigger, GeofenceZone, TriggerAction, TriggerEvent, VisitEvent, ZoneShape,
};
use waypoint_notification::{Notification, NotificationKind, NotificationSink};

use crate::actions::{VisitRecorder, WebhookClient};
use crate::membership::{Membership, Transition, ZoneTracker};
use crate::repository::ZoneRepository;
use crate::{GeofenceError, validate_zone};

/// Default dwell threshold when a trigger does not set one.
pub const DEFAULT_DWELL: Duration = Duration::from_secs(300);

/// Engine-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceSettings {
    pub default_dwell: Duration,
    /// Offset used to read zones' active hours.
    pub utc_offset: FixedOffset,
}

impl Default for GeofenceSettings {
    fn default() -> Self {
        Self {
            default_dwell: DEFAULT_DWELL,
            utc_offset: Utc.fix(),
        }
    }
}

/// A trigger that fired during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTrigger {
    pub zone_id: String,
    pub event: TriggerEvent,
    pub action: TriggerAction,
}

#[derive(Default)]
struct ZoneSet {
    zones: Vec<GeofenceZone>,
    trackers: HashMap<String, ZoneTracker>,
}

struct PendingAction {
    zone: GeofenceZone,
    trigger: GeofenceTrigger,
    visit: VisitEvent,
}

/// Returns `true` if `position` is inside the zone's geometry.
///
/// Circles include their boundary; polygons use the odd-even rule.
#[must_use]
pub fn contains(shape: ZoneShape<'_>, position: &Position) -> bool {
    match shape {
        ZoneShape::Circle(circle) => {
            haversine_distance(position.coordinate(), circle.center) <= circle.radius
        }
        ZoneShape::Polygon(vertices) => point_in_polygon(position.coordinate(), vertices),
    }
}

/// Holds the zone set and evaluates fixes against it.
pub struct GeofenceEngine {
    state: Mutex<ZoneSet>,
    /// Held from a zone-list change through its write so saves land in
    /// mutation order.
    persist: Mutex<()>,
    repository: ZoneRepository,
    notifier: Arc<dyn NotificationSink>,
    webhooks: Option<Arc<dyn WebhookClient>>,
    recorder: Arc<dyn VisitRecorder>,
    settings: GeofenceSettings,
}

impl GeofenceEngine {
    #[must_use]
    pub fn new(
        repository: ZoneRepository,
        notifier: Arc<dyn NotificationSink>,
        recorder: Arc<dyn VisitRecorder>,
        settings: GeofenceSettings,
    ) -> Self {
        Self {
            state: Mutex::new(ZoneSet::default()),
            persist: Mutex::new(()),
            repository,
            notifier,
            webhooks: None,
            recorder,
            settings,
        }
    }

    /// Enables the `webhook` action.
    #[must_use]
    pub fn with_webhooks(mut self, client: Arc<dyn WebhookClient>) -> Self {
        self.webhooks = Some(client);
        self
    }

    /// Replaces the in-memory zone set with the persisted one.
    ///
    /// Stored zones that no longer validate are skipped with a warning.
    /// Returns the number of zones loaded.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::Storage`] if the zone record cannot be read.
    pub async fn restore(&self) -> Result<usize, GeofenceError> {
        let stored = self.repository.load().await?;
        let mut state = self.state.lock().await;
        state.zones.clear();
        state.trackers.clear();

        for zone in stored {
            if let Err(e) = validate_zone(&zone, &state.zones) {
                log::warn!("Skipping stored zone {}: {e}", zone.id);
                continue;
            }
            state.zones.push(zone);
        }

        log::info!("Restored {} geofence zones", state.zones.len());
        Ok(state.zones.len())
    }

    /// A copy of the current zone list.
    pub async fn zones(&self) -> Vec<GeofenceZone> {
        self.state.lock().await.zones.clone()
    }

    /// Current membership for a zone, if it exists.
    pub async fn membership(&self, zone_id: &str) -> Option<Membership> {
        let state = self.state.lock().await;
        state.zones.iter().any(|z| z.id == zone_id).then(|| {
            state
                .trackers
                .get(zone_id)
                .map_or(Membership::Unknown, ZoneTracker::state)
        })
    }

    /// Adds a zone and persists the full list.
    ///
    /// A failed write is logged; the zone stays active in memory.
    ///
    /// # Errors
    ///
    /// Returns [`GeofenceError::Validation`] if the zone has no (or two)
    /// geometries, a bad radius, fewer than three polygon vertices, or an
    /// id already in use.
    pub async fn add_geofence(&self, zone: GeofenceZone) -> Result<(), GeofenceError> {
        let _persist = self.persist.lock().await;
        let snapshot = {
            let mut state = self.state.lock().await;
            validate_zone(&zone, &state.zones)?;
            log::info!("Added geofence zone {} ({})", zone.id, zone.name);
            state.zones.push(zone);
            state.zones.clone()
        };

        self.persist(&snapshot).await;
        Ok(())
    }

    /// Removes a zone and persists the full list. Returns `false` if no
    /// zone had that id.
    pub async fn remove_geofence(&self, zone_id: &str) -> bool {
        let _persist = self.persist.lock().await;
        let snapshot = {
            let mut state = self.state.lock().await;
            let before = state.zones.len();
            state.zones.retain(|z| z.id != zone_id);
            if state.zones.len() == before {
                return false;
            }
            state.trackers.remove(zone_id);
            log::info!("Removed geofence zone {zone_id}");
            state.zones.clone()
        };

        self.persist(&snapshot).await;
        true
    }

    async fn persist(&self, zones: &[GeofenceZone]) {
        if let Err(e) = self.repository.save(zones).await {
            log::warn!("Failed to persist geofence zones: {e}");
        }
    }

    /// Evaluates `position` against every zone and runs the triggers that
    /// fire, in zone order.
    ///
    /// Action failures are logged and never returned.
    pub async fn evaluate(&self, position: &Position) -> Vec<FiredTrigger> {
        let pending = self.collect(position).await;

        let mut fired = Vec::with_capacity(pending.len());
        for action in pending {
            self.dispatch(&action).await;
            fired.push(FiredTrigger {
                zone_id: action.zone.id,
                event: action.trigger.event,
                action: action.trigger.action,
            });
        }
        fired
    }

    async fn collect(&self, position: &Position) -> Vec<PendingAction> {
        let local_time = position
            .timestamp
            .with_timezone(&self.settings.utc_offset)
            .time();

        let mut state = self.state.lock().await;
        let ZoneSet { zones, trackers } = &mut *state;
        let mut pending = Vec::new();

        for zone in zones.iter() {
            let tracker = trackers.entry(zone.id.clone()).or_default();

            if zone.active_hours.is_some_and(|hours| !hours.contains(local_time)) {
                tracker.reset();
                continue;
            }

            let Some(shape) = zone.shape() else {
                continue;
            };

            let inside = contains(shape, position);
            let transition = tracker.update(inside, position.timestamp);

            if transition.entered {
                log::debug!("Entered zone {}", zone.id);
            } else if transition.exited {
                log::debug!("Exited zone {}", zone.id);
            }

            for (index, trigger) in zone.triggers.iter().enumerate() {
                if let Some(event) = self.fires(trigger, index, &transition, tracker) {
                    pending.push(PendingAction {
                        zone: zone.clone(),
                        trigger: trigger.clone(),
                        visit: VisitEvent {
                            zone_id: zone.id.clone(),
                            zone_name: zone.name.clone(),
                            event,
                            position: position.coordinate(),
                            timestamp: position.timestamp,
                            dwell_secs: match event {
                                TriggerEvent::Enter => None,
                                TriggerEvent::Exit | TriggerEvent::Dwell => transition.inside_secs,
                            },
                        },
                    });
                }
            }
        }

        pending
    }

    fn fires(
        &self,
        trigger: &GeofenceTrigger,
        index: usize,
        transition: &Transition,
        tracker: &mut ZoneTracker,
    ) -> Option<TriggerEvent> {
        let fired = match trigger.event {
            TriggerEvent::Enter => transition.entered,
            TriggerEvent::Exit => transition.exited,
            TriggerEvent::Dwell => {
                let threshold = trigger
                    .config
                    .dwell_secs
                    .unwrap_or_else(|| self.settings.default_dwell.as_secs());
                !transition.exited
                    && transition.inside_secs.is_some_and(|secs| secs >= threshold)
                    && tracker.mark_dwell(index)
            }
        };
        fired.then_some(trigger.event)
    }

    async fn dispatch(&self, action: &PendingAction) {
        let PendingAction {
            zone,
            trigger,
            visit,
        } = action;

        match trigger.action {
            TriggerAction::Notification => {
                if !zone.notifications {
                    log::debug!("Notifications disabled for zone {}", zone.id);
                    return;
                }
                let body = notification_text(zone, trigger, visit);
                let notification = Notification::new(NotificationKind::Geofence, &zone.name, body);
                if let Err(e) = self.notifier.notify(&notification).await {
                    log::warn!("Could not deliver geofence notification: {e}");
                }
            }
            TriggerAction::Webhook => {
                let Some(url) = trigger.config.url.as_deref() else {
                    log::warn!("Webhook trigger on zone {} has no url", zone.id);
                    return;
                };
                let Some(client) = &self.webhooks else {
                    log::warn!("Webhook trigger on zone {} but webhooks are disabled", zone.id);
                    return;
                };
                if let Err(e) = client.post(url, visit).await {
                    log::warn!("Webhook for zone {} failed: {e}", zone.id);
                }
            }
            TriggerAction::Analytics => self.recorder.record(visit.clone()).await,
        }
    }
}

fn notification_text(zone: &GeofenceZone, trigger: &GeofenceTrigger, visit: &VisitEvent) -> String {
    if let Some(message) = trigger.config.message.as_ref().or(zone.custom_message.as_ref()) {
        return message.clone();
    }

    match visit.event {
        TriggerEvent::Enter => format!("You've arrived at {}", zone.name),
        TriggerEvent::Exit => format!("You've left {}", zone.name),
        TriggerEvent::Dwell => {
            let minutes = visit.dwell_secs.unwrap_or_default() / 60;
            format!("You've been at {} for {minutes} minutes", zone.name)
        }
    }
}
