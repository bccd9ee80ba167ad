#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geofence zone, trigger, and visit event types.
//!
//! A zone's geometry is stored as two optional fields, `circular` and
//! `polygon`, matching the persisted JSON. Exactly one must be populated;
//! [`GeofenceZone::shape`] returns `None` otherwise and the engine rejects
//! such zones when they are added.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use waypoint_geo_models::Coordinate;

/// A circle on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircularArea {
    pub center: Coordinate,
    /// Radius in meters.
    pub radius: f64,
}

/// Borrowed view of a zone's geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneShape<'a> {
    Circle(&'a CircularArea),
    Polygon(&'a [Coordinate]),
}

/// A daily window during which a zone is active.
///
/// Times are wall-clock `HH:MM` in the engine's configured UTC offset.
/// `start` is inclusive and `end` exclusive; a window whose end is earlier
/// than its start wraps past midnight. Equal start and end means all day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl ActiveHours {
    /// Creates a window.
    #[must_use]
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Returns `true` if `time` falls inside the window.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(d)?;
        NaiveTime::parse_from_str(&text, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M:%S"))
            .map_err(|e| de::Error::custom(format!("invalid time {text:?}: {e}")))
    }
}

/// The membership change a trigger reacts to.
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
pub enum TriggerEvent {
    /// The position moved from outside (or unknown) to inside.
    Enter,
    /// The position moved from inside to outside.
    Exit,
    /// The position has stayed inside for the dwell threshold.
    Dwell,
}

/// What a trigger does when it fires.
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
pub enum TriggerAction {
    /// Show a user-facing notification.
    Notification,
    /// POST the event to an external endpoint.
    Webhook,
    /// Record a visit for later reporting.
    Analytics,
}

/// Action-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerConfig {
    /// Dwell threshold in seconds; the engine default applies when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_secs: Option<u64>,
    /// Webhook endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Overrides the zone's message for this trigger only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One event/action pair on a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceTrigger {
    pub event: TriggerEvent,
    pub action: TriggerAction,
    #[serde(default)]
    pub config: TriggerConfig,
}

impl GeofenceTrigger {
    /// A trigger with no extra configuration.
    #[must_use]
    pub fn new(event: TriggerEvent, action: TriggerAction) -> Self {
        Self {
            event,
            action,
            config: TriggerConfig::default(),
        }
    }

    /// A dwell trigger with an explicit threshold.
    #[must_use]
    pub fn dwell(action: TriggerAction, dwell_secs: u64) -> Self {
        Self {
            event: TriggerEvent::Dwell,
            action,
            config: TriggerConfig {
                dwell_secs: Some(dwell_secs),
                ..TriggerConfig::default()
            },
        }
    }

    /// A webhook trigger posting to `url`.
    #[must_use]
    pub fn webhook(event: TriggerEvent, url: impl Into<String>) -> Self {
        Self {
            event,
            action: TriggerAction::Webhook,
            config: TriggerConfig {
                url: Some(url.into()),
                ..TriggerConfig::default()
            },
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "general".to_string()
}

/// A named geographic region with triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceZone {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circular: Option<CircularArea>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Coordinate>>,
    #[serde(default = "default_category")]
    pub category: String,
    /// Gates `notification` actions for this zone.
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_hours: Option<ActiveHours>,
    #[serde(default)]
    pub triggers: Vec<GeofenceTrigger>,
}

impl GeofenceZone {
    fn base(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            circular: None,
            polygon: None,
            category: default_category(),
            notifications: true,
            custom_message: None,
            active_hours: None,
            triggers: Vec::new(),
        }
    }

    /// A circular zone with no triggers.
    #[must_use]
    pub fn circle(
        id: impl Into<String>,
        name: impl Into<String>,
        center: Coordinate,
        radius: f64,
    ) -> Self {
        Self {
            circular: Some(CircularArea { center, radius }),
            ..Self::base(id, name)
        }
    }

    /// A polygonal zone with no triggers.
    #[must_use]
    pub fn polygon(
        id: impl Into<String>,
        name: impl Into<String>,
        vertices: Vec<Coordinate>,
    ) -> Self {
        Self {
            polygon: Some(vertices),
            ..Self::base(id, name)
        }
    }

    /// Adds a trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: GeofenceTrigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Restricts the zone to a daily window.
    #[must_use]
    pub fn with_active_hours(mut self, hours: ActiveHours) -> Self {
        self.active_hours = Some(hours);
        self
    }

    /// The zone's geometry, or `None` unless exactly one of `circular` and
    /// `polygon` is set.
    #[must_use]
    pub fn shape(&self) -> Option<ZoneShape<'_>> {
        match (&self.circular, &self.polygon) {
            (Some(circle), None) => Some(ZoneShape::Circle(circle)),
            (None, Some(vertices)) => Some(ZoneShape::Polygon(vertices)),
            _ => None,
        }
    }
}

/// A recorded geofence event, kept for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitEvent {
    pub zone_id: String,
    pub zone_name: String,
    pub event: TriggerEvent,
    pub position: Coordinate,
    pub timestamp: DateTime<Utc>,
    /// Time spent inside, for exit and dwell events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dwell_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daytime_window() {
        let hours = ActiveHours::new(t(9, 0), t(17, 0));
        assert!(hours.contains(t(9, 0)));
        assert!(hours.contains(t(16, 59)));
        assert!(!hours.contains(t(17, 0)));
        assert!(!hours.contains(t(8, 59)));
    }

    #[test]
    fn overnight_window_wraps() {
        let hours = ActiveHours::new(t(22, 0), t(6, 0));
        assert!(hours.contains(t(23, 30)));
        assert!(hours.contains(t(0, 0)));
        assert!(hours.contains(t(5, 59)));
        assert!(!hours.contains(t(6, 0)));
        assert!(!hours.contains(t(12, 0)));
    }

    #[test]
    fn equal_bounds_mean_all_day() {
        let hours = ActiveHours::new(t(0, 0), t(0, 0));
        assert!(hours.contains(t(13, 37)));
    }

    #[test]
    fn active_hours_json_is_hh_mm() {
        let hours: ActiveHours =
            serde_json::from_str(r#"{"start":"08:30","end":"18:00"}"#).unwrap();
        assert_eq!(hours.start, t(8, 30));
        assert_eq!(
            serde_json::to_string(&hours).unwrap(),
            r#"{"start":"08:30","end":"18:00"}"#
        );
        assert!(serde_json::from_str::<ActiveHours>(r#"{"start":"25:00","end":"01:00"}"#).is_err());
    }

    #[test]
    fn shape_requires_exactly_one_geometry() {
        let circle = GeofenceZone::circle("a", "A", Coordinate::new(0.0, 0.0), 10.0);
        assert!(matches!(circle.shape(), Some(ZoneShape::Circle(_))));

        let mut both = circle.clone();
        both.polygon = Some(vec![Coordinate::new(0.0, 0.0)]);
        assert!(both.shape().is_none());

        let mut neither = circle;
        neither.circular = None;
        assert!(neither.shape().is_none());
    }

    #[test]
    fn zone_json_defaults() {
        let zone: GeofenceZone = serde_json::from_str(
            r#"{
                "id": "home",
                "name": "Home",
                "circular": {"center": {"latitude": 52.37, "longitude": 4.895}, "radius": 100},
                "triggers": [{"event": "dwell", "action": "analytics", "config": {"dwellSecs": 60}}]
            }"#,
        )
        .unwrap();

        assert!(zone.notifications);
        assert_eq!(zone.category, "general");
        assert_eq!(zone.triggers[0].config.dwell_secs, Some(60));
        assert_eq!(zone.triggers[0].action, TriggerAction::Analytics);
    }
}
