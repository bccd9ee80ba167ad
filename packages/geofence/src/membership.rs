//! Per-zone membership state.
//!
//! Each zone remembers whether the last evaluated fix was inside it, so
//! `enter` and `exit` fire on transitions only and `dwell` fires once per
//! stay. Time inside is measured from fix timestamps.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// Where the tracked position was relative to a zone at the last fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Membership {
    /// No fix evaluated yet, or the zone was outside its active hours.
    #[default]
    Unknown,
    /// Inside since the given fix time.
    Inside { since: DateTime<Utc> },
    Outside,
}

/// What changed for one zone on one fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub entered: bool,
    pub exited: bool,
    /// Seconds inside: for the current stay while inside, or for the stay
    /// that just ended on exit.
    pub inside_secs: Option<u64>,
}

/// Membership state plus the dwell triggers already fired this stay.
#[derive(Debug, Clone, Default)]
pub struct ZoneTracker {
    state: Membership,
    dwell_fired: HashSet<usize>,
}

fn seconds_between(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - since).num_seconds()).unwrap_or(0)
}

impl ZoneTracker {
    /// Current membership.
    #[must_use]
    pub const fn state(&self) -> Membership {
        self.state
    }

    /// Applies one fix.
    pub fn update(&mut self, inside: bool, at: DateTime<Utc>) -> Transition {
        match (self.state, inside) {
            (Membership::Unknown | Membership::Outside, true) => {
                self.state = Membership::Inside { since: at };
                self.dwell_fired.clear();
                Transition {
                    entered: true,
                    exited: false,
                    inside_secs: Some(0),
                }
            }
            (Membership::Inside { since }, true) => Transition {
                inside_secs: Some(seconds_between(since, at)),
                ..Transition::default()
            },
            (Membership::Inside { since }, false) => {
                self.state = Membership::Outside;
                self.dwell_fired.clear();
                Transition {
                    entered: false,
                    exited: true,
                    inside_secs: Some(seconds_between(since, at)),
                }
            }
            (Membership::Unknown | Membership::Outside, false) => {
                self.state = Membership::Outside;
                Transition::default()
            }
        }
    }

    /// Forgets the current stay.
    pub fn reset(&mut self) {
        self.state = Membership::Unknown;
        self.dwell_fired.clear();
    }

    /// Marks dwell trigger `index` as fired for this stay. Returns `false`
    /// if it had already fired.
    pub fn mark_dwell(&mut self, index: usize) -> bool {
        self.dwell_fired.insert(index)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn enter_fires_once_per_stay() {
        let mut tracker = ZoneTracker::default();
        assert!(tracker.update(true, t0()).entered);
        assert!(!tracker.update(true, t0() + Duration::seconds(5)).entered);
        assert!(!tracker.update(true, t0() + Duration::seconds(10)).entered);
    }

    #[test]
    fn first_fix_outside_is_silent() {
        let mut tracker = ZoneTracker::default();
        assert_eq!(tracker.update(false, t0()), Transition::default());
        assert_eq!(tracker.state(), Membership::Outside);
    }

    #[test]
    fn exit_reports_time_inside() {
        let mut tracker = ZoneTracker::default();
        tracker.update(true, t0());
        let transition = tracker.update(false, t0() + Duration::seconds(90));
        assert!(transition.exited);
        assert_eq!(transition.inside_secs, Some(90));
        assert!(!tracker.update(false, t0() + Duration::seconds(95)).exited);
    }

    #[test]
    fn dwell_marks_reset_on_new_stay() {
        let mut tracker = ZoneTracker::default();
        tracker.update(true, t0());
        assert!(tracker.mark_dwell(0));
        assert!(!tracker.mark_dwell(0));

        tracker.update(false, t0() + Duration::seconds(1));
        tracker.update(true, t0() + Duration::seconds(2));
        assert!(tracker.mark_dwell(0));
    }

    #[test]
    fn reset_makes_next_inside_fix_an_entry() {
        let mut tracker = ZoneTracker::default();
        tracker.update(true, t0());
        tracker.reset();
        assert_eq!(tracker.state(), Membership::Unknown);
        assert!(tracker.update(true, t0() + Duration::seconds(1)).entered);
    }

    #[test]
    fn clock_going_backwards_counts_as_zero() {
        let mut tracker = ZoneTracker::default();
        tracker.update(true, t0());
        let transition = tracker.update(true, t0() - Duration::seconds(30));
        assert_eq!(transition.inside_secs, Some(0));
    }
}
