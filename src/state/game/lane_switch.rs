//! Current lane-switch tracking and the switch alert.

use crate::models::chart::LaneSwitchEvent;
use crate::models::chart::lane_switch;

/// Rate mismatch at which alerts are held back.
const RATE_EPSILON: f64 = 0.1;

/// Follows the lane switch event in effect as the clock advances.
///
/// Moving forward steps the cursor; moving backward or an edited event list
/// falls back to a binary search.
#[derive(Debug, Clone, Default)]
pub struct LaneSwitchCursor {
    /// Index of the current event, `None` before the first one.
    index: Option<usize>,
    last_time: Option<f64>,
}

impl LaneSwitchCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent event whose time has passed at `now`.
    pub fn current<'a>(
        &mut self,
        events: &'a [LaneSwitchEvent],
        now: f64,
    ) -> Option<&'a LaneSwitchEvent> {
        let stale = self.index.is_some_and(|i| i >= events.len());
        let moved_back = self.last_time.is_some_and(|last| now < last);

        if stale || moved_back || self.last_time.is_none() {
            self.index = lane_switch::index_at(events, now);
        } else {
            let mut next = self.index.map_or(0, |i| i + 1);
            while next < events.len() && events[next].time <= now {
                self.index = Some(next);
                next += 1;
            }
        }

        self.last_time = Some(now);
        self.index.map(|i| &events[i])
    }

    pub fn reset(&mut self) {
        self.index = None;
        self.last_time = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueDirection {
    /// Lanes are added.
    Outward,
    /// Lanes are removed.
    Inward,
}

/// A one-shot warning that the lane count is about to change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneSwitchCue {
    pub direction: CueDirection,
    pub from: usize,
    pub to: usize,
    /// Time of the upcoming event.
    pub event_time: f64,
    /// Fade length of the cue, half a beat.
    pub fade_ms: f64,
}

/// Clock readings the alert needs each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertClock {
    pub now: f64,
    pub running: bool,
    /// Real-time length of a beat.
    pub beat_time: f64,
    /// Rate the clock is playing at.
    pub clock_rate: f64,
    /// Rate the session was configured for.
    pub screen_rate: f64,
}

/// Raises a cue one beat before each lane switch.
#[derive(Debug, Clone)]
pub struct LaneSwitchAlert {
    enabled: bool,
    key_count: usize,
    /// Last event the alert was raised for, or the one in effect at start.
    current: Option<LaneSwitchEvent>,
}

impl LaneSwitchAlert {
    pub fn new(events: &[LaneSwitchEvent], now: f64, key_count: usize, enabled: bool) -> Self {
        let mut alert = Self {
            enabled,
            key_count,
            current: None,
        };
        alert.reset(events, now);
        alert
    }

    /// Re-anchors the alert after a seek.
    pub fn reset(&mut self, events: &[LaneSwitchEvent], now: f64) {
        self.current = lane_switch::index_at(events, now).map(|i| events[i]);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn update(&mut self, events: &[LaneSwitchEvent], clock: AlertClock) -> Option<LaneSwitchCue> {
        if !self.enabled || !clock.running {
            return None;
        }

        if (clock.clock_rate - clock.screen_rate).abs() >= RATE_EPSILON {
            return None;
        }

        let next = *lane_switch::next_after(events, clock.now)?;
        if next.time - clock.now > clock.beat_time {
            return None;
        }

        if self.current.is_some_and(|c| c.time == next.time) {
            return None;
        }

        let from = self.current.map_or(self.key_count, |c| c.count);
        self.current = Some(next);

        let direction = match from.cmp(&next.count) {
            std::cmp::Ordering::Less => CueDirection::Outward,
            std::cmp::Ordering::Greater => CueDirection::Inward,
            std::cmp::Ordering::Equal => return None,
        };

        log::debug!(
            "ALERT: {} -> {} lanes at {:.0}ms ({:?})",
            from,
            next.count,
            next.time,
            direction
        );

        Some(LaneSwitchCue {
            direction,
            from,
            to: next.count,
            event_time: next.time,
            fade_ms: clock.beat_time / 2.0,
        })
    }
}
