use serde::{Deserialize, Serialize};

/// Changes the number of playable lanes at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneSwitchEvent {
    pub time: f64,
    pub count: usize,
}

impl LaneSwitchEvent {
    pub fn new(time: f64, count: usize) -> Self {
        Self { time, count }
    }
}

/// Index of the last event whose time has passed at `time`.
pub fn index_at(events: &[LaneSwitchEvent], time: f64) -> Option<usize> {
    events.partition_point(|e| e.time <= time).checked_sub(1)
}

/// First event strictly after `time`.
pub fn next_after(events: &[LaneSwitchEvent], time: f64) -> Option<&LaneSwitchEvent> {
    events.get(events.partition_point(|e| e.time <= time))
}
