//! Timing points: beat length and beat-grid visibility.

use serde::{Deserialize, Serialize};

/// Defines the BPM and measure length from `time` until the next timing point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    /// Start of the section in milliseconds.
    pub time: f64,
    /// Length of one beat in milliseconds.
    pub ms_per_beat: f64,
    /// Beats per measure. `0` disables beat lines for the section.
    #[serde(default = "default_signature")]
    pub signature: i32,
    /// Hides the beat lines of the section.
    #[serde(default)]
    pub hide_lines: bool,
}

fn default_signature() -> i32 {
    4
}

impl TimingPoint {
    pub fn new(time: f64, ms_per_beat: f64, signature: i32) -> Self {
        Self {
            time,
            ms_per_beat,
            signature,
            hide_lines: false,
        }
    }

    /// Beats per minute of the section.
    pub fn bpm(&self) -> f64 {
        if self.ms_per_beat > 0.0 {
            60_000.0 / self.ms_per_beat
        } else {
            0.0
        }
    }

    /// Length of one measure in milliseconds.
    pub fn measure_length(&self) -> f64 {
        self.signature as f64 * self.ms_per_beat
    }

    /// Returns `true` if beat lines should be generated for this section.
    pub fn shows_lines(&self) -> bool {
        !self.hide_lines && self.signature != 0
    }
}

/// Returns the index of the timing point active at `time`.
///
/// Before the first point the first one is used.
pub fn index_at(points: &[TimingPoint], time: f64) -> Option<usize> {
    if points.is_empty() {
        return None;
    }

    let idx = points.partition_point(|p| p.time <= time);
    Some(idx.saturating_sub(1))
}

/// Returns the timing point active at `time`.
pub fn point_at(points: &[TimingPoint], time: f64) -> Option<&TimingPoint> {
    index_at(points, time).map(|i| &points[i])
}
