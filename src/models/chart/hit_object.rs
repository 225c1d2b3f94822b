//! Hit objects as stored in a chart.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a hit object inside one loaded chart.
///
/// Issued by the chart when an object is loaded or added and never reused,
/// so it survives edits that move the object or reorder the backing list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HitObjectId(pub(crate) u64);

impl fmt::Display for HitObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A note in a chart: tap note, or long note when `end_time` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitObjectInfo {
    #[serde(skip)]
    pub id: HitObjectId,
    /// Hit time in milliseconds.
    pub time: f64,
    /// Lane index (0-based).
    pub lane: usize,
    /// End of the hold in milliseconds, present only for long notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl HitObjectInfo {
    /// Creates a tap note. The id is assigned once added to a chart.
    pub fn tap(time: f64, lane: usize) -> Self {
        Self {
            id: HitObjectId::default(),
            time,
            lane,
            end_time: None,
        }
    }

    /// Creates a long note.
    pub fn long(time: f64, lane: usize, end_time: f64) -> Self {
        Self {
            id: HitObjectId::default(),
            time,
            lane,
            end_time: Some(end_time),
        }
    }

    pub fn is_long_note(&self) -> bool {
        self.end_time.is_some_and(|end| end > self.time)
    }

    /// End of the object: `end_time` for long notes, `time` otherwise.
    pub fn end(&self) -> f64 {
        match self.end_time {
            Some(end) if end > self.time => end,
            _ => self.time,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.time
    }
}
