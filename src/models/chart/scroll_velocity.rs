use serde::{Deserialize, Serialize};

/// Scroll speed multiplier applied from `time` until the next change.
///
/// Negative multipliers reverse the local scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollVelocity {
    pub time: f64,
    pub multiplier: f64,
}

impl ScrollVelocity {
    pub fn new(time: f64, multiplier: f64) -> Self {
        Self { time, multiplier }
    }
}
