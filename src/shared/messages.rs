//! Messages sent to the logic thread.

/// A gameplay action, already resolved from raw input.
#[derive(Debug, Clone, PartialEq)]
pub enum GameAction {
    /// Lane pressed.
    Hit { lane: usize },
    /// Lane released.
    Release { lane: usize },
    TogglePause,
    /// Restart the session from the lead-in.
    Restart,
    /// Practice seek: continue playing from `time` (ms).
    SeekTo { time: f64 },
}
