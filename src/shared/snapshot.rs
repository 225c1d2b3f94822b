//! Immutable captures of gameplay state sent off the logic thread.

use crate::models::chart::HitObjectId;
use crate::models::stats::{HitStats, Judgement};
use crate::state::game::lane_switch::LaneSwitchCue;
use std::time::Instant;

/// A hit object as the renderer sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleObject {
    pub id: HitObjectId,
    pub lane: usize,
    /// Screen y of the head.
    pub y: f64,
    /// Screen y of the tail for long notes.
    pub tail_y: Option<f64>,
    pub holding: bool,
}

/// Snapshot of gameplay state for rendering.
#[derive(Clone, Debug)]
pub struct GameplaySnapshot {
    /// Current audio time in milliseconds.
    pub audio_time: f64,
    /// Wall-clock time when snapshot was created (for interpolation).
    pub timestamp: Instant,
    /// Playback rate multiplier.
    pub rate: f64,
    pub scroll_speed: f64,
    pub paused: bool,

    /// Screen y of every active timing line. Empty when lines are disabled.
    pub timing_lines: Vec<f64>,
    pub visible_objects: Vec<VisibleObject>,
    /// Lanes in play right now.
    pub lane_count: usize,
    /// Cue raised this tick, if any.
    pub lane_switch_cue: Option<LaneSwitchCue>,
    /// Per-lane key held state.
    pub keys_held: Vec<bool>,

    /// Current score.
    pub score: u32,
    /// Current accuracy percentage.
    pub accuracy: f64,
    /// Current combo.
    pub combo: u32,
    /// Hit statistics.
    pub hit_stats: HitStats,
    /// Number of remaining notes.
    pub remaining_notes: usize,

    /// Last hit judgement (for flash display).
    pub last_hit_judgement: Option<Judgement>,
    /// Last hit timing offset in ms.
    pub last_hit_timing: Option<f64>,

    /// Total map duration (for progress display).
    pub map_duration: f64,
}

/// Outcome of a finished play session.
#[derive(Clone, Debug, PartialEq)]
pub struct GameResult {
    pub chart_hash: String,
    pub score: u32,
    pub accuracy: f64,
    pub max_combo: u32,
    pub rate: f64,
    pub hit_stats: HitStats,
}
