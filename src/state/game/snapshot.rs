//! Snapshot creation for GameEngine - get_snapshot

use super::GameEngine;
use super::hit_objects::ObjectState;
use crate::shared::snapshot::{GameplaySnapshot, VisibleObject};

impl GameEngine {
    /// Creates a snapshot of the current game state for rendering.
    pub fn get_snapshot(&self) -> GameplaySnapshot {
        let viewport = self.viewport();
        let now = viewport.current_time;

        let timing_lines = if self.timing_lines.visible() {
            self.timing_lines
                .active()
                .iter()
                .map(|line| viewport.y_for_position(line.scroll_velocity_time))
                .collect()
        } else {
            Vec::new()
        };

        let visible_objects = self
            .hit_objects
            .visible()
            .map(|(object, state)| {
                // Held long notes stay pinned to the receptors.
                let holding = matches!(state, ObjectState::Holding(_));
                let head_position = if holding {
                    viewport.current_position
                } else {
                    object.start_position
                };

                VisibleObject {
                    id: object.id,
                    lane: object.lane,
                    y: viewport.y_for_position(head_position),
                    tail_y: object
                        .is_long_note()
                        .then(|| viewport.y_for_position(object.end_position)),
                    holding,
                }
            })
            .collect();

        GameplaySnapshot {
            audio_time: now,
            timestamp: std::time::Instant::now(),
            rate: self.rate,
            scroll_speed: self.scroll_speed,
            paused: self.is_paused(),
            timing_lines,
            visible_objects,
            lane_count: self.chart.lane_count_at(now),
            lane_switch_cue: self.last_cue,
            keys_held: self.keys_held.clone(),
            score: self.score,
            accuracy: self.hit_stats.calculate_accuracy(),
            combo: self.combo,
            hit_stats: self.hit_stats.clone(),
            remaining_notes: self.hit_objects.remaining(),
            last_hit_judgement: self.last_hit_judgement,
            last_hit_timing: self.last_hit_timing,
            map_duration: self.chart.end_time(),
        }
    }
}
