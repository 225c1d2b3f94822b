//! Input handling for GameEngine - handle_input, process_hit, process_release.

use super::GameEngine;
use super::hit_objects::HitOutcome;
use crate::models::chart::Chart;
use crate::models::stats::Judgement;
use crate::shared::messages::GameAction;

/// How long autoplay holds a tap note (ms).
const AUTOPLAY_TAP_HOLD_MS: f64 = 40.0;

impl GameEngine {
    /// Handles a gameplay input action.
    pub fn handle_input(&mut self, action: GameAction) {
        match action {
            GameAction::Hit { lane } => {
                if let Some(held) = self.keys_held.get_mut(lane) {
                    *held = true;
                }
                self.process_hit(lane);
            }
            GameAction::Release { lane } => {
                if let Some(held) = self.keys_held.get_mut(lane) {
                    *held = false;
                }
                self.process_release(lane);
            }
            GameAction::TogglePause => self.toggle_pause(),
            GameAction::Restart => self.restart(),
            GameAction::SeekTo { time } => self.restart_from(time),
        }
    }

    /// Processes a press on `lane`: the closest pending object within the
    /// miss window is judged, otherwise it is a ghost tap.
    pub(crate) fn process_hit(&mut self, lane: usize) {
        if self.is_paused() {
            return;
        }

        let now = self.get_time();
        match self.hit_objects.hit(lane, now, &self.hit_window) {
            HitOutcome::Tap(hit) => {
                self.last_hit_timing = hit.offset;
                self.last_hit_judgement = Some(hit.judgement);
                self.apply_judgement(hit.judgement);
            }
            HitOutcome::HoldStarted(hit) => {
                // Scored once the hold ends.
                self.last_hit_timing = hit.offset;
                self.last_hit_judgement = Some(hit.judgement);
            }
            HitOutcome::GhostTap => {
                self.last_hit_timing = None;
                self.last_hit_judgement = Some(Judgement::GhostTap);
                self.apply_judgement(Judgement::GhostTap);
            }
        }
    }

    /// Processes a release on `lane` (for long notes).
    pub(crate) fn process_release(&mut self, lane: usize) {
        let now = self.get_time();
        if let Some(hit) = self.hit_objects.release(lane, now, &self.hit_window) {
            self.last_hit_judgement = Some(hit.judgement);
            self.apply_judgement(hit.judgement);
        }
    }
}

/// Presses every object of a chart on time.
#[derive(Debug, Clone)]
pub struct AutoPlayer {
    /// Sorted by time; releases come before presses at the same time.
    actions: Vec<(f64, GameAction)>,
    cursor: usize,
}

impl AutoPlayer {
    pub fn new(chart: &Chart) -> Self {
        let mut actions = Vec::with_capacity(chart.hit_objects.len() * 2);
        for object in &chart.hit_objects {
            let release = if object.is_long_note() {
                object.end()
            } else {
                object.time + AUTOPLAY_TAP_HOLD_MS
            };
            actions.push((object.time, GameAction::Hit { lane: object.lane }));
            actions.push((release, GameAction::Release { lane: object.lane }));
        }
        actions.sort_by(|a, b| {
            a.0.total_cmp(&b.0).then_with(|| {
                let rank = |action: &GameAction| matches!(action, GameAction::Hit { .. }) as u8;
                rank(&a.1).cmp(&rank(&b.1))
            })
        });

        Self { actions, cursor: 0 }
    }

    /// Actions due at `now`.
    pub fn poll(&mut self, now: f64) -> Vec<GameAction> {
        let start = self.cursor;
        while self.cursor < self.actions.len() && self.actions[self.cursor].0 <= now {
            self.cursor += 1;
        }
        self.actions[start..self.cursor]
            .iter()
            .map(|(_, action)| action.clone())
            .collect()
    }

    /// Rewinds or skips to `time`.
    pub fn seek(&mut self, time: f64) {
        self.cursor = self.actions.partition_point(|(t, _)| *t < time);
    }
}
