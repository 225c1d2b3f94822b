//! Hit-object lifecycle: admission into the active window, judgement state,
//! and eviction once an object is done or has scrolled off screen.
//!
//! Objects are ordered by the scroll position of their head. The render
//! window `[head, tail)` moves like the timing-line window. Judgement runs
//! over `[judge_head, tail)`, where `judge_head` is the first object still
//! waiting for input; it may trail `head` when an unjudged object has already
//! scrolled out of view.
//!
//! Moving backwards (reverse scroll, a drift correction) walks both pointers
//! back instead of rebuilding; only a new seek generation rebuilds.
//!
//! State is keyed by `HitObjectId`, so chart edits that move or reorder
//! objects never mix up which object was hit.

use super::lane_switch::LaneSwitchCursor;
use crate::models::chart::{
    Chart, ChartEvent, HitObjectId, HitObjectInfo, LaneSwitchEvent,
};
use crate::models::engine::hit_window::HitWindow;
use crate::models::engine::playfield::Viewport;
use crate::models::engine::scroll::ScrollResolver;
use crate::models::stats::Judgement;
use ordered_float::OrderedFloat;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Waiting for input.
    Pending,
    /// Long note pressed; carries the head judgement.
    Holding(Judgement),
    Hit(Judgement),
    Missed,
    /// Jumped over by a forward seek. Never scored.
    Skipped,
}

impl ObjectState {
    pub fn is_finished(self) -> bool {
        matches!(self, ObjectState::Hit(_) | ObjectState::Missed | ObjectState::Skipped)
    }

    /// Judgement that counts towards the score, if any.
    pub fn judgement(self) -> Option<Judgement> {
        match self {
            ObjectState::Hit(j) => Some(j),
            ObjectState::Missed => Some(Judgement::Miss),
            _ => None,
        }
    }
}

/// A hit object resolved to scroll space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManagedObject {
    pub id: HitObjectId,
    pub lane: usize,
    pub time: f64,
    /// Equal to `time` for tap notes.
    pub end_time: f64,
    pub start_position: f64,
    pub end_position: f64,
}

impl ManagedObject {
    fn new(info: &HitObjectInfo, resolver: &ScrollResolver) -> Self {
        let end_time = info.end();
        Self {
            id: info.id,
            lane: info.lane,
            time: info.time,
            end_time,
            start_position: resolver.position_from_time(info.time),
            end_position: resolver.position_from_time(end_time),
        }
    }

    pub fn is_long_note(&self) -> bool {
        self.end_time > self.time
    }

    /// Furthest scroll position the object covers.
    fn extent(&self) -> f64 {
        self.start_position.max(self.end_position)
    }

    fn sort_key(&self) -> (OrderedFloat<f64>, OrderedFloat<f64>, usize) {
        (OrderedFloat(self.start_position), OrderedFloat(self.time), self.lane)
    }
}

/// A judgement produced for one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgedHit {
    pub id: HitObjectId,
    pub judgement: Judgement,
    /// Object time minus input time, when the judgement came from a press.
    pub offset: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    /// Tap note judged.
    Tap(JudgedHit),
    /// Long note head judged; scoring happens on release or completion.
    HoldStarted(JudgedHit),
    /// Nothing to hit in this lane.
    GhostTap,
}

#[derive(Debug, Default)]
pub struct HitObjectManager {
    objects: Vec<ManagedObject>,
    /// `reach[i]` is the furthest extent among `objects[..=i]`. Everything
    /// before the first reach on screen is below the viewport.
    reach: Vec<f64>,
    states: HashMap<HitObjectId, ObjectState>,
    head: usize,
    tail: usize,
    judge_head: usize,
    last_viewport: Option<Viewport>,
    seek_generation: u64,
    lane_switches: LaneSwitchCursor,
    #[cfg(test)]
    rebuilds: usize,
}

impl HitObjectManager {
    pub fn new(chart: &Chart, resolver: &ScrollResolver) -> Self {
        let mut manager = Self::default();
        manager.reload(chart, resolver);
        manager
    }

    /// Re-resolves every object, e.g. after the scroll velocities changed.
    /// States of objects that still exist are kept.
    pub fn reload(&mut self, chart: &Chart, resolver: &ScrollResolver) {
        self.objects = chart
            .hit_objects
            .iter()
            .map(|info| ManagedObject::new(info, resolver))
            .collect();
        self.objects.sort_by_key(ManagedObject::sort_key);

        let old_states = std::mem::take(&mut self.states);
        self.states = self
            .objects
            .iter()
            .map(|o| {
                let state = old_states.get(&o.id).copied().unwrap_or(ObjectState::Pending);
                (o.id, state)
            })
            .collect();

        self.refresh_window();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[ManagedObject] {
        &self.objects
    }

    pub fn state(&self, id: HitObjectId) -> Option<ObjectState> {
        self.states.get(&id).copied()
    }

    fn state_at(&self, index: usize) -> ObjectState {
        self.states
            .get(&self.objects[index].id)
            .copied()
            .unwrap_or(ObjectState::Pending)
    }

    /// Objects in the render window, in scroll order.
    pub fn active(&self) -> &[ManagedObject] {
        &self.objects[self.head..self.tail]
    }

    /// Active objects that should still be drawn.
    pub fn visible(&self) -> impl Iterator<Item = (&ManagedObject, ObjectState)> + '_ {
        self.active().iter().filter_map(|o| {
            let state = self.states.get(&o.id).copied().unwrap_or(ObjectState::Pending);
            (!matches!(state, ObjectState::Hit(_) | ObjectState::Skipped)).then_some((o, state))
        })
    }

    /// Objects that still need input.
    pub fn remaining(&self) -> usize {
        self.states.values().filter(|s| !s.is_finished()).count()
    }

    /// Scored judgements of every finished object.
    pub fn judgements(&self) -> impl Iterator<Item = Judgement> + '_ {
        self.objects
            .iter()
            .filter_map(|o| self.states.get(&o.id).and_then(|s| s.judgement()))
    }

    /// Objects the render window drops: already hit, or drawn below the viewport.
    fn is_gone(&self, index: usize, viewport: &Viewport) -> bool {
        matches!(self.state_at(index), ObjectState::Hit(_) | ObjectState::Skipped)
            || viewport.is_below_viewport(self.objects[index].extent())
    }

    /// Moves the render window to `viewport`.
    ///
    /// Both pointers follow the viewport in either direction; a seek
    /// generation the manager has not seen rebuilds the window.
    pub fn update(&mut self, viewport: &Viewport, seek_generation: u64) {
        let last = match self.last_viewport {
            Some(last) if seek_generation == self.seek_generation => last,
            _ => {
                self.rebuild(viewport);
                self.seek_generation = seek_generation;
                return;
            }
        };

        let horizon = viewport.horizon();
        while self.tail < self.objects.len() && self.objects[self.tail].start_position <= horizon {
            self.tail += 1;
        }
        while self.tail > 0 && self.objects[self.tail - 1].start_position > horizon {
            self.tail -= 1;
        }
        self.head = self.head.min(self.tail);

        if viewport.expiry_position() < last.expiry_position() {
            let floor = self.first_on_screen(viewport);
            if let Some(i) = (floor..self.head).find(|&i| !self.is_gone(i, viewport)) {
                self.head = i;
            }
        }
        self.advance_head(viewport);

        self.last_viewport = Some(*viewport);
    }

    /// Recomputes the windows from scratch.
    pub fn rebuild(&mut self, viewport: &Viewport) {
        #[cfg(test)]
        {
            self.rebuilds += 1;
        }

        let horizon = viewport.horizon();
        self.tail = self
            .objects
            .partition_point(|o| o.start_position <= horizon);
        self.head = self.first_on_screen(viewport).min(self.tail);
        self.advance_head(viewport);
        self.judge_head = 0;
        self.advance_judge_head();
        self.last_viewport = Some(*viewport);
    }

    /// First index whose object, or any object before it, reaches the viewport.
    fn first_on_screen(&self, viewport: &Viewport) -> usize {
        self.reach
            .partition_point(|&reach| viewport.is_below_viewport(reach))
    }

    fn advance_head(&mut self, viewport: &Viewport) {
        while self.head < self.tail && self.is_gone(self.head, viewport) {
            self.head += 1;
        }
    }

    fn refresh_window(&mut self) {
        let mut furthest = f64::NEG_INFINITY;
        self.reach = self
            .objects
            .iter()
            .map(|o| {
                furthest = furthest.max(o.extent());
                furthest
            })
            .collect();

        match self.last_viewport {
            Some(viewport) => self.rebuild(&viewport),
            None => {
                self.head = 0;
                self.tail = 0;
                self.judge_head = 0;
                self.advance_judge_head();
            }
        }
    }

    fn advance_judge_head(&mut self) {
        while self.judge_head < self.objects.len() && self.state_at(self.judge_head).is_finished() {
            self.judge_head += 1;
        }
    }

    fn judge_range(&self) -> std::ops::Range<usize> {
        self.judge_head.min(self.tail)..self.tail
    }

    /// Puts every object at or after `time` back to `Pending`. Earlier
    /// objects that were never judged are skipped.
    pub fn reset_states_from(&mut self, time: f64) {
        for object in &self.objects {
            let state = self.states.entry(object.id).or_insert(ObjectState::Pending);
            if object.time >= time {
                *state = ObjectState::Pending;
            } else if !state.is_finished() {
                *state = ObjectState::Skipped;
            }
        }
        self.lane_switches.reset();
        self.refresh_window();
    }

    /// Handles a lane press at `now`.
    pub fn hit(&mut self, lane: usize, now: f64, window: &HitWindow) -> HitOutcome {
        let best = self
            .judge_range()
            .filter(|&i| {
                let o = &self.objects[i];
                o.lane == lane
                    && self.state_at(i) == ObjectState::Pending
                    && (o.time - now).abs() <= window.miss_ms
            })
            .min_by_key(|&i| OrderedFloat((self.objects[i].time - now).abs()));

        let Some(index) = best else {
            return HitOutcome::GhostTap;
        };

        let object = self.objects[index];
        let offset = object.time - now;
        let judgement = window.judge(offset);
        let hit = JudgedHit {
            id: object.id,
            judgement,
            offset: Some(offset),
        };

        let (state, outcome) = if judgement == Judgement::Miss {
            (ObjectState::Missed, HitOutcome::Tap(hit))
        } else if object.is_long_note() {
            (ObjectState::Holding(judgement), HitOutcome::HoldStarted(hit))
        } else {
            (ObjectState::Hit(judgement), HitOutcome::Tap(hit))
        };

        self.states.insert(object.id, state);
        self.advance_judge_head();
        outcome
    }

    /// Handles a lane release at `now`. Only a held long note reacts.
    pub fn release(&mut self, lane: usize, now: f64, window: &HitWindow) -> Option<JudgedHit> {
        let index = self.judge_range().find(|&i| {
            self.objects[i].lane == lane && matches!(self.state_at(i), ObjectState::Holding(_))
        })?;

        let object = self.objects[index];
        let ObjectState::Holding(head) = self.state_at(index) else {
            return None;
        };

        // Releasing inside the bad window of the tail counts as a full hold.
        let judgement = if now >= object.end_time - window.bad_ms() {
            head
        } else {
            let ratio = (now - object.time) / (object.end_time - object.time);
            head.max(HitWindow::judge_hold_ratio(ratio))
        };

        let state = if judgement == Judgement::Miss {
            ObjectState::Missed
        } else {
            ObjectState::Hit(judgement)
        };
        self.states.insert(object.id, state);
        self.advance_judge_head();

        Some(JudgedHit {
            id: object.id,
            judgement,
            offset: None,
        })
    }

    /// Misses objects whose window has passed and completes held long notes.
    pub fn detect_misses(&mut self, now: f64, window: &HitWindow) -> Vec<JudgedHit> {
        let mut judged = Vec::new();

        for i in self.judge_range() {
            let object = self.objects[i];
            let next = match self.state_at(i) {
                ObjectState::Pending if now > object.time + window.miss_ms => {
                    Some((ObjectState::Missed, Judgement::Miss))
                }
                ObjectState::Holding(head) if now >= object.end_time => {
                    Some((ObjectState::Hit(head), head))
                }
                _ => None,
            };

            if let Some((state, judgement)) = next {
                self.states.insert(object.id, state);
                judged.push(JudgedHit {
                    id: object.id,
                    judgement,
                    offset: None,
                });
            }
        }

        self.advance_judge_head();
        judged
    }

    /// Applies a chart edit. Added and changed objects start out `Pending`.
    pub fn apply(&mut self, event: &ChartEvent, chart: &Chart, resolver: &ScrollResolver) {
        match event {
            ChartEvent::HitObjectAdded(id) => {
                if let Some(info) = chart.get(*id) {
                    self.insert(ManagedObject::new(info, resolver));
                }
            }
            ChartEvent::HitObjectRemoved(info) => {
                self.remove(info.id);
            }
            ChartEvent::HitObjectChanged(id) => {
                self.remove(*id);
                if let Some(info) = chart.get(*id) {
                    self.insert(ManagedObject::new(info, resolver));
                }
            }
        }
        self.refresh_window();
    }

    fn insert(&mut self, object: ManagedObject) {
        let key = object.sort_key();
        let index = self.objects.partition_point(|o| o.sort_key() <= key);
        self.objects.insert(index, object);
        self.states.insert(object.id, ObjectState::Pending);
    }

    fn remove(&mut self, id: HitObjectId) {
        self.objects.retain(|o| o.id != id);
        self.states.remove(&id);
    }

    /// Most recent lane switch event whose time has passed at `now`.
    pub fn current_lane_switch_event<'a>(
        &mut self,
        events: &'a [LaneSwitchEvent],
        now: f64,
    ) -> Option<&'a LaneSwitchEvent> {
        self.lane_switches.current(events, now)
    }
}
