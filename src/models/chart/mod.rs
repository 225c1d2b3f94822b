//! In-memory chart (map) model.
//!
//! A chart owns the canonical, time-sorted lists of timing points, scroll
//! velocities, hit objects and lane switch events. Gameplay never mutates it;
//! the editor goes through the edit operations below so that subscribers get
//! a `ChartEvent` for every change.

pub mod events;
pub mod hit_object;
pub mod lane_switch;
pub mod scroll_velocity;
pub mod storage;
pub mod timing_point;

pub use events::{ChartEvent, ChartSubscribers, SubscriptionId};
pub use hit_object::{HitObjectId, HitObjectInfo};
pub use lane_switch::LaneSwitchEvent;
pub use scroll_velocity::ScrollVelocity;
pub use storage::{ChartStore, SaveOutcome};
pub use timing_point::TimingPoint;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Errors raised while loading, validating or saving a chart.
#[derive(Debug)]
pub enum ChartError {
    NoHitObjects,
    NoTimingPoints,
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartError::NoHitObjects => write!(f, "Map has no hit objects!"),
            ChartError::NoTimingPoints => write!(f, "Map has no timing points!"),
            ChartError::Io(e) => write!(f, "I/O error: {}", e),
            ChartError::Json(e) => write!(f, "Invalid chart data: {}", e),
        }
    }
}

impl std::error::Error for ChartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChartError::Io(e) => Some(e),
            ChartError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChartError {
    fn from(e: std::io::Error) -> Self {
        ChartError::Io(e)
    }
}

impl From<serde_json::Error> for ChartError {
    fn from(e: serde_json::Error) -> Self {
        ChartError::Json(e)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartMetadata {
    pub title: String,
    pub artist: String,
    pub mapper: String,
    pub difficulty: String,
    pub preview_time: f64,
}

fn default_key_count() -> usize {
    4
}

/// A playable map.
#[derive(Debug, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub metadata: ChartMetadata,
    #[serde(default)]
    pub audio_file: String,
    /// Lane count when no lane switch event is active.
    #[serde(default = "default_key_count")]
    pub key_count: usize,
    #[serde(default)]
    pub timing_points: Vec<TimingPoint>,
    #[serde(default)]
    pub scroll_velocities: Vec<ScrollVelocity>,
    #[serde(default)]
    pub hit_objects: Vec<HitObjectInfo>,
    #[serde(default)]
    pub lane_switches: Vec<LaneSwitchEvent>,

    #[serde(skip)]
    next_id: u64,
    #[serde(skip)]
    subscribers: ChartSubscribers,
}

impl Clone for Chart {
    /// Clones the chart data. Subscriptions stay with the original.
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            audio_file: self.audio_file.clone(),
            key_count: self.key_count,
            timing_points: self.timing_points.clone(),
            scroll_velocities: self.scroll_velocities.clone(),
            hit_objects: self.hit_objects.clone(),
            lane_switches: self.lane_switches.clone(),
            next_id: self.next_id,
            subscribers: ChartSubscribers::default(),
        }
    }
}

impl Default for Chart {
    fn default() -> Self {
        Self::new(default_key_count())
    }
}

impl Chart {
    pub fn new(key_count: usize) -> Self {
        Self {
            metadata: ChartMetadata::default(),
            audio_file: String::new(),
            key_count,
            timing_points: Vec::new(),
            scroll_velocities: Vec::new(),
            hit_objects: Vec::new(),
            lane_switches: Vec::new(),
            next_id: 0,
            subscribers: ChartSubscribers::default(),
        }
    }

    /// Parses a chart from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, ChartError> {
        let mut chart: Chart = serde_json::from_str(json)?;
        chart.assign_ids();
        chart.sort();
        Ok(chart)
    }

    pub fn load(path: &Path) -> Result<Self, ChartError> {
        let json = std::fs::read_to_string(path)?;
        let chart = Self::from_json(&json)?;
        log::info!(
            "CHART: Loaded {:?} ({} objects, {} timing points, {} SVs)",
            path,
            chart.hit_objects.len(),
            chart.timing_points.len(),
            chart.scroll_velocities.len()
        );
        Ok(chart)
    }

    pub fn to_json(&self) -> Result<String, ChartError> {
        Ok(serde_json::to_string(self)?)
    }

    fn assign_ids(&mut self) {
        for object in &mut self.hit_objects {
            object.id = HitObjectId(self.next_id);
            self.next_id += 1;
        }
    }

    /// Sorts every list by time. Sorting is stable so equal timestamps keep
    /// their authored order.
    pub fn sort(&mut self) {
        self.timing_points.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.scroll_velocities
            .sort_by(|a, b| a.time.total_cmp(&b.time));
        self.hit_objects
            .sort_by(|a, b| a.time.total_cmp(&b.time).then(a.lane.cmp(&b.lane)));
        self.lane_switches.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    /// Rejects charts that cannot be saved or played.
    pub fn validate(&self) -> Result<(), ChartError> {
        if self.hit_objects.is_empty() {
            return Err(ChartError::NoHitObjects);
        }
        if self.timing_points.is_empty() {
            return Err(ChartError::NoTimingPoints);
        }
        Ok(())
    }

    /// Time at which the last object ends.
    pub fn end_time(&self) -> f64 {
        let last_object = self
            .hit_objects
            .iter()
            .map(HitObjectInfo::end)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));

        last_object
            .or_else(|| self.timing_points.last().map(|p| p.time))
            .unwrap_or(0.0)
    }

    pub fn timing_point_at(&self, time: f64) -> Option<&TimingPoint> {
        timing_point::point_at(&self.timing_points, time)
    }

    /// Number of playable lanes at `time`.
    pub fn lane_count_at(&self, time: f64) -> usize {
        lane_switch::index_at(&self.lane_switches, time)
            .map(|i| self.lane_switches[i].count)
            .unwrap_or(self.key_count)
    }

    /// Highest lane count the chart ever uses.
    pub fn max_lane_count(&self) -> usize {
        self.lane_switches
            .iter()
            .map(|e| e.count)
            .fold(self.key_count, usize::max)
    }

    pub fn get(&self, id: HitObjectId) -> Option<&HitObjectInfo> {
        self.hit_objects.iter().find(|o| o.id == id)
    }

    fn index_of(&self, id: HitObjectId) -> Option<usize> {
        self.hit_objects.iter().position(|o| o.id == id)
    }

    fn insert_sorted(&mut self, object: HitObjectInfo) {
        let idx = self.hit_objects.partition_point(|o| {
            o.time < object.time || (o.time == object.time && o.lane <= object.lane)
        });
        self.hit_objects.insert(idx, object);
    }

    /// Adds an object and returns the id it was given.
    pub fn add_hit_object(&mut self, mut object: HitObjectInfo) -> HitObjectId {
        let id = HitObjectId(self.next_id);
        self.next_id += 1;
        object.id = id;
        self.insert_sorted(object);
        self.subscribers.emit(ChartEvent::HitObjectAdded(id));
        id
    }

    pub fn remove_hit_object(&mut self, id: HitObjectId) -> Option<HitObjectInfo> {
        let idx = self.index_of(id)?;
        let removed = self.hit_objects.remove(idx);
        self.subscribers
            .emit(ChartEvent::HitObjectRemoved(removed.clone()));
        Some(removed)
    }

    /// Moves an object. Long notes keep their duration.
    pub fn update_hit_object(&mut self, id: HitObjectId, time: f64, lane: usize) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };

        let mut object = self.hit_objects.remove(idx);
        if let Some(end) = object.end_time.as_mut() {
            *end += time - object.time;
        }
        object.time = time;
        object.lane = lane;
        self.insert_sorted(object);
        self.subscribers.emit(ChartEvent::HitObjectChanged(id));
        true
    }

    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<ChartEvent>) {
        self.subscribers.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chart() -> Chart {
        let mut chart = Chart::new(4);
        chart.timing_points.push(TimingPoint::new(0.0, 500.0, 4));
        chart.add_hit_object(HitObjectInfo::tap(1000.0, 0));
        chart.add_hit_object(HitObjectInfo::long(500.0, 2, 1500.0));
        chart
    }

    #[test]
    fn test_add_keeps_order_and_ids() {
        let mut chart = sample_chart();
        let id = chart.add_hit_object(HitObjectInfo::tap(750.0, 1));

        let times: Vec<f64> = chart.hit_objects.iter().map(|o| o.time).collect();
        assert_eq!(times, vec![500.0, 750.0, 1000.0]);
        assert_eq!(chart.get(id).map(|o| o.lane), Some(1));
    }

    #[test]
    fn test_edit_events_reach_subscribers() {
        let mut chart = sample_chart();
        let (sub, rx) = chart.subscribe();

        let id = chart.add_hit_object(HitObjectInfo::tap(2000.0, 3));
        assert!(chart.update_hit_object(id, 2500.0, 1));
        let removed = chart.remove_hit_object(id).expect("object exists");

        assert_eq!(rx.try_recv().ok(), Some(ChartEvent::HitObjectAdded(id)));
        assert_eq!(rx.try_recv().ok(), Some(ChartEvent::HitObjectChanged(id)));
        assert_eq!(rx.try_recv().ok(), Some(ChartEvent::HitObjectRemoved(removed)));

        assert!(chart.unsubscribe(sub));
        chart.add_hit_object(HitObjectInfo::tap(3000.0, 0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let mut chart = sample_chart();
        let (_, rx) = chart.subscribe();
        drop(rx);

        chart.add_hit_object(HitObjectInfo::tap(10.0, 0));
        assert!(chart.subscribers.is_empty());
    }

    #[test]
    fn test_long_note_keeps_duration_when_moved() {
        let mut chart = sample_chart();
        let id = chart.hit_objects[0].id;
        chart.update_hit_object(id, 800.0, 3);

        let moved = chart.get(id).expect("object exists");
        assert_eq!(moved.time, 800.0);
        assert_eq!(moved.end_time, Some(1800.0));
        assert_eq!(moved.lane, 3);
    }

    #[test]
    fn test_end_time_and_validation() {
        let chart = sample_chart();
        assert_eq!(chart.end_time(), 1500.0);
        assert!(chart.validate().is_ok());

        let mut empty = Chart::new(4);
        assert!(matches!(empty.validate(), Err(ChartError::NoHitObjects)));
        empty.add_hit_object(HitObjectInfo::tap(0.0, 0));
        assert!(matches!(empty.validate(), Err(ChartError::NoTimingPoints)));
    }

    #[test]
    fn test_lane_count_follows_switches() {
        let mut chart = sample_chart();
        chart.lane_switches = vec![
            LaneSwitchEvent::new(1000.0, 6),
            LaneSwitchEvent::new(2000.0, 2),
        ];

        assert_eq!(chart.lane_count_at(0.0), 4);
        assert_eq!(chart.lane_count_at(1500.0), 6);
        assert_eq!(chart.lane_count_at(2000.0), 2);
        assert_eq!(chart.max_lane_count(), 6);
    }

    #[test]
    fn test_json_load_assigns_ids_and_sorts() {
        let json = r#"{
            "key_count": 4,
            "timing_points": [{ "time": 0, "ms_per_beat": 500 }],
            "hit_objects": [
                { "time": 1000, "lane": 1 },
                { "time": 200, "lane": 0, "end_time": 600 }
            ]
        }"#;

        let chart = Chart::from_json(json).expect("valid chart");
        assert_eq!(chart.hit_objects[0].time, 200.0);
        assert!(chart.hit_objects[0].is_long_note());
        assert_ne!(chart.hit_objects[0].id, chart.hit_objects[1].id);
        assert_eq!(chart.timing_points[0].signature, 4);
    }
}
