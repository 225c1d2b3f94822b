//! Editor state module.
//!
//! `EditorState` owns the chart being edited. Every edit goes through the
//! chart's edit operations; the editor's own hit-object manager follows along
//! through its chart subscription, so drawing always reflects the latest
//! edit without rescanning the chart.

pub mod drag;

use crate::logic::clock::AudioClock;
use crate::models::chart::{
    Chart, ChartError, ChartEvent, ChartStore, HitObjectId, HitObjectInfo, SaveOutcome,
    ScrollVelocity, SubscriptionId, TimingPoint, storage,
};
use crate::models::engine::playfield::{PlayfieldLayout, ScreenPoint, Viewport};
use crate::models::engine::scroll::{ScrollResolver, snap_time};
use crate::models::settings::GameSettings;
use crate::state::game::hit_objects::HitObjectManager;
use crate::state::game::timing_lines::TimingLineManager;
use crate::system::notifications::Notifier;
use crossbeam_channel::Receiver;
use drag::Drag;

pub struct EditorState {
    chart: Chart,
    subscription: SubscriptionId,
    events: Receiver<ChartEvent>,
    resolver: ScrollResolver,
    clock: AudioClock,
    timing_lines: TimingLineManager,
    /// Chart end the timing lines were generated for.
    lines_end: f64,
    hit_objects: HitObjectManager,
    layout: PlayfieldLayout,
    scroll_speed: f64,
    snap_divisor: u32,

    selection: Vec<HitObjectId>,
    drag: Option<Drag>,

    store: ChartStore,
    saved_hash: Option<String>,
    notifier: Notifier,
}

impl EditorState {
    /// Opens `chart` for editing.
    ///
    /// `saved_hash` is the hash the chart was loaded from, `None` for a chart
    /// that was never saved.
    pub fn open(
        mut chart: Chart,
        clock: AudioClock,
        store: ChartStore,
        saved_hash: Option<String>,
        settings: &GameSettings,
        notifier: Notifier,
    ) -> Self {
        let settings = settings.clone().sanitized();
        let (subscription, events) = chart.subscribe();
        let resolver = ScrollResolver::from_chart(&chart);
        let timing_lines = TimingLineManager::new(&chart, &resolver, settings.timing_lines);
        let hit_objects = HitObjectManager::new(&chart, &resolver);
        let lines_end = chart.end_time();

        log::info!("EDITOR: Opened chart with {} objects", chart.hit_objects.len());

        let mut editor = Self {
            chart,
            subscription,
            events,
            resolver,
            clock,
            timing_lines,
            lines_end,
            hit_objects,
            layout: PlayfieldLayout::default(),
            scroll_speed: settings.scroll_speed,
            snap_divisor: settings.snap_divisor.max(1),
            selection: Vec::new(),
            drag: None,
            store,
            saved_hash,
            notifier,
        };
        editor.refresh();
        editor
    }

    /// Ends the session and hands the chart back.
    pub fn close(mut self) -> Chart {
        self.chart.unsubscribe(self.subscription);
        self.chart
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn hit_objects(&self) -> &HitObjectManager {
        &self.hit_objects
    }

    pub fn timing_lines(&self) -> &TimingLineManager {
        &self.timing_lines
    }

    pub fn selection(&self) -> &[HitObjectId] {
        &self.selection
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn set_layout(&mut self, layout: PlayfieldLayout) {
        self.layout = layout;
        self.refresh();
    }

    pub fn set_snap_divisor(&mut self, divisor: u32) {
        self.snap_divisor = divisor.max(1);
    }

    pub fn viewport(&self) -> Viewport {
        self.resolver.viewport(
            self.layout,
            self.clock.current_time(),
            self.clock.rate(),
            self.scroll_speed,
        )
    }

    /// Advances playback preview by `dt_seconds`.
    pub fn update(&mut self, dt_seconds: f64) {
        self.clock.update(dt_seconds);
        self.refresh();
    }

    pub fn toggle_playback(&mut self) {
        if self.clock.is_running() {
            self.clock.stop();
        } else {
            self.clock.start();
        }
    }

    /// Moves the editor to `time`.
    pub fn scrub(&mut self, time: f64) {
        self.clock.seek(time);
        self.refresh();
    }

    /// Applies pending chart events, then moves both windows.
    fn refresh(&mut self) {
        let events: Vec<ChartEvent> = self.events.try_iter().collect();
        for event in &events {
            self.hit_objects.apply(event, &self.chart, &self.resolver);
            if let ChartEvent::HitObjectRemoved(info) = event {
                self.selection.retain(|id| *id != info.id);
            }
        }

        let end = self.chart.end_time();
        if end != self.lines_end {
            log::debug!("EDITOR: Chart end moved to {}ms, regenerating lines", end);
            self.reload_lines();
        }

        let viewport = self.viewport();
        let generation = self.clock.seek_generation();
        self.timing_lines.update(&viewport, generation);
        self.hit_objects.update(&viewport, generation);
    }

    /// Snapped time under a screen point.
    pub fn time_at(&self, point: ScreenPoint) -> f64 {
        let viewport = self.viewport();
        let time = self.resolver.time_at_screen_space_position(point, &viewport);
        snap_time(time, &self.chart.timing_points, self.snap_divisor)
    }

    /// Lane under a screen point, using the lane count in effect at `time`.
    pub fn lane_at(&self, point: ScreenPoint, time: f64) -> usize {
        let viewport = self.viewport();
        self.resolver
            .lane_at_screen_space_position(point, &viewport, self.chart.lane_count_at(time))
    }

    /// Places a tap note at a screen point. Returns `None` if an object
    /// already sits at that snapped time and lane.
    pub fn place(&mut self, point: ScreenPoint) -> Option<HitObjectId> {
        let time = self.time_at(point);
        let lane = self.lane_at(point, time);
        self.place_at(time, lane)
    }

    pub fn place_at(&mut self, time: f64, lane: usize) -> Option<HitObjectId> {
        let occupied = self
            .chart
            .hit_objects
            .iter()
            .any(|o| o.lane == lane && o.time == time);
        if occupied {
            return None;
        }

        let id = self.chart.add_hit_object(HitObjectInfo::tap(time, lane));
        self.refresh();
        Some(id)
    }

    /// Places a long note between two snapped times.
    pub fn place_long(&mut self, start: ScreenPoint, end: ScreenPoint) -> Option<HitObjectId> {
        let start_time = self.time_at(start);
        let end_time = self.time_at(end);
        if end_time <= start_time {
            return self.place(start);
        }

        let lane = self.lane_at(start, start_time);
        let id = self
            .chart
            .add_hit_object(HitObjectInfo::long(start_time, lane, end_time));
        self.refresh();
        Some(id)
    }

    pub fn select(&mut self, id: HitObjectId, additive: bool) {
        if self.chart.get(id).is_none() {
            return;
        }
        if !additive {
            self.selection.clear();
        }
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    pub fn select_all(&mut self) {
        self.selection = self.chart.hit_objects.iter().map(|o| o.id).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Deletes the selected objects and returns how many were removed.
    pub fn delete_selected(&mut self) -> usize {
        let selected = std::mem::take(&mut self.selection);
        let removed = selected
            .into_iter()
            .filter(|id| self.chart.remove_hit_object(*id).is_some())
            .count();
        self.refresh();
        removed
    }

    /// Starts dragging the selection by `anchor`. The anchor joins the
    /// selection if it was not part of it.
    pub fn begin_drag(&mut self, anchor: HitObjectId) -> bool {
        if !self.selection.contains(&anchor) {
            self.select(anchor, false);
        }
        self.drag = Drag::begin(&self.chart, anchor, &self.selection);
        self.drag.is_some()
    }

    /// Moves the dragged objects so the anchor sits under `point`.
    pub fn update_drag(&mut self, point: ScreenPoint) {
        let Some(drag) = &self.drag else {
            return;
        };

        let time = self.time_at(point);
        let lane = self.lane_at(point, time);
        let targets = drag.targets(time, lane, self.chart.key_count);

        for (id, time, lane) in targets {
            let unchanged = self
                .chart
                .get(id)
                .is_some_and(|o| o.time == time && o.lane == lane);
            if !unchanged {
                self.chart.update_hit_object(id, time, lane);
            }
        }
        self.refresh();
    }

    pub fn end_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            log::debug!("EDITOR: Moved {} objects", drag.len());
        }
    }

    pub fn add_timing_point(&mut self, point: TimingPoint) {
        self.chart.timing_points.push(point);
        self.chart.sort();
        self.reload_lines();
        self.refresh();
    }

    fn reload_lines(&mut self) {
        self.timing_lines.reload(&self.chart, &self.resolver);
        self.lines_end = self.chart.end_time();
    }

    pub fn add_scroll_velocity(&mut self, velocity: ScrollVelocity) {
        self.chart.scroll_velocities.push(velocity);
        self.chart.sort();
        self.resolver = ScrollResolver::from_chart(&self.chart);
        self.reload_lines();
        self.hit_objects.reload(&self.chart, &self.resolver);
        self.refresh();
    }

    /// Returns `true` if the chart differs from its last save.
    pub fn has_changes(&self) -> bool {
        let Some(saved) = &self.saved_hash else {
            return true;
        };
        match self.chart.to_json() {
            Ok(json) => storage::chart_hash(&json) != *saved,
            Err(_) => true,
        }
    }

    /// Validates and stores the chart, reporting the outcome as a notification.
    pub fn save(&mut self) -> Result<SaveOutcome, ChartError> {
        match self.store.save(&mut self.chart, self.saved_hash.as_deref()) {
            Ok(outcome) => {
                match &outcome {
                    SaveOutcome::Saved { .. } => self.notifier.post("Saved!"),
                    SaveOutcome::UpToDate { .. } => self.notifier.post("Map is already up to date"),
                }
                self.saved_hash = Some(outcome.hash().to_string());
                Ok(outcome)
            }
            Err(e) => {
                log::warn!("EDITOR: Save failed: {}", e);
                self.notifier.post_error(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::notifications::{Notification, NotificationKind};
    use crossbeam_channel::unbounded;

    struct Fixture {
        editor: EditorState,
        notifications: Receiver<Notification>,
        _dir: tempfile::TempDir,
    }

    fn fixture(chart: Chart) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        let editor = EditorState::open(
            chart,
            AudioClock::silent(),
            ChartStore::new(dir.path()),
            None,
            &GameSettings::default(),
            Notifier::new(tx),
        );
        Fixture {
            editor,
            notifications: rx,
            _dir: dir,
        }
    }

    fn timed_chart() -> Chart {
        let mut chart = Chart::new(4);
        chart.timing_points.push(TimingPoint::new(0.0, 500.0, 4));
        chart
    }

    fn point_for(editor: &EditorState, time: f64, lane: usize) -> ScreenPoint {
        let viewport = editor.viewport();
        let y = viewport.y_for_position(editor.resolver.position_from_time(time));
        ScreenPoint::new(viewport.layout.lane_center_x(lane, 4), y)
    }

    #[test]
    fn test_place_snaps_to_grid() {
        let mut f = fixture(timed_chart());
        let point = point_for(&f.editor, 130.0, 2);

        let id = f.editor.place(point).unwrap();
        let placed = f.editor.chart().get(id).unwrap();
        assert_eq!(placed.time, 125.0);
        assert_eq!(placed.lane, 2);

        assert_eq!(f.editor.place(point), None);
        assert_eq!(f.editor.hit_objects().len(), 1);
    }

    #[test]
    fn test_drag_moves_selection() {
        let mut f = fixture(timed_chart());
        let a = f.editor.place_at(500.0, 0).unwrap();
        let b = f.editor.place_at(1000.0, 1).unwrap();

        f.editor.select(a, false);
        f.editor.select(b, true);
        assert!(f.editor.begin_drag(a));

        f.editor.update_drag(point_for(&f.editor, 740.0, 1));
        f.editor.update_drag(point_for(&f.editor, 760.0, 2));
        f.editor.end_drag();

        let chart = f.editor.chart();
        assert_eq!(chart.get(a).map(|o| (o.time, o.lane)), Some((750.0, 2)));
        assert_eq!(chart.get(b).map(|o| (o.time, o.lane)), Some((1250.0, 3)));
        assert!(!f.editor.is_dragging());

        let times: Vec<f64> = f.editor.hit_objects().objects().iter().map(|o| o.time).collect();
        assert_eq!(times, vec![750.0, 1250.0]);
    }

    #[test]
    fn test_delete_selected() {
        let mut f = fixture(timed_chart());
        f.editor.place_at(0.0, 0);
        f.editor.place_at(500.0, 1);
        f.editor.select_all();

        assert_eq!(f.editor.delete_selected(), 2);
        assert!(f.editor.chart().hit_objects.is_empty());
        assert!(f.editor.hit_objects().is_empty());
        assert!(f.editor.selection().is_empty());
    }

    #[test]
    fn test_save_messages() {
        let mut f = fixture(Chart::new(4));

        assert!(matches!(f.editor.save(), Err(ChartError::NoHitObjects)));
        let n = f.notifications.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::Error);
        assert_eq!(n.text, "Map has no hit objects!");

        f.editor.place_at(0.0, 0);
        assert!(matches!(f.editor.save(), Err(ChartError::NoTimingPoints)));
        assert_eq!(f.notifications.try_recv().unwrap().text, "Map has no timing points!");

        f.editor.add_timing_point(TimingPoint::new(0.0, 500.0, 4));
        assert!(f.editor.has_changes());
        assert!(matches!(f.editor.save(), Ok(SaveOutcome::Saved { .. })));
        assert_eq!(f.notifications.try_recv().unwrap().text, "Saved!");
        assert!(!f.editor.has_changes());

        assert!(matches!(f.editor.save(), Ok(SaveOutcome::UpToDate { .. })));
        assert_eq!(
            f.notifications.try_recv().unwrap().text,
            "Map is already up to date"
        );
    }

    #[test]
    fn test_scrub_rebuilds_windows() {
        let mut chart = timed_chart();
        for i in 0..40 {
            chart.add_hit_object(HitObjectInfo::tap(i as f64 * 250.0, i % 4));
        }
        let mut f = fixture(chart);

        f.editor.scrub(8000.0);
        f.editor.scrub(2000.0);

        let viewport = f.editor.viewport();
        assert!(f.editor.hit_objects().active().iter().all(|o| {
            o.start_position <= viewport.horizon() && !viewport.is_below_viewport(o.start_position)
        }));
        assert!(!f.editor.timing_lines().active().is_empty());
    }

    #[test]
    fn test_lines_follow_chart_end() {
        let mut chart = timed_chart();
        chart.add_hit_object(HitObjectInfo::tap(2000.0, 0));
        let mut f = fixture(chart);
        let times = |editor: &EditorState| -> Vec<f64> {
            editor.timing_lines().lines().iter().map(|l| l.time).collect()
        };
        assert_eq!(times(&f.editor), vec![0.0, 2000.0]);

        f.editor.place_at(10000.0, 1).unwrap();
        assert_eq!(
            times(&f.editor),
            vec![0.0, 2000.0, 4000.0, 6000.0, 8000.0, 10000.0]
        );

        f.editor.scrub(9500.0);
        let active: Vec<f64> = f.editor.timing_lines().active().iter().map(|l| l.time).collect();
        assert_eq!(active, vec![10000.0]);

        f.editor.select_all();
        f.editor.delete_selected();
        assert_eq!(times(&f.editor), vec![0.0]);
    }

    #[test]
    fn test_close_unsubscribes() {
        let f = fixture(timed_chart());
        assert_eq!(f.editor.chart().subscriber_count(), 1);

        let chart = f.editor.close();
        assert_eq!(chart.subscriber_count(), 0);
    }
}
