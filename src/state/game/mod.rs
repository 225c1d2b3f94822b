//! Core gameplay engine.
//!
//! The `GameEngine` owns one play session:
//! - the audio clock every other component reads
//! - beat-line and hit-object scheduling against the scroll resolver
//! - judgement, score and combo
//! - lane switch alerts
//! - practice seeking, which recomputes the score from object states

mod input;
mod snapshot;

pub mod hit_objects;
pub mod lane_switch;
pub mod timing_lines;

pub use input::AutoPlayer;

use crate::logic::audio::AudioManager;
use crate::logic::clock::AudioClock;
use crate::models::chart::{Chart, ChartError, storage};
use crate::models::engine::hit_window::HitWindow;
use crate::models::engine::playfield::{PlayfieldLayout, Viewport};
use crate::models::engine::scroll::ScrollResolver;
use crate::models::settings::GameSettings;
use crate::models::stats::{HitStats, Judgement};
use crate::shared::snapshot::GameResult;
use crate::system::bus::SystemBus;
use hit_objects::HitObjectManager;
use lane_switch::{AlertClock, LaneSwitchAlert, LaneSwitchCue};
use std::path::Path;
use timing_lines::TimingLineManager;

/// Time after the last object before the session counts as finished (ms).
const FINISH_DELAY_MS: f64 = 2000.0;

/// Main gameplay engine handling note timing, scoring, and audio sync.
pub struct GameEngine {
    /// The chart being played. Never mutated during play.
    pub chart: Chart,
    chart_hash: String,
    resolver: ScrollResolver,
    clock: AudioClock,
    timing_lines: TimingLineManager,
    hit_objects: HitObjectManager,
    alert: LaneSwitchAlert,
    layout: PlayfieldLayout,

    /// Current score.
    pub score: u32,
    /// Current combo count.
    pub combo: u32,
    /// Maximum combo achieved.
    pub max_combo: u32,
    /// Hit statistics (marv, perfect, etc.).
    pub hit_stats: HitStats,

    /// Currently held keys per lane.
    pub keys_held: Vec<bool>,
    /// Timing offset of the last hit (for hit error display).
    pub last_hit_timing: Option<f64>,
    /// Judgement of the last hit.
    pub last_hit_judgement: Option<Judgement>,
    /// Last lane switch cue, kept until its event is reached.
    last_cue: Option<LaneSwitchCue>,

    /// Rate the session was started with.
    pub rate: f64,
    pub scroll_speed: f64,
    /// Hit window configuration.
    pub hit_window: HitWindow,

    autoplay: Option<AutoPlayer>,
}

impl GameEngine {
    /// Pre-roll time before the audio starts (in ms).
    pub const PRE_ROLL_MS: f64 = 3000.0;

    /// Creates an engine that plays `chart` with `clock` as its time source.
    pub fn new(chart: Chart, clock: AudioClock, settings: &GameSettings) -> Result<Self, ChartError> {
        let settings = settings.clone().sanitized();
        let chart_hash = storage::chart_hash(&chart.to_json()?);
        let resolver = ScrollResolver::from_chart(&chart);
        let timing_lines = TimingLineManager::new(&chart, &resolver, settings.timing_lines);
        let hit_objects = HitObjectManager::new(&chart, &resolver);

        let mut clock = clock.with_lead_in(Self::PRE_ROLL_MS);
        if let Err(e) = clock.set_rate(settings.rate) {
            log::warn!("ENGINE: {}, playing at {}x", e, clock.rate());
        }
        let rate = clock.rate();

        let alert = LaneSwitchAlert::new(
            &chart.lane_switches,
            clock.current_time(),
            chart.key_count,
            settings.lane_switch_alerts,
        );

        log::info!(
            "ENGINE: Loaded {} ({} objects, {} timing lines) at {}x",
            chart_hash,
            hit_objects.len(),
            timing_lines.lines().len(),
            rate
        );

        Ok(Self {
            keys_held: vec![false; chart.max_lane_count()],
            chart,
            chart_hash,
            resolver,
            clock,
            timing_lines,
            hit_objects,
            alert,
            layout: PlayfieldLayout::default(),
            score: 0,
            combo: 0,
            max_combo: 0,
            hit_stats: HitStats::new(),
            last_hit_timing: None,
            last_hit_judgement: None,
            last_cue: None,
            rate,
            scroll_speed: settings.scroll_speed,
            hit_window: HitWindow::from_settings(settings.hit_window_mode, settings.hit_window_value),
            autoplay: None,
        })
    }

    /// Creates an engine whose audio plays on the audio thread.
    ///
    /// `chart_dir` is the directory the chart's audio file is relative to.
    pub fn with_audio(
        bus: &SystemBus,
        chart: Chart,
        chart_dir: &Path,
        settings: &GameSettings,
    ) -> Result<Self, ChartError> {
        let mut audio_manager = AudioManager::new(bus);
        if !chart.audio_file.is_empty() {
            audio_manager.load_music(&chart_dir.join(&chart.audio_file));
        }
        audio_manager.set_volume(settings.master_volume.clamp(0.0, 1.0));

        Self::new(chart, AudioClock::new(Box::new(audio_manager)), settings)
    }

    pub fn set_layout(&mut self, layout: PlayfieldLayout) {
        self.layout = layout;
    }

    /// Lets the engine press its own keys.
    pub fn enable_autoplay(&mut self) {
        self.autoplay = Some(AutoPlayer::new(&self.chart));
    }

    pub fn start(&mut self) {
        self.clock.start();
    }

    pub fn is_paused(&self) -> bool {
        !self.clock.is_running()
    }

    pub fn toggle_pause(&mut self) {
        if self.clock.is_running() {
            self.clock.stop();
        } else {
            self.clock.start();
        }
    }

    pub fn chart_hash(&self) -> &str {
        &self.chart_hash
    }

    pub fn resolver(&self) -> &ScrollResolver {
        &self.resolver
    }

    pub fn timing_lines(&self) -> &TimingLineManager {
        &self.timing_lines
    }

    pub fn hit_objects(&self) -> &HitObjectManager {
        &self.hit_objects
    }

    /// Returns the current audio clock time in milliseconds.
    pub fn get_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn viewport(&self) -> Viewport {
        self.resolver.viewport(
            self.layout,
            self.clock.current_time(),
            self.rate,
            self.scroll_speed,
        )
    }

    /// Updates the game state for one tick.
    pub fn update(&mut self, dt_seconds: f64) {
        self.clock.update(dt_seconds);
        let now = self.clock.current_time();

        let viewport = self.viewport();
        let generation = self.clock.seek_generation();
        self.timing_lines.update(&viewport, generation);
        self.hit_objects.update(&viewport, generation);

        if let Some(actions) = self.autoplay.as_mut().map(|a| a.poll(now)) {
            for action in actions {
                self.handle_input(action);
            }
        }

        for judged in self.hit_objects.detect_misses(now, &self.hit_window) {
            self.apply_judgement(judged.judgement);
        }

        let cue = self.alert.update(
            &self.chart.lane_switches,
            AlertClock {
                now,
                running: self.clock.is_running(),
                beat_time: self.clock.beat_time(&self.chart.timing_points),
                clock_rate: self.clock.rate(),
                screen_rate: self.rate,
            },
        );
        if cue.is_some() {
            self.last_cue = cue;
        } else if self.last_cue.is_some_and(|c| now >= c.event_time) {
            self.last_cue = None;
        }
    }

    /// Lanes in play at the current time.
    pub fn lane_count(&mut self) -> usize {
        let now = self.clock.current_time();
        self.hit_objects
            .current_lane_switch_event(&self.chart.lane_switches, now)
            .map_or(self.chart.key_count, |e| e.count)
    }

    /// Returns `true` once the map has finished.
    pub fn is_finished(&self) -> bool {
        self.clock.current_time() > self.chart.end_time() + FINISH_DELAY_MS
    }

    /// Continues playing from `time`.
    ///
    /// Objects at or after `time` become playable again and the score is
    /// recomputed from what was judged before it.
    pub fn restart_from(&mut self, time: f64) {
        self.hit_objects.reset_states_from(time);
        self.clock.seek(time);
        self.alert.reset(&self.chart.lane_switches, time);
        if let Some(autoplay) = self.autoplay.as_mut() {
            autoplay.seek(time);
        }

        self.keys_held.iter_mut().for_each(|k| *k = false);
        self.last_cue = None;
        self.last_hit_judgement = None;
        self.last_hit_timing = None;
        self.recompute_stats();

        log::info!("ENGINE: Restarting from {:.0}ms", time);
    }

    /// Restarts the whole session, lead-in included.
    pub fn restart(&mut self) {
        self.restart_from(-Self::PRE_ROLL_MS);
    }

    fn recompute_stats(&mut self) {
        self.score = 0;
        self.combo = 0;
        self.max_combo = 0;
        self.hit_stats = HitStats::new();

        let judgements: Vec<Judgement> = self.hit_objects.judgements().collect();
        for judgement in judgements {
            self.apply_judgement(judgement);
        }
    }

    /// Applies a judgement to the game state (score, combo, stats).
    pub(crate) fn apply_judgement(&mut self, judgement: Judgement) {
        self.hit_stats.record(judgement);

        match judgement {
            Judgement::GhostTap => {}
            Judgement::Miss => self.combo = 0,
            _ => {
                self.combo += 1;
                self.max_combo = self.max_combo.max(self.combo);
                self.score += judgement.score_value();
            }
        }
    }

    pub fn result(&self) -> GameResult {
        GameResult {
            chart_hash: self.chart_hash.clone(),
            score: self.score,
            accuracy: self.hit_stats.calculate_accuracy(),
            max_combo: self.max_combo,
            rate: self.rate,
            hit_stats: self.hit_stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chart::{HitObjectInfo, LaneSwitchEvent, TimingPoint};
    use crate::shared::messages::GameAction;

    fn chart() -> Chart {
        let mut chart = Chart::new(4);
        chart.timing_points.push(TimingPoint::new(0.0, 500.0, 4));
        for i in 0..8 {
            chart.add_hit_object(HitObjectInfo::tap(1000.0 + i as f64 * 500.0, i % 4));
        }
        chart
    }

    fn engine(chart: Chart) -> GameEngine {
        let mut engine =
            GameEngine::new(chart, AudioClock::silent(), &GameSettings::default()).unwrap();
        engine.start();
        engine
    }

    fn run_until(engine: &mut GameEngine, time: f64) {
        while engine.get_time() < time {
            engine.update(0.005);
        }
    }

    #[test]
    fn test_lead_in() {
        let engine = engine(chart());
        assert_eq!(engine.get_time(), -GameEngine::PRE_ROLL_MS);
        assert!(!engine.is_paused());
    }

    #[test]
    fn test_everything_missed_without_input() {
        let mut engine = engine(chart());
        run_until(&mut engine, 5000.0);

        assert_eq!(engine.hit_stats.miss, 8);
        assert_eq!(engine.combo, 0);
        assert_eq!(engine.score, 0);
        assert!(!engine.is_finished());

        run_until(&mut engine, 6600.0);
        assert!(engine.is_finished());
    }

    #[test]
    fn test_autoplay_scores_everything() {
        let mut engine = engine(chart());
        engine.enable_autoplay();
        run_until(&mut engine, 5000.0);

        assert_eq!(engine.hit_stats.miss, 0);
        assert_eq!(engine.hit_stats.ghost_tap, 0);
        assert_eq!(engine.max_combo, 8);
        assert_eq!(engine.result().accuracy, 100.0);
    }

    #[test]
    fn test_manual_hit() {
        let mut engine = engine(chart());
        run_until(&mut engine, 1000.0);
        engine.handle_input(GameAction::Hit { lane: 0 });

        assert_eq!(engine.combo, 1);
        assert_eq!(engine.score, 300);
        assert!(engine.keys_held[0]);
    }

    #[test]
    fn test_restart_from_recomputes_stats() {
        let mut engine = engine(chart());
        run_until(&mut engine, 4000.0);
        assert_eq!(engine.hit_stats.miss, 6);

        engine.handle_input(GameAction::SeekTo { time: 2000.0 });
        assert_eq!(engine.get_time(), 2000.0);
        assert_eq!(engine.hit_stats.miss, 2);
        assert_eq!(engine.hit_objects().remaining(), 6);
    }

    #[test]
    fn test_invalid_scroll_speed_falls_back_to_default() {
        let settings = GameSettings {
            scroll_speed: 0.0,
            ..GameSettings::default()
        };
        let mut engine = GameEngine::new(chart(), AudioClock::silent(), &settings).unwrap();
        engine.start();
        run_until(&mut engine, 900.0);

        let viewport = engine.viewport();
        assert_eq!(viewport.scroll_speed, GameSettings::default().scroll_speed);
        assert!(viewport.lookahead().is_finite());
        assert!(!engine.hit_objects().active().is_empty());
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut engine = engine(chart());
        run_until(&mut engine, 0.0);
        engine.handle_input(GameAction::TogglePause);
        let paused_at = engine.get_time();
        engine.update(1.0);
        assert_eq!(engine.get_time(), paused_at);
        assert!(engine.is_paused());
    }

    #[test]
    fn test_lane_switch_cue_and_count() {
        let mut chart = chart();
        chart.lane_switches = vec![LaneSwitchEvent::new(2000.0, 6)];
        let mut engine = engine(chart);

        run_until(&mut engine, 1600.0);
        let cue = engine.get_snapshot().lane_switch_cue.unwrap();
        assert_eq!((cue.from, cue.to), (4, 6));
        assert_eq!(engine.lane_count(), 4);

        run_until(&mut engine, 2100.0);
        assert!(engine.get_snapshot().lane_switch_cue.is_none());
        assert_eq!(engine.lane_count(), 6);
    }
}
