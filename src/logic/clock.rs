//! Audio-synchronized gameplay clock.
//!
//! `AudioClock` is the single time source of a session. It advances with the
//! frame delta scaled by the playback rate and is pulled back towards the
//! position reported by the audio source whenever the two drift apart.

use crate::models::chart::{TimingPoint, timing_point};
use std::fmt;

/// Drift beyond which the clock jumps straight to the audio position (ms).
const SNAP_THRESHOLD_MS: f64 = 80.0;
/// Drift below which the clock is left alone (ms).
const NUDGE_THRESHOLD_MS: f64 = 5.0;
/// Fraction of the drift corrected per update.
const NUDGE_FACTOR: f64 = 0.05;
/// Beat length used when a chart has no timing points (120 BPM).
const DEFAULT_MS_PER_BEAT: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockError {
    /// Rates must be finite and strictly positive.
    InvalidRate(f64),
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::InvalidRate(r) => write!(f, "Invalid playback rate {}", r),
        }
    }
}

impl std::error::Error for ClockError {}

/// Playback primitives the clock drives and reads back.
pub trait AudioSource {
    fn play(&mut self);
    fn pause(&mut self);
    /// Moves playback to `time_ms` without changing the play/pause state.
    fn seek(&mut self, time_ms: f64);
    fn set_rate(&mut self, rate: f64);
    /// Playback position in milliseconds, or `None` when nothing audible is
    /// loaded and the clock should run freely.
    fn position_ms(&self) -> Option<f64>;
    /// `true` while a seek has been requested but not applied yet.
    fn is_seeking(&self) -> bool {
        false
    }
}

/// Audio source for headless sessions and tests. Never reports a position.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSource;

impl AudioSource for SilentSource {
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn seek(&mut self, _time_ms: f64) {}
    fn set_rate(&mut self, _rate: f64) {}
    fn position_ms(&self) -> Option<f64> {
        None
    }
}

pub struct AudioClock {
    source: Box<dyn AudioSource + Send>,
    current_time: f64,
    rate: f64,
    running: bool,
    /// Whether the source is currently playing.
    audio_playing: bool,
    seek_generation: u64,
}

impl AudioClock {
    pub fn new(source: Box<dyn AudioSource + Send>) -> Self {
        Self {
            source,
            current_time: 0.0,
            rate: 1.0,
            running: false,
            audio_playing: false,
            seek_generation: 0,
        }
    }

    /// A clock with no audio attached.
    pub fn silent() -> Self {
        Self::new(Box::new(SilentSource))
    }

    /// Starts the clock `lead_in_ms` before the audio. The audio source is
    /// started when the clock crosses zero.
    pub fn with_lead_in(mut self, lead_in_ms: f64) -> Self {
        self.current_time = -lead_in_ms.max(0.0);
        self
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Incremented by every seek that actually moved the clock.
    pub fn seek_generation(&self) -> u64 {
        self.seek_generation
    }

    /// Real-time length of one beat at the current time.
    pub fn beat_time(&self, timing_points: &[TimingPoint]) -> f64 {
        let ms_per_beat = timing_point::point_at(timing_points, self.current_time)
            .map(|p| p.ms_per_beat)
            .filter(|ms| *ms > 0.0)
            .unwrap_or(DEFAULT_MS_PER_BEAT);
        ms_per_beat / self.rate
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        if self.current_time >= 0.0 {
            self.start_audio();
        }
    }

    /// Pauses time advancement. `current_time` is kept.
    pub fn stop(&mut self) {
        self.running = false;
        if self.audio_playing {
            self.source.pause();
            self.audio_playing = false;
        }
    }

    /// Moves the clock to `time`. Seeking to the current time is a no-op.
    pub fn seek(&mut self, time: f64) {
        if !time.is_finite() || time == self.current_time {
            return;
        }

        self.current_time = time;
        self.seek_generation += 1;

        if time >= 0.0 {
            self.source.seek(time);
            if self.running && !self.audio_playing {
                self.start_audio();
            }
        } else {
            // Back into the lead-in: audio restarts from zero once reached.
            if self.audio_playing {
                self.source.pause();
                self.audio_playing = false;
            }
            self.source.seek(0.0);
        }
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<(), ClockError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ClockError::InvalidRate(rate));
        }
        self.rate = rate;
        self.source.set_rate(rate);
        Ok(())
    }

    /// Advances the clock by `dt_seconds` of wall time.
    pub fn update(&mut self, dt_seconds: f64) {
        if !self.running {
            return;
        }

        self.current_time += dt_seconds * 1000.0 * self.rate;

        if !self.audio_playing {
            if self.current_time >= 0.0 {
                self.start_audio();
            } else {
                return;
            }
        }

        if self.source.is_seeking() {
            return;
        }

        if let Some(audio_time) = self.source.position_ms() {
            let drift = audio_time - self.current_time;

            if drift.abs() > SNAP_THRESHOLD_MS {
                log::debug!("CLOCK: Snapping {:.1}ms of drift", drift);
                self.current_time = audio_time;
            } else if drift.abs() > NUDGE_THRESHOLD_MS {
                self.current_time += drift * NUDGE_FACTOR;
            }
        }
    }

    fn start_audio(&mut self) {
        self.source.play();
        self.audio_playing = true;
    }
}

impl fmt::Debug for AudioClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClock")
            .field("current_time", &self.current_time)
            .field("rate", &self.rate)
            .field("running", &self.running)
            .field("seek_generation", &self.seek_generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeState {
        playing: bool,
        position: Option<f64>,
        seeks: Vec<f64>,
        rate: f64,
    }

    #[derive(Clone, Default)]
    struct FakeSource(Arc<Mutex<FakeState>>);

    impl AudioSource for FakeSource {
        fn play(&mut self) {
            self.0.lock().unwrap().playing = true;
        }
        fn pause(&mut self) {
            self.0.lock().unwrap().playing = false;
        }
        fn seek(&mut self, time_ms: f64) {
            let mut state = self.0.lock().unwrap();
            state.seeks.push(time_ms);
            if state.position.is_some() {
                state.position = Some(time_ms);
            }
        }
        fn set_rate(&mut self, rate: f64) {
            self.0.lock().unwrap().rate = rate;
        }
        fn position_ms(&self) -> Option<f64> {
            self.0.lock().unwrap().position
        }
    }

    #[test]
    fn test_lead_in_starts_audio_at_zero() {
        let fake = FakeSource::default();
        let mut clock = AudioClock::new(Box::new(fake.clone())).with_lead_in(100.0);
        clock.start();
        assert!(!fake.0.lock().unwrap().playing);

        clock.update(0.05);
        assert!((clock.current_time() + 50.0).abs() < 1e-9);
        assert!(!fake.0.lock().unwrap().playing);

        clock.update(0.06);
        assert!(fake.0.lock().unwrap().playing);
    }

    #[test]
    fn test_rate_scales_advancement() {
        let mut clock = AudioClock::silent();
        clock.set_rate(1.5).unwrap();
        clock.start();
        clock.update(0.1);
        assert!((clock.current_time() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let mut clock = AudioClock::silent();
        assert_eq!(clock.set_rate(0.0), Err(ClockError::InvalidRate(0.0)));
        assert!(clock.set_rate(-1.0).is_err());
        assert!(clock.set_rate(f64::NAN).is_err());
        assert_eq!(clock.rate(), 1.0);
    }

    #[test]
    fn test_pause_preserves_time() {
        let mut clock = AudioClock::silent();
        clock.start();
        clock.update(0.25);
        clock.stop();
        clock.update(1.0);
        assert!((clock.current_time() - 250.0).abs() < 1e-9);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_seek_is_idempotent() {
        let fake = FakeSource::default();
        let mut clock = AudioClock::new(Box::new(fake.clone()));
        clock.seek(1200.0);
        clock.seek(1200.0);

        assert_eq!(clock.current_time(), 1200.0);
        assert_eq!(clock.seek_generation(), 1);
        assert_eq!(fake.0.lock().unwrap().seeks, vec![1200.0]);
    }

    #[test]
    fn test_drift_correction() {
        let fake = FakeSource::default();
        fake.0.lock().unwrap().position = Some(0.0);
        let mut clock = AudioClock::new(Box::new(fake.clone()));
        clock.start();

        // Small drift is nudged.
        fake.0.lock().unwrap().position = Some(20.0);
        clock.update(0.0);
        assert!((clock.current_time() - 1.0).abs() < 1e-9);

        // Large drift snaps.
        fake.0.lock().unwrap().position = Some(500.0);
        clock.update(0.0);
        assert_eq!(clock.current_time(), 500.0);
    }

    #[test]
    fn test_beat_time() {
        let points = vec![TimingPoint::new(0.0, 500.0, 4), TimingPoint::new(1000.0, 250.0, 4)];
        let mut clock = AudioClock::silent();
        clock.set_rate(2.0).unwrap();
        assert_eq!(clock.beat_time(&points), 250.0);
        clock.seek(1500.0);
        assert_eq!(clock.beat_time(&points), 125.0);
        assert_eq!(clock.beat_time(&[]), 250.0);
    }
}
