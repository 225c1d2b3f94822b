//! Audio manager that sends commands to the dedicated audio thread.
//!
//! This module provides a thread-safe interface for controlling audio playback
//! without blocking the main game loop.

use crate::logic::clock::AudioSource;
use crate::system::bus::{AudioCommand, SystemBus};
use crossbeam_channel::Sender;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Wrapper for sending commands to the audio thread.
///
/// The `AudioManager` does not perform audio operations directly.
/// Instead, it sends commands through a channel to a dedicated audio thread,
/// ensuring non-blocking audio control from the game logic thread.
pub struct AudioManager {
    cmd_tx: Sender<AudioCommand>,
    position: Arc<AtomicU64>,
    sample_rate: Arc<AtomicU64>,
    channels: Arc<AtomicU64>,
    ready: Arc<AtomicBool>,
    pending_seeks: Arc<AtomicU64>,
}

impl AudioManager {
    /// Creates a new audio manager connected to the system bus.
    pub fn new(bus: &SystemBus) -> Self {
        Self {
            cmd_tx: bus.audio_cmd_tx.clone(),
            position: bus.audio_position.clone(),
            sample_rate: bus.audio_sample_rate.clone(),
            channels: bus.audio_channels.clone(),
            ready: bus.audio_ready.clone(),
            pending_seeks: bus.audio_pending_seeks.clone(),
        }
    }

    /// Loads an audio file for playback.
    pub fn load_music(&mut self, path: &Path) {
        self.ready.store(false, Ordering::Relaxed);
        let _ = self.cmd_tx.send(AudioCommand::Load {
            path: path.to_path_buf(),
        });
    }

    /// Sets the master volume (0.0 to 1.0).
    pub fn set_volume(&mut self, volume: f32) {
        let _ = self.cmd_tx.send(AudioCommand::SetVolume { volume });
    }

    /// Returns the current playback position in seconds.
    ///
    /// The position is calculated from the sample count shared atomically
    /// with the audio thread.
    pub fn get_position_seconds(&self) -> f64 {
        let samples = self.position.load(Ordering::Relaxed) as f64;
        let sample_rate = self.sample_rate.load(Ordering::Relaxed).max(1) as f64;
        let channels = self.channels.load(Ordering::Relaxed).max(1) as f64;

        samples / (sample_rate * channels)
    }
}

impl AudioSource for AudioManager {
    fn play(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Play);
    }

    fn pause(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Pause);
    }

    /// Non-blocking; the audio thread decrements the pending counter once
    /// the seek has been applied.
    fn seek(&mut self, time_ms: f64) {
        let position_secs = (time_ms / 1000.0).max(0.0) as f32;
        self.pending_seeks.fetch_add(1, Ordering::Relaxed);
        if self
            .cmd_tx
            .send(AudioCommand::Seek { position_secs })
            .is_err()
        {
            self.pending_seeks.fetch_sub(1, Ordering::Relaxed);
        }
    }

    fn set_rate(&mut self, rate: f64) {
        let _ = self.cmd_tx.send(AudioCommand::SetSpeed { speed: rate as f32 });
    }

    fn position_ms(&self) -> Option<f64> {
        self.ready
            .load(Ordering::Relaxed)
            .then(|| self.get_position_seconds() * 1000.0)
    }

    fn is_seeking(&self) -> bool {
        self.pending_seeks.load(Ordering::Relaxed) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_hidden_until_ready() {
        let bus = SystemBus::new();
        let manager = AudioManager::new(&bus);
        assert_eq!(manager.position_ms(), None);

        bus.audio_sample_rate.store(1000, Ordering::Relaxed);
        bus.audio_channels.store(2, Ordering::Relaxed);
        bus.audio_position.store(3000, Ordering::Relaxed);
        bus.audio_ready.store(true, Ordering::Relaxed);
        assert_eq!(manager.position_ms(), Some(1500.0));
    }

    #[test]
    fn test_seek_is_pending_until_applied() {
        let bus = SystemBus::new();
        let mut manager = AudioManager::new(&bus);
        manager.seek(2500.0);

        assert!(manager.is_seeking());
        match bus.audio_cmd_rx.try_recv().unwrap() {
            AudioCommand::Seek { position_secs } => assert_eq!(position_secs, 2.5),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
