//! Shared channel infrastructure between system threads.
//!
//! The `SystemBus` is the only way threads talk to each other: the logic
//! thread owns every piece of gameplay state, the audio and worker threads
//! only ever see messages and atomics.

use crate::shared::messages::GameAction;
use crate::shared::snapshot::{GameResult, GameplaySnapshot};
use crate::system::notifications::Notification;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

/// System-level events for the logic thread.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Window or terminal lost focus; gameplay pauses.
    FocusLost,
    FocusGained,
    /// Shutdown requested.
    Quit,
}

/// Commands sent to the dedicated audio thread.
#[derive(Debug, Clone)]
pub enum AudioCommand {
    /// Load an audio file for playback.
    Load { path: PathBuf },
    /// Start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Stop and reset playback position.
    Stop,
    /// Seek to a position (in seconds).
    Seek { position_secs: f32 },
    /// Change playback speed.
    SetSpeed { speed: f32 },
    /// Change volume level.
    SetVolume { volume: f32 },
    /// Stop the audio thread.
    Shutdown,
}

/// Aggregates the cross-thread communication channels.
#[derive(Clone)]
pub struct SystemBus {
    /// Main → Logic: gameplay actions.
    pub action_tx: Sender<GameAction>,
    pub action_rx: Receiver<GameAction>,

    /// Logic → Main: per-tick snapshots.
    pub render_tx: Sender<GameplaySnapshot>,
    pub render_rx: Receiver<GameplaySnapshot>,

    /// Logic → Main: final results of a finished session.
    pub result_tx: Sender<GameResult>,
    pub result_rx: Receiver<GameResult>,

    /// Main → Logic: system events.
    pub sys_tx: Sender<SystemEvent>,
    pub sys_rx: Receiver<SystemEvent>,

    /// Any thread → Main: user-visible messages.
    pub notify_tx: Sender<Notification>,
    pub notify_rx: Receiver<Notification>,

    /// Logic → Audio: audio commands.
    pub audio_cmd_tx: Sender<AudioCommand>,
    pub audio_cmd_rx: Receiver<AudioCommand>,

    /// Shared audio position in samples.
    /// Written by the audio thread, read by the logic thread.
    pub audio_position: Arc<AtomicU64>,

    /// Current audio sample rate.
    pub audio_sample_rate: Arc<AtomicU64>,

    /// Number of audio channels.
    pub audio_channels: Arc<AtomicU64>,

    /// Set once a track is decoded and attached to an output device.
    pub audio_ready: Arc<AtomicBool>,

    /// Seeks sent to the audio thread and not yet applied.
    pub audio_pending_seeks: Arc<AtomicU64>,
}

impl SystemBus {
    /// Creates a new system bus with all channels initialized.
    pub fn new() -> Self {
        let (action_tx, action_rx) = unbounded();

        // Bounded render channel: max 2 frames queued to limit latency
        let (render_tx, render_rx) = bounded(2);

        let (result_tx, result_rx) = unbounded();
        let (sys_tx, sys_rx) = unbounded();
        let (notify_tx, notify_rx) = unbounded();
        let (audio_cmd_tx, audio_cmd_rx) = unbounded();

        Self {
            action_tx,
            action_rx,
            render_tx,
            render_rx,
            result_tx,
            result_rx,
            sys_tx,
            sys_rx,
            notify_tx,
            notify_rx,
            audio_cmd_tx,
            audio_cmd_rx,
            audio_position: Arc::new(AtomicU64::new(0)),
            audio_sample_rate: Arc::new(AtomicU64::new(44100)),
            audio_channels: Arc::new(AtomicU64::new(2)),
            audio_ready: Arc::new(AtomicBool::new(false)),
            audio_pending_seeks: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}
