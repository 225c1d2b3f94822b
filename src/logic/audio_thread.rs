//! Dedicated audio thread.
//!
//! Decoding and seeking happen here so they never stall the logic thread.
//! Every sample handed to the output device bumps `SystemBus::audio_position`,
//! which is what `AudioClock` resynchronises against.

use crate::system::bus::{AudioCommand, SystemBus};
use crate::system::notifications::Notifier;
use rodio::source::SkipDuration;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
enum LoadError {
    Open(std::io::Error),
    Decode(rodio::decoder::DecoderError),
    Sink(rodio::PlayError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Open(e) => write!(f, "cannot open file: {}", e),
            LoadError::Decode(e) => write!(f, "cannot decode file: {}", e),
            LoadError::Sink(e) => write!(f, "cannot create sink: {}", e),
        }
    }
}

/// Interleaved sample count for `secs` of audio.
fn samples_for(secs: f32, sample_rate: u32, channels: u16) -> u64 {
    (secs.max(0.0) as f64 * sample_rate as f64 * channels as f64) as u64
}

type Track = SampleCounter<SkipDuration<Decoder<BufReader<File>>>>;

struct AudioWorker {
    bus: SystemBus,
    notifier: Notifier,
    /// `None` when no output device exists; commands are then accepted and
    /// ignored.
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    track: Option<PathBuf>,
    speed: f32,
    volume: f32,
}

impl AudioWorker {
    fn new(bus: SystemBus) -> Self {
        let output = match OutputStream::try_default() {
            Ok(output) => {
                log::info!("AUDIO: Device found, audio enabled");
                Some(output)
            }
            Err(e) => {
                log::warn!("AUDIO: No audio device found ({}), running silent", e);
                None
            }
        };

        Self {
            notifier: Notifier::new(bus.notify_tx.clone()),
            bus,
            output,
            sink: None,
            track: None,
            speed: 1.0,
            volume: 1.0,
        }
    }

    fn handle_command(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Load { path } => {
                self.track = Some(path);
                self.open_at(0.0);
            }
            AudioCommand::Play => self.with_sink(Sink::play),
            AudioCommand::Pause => self.with_sink(Sink::pause),
            AudioCommand::Stop => {
                self.drop_sink();
                self.bus.audio_position.store(0, Ordering::Relaxed);
            }
            AudioCommand::Seek { position_secs } => {
                let was_playing = self.sink.as_ref().is_some_and(|s| !s.is_paused());
                self.open_at(position_secs);
                if was_playing {
                    self.with_sink(Sink::play);
                }
                let _ = self.bus.audio_pending_seeks.fetch_update(
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                    |n| Some(n.saturating_sub(1)),
                );
                log::debug!("AUDIO: Seeked to {:.1}s", position_secs);
            }
            AudioCommand::SetSpeed { speed } => {
                self.speed = speed;
                self.with_sink(|s| s.set_speed(speed));
            }
            AudioCommand::SetVolume { volume } => {
                self.volume = volume;
                self.with_sink(|s| s.set_volume(volume));
            }
            AudioCommand::Shutdown => self.drop_sink(),
        }
    }

    fn with_sink(&self, f: impl FnOnce(&Sink)) {
        if let Some(sink) = &self.sink {
            f(sink);
        }
    }

    fn drop_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.bus.audio_ready.store(false, Ordering::Relaxed);
    }

    /// Rebuilds the sink for the current track, paused at `position_secs`.
    ///
    /// The file is decoded even without an output device so a bad track is
    /// reported either way.
    fn open_at(&mut self, position_secs: f32) {
        self.drop_sink();

        let Some(path) = self.track.clone() else {
            return;
        };

        let track = match Self::decode(&path, position_secs, &self.bus) {
            Ok(track) => track,
            Err(e) => {
                log::error!("AUDIO: {:?}: {}", path, e);
                self.notifier.post_error(format!("Failed to load audio: {}", e));
                return;
            }
        };

        let Some((_, handle)) = &self.output else {
            return;
        };

        match Sink::try_new(handle) {
            Ok(sink) => {
                sink.append(track);
                sink.set_speed(self.speed);
                sink.set_volume(self.volume);
                sink.pause();
                self.sink = Some(sink);
                self.bus.audio_ready.store(true, Ordering::Relaxed);
                log::info!("AUDIO: Loaded {:?} at {:.1}s", path, position_secs);
            }
            Err(e) => {
                let e = LoadError::Sink(e);
                log::error!("AUDIO: {:?}: {}", path, e);
                self.notifier.post_error(format!("Failed to load audio: {}", e));
            }
        }
    }

    /// Decodes `path` from `position_secs` and points the bus counters at it.
    fn decode(path: &Path, position_secs: f32, bus: &SystemBus) -> Result<Track, LoadError> {
        let file = File::open(path).map_err(LoadError::Open)?;
        let source = Decoder::new(BufReader::new(file)).map_err(LoadError::Decode)?;

        let sample_rate = source.sample_rate();
        let channels = source.channels();
        bus.audio_sample_rate
            .store(sample_rate as u64, Ordering::Relaxed);
        bus.audio_channels.store(channels as u64, Ordering::Relaxed);
        bus.audio_position.store(
            samples_for(position_secs, sample_rate, channels),
            Ordering::Relaxed,
        );

        Ok(SampleCounter {
            inner: source.skip_duration(Duration::from_secs_f32(position_secs.max(0.0))),
            played: bus.audio_position.clone(),
        })
    }
}

/// Passes samples through, counting each one.
struct SampleCounter<I> {
    inner: I,
    played: Arc<AtomicU64>,
}

impl<I: Iterator> Iterator for SampleCounter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()?;
        self.played.fetch_add(1, Ordering::Relaxed);
        Some(sample)
    }
}

impl<I> Source for SampleCounter<I>
where
    I: Source,
    I::Item: rodio::Sample,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

/// Starts the audio thread. It runs until `AudioCommand::Shutdown`.
pub fn start_audio_thread(bus: SystemBus) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("Audio Thread".to_string())
        .spawn(move || {
            log::info!("AUDIO: Thread started");

            let commands = bus.audio_cmd_rx.clone();
            let mut worker = AudioWorker::new(bus);

            while let Ok(cmd) = commands.recv() {
                let shutdown = matches!(cmd, AudioCommand::Shutdown);
                worker.handle_command(cmd);
                if shutdown {
                    break;
                }
            }

            log::info!("AUDIO: Thread stopped");
        })
}
