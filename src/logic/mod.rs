//! Logic thread module.
//!
//! The logic thread owns the play session. It runs the engine at a fixed
//! tick rate and talks to the rest of the program only through the bus.

pub mod audio;
pub mod audio_thread;
pub mod clock;

use crate::state::GameEngine;
use crate::system::bus::{AudioCommand, SystemBus, SystemEvent};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Target ticks per second for the logic thread.
const TPS: u64 = 200;

/// Spawns the logic thread that drives `engine` until the map ends or a
/// quit event arrives.
///
/// Every tick it:
/// 1. Processes gameplay actions
/// 2. Handles system events (focus, quit)
/// 3. Updates the engine at a fixed rate
/// 4. Sends a snapshot if anything was updated
///
/// The final result goes out on `result_tx` when the map finishes.
pub fn start_thread(bus: SystemBus, mut engine: GameEngine) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("Logic Thread".to_string())
        .spawn(move || {
            log::info!("LOGIC: Thread started");
            engine.start();

            let mut accumulator = Duration::new(0, 0);
            let mut last_time = Instant::now();
            let target_dt = Duration::from_secs_f64(1.0 / TPS as f64);

            loop {
                // 1. Process gameplay actions
                while let Ok(action) = bus.action_rx.try_recv() {
                    engine.handle_input(action);
                }

                // 2. Handle system events
                while let Ok(sys_evt) = bus.sys_rx.try_recv() {
                    match sys_evt {
                        SystemEvent::Quit => {
                            log::info!("LOGIC: Quit received...");
                            let _ = bus.audio_cmd_tx.send(AudioCommand::Shutdown);
                            return;
                        }
                        SystemEvent::FocusLost => {
                            if !engine.is_paused() {
                                engine.toggle_pause();
                            }
                        }
                        SystemEvent::FocusGained => {}
                    }
                }

                // 3. Fixed-timestep update loop
                let current_time = Instant::now();
                accumulator += current_time - last_time;
                last_time = current_time;

                let mut loops = 0;
                while accumulator >= target_dt && loops < 10 {
                    engine.update(target_dt.as_secs_f64());
                    accumulator -= target_dt;
                    loops += 1;
                }

                // 4. Snapshots only for new ticks
                if loops > 0 {
                    let _ = bus.render_tx.try_send(engine.get_snapshot());
                }

                if engine.is_finished() {
                    let result = engine.result();
                    log::info!(
                        "LOGIC: Map finished, score {} ({:.2}%)",
                        result.score,
                        result.accuracy
                    );
                    let _ = bus.result_tx.send(result);
                    let _ = bus.audio_cmd_tx.send(AudioCommand::Shutdown);
                    return;
                }

                if loops == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        })
}
