//! Application entry point and thread bootstrapper.
//!
//! Usage:
//!   lanefall <chart.json> [--autoplay]   play a chart headless
//!   lanefall scores <chart.json>         list local scores

use crossbeam_channel::select;
use lanefall::logic::{self, audio_thread};
use lanefall::models::chart::{Chart, storage};
use lanefall::models::settings::GameSettings;
use lanefall::shared::snapshot::GameResult;
use lanefall::state::GameEngine;
use lanefall::state::select::{LocalScores, ScoreList, SelectedMap};
use lanefall::system::bus::SystemBus;
use lanefall::system::notifications::Notifier;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const SETTINGS_PATH: &str = "settings.toml";
const SCORES_DB_PATH: &str = "scores.db";
const PLAYER_NAME: &str = "Player";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("MAIN: Booting lanefall...");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let autoplay = args.iter().any(|a| a == "--autoplay");
    let positional: Vec<&str> = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    let outcome = match positional.as_slice() {
        ["scores", chart] => list_scores(Path::new(chart)),
        [chart] => play(Path::new(chart), autoplay),
        _ => {
            eprintln!("usage: lanefall <chart.json> [--autoplay] | lanefall scores <chart.json>");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("MAIN: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn play(chart_path: &Path, autoplay: bool) -> Result<(), String> {
    let settings = GameSettings::load(Path::new(SETTINGS_PATH));
    let chart = Chart::load(chart_path).map_err(|e| format!("Failed to load chart: {}", e))?;
    let chart_dir = chart_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let bus = SystemBus::new();
    let audio_handle = audio_thread::start_audio_thread(bus.clone())
        .map_err(|e| format!("Failed to spawn audio thread: {}", e))?;

    let mut engine = GameEngine::with_audio(&bus, chart, &chart_dir, &settings)
        .map_err(|e| format!("Failed to start session: {}", e))?;
    if autoplay {
        engine.enable_autoplay();
    }
    let hash = engine.chart_hash().to_string();

    let logic_handle = logic::start_thread(bus.clone(), engine)
        .map_err(|e| format!("Failed to spawn logic thread: {}", e))?;

    let result = run_session(&bus);

    let _ = logic_handle.join();
    let _ = audio_handle.join();

    if let Some(result) = result {
        if autoplay {
            log::info!("MAIN: Autoplay score not saved");
        } else {
            let notifier = Notifier::new(bus.notify_tx.clone());
            save_result(&LocalScores::new(SCORES_DB_PATH), &result, &notifier);
        }
    }
    for notification in bus.notify_rx.try_iter() {
        println!("{}", notification);
    }

    print_scores(&hash);
    Ok(())
}

/// Follows the session from the main thread until a result arrives.
fn run_session(bus: &SystemBus) -> Option<GameResult> {
    let mut last_logged_second = i64::MIN;

    loop {
        select! {
            recv(bus.render_rx) -> msg => {
                let Ok(snapshot) = msg else { return None };
                let second = (snapshot.audio_time / 1000.0).floor() as i64;
                if second != last_logged_second {
                    last_logged_second = second;
                    log::info!(
                        "MAIN: {:>7.0}ms  {} lanes  score {}  combo {}  {:.2}%",
                        snapshot.audio_time,
                        snapshot.lane_count,
                        snapshot.score,
                        snapshot.combo,
                        snapshot.accuracy
                    );
                }
                if let Some(cue) = snapshot.lane_switch_cue {
                    log::debug!("MAIN: Lane switch {} -> {}", cue.from, cue.to);
                }
            }
            recv(bus.notify_rx) -> msg => {
                if let Ok(notification) = msg {
                    println!("{}", notification);
                }
            }
            recv(bus.result_rx) -> msg => {
                return msg.ok();
            }
            default(Duration::from_secs(1)) => {}
        }
    }
}

fn save_result(scores: &LocalScores, result: &GameResult, notifier: &Notifier) -> Option<i64> {
    match scores.record(result, PLAYER_NAME) {
        Ok(id) => {
            notifier.post("Score saved!");
            Some(id)
        }
        Err(e) => {
            log::error!("MAIN: Failed to save score: {}", e);
            notifier.post_error(format!("Failed to save score: {}", e));
            None
        }
    }
}

fn list_scores(chart_path: &Path) -> Result<(), String> {
    let chart = Chart::load(chart_path).map_err(|e| format!("Failed to load chart: {}", e))?;
    let json = chart.to_json().map_err(|e| e.to_string())?;
    print_scores(&storage::chart_hash(&json));
    Ok(())
}

fn print_scores(hash: &str) {
    let provider = LocalScores::new(PathBuf::from(SCORES_DB_PATH));
    let mut list = ScoreList::new(Arc::new(provider));
    list.set_map(SelectedMap {
        hash: hash.to_string(),
        online_id: None,
    });

    while list.is_loading() {
        list.poll();
        std::thread::sleep(Duration::from_millis(5));
    }

    if let Some(status) = list.status() {
        println!("{}", status);
    }
    for entry in list.scores() {
        println!(
            "#{:<3} {:<12} {:>8}  {:>6.2}%  {}x  {:.2}x",
            entry.place, entry.player, entry.score, entry.accuracy, entry.max_combo, entry.rate
        );
    }
}
