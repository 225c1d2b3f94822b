//! Process-wide gameplay settings, persisted as TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HitWindowMode {
    OsuOD,
    EtternaJudge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Draw beat lines.
    pub timing_lines: bool,
    /// Show the directional cue before a lane switch.
    pub lane_switch_alerts: bool,
    /// Scroll speed multiplier; higher values spread objects further apart.
    pub scroll_speed: f64,
    /// Editor beat snap divisor (4 = quarter beats).
    pub snap_divisor: u32,
    /// Playback rate used for gameplay.
    pub rate: f64,
    pub master_volume: f32, // 0.0 to 1.0
    pub hit_window_mode: HitWindowMode,
    pub hit_window_value: f64, // OD (0.0-10.0) or judge level (1-9)
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            timing_lines: true,
            lane_switch_alerts: true,
            scroll_speed: 3.0,
            snap_divisor: 4,
            rate: 1.0,
            master_volume: 0.5,
            hit_window_mode: HitWindowMode::OsuOD,
            hit_window_value: 5.0,
        }
    }
}

impl GameSettings {
    /// Loads settings, falling back to defaults if the file is missing or invalid.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<GameSettings>(&content) {
                Ok(settings) => settings.sanitized(),
                Err(e) => {
                    log::warn!("SETTINGS: Invalid {:?} ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("SETTINGS: No settings at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, content).map_err(|e| e.to_string())
    }

    /// Clamps values that would break scrolling or timing.
    pub fn sanitized(mut self) -> Self {
        if !self.scroll_speed.is_finite() || self.scroll_speed <= 0.0 {
            self.scroll_speed = Self::default().scroll_speed;
        }
        if !self.rate.is_finite() || self.rate <= 0.0 {
            self.rate = 1.0;
        }
        self.snap_divisor = self.snap_divisor.max(1);
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "timing_lines = false\nscroll_speed = -2.0\n").unwrap();

        let settings = GameSettings::load(&path);
        assert!(!settings.timing_lines);
        assert!(settings.lane_switch_alerts);
        assert_eq!(settings.scroll_speed, 3.0);
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("settings.toml");

        let settings = GameSettings {
            snap_divisor: 8,
            hit_window_mode: HitWindowMode::EtternaJudge,
            ..GameSettings::default()
        };
        settings.save(&path).unwrap();

        assert_eq!(GameSettings::load(&path), settings);
    }

    #[test]
    fn test_missing_file() {
        let settings = GameSettings::load(Path::new("/nonexistent/settings.toml"));
        assert_eq!(settings, GameSettings::default());
    }
}
