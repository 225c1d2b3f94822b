//! Hit timing tolerances.

use crate::models::settings::HitWindowMode;
use crate::models::stats::Judgement;

const GRADES: [Judgement; 5] = [
    Judgement::Marv,
    Judgement::Perfect,
    Judgement::Great,
    Judgement::Good,
    Judgement::Bad,
];

/// Minimum held share for each grade of an early long-note release.
const HOLD_GRADES: [(f64, Judgement); 5] = [
    (0.9, Judgement::Marv),
    (0.8, Judgement::Perfect),
    (0.6, Judgement::Great),
    (0.4, Judgement::Good),
    (0.2, Judgement::Bad),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitWindow {
    /// Largest offset, in ms, for each entry of `GRADES`.
    bands: [f64; 5],
    /// Offsets beyond this are not matched to any object.
    pub miss_ms: f64,
}

impl HitWindow {
    pub fn new() -> Self {
        Self {
            bands: [16.0, 50.0, 65.0, 100.0, 150.0],
            miss_ms: 200.0,
        }
    }

    /// osu!mania windows for overall difficulty `od`.
    fn osu(od: f64) -> Self {
        let shrink = 3.0 * od;
        Self {
            bands: [
                16.0,
                64.0 - shrink,
                97.0 - shrink,
                127.0 - shrink,
                151.0 - shrink,
            ],
            miss_ms: 188.0 - shrink,
        }
    }

    /// Etterna windows for judge level `judge`; J4 is unscaled.
    fn etterna(judge: u8) -> Self {
        let scale = if judge == 9 {
            0.2
        } else {
            1.0 - (judge as f64 - 4.0) / 6.0
        };
        Self {
            bands: [
                22.5 * scale,
                45.0 * scale,
                90.0 * scale,
                135.0 * scale,
                (180.0 * scale).max(180.0),
            ],
            miss_ms: 500.0,
        }
    }

    pub fn from_settings(mode: HitWindowMode, value: f64) -> Self {
        match mode {
            HitWindowMode::OsuOD => Self::osu(value.clamp(0.0, 10.0)),
            HitWindowMode::EtternaJudge => Self::etterna(value.clamp(1.0, 9.0) as u8),
        }
    }

    /// Late edge of the `Bad` band.
    pub fn bad_ms(&self) -> f64 {
        self.bands[4]
    }

    /// Grades a press `offset_ms` away from its object. Presses outside the
    /// miss window are ghost taps.
    pub fn judge(&self, offset_ms: f64) -> Judgement {
        let distance = offset_ms.abs();
        if distance > self.miss_ms {
            return Judgement::GhostTap;
        }

        GRADES
            .into_iter()
            .zip(self.bands)
            .find(|(_, bound)| distance <= *bound)
            .map_or(Judgement::Miss, |(grade, _)| grade)
    }

    /// Grades a long note released early from the share of it that was held.
    pub fn judge_hold_ratio(hold_ratio: f64) -> Judgement {
        HOLD_GRADES
            .into_iter()
            .find(|(min, _)| hold_ratio >= *min)
            .map_or(Judgement::Miss, |(_, grade)| grade)
    }
}

impl Default for HitWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judge_bands() {
        let window = HitWindow::new();
        assert_eq!(window.judge(10.0), Judgement::Marv);
        assert_eq!(window.judge(-60.0), Judgement::Great);
        assert_eq!(window.judge(180.0), Judgement::Miss);
        assert_eq!(window.judge(250.0), Judgement::GhostTap);
    }

    #[test]
    fn test_osu_windows_shrink_with_od() {
        let window = HitWindow::from_settings(HitWindowMode::OsuOD, 10.0);
        assert_eq!(window.judge(30.0), Judgement::Perfect);
        assert_eq!(window.judge(40.0), Judgement::Great);
        assert_eq!(window.judge(160.0), Judgement::GhostTap);
    }

    #[test]
    fn test_etterna_bad_floor() {
        let window = HitWindow::from_settings(HitWindowMode::EtternaJudge, 9.0);
        assert_eq!(window.bad_ms(), 180.0);
        assert_eq!(window.judge(4.0), Judgement::Marv);
        assert_eq!(window.judge(5.0), Judgement::Perfect);
        assert_eq!(window.judge(179.0), Judgement::Bad);
    }

    #[test]
    fn test_hold_ratio() {
        assert_eq!(HitWindow::judge_hold_ratio(0.95), Judgement::Marv);
        assert_eq!(HitWindow::judge_hold_ratio(0.5), Judgement::Good);
        assert_eq!(HitWindow::judge_hold_ratio(0.1), Judgement::Miss);
    }
}
