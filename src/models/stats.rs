//! Hit statistics and judgement types.
//!
//! This module defines the judgement system used for scoring,
//! including accuracy calculation and hit statistics tracking.

use serde::{Deserialize, Serialize};

/// Hit judgement types from best to worst. Ordering follows the same
/// direction, so the worse of two judgements is their `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Judgement {
    /// Perfect timing (best).
    Marv,
    /// Excellent timing.
    Perfect,
    /// Good timing.
    Great,
    /// Acceptable timing.
    Good,
    /// Poor timing.
    Bad,
    /// Missed note.
    Miss,
    /// Key press without a note (not counted as miss).
    GhostTap,
}

impl Judgement {
    /// Score awarded for this judgement.
    pub fn score_value(self) -> u32 {
        match self {
            Judgement::Marv | Judgement::Perfect => 300,
            Judgement::Great => 200,
            Judgement::Good => 100,
            Judgement::Bad => 50,
            Judgement::Miss | Judgement::GhostTap => 0,
        }
    }

    /// Returns `true` if the judgement keeps the combo going.
    pub fn continues_combo(self) -> bool {
        !matches!(self, Judgement::Miss | Judgement::GhostTap)
    }
}

/// Accumulated hit statistics for a play session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HitStats {
    pub marv: u32,
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
    pub ghost_tap: u32,
}

impl HitStats {
    /// Creates empty hit statistics.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, judgement: Judgement) {
        match judgement {
            Judgement::Marv => self.marv += 1,
            Judgement::Perfect => self.perfect += 1,
            Judgement::Great => self.great += 1,
            Judgement::Good => self.good += 1,
            Judgement::Bad => self.bad += 1,
            Judgement::Miss => self.miss += 1,
            Judgement::GhostTap => self.ghost_tap += 1,
        }
    }

    /// Number of judged notes (ghost taps excluded).
    pub fn judged(&self) -> u32 {
        self.marv + self.perfect + self.great + self.good + self.bad + self.miss
    }

    /// Calculates accuracy percentage (0-100).
    ///
    /// Uses a weighted formula:
    /// - Marv/Perfect: 100% weight (6 points)
    /// - Great: 66.7% weight (4 points)
    /// - Good: 33.3% weight (2 points)
    /// - Bad: 16.7% weight (1 point)
    /// - Miss: 0% weight (0 points)
    pub fn calculate_accuracy(&self) -> f64 {
        let total = self.judged() as f64;

        if total == 0.0 {
            return 0.0;
        }

        let score = (self.marv + self.perfect) as f64 * 6.0
            + self.great as f64 * 4.0
            + self.good as f64 * 2.0
            + self.bad as f64;

        (score / (total * 6.0)) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        let mut stats = HitStats::new();
        assert_eq!(stats.calculate_accuracy(), 0.0);

        stats.record(Judgement::Marv);
        stats.record(Judgement::Miss);
        stats.record(Judgement::GhostTap);

        assert_eq!(stats.judged(), 2);
        assert_eq!(stats.calculate_accuracy(), 50.0);
    }
}
