//! Rows of the SQLite tables.

use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ScoreRecord {
    pub id: i64,
    /// Content hash of the chart the score was set on.
    pub chart_hash: String,
    pub player: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub score: i64,
    pub accuracy: f64,
    pub max_combo: i64,
    pub rate: f64,
    pub marv: i64,
    pub perfect: i64,
    pub great: i64,
    pub good: i64,
    pub bad: i64,
    pub miss: i64,
}

/// A score about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScore<'a> {
    pub chart_hash: &'a str,
    pub player: &'a str,
    pub timestamp: i64,
    pub score: i64,
    pub accuracy: f64,
    pub max_combo: i64,
    pub rate: f64,
    /// Marv, perfect, great, good, bad, miss.
    pub judgements: [i64; 6],
}
