//! Raw sqlx query helpers.

use crate::database::models::{NewScore, ScoreRecord};
use sqlx::SqlitePool;

pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS score (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chart_hash TEXT NOT NULL,
            player TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            score INTEGER NOT NULL,
            accuracy REAL NOT NULL,
            max_combo INTEGER NOT NULL,
            rate REAL NOT NULL DEFAULT 1.0,
            marv INTEGER NOT NULL DEFAULT 0,
            perfect INTEGER NOT NULL DEFAULT 0,
            great INTEGER NOT NULL DEFAULT 0,
            good INTEGER NOT NULL DEFAULT 0,
            bad INTEGER NOT NULL DEFAULT 0,
            miss INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS score_chart ON score (chart_hash)")
        .execute(pool)
        .await?;
    Ok(())
}

/// Inserts a score and returns its row id.
pub async fn insert_score(pool: &SqlitePool, score: &NewScore<'_>) -> Result<i64, sqlx::Error> {
    let [marv, perfect, great, good, bad, miss] = score.judgements;
    let result = sqlx::query(
        "INSERT INTO score (chart_hash, player, timestamp, score, accuracy, max_combo, rate, marv, perfect, great, good, bad, miss)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )
    .bind(score.chart_hash)
    .bind(score.player)
    .bind(score.timestamp)
    .bind(score.score)
    .bind(score.accuracy)
    .bind(score.max_combo)
    .bind(score.rate)
    .bind(marv)
    .bind(perfect)
    .bind(great)
    .bind(good)
    .bind(bad)
    .bind(miss)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Every score set on a chart, best first.
pub async fn scores_for_chart(
    pool: &SqlitePool,
    chart_hash: &str,
) -> Result<Vec<ScoreRecord>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, chart_hash, player, timestamp, score, accuracy, max_combo, rate, marv, perfect, great, good, bad, miss
         FROM score WHERE chart_hash = ?1 ORDER BY score DESC, timestamp ASC",
    )
    .bind(chart_hash)
    .fetch_all(pool)
    .await
}

pub async fn delete_score(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM score WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
