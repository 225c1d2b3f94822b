use crate::database::models::{NewScore, ScoreRecord};
use crate::database::query;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::path::{Path, PathBuf};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the database, creating the file and tables if needed.
    pub async fn new(db_path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
            }
        }

        let absolute_path = if db_path.is_absolute() {
            db_path.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(db_path)
        };

        let options = SqliteConnectOptions::new()
            .filename(&absolute_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;
        query::create_tables(&pool).await?;
        log::debug!("DB: Opened {:?}", absolute_path);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_score(&self, score: &NewScore<'_>) -> Result<i64, sqlx::Error> {
        query::insert_score(&self.pool, score).await
    }

    pub async fn scores_for_chart(&self, chart_hash: &str) -> Result<Vec<ScoreRecord>, sqlx::Error> {
        query::scores_for_chart(&self.pool, chart_hash).await
    }

    pub async fn delete_score(&self, id: i64) -> Result<bool, sqlx::Error> {
        query::delete_score(&self.pool, id).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score<'a>(hash: &'a str, value: i64, timestamp: i64) -> NewScore<'a> {
        NewScore {
            chart_hash: hash,
            player: "Player",
            timestamp,
            score: value,
            accuracy: 95.0,
            max_combo: 100,
            rate: 1.0,
            judgements: [90, 5, 3, 1, 0, 1],
        }
    }

    #[tokio::test]
    async fn test_scores_for_chart() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("nested/scores.db")).await.unwrap();

        db.insert_score(&score("a", 500, 1)).await.unwrap();
        db.insert_score(&score("a", 900, 2)).await.unwrap();
        db.insert_score(&score("b", 700, 3)).await.unwrap();

        let scores = db.scores_for_chart("a").await.unwrap();
        let values: Vec<i64> = scores.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![900, 500]);
        assert_eq!(scores[0].marv, 90);
        assert_eq!(scores[0].miss, 1);

        assert!(db.delete_score(scores[0].id).await.unwrap());
        assert!(!db.delete_score(scores[0].id).await.unwrap());
        assert_eq!(db.scores_for_chart("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_scores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.db");

        let db = Database::new(&path).await.unwrap();
        db.insert_score(&score("a", 1, 1)).await.unwrap();
        db.close().await;

        let db = Database::new(&path).await.unwrap();
        assert_eq!(db.scores_for_chart("a").await.unwrap().len(), 1);
    }
}
