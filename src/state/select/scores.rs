//! Leaderboard for the selected map.
//!
//! Scores are fetched on a background thread. Each fetch carries a
//! cancellation token; selecting another map cancels the previous token, and
//! `ScoreList::poll` drops any reply whose token was cancelled, so a slow
//! fetch never overwrites a newer one.

use crate::database::Database;
use crate::database::models::{NewScore, ScoreRecord};
use crate::shared::snapshot::GameResult;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreListType {
    Local,
    Global,
    Country,
    Friends,
}

impl fmt::Display for ScoreListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreListType::Local => "Local",
            ScoreListType::Global => "Global",
            ScoreListType::Country => "Country",
            ScoreListType::Friends => "Friends",
        };
        f.write_str(name)
    }
}

/// The map whose scores are listed.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedMap {
    pub hash: String,
    /// `None` for maps that were never submitted online.
    pub online_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    /// 1-based rank, set once the list is sorted.
    pub place: usize,
    pub player: String,
    pub score: i64,
    pub accuracy: f64,
    pub max_combo: i64,
    pub rate: f64,
    pub timestamp: i64,
    /// Local database row, for scores the player may delete.
    pub record_id: Option<i64>,
}

impl From<ScoreRecord> for ScoreEntry {
    fn from(record: ScoreRecord) -> Self {
        Self {
            place: 0,
            player: record.player,
            score: record.score,
            accuracy: record.accuracy,
            max_combo: record.max_combo,
            rate: record.rate,
            timestamp: record.timestamp,
            record_id: Some(record.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFetchError {
    NotSubmitted,
    Unavailable(ScoreListType),
    Failed(String),
}

impl fmt::Display for ScoreFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreFetchError::NotSubmitted => write!(f, "This map is not submitted online!"),
            ScoreFetchError::Unavailable(kind) => {
                write!(f, "{} leaderboards are not available yet!", kind)
            }
            ScoreFetchError::Failed(_) => write!(f, "Something went wrong!"),
        }
    }
}

impl std::error::Error for ScoreFetchError {}

/// A source of scores. `fetch` is called on a background thread.
pub trait ScoreProvider: Send + Sync {
    fn fetch(&self, map: &SelectedMap) -> Result<Vec<ScoreEntry>, ScoreFetchError>;

    /// Removes a stored score. Returns `false` if there was no such score or
    /// the provider is read-only.
    fn delete(&self, _record_id: i64) -> Result<bool, ScoreFetchError> {
        Ok(false)
    }
}

fn rank(scores: &mut [ScoreEntry]) {
    for (i, entry) in scores.iter_mut().enumerate() {
        entry.place = i + 1;
    }
}

struct FetchReply {
    token: Arc<AtomicBool>,
    result: Result<Vec<ScoreEntry>, ScoreFetchError>,
}

pub struct ScoreList {
    list_type: ScoreListType,
    local: Arc<dyn ScoreProvider>,
    online: Option<Arc<dyn ScoreProvider>>,

    map: Option<SelectedMap>,
    token: Option<Arc<AtomicBool>>,
    reply_tx: Sender<FetchReply>,
    reply_rx: Receiver<FetchReply>,

    scores: Vec<ScoreEntry>,
    status: Option<String>,
    loading: bool,
}

impl ScoreList {
    pub fn new(local: Arc<dyn ScoreProvider>) -> Self {
        let (reply_tx, reply_rx) = unbounded();
        Self {
            list_type: ScoreListType::Local,
            local,
            online: None,
            map: None,
            token: None,
            reply_tx,
            reply_rx,
            scores: Vec::new(),
            status: None,
            loading: false,
        }
    }

    pub fn with_online(mut self, online: Arc<dyn ScoreProvider>) -> Self {
        self.online = Some(online);
        self
    }

    pub fn list_type(&self) -> ScoreListType {
        self.list_type
    }

    pub fn scores(&self) -> &[ScoreEntry] {
        &self.scores
    }

    /// Text shown in place of the list, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_type(&mut self, list_type: ScoreListType) {
        if self.list_type == list_type {
            return;
        }
        self.list_type = list_type;
        self.refresh();
    }

    pub fn refresh(&mut self) {
        if let Some(map) = self.map.clone() {
            self.set_map(map);
        }
    }

    /// Clears the list and starts fetching scores for `map`.
    pub fn set_map(&mut self, map: SelectedMap) {
        if let Some(token) = self.token.take() {
            token.store(true, Ordering::Release);
        }

        let token = Arc::new(AtomicBool::new(false));
        self.token = Some(Arc::clone(&token));
        self.map = Some(map.clone());
        self.scores.clear();
        self.status = None;
        self.loading = true;

        let provider = self.provider_for(&map);
        let tx = self.reply_tx.clone();
        let spawned = thread::Builder::new()
            .name("score-fetch".into())
            .spawn(move || {
                let result = provider.and_then(|p| p.fetch(&map));
                let _ = tx.send(FetchReply { token, result });
            });

        if let Err(e) = spawned {
            log::error!("SCORES: Failed to spawn fetch thread: {}", e);
            self.loading = false;
            self.status = Some(ScoreFetchError::Failed(e.to_string()).to_string());
        }
    }

    fn provider_for(&self, map: &SelectedMap) -> Result<Arc<dyn ScoreProvider>, ScoreFetchError> {
        match self.list_type {
            ScoreListType::Local => Ok(Arc::clone(&self.local)),
            ScoreListType::Global => {
                if map.online_id.is_none() {
                    return Err(ScoreFetchError::NotSubmitted);
                }
                self.online
                    .clone()
                    .ok_or_else(|| ScoreFetchError::Failed("no online provider".into()))
            }
            other => Err(ScoreFetchError::Unavailable(other)),
        }
    }

    /// Publishes finished fetches. Returns `true` if the list changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        for reply in self.reply_rx.try_iter() {
            if reply.token.load(Ordering::Acquire) {
                continue;
            }

            self.loading = false;
            changed = true;
            match reply.result {
                Ok(mut scores) => {
                    scores.sort_by(|a, b| b.score.cmp(&a.score));
                    rank(&mut scores);
                    self.status = scores.is_empty().then(|| "No scores yet!".to_string());
                    log::debug!("SCORES: {} {} scores", scores.len(), self.list_type);
                    self.scores = scores;
                }
                Err(e) => {
                    if let ScoreFetchError::Failed(reason) = &e {
                        log::warn!("SCORES: Fetch failed: {}", reason);
                    }
                    self.scores.clear();
                    self.status = Some(e.to_string());
                }
            }
        }

        changed
    }

    /// Deletes a local score and drops it from the list. Returns `true` if
    /// the score was removed.
    pub fn delete(&mut self, record_id: i64) -> bool {
        if self.list_type != ScoreListType::Local {
            return false;
        }

        match self.local.delete(record_id) {
            Ok(true) => {
                self.scores.retain(|e| e.record_id != Some(record_id));
                rank(&mut self.scores);
                if self.scores.is_empty() && !self.loading {
                    self.status = Some("No scores yet!".to_string());
                }
                log::info!("SCORES: Deleted score {}", record_id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("SCORES: Failed to delete score {}: {:?}", record_id, e);
                false
            }
        }
    }
}

impl Drop for ScoreList {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.store(true, Ordering::Release);
        }
    }
}

/// Scores stored in the local SQLite database.
#[derive(Debug, Clone)]
pub struct LocalScores {
    db_path: PathBuf,
}

impl LocalScores {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn runtime() -> Result<tokio::runtime::Runtime, sqlx::Error> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(sqlx::Error::Io)
    }

    /// Stores a finished play and returns its row id.
    pub fn record(&self, result: &GameResult, player: &str) -> Result<i64, sqlx::Error> {
        let stats = &result.hit_stats;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let score = NewScore {
            chart_hash: &result.chart_hash,
            player,
            timestamp,
            score: result.score as i64,
            accuracy: result.accuracy,
            max_combo: result.max_combo as i64,
            rate: result.rate,
            judgements: [
                stats.marv, stats.perfect, stats.great, stats.good, stats.bad, stats.miss,
            ]
            .map(i64::from),
        };

        Self::runtime()?.block_on(async {
            let db = Database::new(&self.db_path).await?;
            let id = db.insert_score(&score).await?;
            db.close().await;
            log::info!("SCORES: Saved score {} for {}", result.score, result.chart_hash);
            Ok::<_, sqlx::Error>(id)
        })
    }

    /// Deletes the score stored under `record_id`.
    pub fn delete(&self, record_id: i64) -> Result<bool, sqlx::Error> {
        Self::runtime()?.block_on(async {
            let db = Database::new(&self.db_path).await?;
            let deleted = db.delete_score(record_id).await?;
            db.close().await;
            Ok::<_, sqlx::Error>(deleted)
        })
    }

    fn load(&self, chart_hash: &str) -> Result<Vec<ScoreRecord>, sqlx::Error> {
        Self::runtime()?.block_on(async {
            let db = Database::new(&self.db_path).await?;
            let scores = db.scores_for_chart(chart_hash).await?;
            db.close().await;
            Ok::<_, sqlx::Error>(scores)
        })
    }
}

impl ScoreProvider for LocalScores {
    fn fetch(&self, map: &SelectedMap) -> Result<Vec<ScoreEntry>, ScoreFetchError> {
        self.load(&map.hash)
            .map(|records| records.into_iter().map(ScoreEntry::from).collect())
            .map_err(|e| ScoreFetchError::Failed(e.to_string()))
    }

    fn delete(&self, record_id: i64) -> Result<bool, ScoreFetchError> {
        LocalScores::delete(self, record_id).map_err(|e| ScoreFetchError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stats::HitStats;
    use std::time::Duration;

    fn entry(player: &str, score: i64) -> ScoreEntry {
        ScoreEntry {
            place: 0,
            player: player.into(),
            score,
            accuracy: 100.0,
            max_combo: 0,
            rate: 1.0,
            timestamp: 0,
            record_id: None,
        }
    }

    fn map(hash: &str, online_id: Option<i64>) -> SelectedMap {
        SelectedMap {
            hash: hash.into(),
            online_id,
        }
    }

    /// Returns one score named after the map, once the gate opens.
    struct Gated {
        gate: Receiver<()>,
    }

    impl ScoreProvider for Gated {
        fn fetch(&self, map: &SelectedMap) -> Result<Vec<ScoreEntry>, ScoreFetchError> {
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            Ok(vec![entry(&map.hash, 1)])
        }
    }

    struct Fixed(Vec<ScoreEntry>);

    impl ScoreProvider for Fixed {
        fn fetch(&self, _map: &SelectedMap) -> Result<Vec<ScoreEntry>, ScoreFetchError> {
            Ok(self.0.clone())
        }
    }

    fn wait(list: &mut ScoreList) {
        for _ in 0..500 {
            list.poll();
            if !list.is_loading() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("fetch never finished");
    }

    #[test]
    fn test_sorted_descending_with_places() {
        let provider = Fixed(vec![entry("a", 100), entry("b", 300), entry("c", 200)]);
        let mut list = ScoreList::new(Arc::new(provider));
        list.set_map(map("x", None));
        wait(&mut list);

        let ranked: Vec<(usize, &str)> = list
            .scores()
            .iter()
            .map(|s| (s.place, s.player.as_str()))
            .collect();
        assert_eq!(ranked, vec![(1, "b"), (2, "c"), (3, "a")]);
        assert_eq!(list.status(), None);
    }

    #[test]
    fn test_cancelled_fetch_is_dropped() {
        let (gate_tx, gate_rx) = unbounded();
        let mut list = ScoreList::new(Arc::new(Gated { gate: gate_rx }));

        list.set_map(map("first", None));
        list.set_map(map("second", None));
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        wait(&mut list);

        // Give the stale reply time to arrive too.
        thread::sleep(Duration::from_millis(50));
        list.poll();

        assert_eq!(list.scores().len(), 1);
        assert_eq!(list.scores()[0].player, "second");
    }

    #[test]
    fn test_status_texts() {
        let mut list = ScoreList::new(Arc::new(Fixed(Vec::new())));
        list.set_map(map("x", None));
        wait(&mut list);
        assert_eq!(list.status(), Some("No scores yet!"));

        list.set_type(ScoreListType::Global);
        wait(&mut list);
        assert_eq!(list.status(), Some("This map is not submitted online!"));

        list.set_map(map("x", Some(12)));
        wait(&mut list);
        assert_eq!(list.status(), Some("Something went wrong!"));

        list.set_type(ScoreListType::Country);
        wait(&mut list);
        assert_eq!(
            list.status(),
            Some("Country leaderboards are not available yet!")
        );
    }

    #[test]
    fn test_local_scores_round_trip_through_database() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalScores::new(dir.path().join("scores.db"));

        let mut stats = HitStats::new();
        stats.marv = 10;
        stats.miss = 2;
        for score in [1000, 3000] {
            let result = GameResult {
                chart_hash: "abc".into(),
                score,
                accuracy: 90.0,
                max_combo: 10,
                rate: 1.0,
                hit_stats: stats.clone(),
            };
            local.record(&result, "Player").unwrap();
        }

        let mut list = ScoreList::new(Arc::new(local));
        list.set_map(map("abc", None));
        wait(&mut list);

        let scores: Vec<i64> = list.scores().iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![3000, 1000]);
        assert!(list.scores().iter().all(|s| s.record_id.is_some()));
    }

    #[test]
    fn test_delete_removes_entry_and_reranks() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalScores::new(dir.path().join("scores.db"));
        for score in [1000, 2000, 3000] {
            let result = GameResult {
                chart_hash: "abc".into(),
                score,
                accuracy: 90.0,
                max_combo: 10,
                rate: 1.0,
                hit_stats: HitStats::new(),
            };
            local.record(&result, "Player").unwrap();
        }

        let mut list = ScoreList::new(Arc::new(local.clone()));
        list.set_map(map("abc", None));
        wait(&mut list);

        let middle = list.scores()[1].record_id.unwrap();
        assert!(list.delete(middle));
        assert!(!list.delete(middle));

        let ranked: Vec<(usize, i64)> = list.scores().iter().map(|s| (s.place, s.score)).collect();
        assert_eq!(ranked, vec![(1, 3000), (2, 1000)]);

        // The row is gone from the database too.
        list.refresh();
        wait(&mut list);
        let scores: Vec<i64> = list.scores().iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![3000, 1000]);

        for id in list.scores().iter().filter_map(|s| s.record_id).collect::<Vec<_>>() {
            assert!(list.delete(id));
        }
        assert_eq!(list.status(), Some("No scores yet!"));
    }

    #[test]
    fn test_read_only_provider_deletes_nothing() {
        let mut list = ScoreList::new(Arc::new(Fixed(vec![entry("a", 1)])));
        list.set_map(map("abc", None));
        wait(&mut list);

        assert!(!list.delete(1));
        assert_eq!(list.scores().len(), 1);
    }
}
