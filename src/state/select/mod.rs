//! Song select state.

pub mod scores;

pub use scores::{
    LocalScores, ScoreEntry, ScoreFetchError, ScoreList, ScoreListType, ScoreProvider,
    SelectedMap,
};
