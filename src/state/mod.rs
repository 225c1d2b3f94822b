//! State management module.
//!
//! - `GameEngine` - active gameplay
//! - `EditorState` - chart editing
//! - `ScoreList` - leaderboard of the selected map

pub mod editor;
pub mod game;
pub mod select;

pub use editor::EditorState;
pub use game::GameEngine;
pub use select::ScoreList;
