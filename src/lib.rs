//! Timing core of a vertical-scrolling rhythm game: chart model, scroll
//! positions, the audio-synchronized clock, and the schedulers that decide
//! what is on screen and what gets judged.

pub mod database;
pub mod logic;
pub mod models;
pub mod shared;
pub mod state;
pub mod system;
