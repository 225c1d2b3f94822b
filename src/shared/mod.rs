//! Types exchanged between threads.

pub mod messages;
pub mod snapshot;
