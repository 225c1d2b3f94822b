//! Local score database.

pub mod connection;
pub mod models;
pub mod query;

pub use connection::Database;
pub use models::ScoreRecord;
