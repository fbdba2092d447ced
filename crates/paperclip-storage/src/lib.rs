//! Paperclip Storage crate - SQLite persistence for signals, contexts,
//! action history and user preferences.
//!
//! Provides a WAL-mode SQLite database with migrations and [`SqliteStore`],
//! the SQLite implementation of the core `Persistence` contract.

pub mod db;
pub mod migrations;
pub mod store;

pub use db::Database;
pub use store::SqliteStore;
