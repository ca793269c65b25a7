//! Durable storage for the log.
//!
//! A single embedded SQLite database holds complete subtrees, pending
//! subtrees and the leaf table. The store is exclusive to the logger
//! process; every component goes through one [`Db`] handle.

pub mod sqlite;

pub use sqlite::{Db, StorageError};
