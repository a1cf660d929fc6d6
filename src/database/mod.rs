//! BMarks local persistence layer.
//!
//! Provides SQLite connection management and schema migrations for the
//! key/value cache that stands in for browser local storage.
//!
//! # Usage
//!
//! ```no_run
//! use bmarks::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("bmarks.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
