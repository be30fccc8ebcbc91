//! SQLite backend for recap artifacts and run traces.
//!
//! Synchronous: one [`rusqlite::Connection`] per [`SqliteStore`], opened for
//! a unit of work and dropped afterwards. Multi-row changes run inside a
//! single SQLite transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
