//! Table discovery and loading over a local SQLite database file.
//!
//! # Intention
//!
//! - List the tables of a database file, sorted by name.
//! - Load a whole table into an in-memory [`TableSnapshot`].
//!
//! # Architectural Boundaries
//!
//! - Read-only access; nothing here writes to the database.
//! - One connection per operation. No pooling, no shared handles.

pub mod error;
pub mod snapshot;
pub mod sqlite;

pub use error::{AccessorError, Result};
pub use snapshot::{Row, TableSnapshot, Value};
pub use sqlite::{AccessorConfig, TableAccessor};
