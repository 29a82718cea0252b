use std::path::{Path, PathBuf};

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccessorError {
    /// The file could not be opened as a SQLite database.
    #[error("cannot open database {}: {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed against an open connection.
    #[error("query failed ({sql}): {source}")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AccessorError>;

impl AccessorError {
    /// Classify an error raised while running `sql` against `path`.
    ///
    /// SQLite opens files lazily, so a corrupt or non-database file usually
    /// surfaces on the first statement rather than on open. Those codes are
    /// reported as connection failures.
    pub(crate) fn from_statement(path: &Path, sql: &str, source: rusqlite::Error) -> Self {
        if is_connection_failure(&source) {
            Self::Connection {
                path: path.to_path_buf(),
                source,
            }
        } else {
            Self::Query {
                sql: sql.to_string(),
                source,
            }
        }
    }

    /// True when the database file itself could not be used.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// True when a statement failed on an open connection.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }
}

fn is_connection_failure(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::PermissionDenied
        )
    )
}
