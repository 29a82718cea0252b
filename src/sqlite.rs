use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::error::{AccessorError, Result};
use crate::snapshot::{TableSnapshot, Value};

const LIST_TABLES_SQL: &str = "SELECT name FROM sqlite_master WHERE type = 'table'";
// Table names resolve case-insensitively, same as in `load_table`.
const HAS_TABLE_SQL: &str =
    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE";

/// Table accessor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorConfig {
    /// Path to the SQLite database file. The file must already exist.
    pub db_path: PathBuf,
}

impl AccessorConfig {
    /// Create a config for the database at `db_path`
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

/// Lists and loads the tables of one SQLite database file.
///
/// Each operation opens its own read-only connection and closes it before
/// returning, on success and on error alike.
#[derive(Debug, Clone)]
pub struct TableAccessor {
    config: AccessorConfig,
    tables: Vec<String>,
}

impl TableAccessor {
    /// Create an accessor without touching the database.
    ///
    /// The stored table list starts empty; call [`refresh`](Self::refresh)
    /// to populate it.
    pub fn new(config: AccessorConfig) -> Self {
        Self {
            config,
            tables: Vec::new(),
        }
    }

    /// Create an accessor and enumerate its tables right away.
    ///
    /// Fails with [`AccessorError::Connection`] when `path` is missing or is
    /// not a readable SQLite database.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut accessor = Self::new(AccessorConfig::new(path));
        accessor.refresh()?;
        Ok(accessor)
    }

    /// Path of the database file this accessor reads.
    pub fn path(&self) -> &Path {
        &self.config.db_path
    }

    /// Table names from the last [`refresh`](Self::refresh), sorted ascending.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Read the catalog and return every table name, sorted ascending.
    ///
    /// Does not touch the stored list.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let path = self.path();
        let mut names = self.with_connection(|conn| {
            let to_err = |e| AccessorError::from_statement(path, LIST_TABLES_SQL, e);
            let mut stmt = conn.prepare(LIST_TABLES_SQL).map_err(to_err)?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>("name"))
                .map_err(to_err)?
                .collect::<rusqlite::Result<Vec<String>>>()
                .map_err(to_err)?;
            Ok(names)
        })?;
        names.sort();
        names.dedup();
        debug!(path = %path.display(), count = names.len(), "listed tables");
        Ok(names)
    }

    /// Re-read the catalog and replace the stored table list.
    pub fn refresh(&mut self) -> Result<&[String]> {
        self.tables = self.list_tables()?;
        Ok(&self.tables)
    }

    /// Whether the catalog currently has a table called `name`, ignoring case.
    pub fn has_table(&self, name: &str) -> Result<bool> {
        let path = self.path();
        self.with_connection(|conn| {
            conn.query_row(HAS_TABLE_SQL, [name], |_| Ok(()))
                .optional()
                .map(|found| found.is_some())
                .map_err(|e| AccessorError::from_statement(path, HAS_TABLE_SQL, e))
        })
    }

    /// Load every row of `name`, equivalent to `SELECT * FROM name`.
    ///
    /// A name that is not in the catalog fails with [`AccessorError::Query`].
    pub fn load_table(&self, name: &str) -> Result<TableSnapshot> {
        let path = self.path();
        let sql = format!("SELECT * FROM {}", quote_identifier(name));
        let snapshot = self.with_connection(|conn| {
            let to_err = |e| AccessorError::from_statement(path, &sql, e);
            let mut stmt = conn.prepare(&sql).map_err(to_err)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = columns.len();

            let mut rows = Vec::new();
            let mut cursor = stmt.query([]).map_err(to_err)?;
            while let Some(row) = cursor.next().map_err(to_err)? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(Value::from(row.get_ref(idx).map_err(to_err)?));
                }
                rows.push(values);
            }
            Ok(TableSnapshot::new(name, columns, rows))
        })?;
        debug!(
            table = name,
            rows = snapshot.row_count(),
            columns = snapshot.column_count(),
            "loaded table"
        );
        Ok(snapshot)
    }

    /// Run `body` on a fresh read-only connection, then close it.
    ///
    /// Statements created by `body` must not outlive it.
    fn with_connection<T>(&self, body: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let path = self.path();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| {
            AccessorError::Connection {
                path: path.to_path_buf(),
                source,
            }
        })?;
        trace!(path = %path.display(), "opened connection");

        let result = body(&conn);

        // Dropping the connection also closes it; `close` just surfaces the error.
        if let Err((_conn, source)) = conn.close() {
            warn!(path = %path.display(), error = %source, "failed to close connection");
            if result.is_ok() {
                return Err(AccessorError::Connection {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
        trace!(path = %path.display(), "closed connection");
        result
    }
}

/// Quote `name` as an SQL identifier so any table name can be scanned.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
