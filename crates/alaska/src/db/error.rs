use std::path::PathBuf;

use thiserror::Error;

/// Failures of the persistence layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the database file could not be created.
    #[error("Cannot create database directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration v{version} ({description}) failed: {source}")]
    Migration {
        version: u32,
        description: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A table or column name that cannot be spliced into a PRAGMA.
    #[error("Invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    /// A thread panicked while holding the connection.
    #[error("Database lock poisoned")]
    LockPoisoned,
}
