// SQLite access for one pipeline run: a private copy of the uploaded database,
// schema introspection, and statement execution.
pub mod executor;
pub mod schema_inspector;
pub mod session;

use thiserror::Error;

/// Errors raised while opening or introspecting a database.
#[derive(Debug, Error)]
pub enum DbError {
    /// The file could not be opened or read as a SQLite database.
    #[error("database connection error: {0}")]
    ConnectionError(#[from] rusqlite::Error),

    /// The temporary copy of the database could not be written.
    #[error("temporary database error: {0}")]
    IoError(#[from] std::io::Error),
}
