use crate::db::DbError;
use rusqlite::{Connection, OpenFlags};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A private, writable copy of an uploaded database plus the one connection that uses it.
///
/// Each pipeline run owns exactly one session. Dropping it closes the connection
/// and removes the temporary file; [`DatabaseSession::close`] does the same and
/// logs any failure.
pub struct DatabaseSession {
    // Field order matters: the connection must be released before the file is removed.
    connection: Connection,
    file: NamedTempFile,
}

impl DatabaseSession {
    /// Writes `bytes` to a fresh `.db` file under `scratch_dir` and opens it.
    pub fn from_bytes(bytes: &[u8], scratch_dir: &Path) -> Result<Self, DbError> {
        let mut file = tempfile::Builder::new()
            .prefix("nl-sqlite-")
            .suffix(".db")
            .tempfile_in(scratch_dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        let connection = Connection::open_with_flags(
            file.path(),
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        debug!(
            "Materialized {} byte database at {}",
            bytes.len(),
            file.path().display()
        );

        Ok(Self { connection, file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Closes the connection and deletes the temporary file.
    pub fn close(self) {
        let Self { connection, file } = self;
        let path = file.path().to_path_buf();

        if let Err((_, e)) = connection.close() {
            // The connection is dropped anyway when it goes out of scope here.
            warn!("Failed to close connection to {}: {}", path.display(), e);
        }

        match file.close() {
            Ok(()) => debug!("Removed temporary database {}", path.display()),
            Err(e) => warn!("Failed to remove temporary database {}: {}", path.display(), e),
        }
    }
}
