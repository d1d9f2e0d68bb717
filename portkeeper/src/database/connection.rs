//! Connection management for the reservation store.

use std::fs;

use log::debug;
use rusqlite::{Connection, OpenFlags};

use crate::error::{Error, Result};

use super::config::DatabaseConfig;
use super::migrations;

/// An open handle to the reservation database.
///
/// Opening a database configures WAL journaling, a busy timeout, and
/// verifies schema compatibility (initializing the schema on a fresh
/// file). All reservation operations hang off this handle; there is no
/// process-global instance, so tests and embedders can open as many
/// independent stores as they need.
///
/// # Examples
///
/// ```no_run
/// use portkeeper::database::{Database, DatabaseConfig};
///
/// let db = Database::open(DatabaseConfig::new("/tmp/ports.db")).unwrap();
/// ```
pub struct Database {
    conn: Connection,
    config: DatabaseConfig,
}

impl Database {
    /// Opens (and if necessary creates) the database at the configured path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// file cannot be opened, a pragma fails, or the stored schema version
    /// is incompatible with this client.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        if config.auto_create {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        let mut flags = OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        if config.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if config.auto_create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }

        let conn = Connection::open_with_flags(&config.path, flags)?;

        // WAL allows a reader to proceed while another process writes.
        // journal_mode returns the resulting mode, so it must go through
        // query_row rather than execute.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL")?;
        conn.busy_timeout(config.busy_timeout)
            .map_err(Error::Database)?;

        if config.read_only {
            let version = migrations::get_schema_version(&conn)?;
            if version == 0 {
                return Err(Error::Validation {
                    field: "database".into(),
                    message: format!(
                        "database at {} is uninitialized and was opened read-only",
                        config.path.display()
                    ),
                });
            }
        }
        migrations::check_schema_compatibility(&conn)?;

        debug!("opened reservation database at {}", config.path.display());

        Ok(Self { conn, config })
    }

    /// Returns the configuration this database was opened with.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Borrows the underlying connection.
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Mutably borrows the underlying connection, for transactions.
    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.config.path)
            .field("read_only", &self.config.read_only)
            .finish_non_exhaustive()
    }
}
