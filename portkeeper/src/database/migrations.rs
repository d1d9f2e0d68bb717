//! Schema initialization and version compatibility checks.

use rusqlite::Connection;

use crate::error::{Error, Result};

use super::schema::{
    CREATE_METADATA_TABLE, CREATE_PORTS_TABLE, CREATE_PROJECT_INDEX, CREATE_STATUS_INDEX,
    CREATE_TAGS_PORT_INDEX, CREATE_TAGS_TABLE, CURRENT_SCHEMA_VERSION, INSERT_SCHEMA_VERSION,
    SELECT_SCHEMA_VERSION,
};

/// Initializes the schema on a fresh database.
///
/// Creates all tables and indices and records the current schema version.
///
/// # Errors
///
/// Returns an error if any SQL statement fails to execute.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;
    conn.execute(CREATE_PORTS_TABLE, [])?;
    conn.execute(CREATE_TAGS_TABLE, [])?;

    conn.execute(CREATE_STATUS_INDEX, [])?;
    conn.execute(CREATE_PROJECT_INDEX, [])?;
    conn.execute(CREATE_TAGS_PORT_INDEX, [])?;

    conn.execute(INSERT_SCHEMA_VERSION, [CURRENT_SCHEMA_VERSION])?;

    Ok(())
}

/// Reads the schema version from the database.
///
/// Returns 0 when the metadata table is missing or holds no version, which
/// marks the database as uninitialized.
///
/// # Errors
///
/// Returns an error if the query fails for any other reason.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    match conn.query_row(SELECT_SCHEMA_VERSION, [], |row| {
        let value: String = row.get(0)?;
        value
            .parse::<i32>()
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    }) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => {
            if let rusqlite::Error::SqliteFailure(ref sqlite_err, _) = e {
                if sqlite_err.code == rusqlite::ErrorCode::Unknown {
                    // "no such table: metadata" - uninitialized database
                    return Ok(0);
                }
            }
            Err(e.into())
        }
    }
}

/// Checks schema compatibility, initializing a fresh database as needed.
///
/// # Errors
///
/// Returns an error if the stored version is older or newer than this
/// client supports, or if initialization fails.
pub fn check_schema_compatibility(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        initialize_schema(conn)?;
    } else if version < CURRENT_SCHEMA_VERSION {
        return Err(Error::Validation {
            field: "schema_version".into(),
            message: format!(
                "database schema version {version} is older than client version {CURRENT_SCHEMA_VERSION}"
            ),
        });
    } else if version > CURRENT_SCHEMA_VERSION {
        return Err(Error::Validation {
            field: "schema_version".into(),
            message: format!(
                "database schema version {version} is newer than client version {CURRENT_SCHEMA_VERSION}; upgrade portkeeper"
            ),
        });
    }

    Ok(())
}
