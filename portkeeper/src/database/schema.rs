//! Schema definitions and SQL constants for the reservation store.

/// Current schema version, stored in the metadata table.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Key-value metadata table for versioning information.
pub const CREATE_METADATA_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    )";

/// The reservations table. One row per port number; the port itself is the
/// primary key. `status` is constrained to the three wire values.
/// Timestamps are RFC 3339 text.
pub const CREATE_PORTS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS ports (
        number INTEGER PRIMARY KEY,
        project_name TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL CHECK(status IN ('reserved', 'in-use', 'free')),
        pid INTEGER,
        reserved_at TEXT NOT NULL,
        last_used TEXT,
        auto_release INTEGER NOT NULL DEFAULT 0
    )";

/// Tag side-table, one row per (port, tag) pair. The tag set for a port is
/// replaced wholesale on every reservation write; deletion is explicit
/// because foreign-key cascades are not enabled on the connection.
pub const CREATE_TAGS_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        port_number INTEGER NOT NULL,
        tag TEXT NOT NULL,
        FOREIGN KEY (port_number) REFERENCES ports(number) ON DELETE CASCADE,
        UNIQUE(port_number, tag)
    )";

/// Index for status-filtered listing.
pub const CREATE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_ports_status ON ports(status)";

/// Index for project-filtered listing.
pub const CREATE_PROJECT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_ports_project ON ports(project_name)";

/// Index for per-port tag lookup.
pub const CREATE_TAGS_PORT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_tags_port ON tags(port_number)";

/// Reads the schema version from the metadata table.
pub const SELECT_SCHEMA_VERSION: &str = "SELECT value FROM metadata WHERE key = 'schema_version'";

/// Writes the schema version into the metadata table.
pub const INSERT_SCHEMA_VERSION: &str =
    "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)";

/// Insert-or-replace of a reservation row, keyed by port number.
pub const UPSERT_PORT: &str = r"
    INSERT OR REPLACE INTO ports
    (number, project_name, description, status, pid, reserved_at, last_used, auto_release)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

/// Single-row fetch by port number.
pub const SELECT_PORT: &str = r"
    SELECT number, project_name, description, status, pid, reserved_at, last_used, auto_release
    FROM ports
    WHERE number = ?
";

/// Deletes a reservation row.
pub const DELETE_PORT: &str = "DELETE FROM ports WHERE number = ?";

/// Deletes every tag attached to a port.
pub const DELETE_TAGS_FOR_PORT: &str = "DELETE FROM tags WHERE port_number = ?";

/// Inserts one tag for a port.
pub const INSERT_TAG: &str = "INSERT INTO tags (port_number, tag) VALUES (?, ?)";

/// Fetches the tag set for a port in deterministic order.
pub const SELECT_TAGS_FOR_PORT: &str =
    "SELECT tag FROM tags WHERE port_number = ? ORDER BY tag";

/// Point update of the cached status column.
pub const UPDATE_STATUS: &str = "UPDATE ports SET status = ? WHERE number = ?";
