//! SQLite-backed reservation store.
//!
//! This module provides durable CRUD for port reservations and their tags:
//! connection management with WAL mode and a busy timeout, schema
//! versioning through a metadata table, and the reservation/tag operations
//! the service layer builds on.
//!
//! # Examples
//!
//! ```no_run
//! use portkeeper::database::{Database, DatabaseConfig};
//! use portkeeper::{Port, PortReservation};
//!
//! let config = DatabaseConfig::new("/tmp/ports.db");
//! let mut db = Database::open(config).unwrap();
//!
//! let reservation = PortReservation::builder(
//!     Port::try_from(3000u16).unwrap(),
//!     "api-server",
//! )
//! .build()
//! .unwrap();
//!
//! db.upsert_reservation(&reservation).unwrap();
//! ```

mod config;
mod connection;
pub mod migrations;
mod operations;
mod schema;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::{default_data_dir, resolve_database_path, DatabaseConfig};
pub use connection::Database;

pub use migrations::{check_schema_compatibility, get_schema_version, initialize_schema};
