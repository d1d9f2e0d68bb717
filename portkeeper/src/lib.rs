#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # portkeeper
//!
//! A library for tracking local TCP port usage across development projects.
//!
//! Reservations are persisted in a per-user SQLite store; live OS socket
//! state is read through platform tools; and a reconciliation service
//! merges the two into one authoritative answer per port. On top of that
//! sit an N-port allocator with all-or-nothing semantics, process
//! termination for occupied ports, and JSON export/import of the store.
//!
//! ## Core Types
//!
//! - [`Port`] and [`PortRange`]: network port types with validation
//! - [`PortReservation`] and [`PortStatus`]: the persisted reservation model
//! - [`PortService`]: the reconciliation and allocation service
//! - [`Error`] and [`Result`]: error handling types
//!
//! ## Examples
//!
//! ```
//! use portkeeper::{Port, PortRange};
//!
//! let port = Port::try_from(8080u16).unwrap();
//! assert_eq!(port.value(), 8080);
//!
//! let min = Port::try_from(5000u16).unwrap();
//! let max = Port::try_from(5010u16).unwrap();
//! let range = PortRange::new(min, max).unwrap();
//! assert_eq!(range.len(), 11);
//! ```

pub mod database;
pub mod error;
pub mod inspect;
pub mod port;
pub mod reservation;
pub mod service;
pub mod terminate;

// Re-export key types at crate root for convenience
pub use database::{Database, DatabaseConfig};
pub use error::{Error, Result};
pub use inspect::{MockInspector, PortInspector, SystemInspector};
pub use port::{Port, PortRange};
pub use reservation::{
    ActivePort, PortFilter, PortReservation, PortStatus, RequestOptions, RequestOutcome,
    ReserveOptions,
};
pub use service::{
    ExportDocument, ExportedPort, ImportOptions, ImportSummary, PortService, EXPORT_VERSION,
};
pub use terminate::{MockProcessControl, ProcessControl, SystemProcessControl};
