//! Error types for the portkeeper library.
//!
//! One `thiserror` enum covers the whole error taxonomy: validation
//! failures, reservation conflicts, process termination failures, and the
//! ambient database/IO/JSON errors, with `#[from]` conversions where the
//! lower layer has a canonical error type.

use thiserror::Error;

use crate::Port;

/// Result type alias for operations that may fail with a portkeeper error.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the portkeeper library.
#[derive(Debug, Error)]
pub enum Error {
    /// An invalid port number was provided.
    #[error("invalid port {value}: {reason}")]
    InvalidPort {
        /// The invalid port value.
        value: u32,
        /// The reason the port is invalid.
        reason: String,
    },

    /// An invalid port range was specified.
    #[error("invalid port range {min}-{max}: {reason}")]
    InvalidPortRange {
        /// The minimum port in the range.
        min: u16,
        /// The maximum port in the range.
        max: u16,
        /// The reason the range is invalid.
        reason: String,
    },

    /// An invalid port count was requested from the allocator.
    #[error("invalid count {count}: must be between 1 and 100")]
    InvalidCount {
        /// The requested number of ports.
        count: usize,
    },

    /// A reservation was attempted against a port the OS reports bound.
    #[error("port {port} is already in use")]
    PortInUse {
        /// The port that is in use.
        port: Port,
    },

    /// A reservation was attempted against a port held by another project.
    #[error("port {port} is reserved for project \"{project}\"")]
    PortReserved {
        /// The contested port.
        port: Port,
        /// The project that already holds the reservation.
        project: String,
    },

    /// A kill was requested for a port with no owning process.
    #[error("no process found on port {port}")]
    NoProcessOnPort {
        /// The port with no listener.
        port: Port,
    },

    /// The termination sequence for a port's owning process failed.
    #[error("failed to kill process on port {port}: {reason}")]
    ProcessKill {
        /// The port whose owning process could not be killed.
        port: Port,
        /// The underlying reason.
        reason: String,
    },

    /// A system-wide scan was requested on a host with no known listing tool.
    #[error("unsupported platform: {os}")]
    UnsupportedPlatform {
        /// The host OS family.
        os: String,
    },

    /// The allocator could not find enough free ports in the search range.
    #[error("insufficient ports available: found {found} of {requested} requested")]
    InsufficientPorts {
        /// How many free ports were found.
        found: usize,
        /// How many were requested.
        requested: usize,
    },

    /// An import payload is missing required fields or is not valid JSON.
    #[error("invalid import format: {reason}")]
    InvalidImportFormat {
        /// What was wrong with the payload.
        reason: String,
    },

    /// A validation error occurred.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// A description of the validation failure.
        message: String,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization or deserialization error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<crate::port::InvalidPortError> for Error {
    fn from(err: crate::port::InvalidPortError) -> Self {
        Self::InvalidPort {
            value: err.value,
            reason: err.reason,
        }
    }
}

impl From<crate::port::InvalidPortRangeError> for Error {
    fn from(err: crate::port::InvalidPortRangeError) -> Self {
        Self::InvalidPortRange {
            min: err.min.value(),
            max: err.max.value(),
            reason: err.reason,
        }
    }
}

impl From<crate::reservation::ValidationError> for Error {
    fn from(err: crate::reservation::ValidationError) -> Self {
        Self::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl Error {
    /// Check if this error is a reservation conflict (in-use or reserved).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PortInUse { .. } | Self::PortReserved { .. })
    }

    /// Check if this error indicates bad caller input rather than a
    /// system-level failure.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidPort { .. }
                | Self::InvalidPortRange { .. }
                | Self::InvalidCount { .. }
                | Self::InvalidImportFormat { .. }
                | Self::Validation { .. }
        )
    }
}
