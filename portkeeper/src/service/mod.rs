//! The port reconciliation service.
//!
//! Merges the persisted reservation table with live OS socket state into
//! one authoritative answer per port, and performs the writes that keep
//! the two coherent. This is the public contract of the crate; everything
//! the CLI and desktop front-ends do goes through a [`PortService`].
//!
//! # Examples
//!
//! ```no_run
//! use portkeeper::database::{Database, DatabaseConfig};
//! use portkeeper::reservation::ReserveOptions;
//! use portkeeper::PortService;
//!
//! let db = Database::open(DatabaseConfig::new("/tmp/ports.db")).unwrap();
//! let mut service = PortService::with_system(db);
//!
//! let reservation = service
//!     .reserve_port(3000, &ReserveOptions::new("api-server"))
//!     .unwrap();
//! assert_eq!(reservation.project(), "api-server");
//! ```

mod allocator;
mod transfer;

pub use transfer::{ExportDocument, ExportedPort, ImportOptions, ImportSummary, EXPORT_VERSION};

use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};

use crate::database::Database;
use crate::error::{Error, Result};
use crate::inspect::{PortInspector, SystemInspector};
use crate::reservation::{
    ActivePort, PortFilter, PortReservation, PortStatus, ReserveOptions,
};
use crate::terminate::{ProcessControl, SystemProcessControl, TERMINATION_GRACE};
use crate::Port;

/// The reconciliation and allocation service.
///
/// Owns the database handle it was constructed with; OS inspection and
/// process signalling are trait parameters so reconciliation logic is
/// testable against scripted fakes. Not safe for concurrent callers:
/// check-then-write sequences are unlocked, which is acceptable for the
/// single-user design point.
pub struct PortService<I: PortInspector, P: ProcessControl> {
    db: Database,
    inspector: I,
    process: P,
    termination_grace: Duration,
}

impl PortService<SystemInspector, SystemProcessControl> {
    /// Creates a service backed by the host system's tools.
    #[must_use]
    pub fn with_system(db: Database) -> Self {
        Self::new(db, SystemInspector::new(), SystemProcessControl::new())
    }
}

impl<I: PortInspector, P: ProcessControl> PortService<I, P> {
    /// Creates a service over the given store, inspector, and process
    /// controller.
    #[must_use]
    pub fn new(db: Database, inspector: I, process: P) -> Self {
        Self {
            db,
            inspector,
            process,
            termination_grace: TERMINATION_GRACE,
        }
    }

    /// Overrides the grace interval between the polite stop and the
    /// forced kill.
    #[must_use]
    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    /// Borrows the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Borrows the inspector.
    #[must_use]
    pub fn inspector(&self) -> &I {
        &self.inspector
    }

    /// Borrows the process controller.
    #[must_use]
    pub fn process_control(&self) -> &P {
        &self.process
    }

    /// Resolves the authoritative status of a port.
    ///
    /// A reservation row whose cached status is not `free` is trusted
    /// as-is; only rows cached `free` (and ports with no row) are probed
    /// against the OS. When a probe finds a cached-free row actually
    /// bound, the `in-use` result is written back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for port 0 and database errors from
    /// the lookup. OS probe failures are not errors; an unprobeable port
    /// reads as free.
    pub fn check_port(&mut self, port: u16) -> Result<PortStatus> {
        let port = Port::try_from(port)?;
        self.resolve_status(port)
    }

    fn resolve_status(&mut self, port: Port) -> Result<PortStatus> {
        let reservation = self.db.get_reservation(port)?;

        if let Some(ref existing) = reservation {
            if existing.status() != PortStatus::Free {
                return Ok(existing.status());
            }
        }

        if self.inspector.is_bound(port.value()) {
            if reservation.is_some() {
                self.db.set_status(port, PortStatus::InUse)?;
            }
            return Ok(PortStatus::InUse);
        }

        Ok(PortStatus::Free)
    }

    /// Reserves a port for a project.
    ///
    /// Re-reserving a port for the project that already holds it is an
    /// idempotent overwrite: description and tags refresh, the original
    /// `reservedAt` is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortInUse`] if something is listening on the
    /// port, [`Error::PortReserved`] if another project holds it, and
    /// validation or database errors otherwise.
    pub fn reserve_port(&mut self, port: u16, options: &ReserveOptions) -> Result<PortReservation> {
        let port = Port::try_from(port)?;
        let existing = self.db.get_reservation(port)?;

        match self.resolve_status(port)? {
            PortStatus::InUse => return Err(Error::PortInUse { port }),
            PortStatus::Reserved => {
                let holder = existing
                    .as_ref()
                    .map(PortReservation::project)
                    .unwrap_or_default();
                if holder != options.project.trim() {
                    return Err(Error::PortReserved {
                        port,
                        project: holder.to_string(),
                    });
                }
            }
            PortStatus::Free => {}
        }

        // Same-project re-reservation keeps the original creation time;
        // a new claim over a lingering free-cached row starts fresh.
        let reserved_at = existing
            .as_ref()
            .filter(|r| r.project() == options.project.trim())
            .map_or_else(Utc::now, PortReservation::reserved_at);

        let reservation = PortReservation::builder(port, options.project.clone())
            .description(options.description.clone())
            .tags(options.tags.clone())
            .auto_release(options.auto_release)
            .reserved_at(reserved_at)
            .build()?;

        self.db.upsert_reservation(&reservation)?;
        info!("reserved port {port} for project {}", reservation.project());
        Ok(reservation)
    }

    /// Releases a port's reservation.
    ///
    /// Deleting a port that was never reserved is not an error; the
    /// return value reports whether a row was actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for port 0 and database errors from
    /// the delete.
    pub fn release_port(&mut self, port: u16) -> Result<bool> {
        let port = Port::try_from(port)?;
        let removed = self.db.delete_reservation(port)?;
        if removed {
            info!("released port {port}");
        }
        Ok(removed)
    }

    /// Lists reservations matching the filter, re-validating cached
    /// `reserved` rows against the OS.
    ///
    /// A reserved row found bound is flipped to `in-use` and the
    /// correction is persisted. Rows cached `in-use` are returned as-is
    /// without re-probing.
    ///
    /// # Errors
    ///
    /// Returns database errors from the listing or the write-back.
    pub fn list_ports(&mut self, filter: &PortFilter) -> Result<Vec<PortReservation>> {
        let mut reservations = self.db.list_reservations(filter)?;

        for reservation in &mut reservations {
            if reservation.status() == PortStatus::Reserved
                && self.inspector.is_bound(reservation.port().value())
            {
                self.db.set_status(reservation.port(), PortStatus::InUse)?;
                reservation.set_status(PortStatus::InUse);
            }
        }

        Ok(reservations)
    }

    /// Stops the process listening on a port.
    ///
    /// Sends a polite stop, waits out the grace interval, and force
    /// kills if the process is still alive. A pid that vanishes during
    /// the sequence counts as success. On completion any reservation row
    /// for the port has its cached status cleared to `free`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoProcessOnPort`] when nothing is listening, and
    /// [`Error::ProcessKill`] when signal delivery fails.
    pub fn kill_process(&mut self, port: u16) -> Result<()> {
        let port = Port::try_from(port)?;

        let Some(pid) = self.inspector.owner_pid(port.value()) else {
            return Err(Error::NoProcessOnPort { port });
        };

        debug!("stopping pid {pid} on port {port}");
        self.process
            .terminate(pid)
            .map_err(|e| Error::ProcessKill {
                port,
                reason: e.to_string(),
            })?;

        thread::sleep(self.termination_grace);

        if self.process.is_alive(pid) {
            self.process
                .force_kill(pid)
                .map_err(|e| Error::ProcessKill {
                    port,
                    reason: e.to_string(),
                })?;
        }

        self.db.set_status(port, PortStatus::Free)?;
        info!("killed process {pid} on port {port}");
        Ok(())
    }

    /// Lists every port with a live listener, sorted by port number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] on hosts with no known
    /// listing tool. A present-but-failing tool yields an empty list.
    pub fn scan_active_ports(&self) -> Result<Vec<ActivePort>> {
        let mut active = self.inspector.scan_active()?;
        active.sort_by_key(|a| a.port);
        Ok(active)
    }
}
