//! Reservation export and import.
//!
//! The wire format is a JSON document of the shape:
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "exportDate": "2024-03-01T12:00:00Z",
//!   "ports": [
//!     { "number": 3000, "projectName": "api", "description": null,
//!       "tags": ["backend"], "reservedAt": "2024-02-01T09:30:00Z" }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inspect::PortInspector;
use crate::reservation::{PortFilter, PortReservation, PortStatus, ReserveOptions};
use crate::terminate::ProcessControl;
use crate::Port;

use super::PortService;

/// Version string written into every export document.
pub const EXPORT_VERSION: &str = "1.0.0";

/// One reservation as carried in the export document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedPort {
    /// The reserved port number.
    pub number: Port,
    /// The owning project.
    pub project_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Tag set.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Original reservation timestamp.
    pub reserved_at: DateTime<Utc>,
}

impl From<&PortReservation> for ExportedPort {
    fn from(reservation: &PortReservation) -> Self {
        Self {
            number: reservation.port(),
            project_name: reservation.project().to_string(),
            description: reservation.description().map(str::to_string),
            tags: reservation.tags().to_vec(),
            reserved_at: reservation.reserved_at(),
        }
    }
}

/// A complete export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Format version.
    pub version: String,
    /// When the export was produced.
    pub export_date: DateTime<Utc>,
    /// The exported reservations.
    pub ports: Vec<ExportedPort>,
}

impl ExportDocument {
    /// Serializes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Options accepted by `import_ports`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// In merge mode, entries for already-reserved ports are skipped
    /// instead of reported as conflicts.
    pub merge: bool,
}

impl ImportOptions {
    /// Creates default (non-merge) options.
    #[must_use]
    pub const fn new() -> Self {
        Self { merge: false }
    }

    /// Enables merge mode.
    #[must_use]
    pub const fn merging() -> Self {
        Self { merge: true }
    }
}

/// Tally of an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// How many reservations were created.
    pub imported: usize,
    /// How many entries were skipped (merge mode).
    pub skipped: usize,
    /// Per-entry failure descriptions.
    pub errors: Vec<String>,
}

impl<I: PortInspector, P: ProcessControl> PortService<I, P> {
    /// Exports every reservation as a document.
    ///
    /// # Errors
    ///
    /// Returns database errors from the listing.
    pub fn export_ports(&mut self) -> Result<ExportDocument> {
        let reservations = self.list_ports(&PortFilter::default())?;
        Ok(ExportDocument {
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now(),
            ports: reservations.iter().map(ExportedPort::from).collect(),
        })
    }

    /// Imports reservations from a JSON document.
    ///
    /// Each entry is handled independently: an in-use port, a
    /// conflicting reservation, or an entry that fails validation is
    /// tallied as an error, a port already reserved while in merge mode
    /// is skipped, and everything else is reserved. One bad entry never
    /// aborts the rest of the run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidImportFormat`] when the payload is not
    /// JSON or lacks the `version` field or `ports` array. Per-entry
    /// failures go into the summary, not the error channel.
    pub fn import_ports(&mut self, json: &str, options: &ImportOptions) -> Result<ImportSummary> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::InvalidImportFormat {
                reason: format!("not valid JSON: {e}"),
            })?;

        if value.get("version").and_then(serde_json::Value::as_str).is_none() {
            return Err(Error::InvalidImportFormat {
                reason: "missing 'version' field".into(),
            });
        }
        let Some(entries) = value.get("ports").and_then(serde_json::Value::as_array) else {
            return Err(Error::InvalidImportFormat {
                reason: "missing 'ports' array".into(),
            });
        };

        let mut summary = ImportSummary::default();

        for entry in entries {
            let port: ExportedPort = match serde_json::from_value(entry.clone()) {
                Ok(port) => port,
                Err(e) => {
                    summary.errors.push(format!("malformed entry: {e}"));
                    continue;
                }
            };
            self.import_entry(&port, options, &mut summary)?;
        }

        info!(
            "import finished: {} imported, {} skipped, {} error(s)",
            summary.imported,
            summary.skipped,
            summary.errors.len()
        );
        Ok(summary)
    }

    fn import_entry(
        &mut self,
        entry: &ExportedPort,
        options: &ImportOptions,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let value = entry.number.value();

        match self.check_port(value)? {
            PortStatus::InUse => {
                summary
                    .errors
                    .push(format!("port {value} is in use, not imported"));
                return Ok(());
            }
            PortStatus::Reserved if options.merge => {
                summary.skipped += 1;
                return Ok(());
            }
            _ => {}
        }

        let reserve = ReserveOptions::new(entry.project_name.clone())
            .with_description(entry.description.clone())
            .with_tags(entry.tags.clone());

        // Conflicts and invalid entries alike stay on the tally; only
        // the infrastructure failures above abort the run.
        match self.reserve_port(value, &reserve) {
            Ok(_) => summary.imported += 1,
            Err(e) => summary.errors.push(format!("port {value}: {e}")),
        }
        Ok(())
    }
}
