//! Reservation model types.
//!
//! The persisted [`PortReservation`] row, the ephemeral [`ActivePort`]
//! scan record, and the option/filter structs accepted by the service
//! layer. JSON field names follow the export wire format (`projectName`,
//! `reservedAt`, ...) so serialized reservations match what the desktop
//! and CLI front-ends historically produced.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Port;

/// The authoritative status of a port, as resolved by reconciliation.
///
/// `Free` is a computed answer, not a stored state: a free port normally has
/// no reservation row at all. The single exception is the post-kill
/// write-back, which parks an existing row at `free` until the next probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortStatus {
    /// The port has a reservation and nothing is bound to it.
    Reserved,
    /// A process currently holds a listening socket on the port.
    InUse,
    /// No reservation and no binding.
    Free,
}

impl PortStatus {
    /// Returns the wire/database representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::InUse => "in-use",
            Self::Free => "free",
        }
    }

    /// Parses a status from its wire/database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(Self::Reserved),
            "in-use" => Some(Self::InUse),
            "free" => Some(Self::Free),
            _ => None,
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for model validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// A description of the failure.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A persisted claim on a port number for a named project.
///
/// One row per port number. The `status` field is a cache of the last
/// reconciliation; only the service layer writes it, and reads re-derive it
/// against live OS state before trusting it.
///
/// # Examples
///
/// ```
/// use portkeeper::{Port, PortReservation};
///
/// let reservation = PortReservation::builder(
///     Port::try_from(3000u16).unwrap(),
///     "api-server",
/// )
/// .description(Some("REST API".to_string()))
/// .tags(vec!["backend".to_string()])
/// .build()
/// .unwrap();
///
/// assert_eq!(reservation.port().value(), 3000);
/// assert_eq!(reservation.project(), "api-server");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortReservation {
    #[serde(rename = "number")]
    port: Port,
    #[serde(rename = "projectName")]
    project: String,
    description: Option<String>,
    status: PortStatus,
    pid: Option<u32>,
    reserved_at: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
    auto_release: bool,
    tags: Vec<String>,
}

impl PortReservation {
    /// Creates a new reservation builder.
    #[must_use]
    pub fn builder(port: Port, project: impl Into<String>) -> PortReservationBuilder {
        PortReservationBuilder {
            port,
            project: project.into(),
            description: None,
            status: PortStatus::Reserved,
            pid: None,
            reserved_at: None,
            last_used: None,
            auto_release: false,
            tags: Vec::new(),
        }
    }

    /// Returns the reserved port.
    #[must_use]
    pub const fn port(&self) -> Port {
        self.port
    }

    /// Returns the owning project name.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the cached status from the last reconciliation.
    #[must_use]
    pub const fn status(&self) -> PortStatus {
        self.status
    }

    /// Returns the last known owning process id.
    ///
    /// Only meaningful while the cached status is `in-use`.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns when the reservation was created.
    #[must_use]
    pub const fn reserved_at(&self) -> DateTime<Utc> {
        self.reserved_at
    }

    /// Returns the last-used timestamp.
    ///
    /// Carried in the schema for future use; no current logic reads it.
    #[must_use]
    pub const fn last_used(&self) -> Option<DateTime<Utc>> {
        self.last_used
    }

    /// Returns whether the reservation is flagged for automatic release.
    ///
    /// Declared but not enforced by any watcher.
    #[must_use]
    pub const fn auto_release(&self) -> bool {
        self.auto_release
    }

    /// Returns the tag set.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn set_status(&mut self, status: PortStatus) {
        self.status = status;
    }
}

/// Builder for [`PortReservation`].
#[derive(Debug, Clone)]
pub struct PortReservationBuilder {
    port: Port,
    project: String,
    description: Option<String>,
    status: PortStatus,
    pid: Option<u32>,
    reserved_at: Option<DateTime<Utc>>,
    last_used: Option<DateTime<Utc>>,
    auto_release: bool,
    tags: Vec<String>,
}

impl PortReservationBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the cached status (defaults to `reserved`).
    #[must_use]
    pub const fn status(mut self, status: PortStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the last known owning pid.
    #[must_use]
    pub const fn pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Sets the creation timestamp (defaults to now).
    #[must_use]
    pub fn reserved_at(mut self, at: DateTime<Utc>) -> Self {
        self.reserved_at = Some(at);
        self
    }

    /// Sets the last-used timestamp.
    #[must_use]
    pub fn last_used(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_used = at;
        self
    }

    /// Sets the auto-release flag.
    #[must_use]
    pub const fn auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }

    /// Sets the tag set.
    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Builds the reservation.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the project name is empty after
    /// trimming whitespace.
    pub fn build(self) -> Result<PortReservation, ValidationError> {
        let project = self.project.trim().to_string();
        if project.is_empty() {
            return Err(ValidationError {
                field: "project".into(),
                message: "project name must be non-empty".into(),
            });
        }

        Ok(PortReservation {
            port: self.port,
            project,
            description: self.description,
            status: self.status,
            pid: self.pid,
            reserved_at: self.reserved_at.unwrap_or_else(Utc::now),
            last_used: self.last_used,
            auto_release: self.auto_release,
            tags: self.tags,
        })
    }
}

/// Options accepted by `reserve_port`.
#[derive(Debug, Clone)]
pub struct ReserveOptions {
    /// The project name claiming the port.
    pub project: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Tags to attach to the reservation (replaced wholesale on re-reserve).
    pub tags: Vec<String>,
    /// Auto-release flag (declared, not enforced).
    pub auto_release: bool,
}

impl ReserveOptions {
    /// Creates options for the given project with no description or tags.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            description: None,
            tags: Vec::new(),
            auto_release: false,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the auto-release flag.
    #[must_use]
    pub const fn with_auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }
}

/// Filter predicates for `list_ports`, combined as a conjunction.
///
/// The store applies `status` (exact) and `project` (case-insensitive
/// substring) at the SQL level. `tags` is carried for callers that filter
/// post-fetch; the store does not interpret it.
#[derive(Debug, Clone, Default)]
pub struct PortFilter {
    /// Exact status match.
    pub status: Option<PortStatus>,
    /// Case-insensitive project-name substring match.
    pub project: Option<String>,
    /// Tag filter, applied by callers after fetching.
    pub tags: Vec<String>,
}

impl PortFilter {
    /// Filter by exact status.
    #[must_use]
    pub fn by_status(status: PortStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Filter by project-name substring.
    #[must_use]
    pub fn by_project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Self::default()
        }
    }
}

/// A port observed bound on the live system.
///
/// Produced fresh by every scan and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePort {
    /// The bound port.
    #[serde(rename = "number")]
    pub port: Port,
    /// The owning process id.
    pub pid: u32,
    /// The process/command name, when the listing tool reports one.
    pub process_name: Option<String>,
    /// The socket state marker (e.g. `LISTEN`).
    pub state: Option<String>,
    /// The local address the socket is bound to.
    pub address: Option<String>,
}

/// Options accepted by `request_ports`.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// How many ports to find and reserve (1-100).
    pub count: usize,
    /// Base project name; sub-reservations are named `{project}-{n}`.
    pub project: String,
    /// Shared description for every sub-reservation.
    pub description: Option<String>,
    /// Shared tags for every sub-reservation.
    pub tags: Vec<String>,
    /// Scan the range in ascending order (`true`, default) or draw
    /// candidates uniformly at random without replacement (`false`).
    pub sequential: bool,
    /// Lower bound of the search range (default 3000).
    pub start_port: Port,
    /// Upper bound of the search range (default 9999).
    pub end_port: Port,
    /// Additional ports to avoid, unioned with the well-known set.
    pub avoid: Vec<u16>,
}

impl RequestOptions {
    /// Default lower bound of the search range.
    pub const DEFAULT_START: u16 = 3000;

    /// Default upper bound of the search range.
    pub const DEFAULT_END: u16 = 9999;

    /// Creates a sequential request over the default 3000-9999 range.
    ///
    /// # Panics
    ///
    /// Never panics; the default bounds are valid ports.
    #[must_use]
    pub fn new(count: usize, project: impl Into<String>) -> Self {
        Self {
            count,
            project: project.into(),
            description: None,
            tags: Vec::new(),
            sequential: true,
            start_port: Port::try_from(Self::DEFAULT_START).expect("default start port is valid"),
            end_port: Port::try_from(Self::DEFAULT_END).expect("default end port is valid"),
            avoid: Vec::new(),
        }
    }

    /// Sets the search range.
    #[must_use]
    pub const fn with_range(mut self, start: Port, end: Port) -> Self {
        self.start_port = start;
        self.end_port = end;
        self
    }

    /// Switches to random candidate selection.
    #[must_use]
    pub const fn random(mut self) -> Self {
        self.sequential = false;
        self
    }

    /// Sets the shared description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the shared tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the additional avoid list.
    #[must_use]
    pub fn with_avoid(mut self, avoid: Vec<u16>) -> Self {
        self.avoid = avoid;
        self
    }
}

/// Result of a successful `request_ports` call.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    /// The reservations created, in allocation order.
    pub ports: Vec<PortReservation>,
    /// A human-readable summary of what was reserved.
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(value: u16) -> Port {
        Port::try_from(value).unwrap()
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [PortStatus::Reserved, PortStatus::InUse, PortStatus::Free] {
            assert_eq!(PortStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PortStatus::parse("bogus"), None);
    }

    #[test]
    fn status_wire_strings() {
        assert_eq!(PortStatus::Reserved.as_str(), "reserved");
        assert_eq!(PortStatus::InUse.as_str(), "in-use");
        assert_eq!(PortStatus::Free.as_str(), "free");
    }

    #[test]
    fn status_serde_uses_kebab_case() {
        let json = serde_json::to_string(&PortStatus::InUse).unwrap();
        assert_eq!(json, "\"in-use\"");
        let back: PortStatus = serde_json::from_str("\"reserved\"").unwrap();
        assert_eq!(back, PortStatus::Reserved);
    }

    #[test]
    fn builder_defaults() {
        let reservation = PortReservation::builder(port(3000), "web").build().unwrap();

        assert_eq!(reservation.status(), PortStatus::Reserved);
        assert_eq!(reservation.pid(), None);
        assert_eq!(reservation.last_used(), None);
        assert!(!reservation.auto_release());
        assert!(reservation.tags().is_empty());
    }

    #[test]
    fn builder_rejects_empty_project() {
        assert!(PortReservation::builder(port(3000), "").build().is_err());
        assert!(PortReservation::builder(port(3000), "   ").build().is_err());
    }

    #[test]
    fn builder_trims_project() {
        let reservation = PortReservation::builder(port(3000), "  web  ")
            .build()
            .unwrap();
        assert_eq!(reservation.project(), "web");
    }

    #[test]
    fn builder_preserves_explicit_timestamp() {
        let at = "2024-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let reservation = PortReservation::builder(port(3000), "web")
            .reserved_at(at)
            .build()
            .unwrap();
        assert_eq!(reservation.reserved_at(), at);
    }

    #[test]
    fn reservation_serializes_with_wire_names() {
        let at = "2024-03-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let reservation = PortReservation::builder(port(3000), "web")
            .reserved_at(at)
            .tags(vec!["a".into()])
            .build()
            .unwrap();

        let value = serde_json::to_value(&reservation).unwrap();
        assert_eq!(value["number"], 3000);
        assert_eq!(value["projectName"], "web");
        assert_eq!(value["status"], "reserved");
        assert_eq!(value["tags"][0], "a");
    }

    #[test]
    fn request_options_defaults() {
        let opts = RequestOptions::new(3, "svc");
        assert!(opts.sequential);
        assert_eq!(opts.start_port.value(), 3000);
        assert_eq!(opts.end_port.value(), 9999);
        assert!(opts.avoid.is_empty());
    }

    #[test]
    fn filter_constructors() {
        let by_status = PortFilter::by_status(PortStatus::Reserved);
        assert_eq!(by_status.status, Some(PortStatus::Reserved));
        assert!(by_status.project.is_none());

        let by_project = PortFilter::by_project("api");
        assert_eq!(by_project.project.as_deref(), Some("api"));
        assert!(by_project.status.is_none());
    }
}
