//! Reservation CRUD over the open database handle.

use chrono::{DateTime, Utc};
use log::trace;
use rusqlite::{params, Row, TransactionBehavior};

use crate::error::Result;
use crate::reservation::{PortFilter, PortReservation, PortStatus};
use crate::Port;

use super::connection::Database;
use super::schema;

impl Database {
    /// Fetches the reservation for a port, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row cannot be
    /// decoded.
    pub fn get_reservation(&self, port: Port) -> Result<Option<PortReservation>> {
        let row = self
            .connection()
            .query_row(schema::SELECT_PORT, [port.value()], row_to_parts);

        match row {
            Ok(parts) => {
                let tags = self.tags_for_port(port)?;
                Ok(Some(parts.into_reservation(tags)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a reservation, replacing any existing row for the same port.
    ///
    /// The tag set is replaced wholesale. The row and its tags are written
    /// in one immediate transaction so concurrent readers never observe a
    /// reservation with a partial tag set.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or any write
    /// fails.
    pub fn upsert_reservation(&mut self, reservation: &PortReservation) -> Result<()> {
        let tx = self
            .connection_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            schema::UPSERT_PORT,
            params![
                reservation.port().value(),
                reservation.project(),
                reservation.description(),
                reservation.status().as_str(),
                reservation.pid(),
                reservation.reserved_at().to_rfc3339(),
                reservation.last_used().map(|at| at.to_rfc3339()),
                reservation.auto_release(),
            ],
        )?;

        tx.execute(schema::DELETE_TAGS_FOR_PORT, [reservation.port().value()])?;
        for tag in reservation.tags() {
            tx.execute(
                schema::INSERT_TAG,
                params![reservation.port().value(), tag],
            )?;
        }

        tx.commit()?;
        trace!(
            "wrote reservation for port {} (project {})",
            reservation.port(),
            reservation.project()
        );
        Ok(())
    }

    /// Deletes the reservation for a port along with its tags.
    ///
    /// Returns `true` if a row was removed, `false` if none existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or a delete
    /// fails.
    pub fn delete_reservation(&mut self, port: Port) -> Result<bool> {
        let tx = self
            .connection_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(schema::DELETE_TAGS_FOR_PORT, [port.value()])?;
        let removed = tx.execute(schema::DELETE_PORT, [port.value()])?;

        tx.commit()?;
        Ok(removed > 0)
    }

    /// Lists reservations matching the filter, ordered by port number.
    ///
    /// Status matches exactly; project matches as a case-insensitive
    /// substring. The filter's tag list is not applied here.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row cannot be
    /// decoded.
    pub fn list_reservations(&self, filter: &PortFilter) -> Result<Vec<PortReservation>> {
        let mut sql = String::from(
            "SELECT number, project_name, description, status, pid, reserved_at, last_used, auto_release FROM ports",
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(ref project) = filter.project {
            clauses.push("project_name LIKE ? COLLATE NOCASE");
            params.push(Box::new(format!("%{project}%")));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY number");

        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(params.iter().map(AsRef::as_ref)),
            row_to_parts,
        )?;

        let mut parts = Vec::new();
        for row in rows {
            parts.push(row?);
        }
        drop(stmt);

        let mut reservations = Vec::with_capacity(parts.len());
        for part in parts {
            let tags = self.tags_for_port(part.port)?;
            reservations.push(part.into_reservation(tags)?);
        }
        Ok(reservations)
    }

    /// Updates the cached status column of an existing row.
    ///
    /// Returns `true` if a row was updated, `false` if the port has no
    /// reservation.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_status(&mut self, port: Port, status: PortStatus) -> Result<bool> {
        let updated = self.connection().execute(
            schema::UPDATE_STATUS,
            params![status.as_str(), port.value()],
        )?;
        Ok(updated > 0)
    }

    fn tags_for_port(&self, port: Port) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(schema::SELECT_TAGS_FOR_PORT)?;
        let rows = stmt.query_map([port.value()], |row| row.get::<_, String>(0))?;

        let mut tags = Vec::new();
        for tag in rows {
            tags.push(tag?);
        }
        Ok(tags)
    }
}

/// Decoded row columns, before the tag fetch joins them into a model.
struct RowParts {
    port: Port,
    project: String,
    description: Option<String>,
    status: PortStatus,
    pid: Option<u32>,
    reserved_at: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
    auto_release: bool,
}

impl RowParts {
    fn into_reservation(self, tags: Vec<String>) -> Result<PortReservation> {
        let reservation = PortReservation::builder(self.port, self.project)
            .description(self.description)
            .status(self.status)
            .pid(self.pid)
            .reserved_at(self.reserved_at)
            .last_used(self.last_used)
            .auto_release(self.auto_release)
            .tags(tags)
            .build()?;
        Ok(reservation)
    }
}

fn row_to_parts(row: &Row<'_>) -> rusqlite::Result<RowParts> {
    let number: u32 = row.get(0)?;
    let port = Port::try_from(number)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let status_text: String = row.get(3)?;
    let status = PortStatus::parse(&status_text).ok_or_else(|| {
        rusqlite::Error::ToSqlConversionFailure(
            format!("unknown status '{status_text}'").into(),
        )
    })?;

    let reserved_at_text: String = row.get(5)?;
    let reserved_at = parse_timestamp(&reserved_at_text)?;

    let last_used = row
        .get::<_, Option<String>>(6)?
        .map(|text| parse_timestamp(&text))
        .transpose()?;

    Ok(RowParts {
        port,
        project: row.get(1)?,
        description: row.get(2)?,
        status,
        pid: row.get(4)?,
        reserved_at,
        last_used,
        auto_release: row.get(7)?,
    })
}

fn parse_timestamp(text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::super::test_util::create_test_database;
    use super::*;
    use crate::reservation::ReserveOptions;

    fn port(value: u16) -> Port {
        Port::try_from(value).unwrap()
    }

    fn reservation(value: u16, project: &str) -> PortReservation {
        PortReservation::builder(port(value), project).build().unwrap()
    }

    #[test]
    fn get_returns_none_for_missing_port() {
        let db = create_test_database();
        assert!(db.get_reservation(port(3000)).unwrap().is_none());
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let mut db = create_test_database();

        let original = PortReservation::builder(port(3000), "api")
            .description(Some("REST API".into()))
            .tags(vec!["backend".into(), "api".into()])
            .auto_release(true)
            .build()
            .unwrap();

        db.upsert_reservation(&original).unwrap();
        let fetched = db.get_reservation(port(3000)).unwrap().unwrap();

        assert_eq!(fetched.port(), original.port());
        assert_eq!(fetched.project(), "api");
        assert_eq!(fetched.description(), Some("REST API"));
        assert_eq!(fetched.status(), PortStatus::Reserved);
        assert!(fetched.auto_release());
        // tags come back sorted
        assert_eq!(fetched.tags(), ["api", "backend"]);
    }

    #[test]
    fn upsert_replaces_existing_row_and_tags() {
        let mut db = create_test_database();

        let first = PortReservation::builder(port(3000), "api")
            .tags(vec!["old".into()])
            .build()
            .unwrap();
        db.upsert_reservation(&first).unwrap();

        let second = PortReservation::builder(port(3000), "worker")
            .tags(vec!["new".into()])
            .build()
            .unwrap();
        db.upsert_reservation(&second).unwrap();

        let fetched = db.get_reservation(port(3000)).unwrap().unwrap();
        assert_eq!(fetched.project(), "worker");
        assert_eq!(fetched.tags(), ["new"]);
    }

    #[test]
    fn delete_removes_row_and_reports() {
        let mut db = create_test_database();

        db.upsert_reservation(&reservation(3000, "api")).unwrap();
        assert!(db.delete_reservation(port(3000)).unwrap());
        assert!(db.get_reservation(port(3000)).unwrap().is_none());
        assert!(!db.delete_reservation(port(3000)).unwrap());
    }

    #[test]
    fn delete_removes_tags() {
        let mut db = create_test_database();

        let with_tags = PortReservation::builder(port(3000), "api")
            .tags(vec!["a".into()])
            .build()
            .unwrap();
        db.upsert_reservation(&with_tags).unwrap();
        db.delete_reservation(port(3000)).unwrap();

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM tags WHERE port_number = 3000", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn list_orders_by_port() {
        let mut db = create_test_database();

        db.upsert_reservation(&reservation(3002, "c")).unwrap();
        db.upsert_reservation(&reservation(3000, "a")).unwrap();
        db.upsert_reservation(&reservation(3001, "b")).unwrap();

        let all = db.list_reservations(&PortFilter::default()).unwrap();
        let ports: Vec<u16> = all.iter().map(|r| r.port().value()).collect();
        assert_eq!(ports, [3000, 3001, 3002]);
    }

    #[test]
    fn list_filters_by_status() {
        let mut db = create_test_database();

        db.upsert_reservation(&reservation(3000, "a")).unwrap();
        let in_use = PortReservation::builder(port(3001), "b")
            .status(PortStatus::InUse)
            .pid(Some(1234))
            .build()
            .unwrap();
        db.upsert_reservation(&in_use).unwrap();

        let reserved = db
            .list_reservations(&PortFilter::by_status(PortStatus::Reserved))
            .unwrap();
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].port().value(), 3000);
    }

    #[test]
    fn list_filters_by_project_substring_case_insensitive() {
        let mut db = create_test_database();

        db.upsert_reservation(&reservation(3000, "Api-Server")).unwrap();
        db.upsert_reservation(&reservation(3001, "worker")).unwrap();

        let matched = db
            .list_reservations(&PortFilter::by_project("api"))
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].project(), "Api-Server");
    }

    #[test]
    fn set_status_updates_existing_row() {
        let mut db = create_test_database();

        db.upsert_reservation(&reservation(3000, "api")).unwrap();
        assert!(db.set_status(port(3000), PortStatus::Free).unwrap());

        let fetched = db.get_reservation(port(3000)).unwrap().unwrap();
        assert_eq!(fetched.status(), PortStatus::Free);
    }

    #[test]
    fn set_status_on_missing_row_reports_false() {
        let mut db = create_test_database();
        assert!(!db.set_status(port(3000), PortStatus::Free).unwrap());
    }

    #[test]
    fn reserve_options_builder_carries_fields() {
        let opts = ReserveOptions::new("api")
            .with_description(Some("svc".into()))
            .with_tags(vec!["t".into()])
            .with_auto_release(true);
        assert_eq!(opts.project, "api");
        assert_eq!(opts.description.as_deref(), Some("svc"));
        assert!(opts.auto_release);
    }
}
