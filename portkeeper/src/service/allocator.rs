//! Multi-port allocation with all-or-nothing semantics.

use std::collections::HashSet;

use log::{debug, warn};
use rand::Rng;

use crate::error::{Error, Result};
use crate::inspect::PortInspector;
use crate::port::exclusions::ExclusionSet;
use crate::reservation::{PortStatus, RequestOptions, RequestOutcome, ReserveOptions};
use crate::terminate::ProcessControl;
use crate::{Port, PortRange};

use super::PortService;

/// Upper bound on how many ports one request may claim.
pub const MAX_REQUEST_COUNT: usize = 100;

impl<I: PortInspector, P: ProcessControl> PortService<I, P> {
    /// Finds and reserves `count` free ports in one request.
    ///
    /// Candidates are drawn from `[start_port, end_port]`, skipping the
    /// well-known service ports and the caller's avoid list, either in
    /// ascending order or uniformly at random without replacement. The
    /// request is all-or-nothing: if any reservation write fails partway,
    /// every port reserved earlier in the same request is released again
    /// and the original failure is propagated.
    ///
    /// Sub-reservations are named `{project}-1` through `{project}-{count}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCount`] for a count outside 1-100,
    /// [`Error::InvalidPortRange`] when the range bounds are inverted,
    /// and [`Error::InsufficientPorts`] when the range does not hold
    /// enough free ports. Reservation-phase failures propagate after
    /// rollback.
    pub fn request_ports(&mut self, options: &RequestOptions) -> Result<RequestOutcome> {
        if options.count < 1 || options.count > MAX_REQUEST_COUNT {
            return Err(Error::InvalidCount {
                count: options.count,
            });
        }
        let range = PortRange::new(options.start_port, options.end_port)?;

        let exclusions = ExclusionSet::with_avoided(&options.avoid);
        let found = if options.sequential {
            self.find_sequential(range, options.count, &exclusions)?
        } else {
            self.find_random(range, options.count, &exclusions)?
        };

        if found.len() < options.count {
            return Err(Error::InsufficientPorts {
                found: found.len(),
                requested: options.count,
            });
        }

        self.reserve_found(options, &found)
    }

    fn find_sequential(
        &mut self,
        range: PortRange,
        count: usize,
        exclusions: &ExclusionSet,
    ) -> Result<Vec<Port>> {
        let mut found = Vec::with_capacity(count);

        for port in range {
            if found.len() == count {
                break;
            }
            if exclusions.is_excluded(port) {
                continue;
            }
            if self.resolve_status(port)? == PortStatus::Free {
                found.push(port);
            }
        }

        Ok(found)
    }

    fn find_random(
        &mut self,
        range: PortRange,
        count: usize,
        exclusions: &ExclusionSet,
    ) -> Result<Vec<Port>> {
        let start = range.min().value();
        let end = range.max().value();

        let mut rng = rand::thread_rng();
        let mut tried: HashSet<u16> = HashSet::new();
        let mut found = Vec::with_capacity(count);

        // Tried candidates bound the loop: once every distinct value in
        // the range has been drawn, the search is exhausted.
        while found.len() < count && tried.len() < usize::from(range.len()) {
            let value = rng.gen_range(start..=end);
            if !tried.insert(value) {
                continue;
            }
            let port = Port::try_from(value)?;
            if exclusions.is_excluded(port) {
                continue;
            }
            if self.resolve_status(port)? == PortStatus::Free {
                found.push(port);
            }
        }

        Ok(found)
    }

    fn reserve_found(
        &mut self,
        options: &RequestOptions,
        found: &[Port],
    ) -> Result<RequestOutcome> {
        let mut reserved = Vec::with_capacity(found.len());

        for (index, &port) in found.iter().enumerate() {
            let sub_options = ReserveOptions::new(format!("{}-{}", options.project, index + 1))
                .with_description(options.description.clone())
                .with_tags(options.tags.clone());

            match self.reserve_port(port.value(), &sub_options) {
                Ok(reservation) => reserved.push(reservation),
                Err(e) => {
                    warn!(
                        "reservation of port {port} failed mid-request, rolling back {} earlier reservation(s)",
                        reserved.len()
                    );
                    self.rollback(&reserved);
                    return Err(e);
                }
            }
        }

        let numbers: Vec<String> = reserved
            .iter()
            .map(|r| r.port().value().to_string())
            .collect();
        let summary = format!(
            "Reserved {} port(s) for {}: {}",
            reserved.len(),
            options.project,
            numbers.join(", ")
        );
        debug!("{summary}");

        Ok(RequestOutcome {
            ports: reserved,
            summary,
        })
    }

    /// Best-effort release of partially reserved ports. Rollback errors
    /// are swallowed so they never mask the original failure.
    fn rollback(&mut self, reserved: &[crate::reservation::PortReservation]) {
        for reservation in reserved {
            if let Err(e) = self.release_port(reservation.port().value()) {
                warn!(
                    "rollback of port {} failed: {e}",
                    reservation.port().value()
                );
            }
        }
    }
}
