//! Exclusion sets for the port allocator.
//!
//! The allocator never hands out ports conventionally claimed by common
//! services, even when nothing is listening on them locally. Callers can
//! widen the set with their own avoid list.

use std::collections::BTreeSet;

use crate::Port;

/// Ports conventionally reserved for well-known services.
///
/// Covers remote access and transfer protocols (FTP, SSH, SMTP), the web
/// (HTTP, HTTPS), and the usual local database and cache daemons (MySQL,
/// PostgreSQL, Redis, Memcached, MongoDB).
pub const WELL_KNOWN_PORTS: [u16; 10] = [21, 22, 25, 80, 443, 3306, 5432, 6379, 11211, 27017];

/// A set of ports the allocator must skip.
///
/// # Examples
///
/// ```
/// use portkeeper::port::exclusions::ExclusionSet;
/// use portkeeper::Port;
///
/// let set = ExclusionSet::with_avoided(&[3000, 3001]);
///
/// assert!(set.is_excluded(Port::try_from(443u16).unwrap()));
/// assert!(set.is_excluded(Port::try_from(3000u16).unwrap()));
/// assert!(!set.is_excluded(Port::try_from(3002u16).unwrap()));
/// ```
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    excluded: BTreeSet<Port>,
}

impl ExclusionSet {
    /// Creates the default exclusion set of well-known service ports.
    #[must_use]
    pub fn well_known() -> Self {
        let excluded = WELL_KNOWN_PORTS
            .iter()
            .filter_map(|&p| Port::try_from(p).ok())
            .collect();
        Self { excluded }
    }

    /// Creates the well-known set unioned with a caller-supplied avoid list.
    ///
    /// Invalid entries in the avoid list (port 0) are skipped.
    #[must_use]
    pub fn with_avoided(avoid: &[u16]) -> Self {
        let mut set = Self::well_known();
        for &value in avoid {
            if let Ok(port) = Port::try_from(value) {
                set.excluded.insert(port);
            }
        }
        set
    }

    /// Creates an empty exclusion set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            excluded: BTreeSet::new(),
        }
    }

    /// Adds a single port to the set.
    pub fn insert(&mut self, port: Port) {
        self.excluded.insert(port);
    }

    /// Returns `true` if the given port must not be allocated.
    #[must_use]
    pub fn is_excluded(&self, port: Port) -> bool {
        self.excluded.contains(&port)
    }

    /// Returns the number of excluded ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    /// Returns `true` if no ports are excluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}
