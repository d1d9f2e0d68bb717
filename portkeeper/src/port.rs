//! Port and port range types.
//!
//! Validated TCP port numbers and inclusive ranges used throughout the
//! reservation, inspection, and allocation layers.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod exclusions;

/// A valid TCP port number (1-65535).
///
/// Port 0 is rejected: it means "pick any port" to the OS and can never be
/// the subject of a reservation.
///
/// # Examples
///
/// ```
/// use portkeeper::Port;
///
/// let port = Port::try_from(3000u16).unwrap();
/// assert_eq!(port.value(), 3000);
///
/// assert!(Port::try_from(0u16).is_err());
/// assert!(Port::try_from(70000u32).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// The minimum valid port number.
    pub const MIN: u16 = 1;

    /// The maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Returns the underlying port number.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns `true` if this is a privileged port (< 1024).
    ///
    /// Binding a privileged port typically requires elevated permissions,
    /// which makes them poor candidates for development reservations.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        self.0 < 1024
    }
}

impl TryFrom<u16> for Port {
    type Error = InvalidPortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(InvalidPortError {
                value: u32::from(value),
                reason: "port must be between 1 and 65535".into(),
            })
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<u32> for Port {
    type Error = InvalidPortError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match u16::try_from(value) {
            Ok(v) if v != 0 => Ok(Self(v)),
            _ => Err(InvalidPortError {
                value,
                reason: "port must be between 1 and 65535".into(),
            }),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for invalid port numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPortError {
    /// The invalid port value.
    pub value: u32,
    /// The reason the port is invalid.
    pub reason: String,
}

impl fmt::Display for InvalidPortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid port {}: {}", self.value, self.reason)
    }
}

impl std::error::Error for InvalidPortError {}

/// An inclusive range of ports.
///
/// # Examples
///
/// ```
/// use portkeeper::{Port, PortRange};
///
/// let range = PortRange::new(
///     Port::try_from(3000u16).unwrap(),
///     Port::try_from(3009u16).unwrap(),
/// ).unwrap();
///
/// assert_eq!(range.len(), 10);
/// assert!(range.contains(Port::try_from(3005u16).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    min: Port,
    max: Port,
}

impl PortRange {
    /// Creates a new port range.
    ///
    /// # Errors
    ///
    /// Returns an error if `max` is less than `min`.
    pub fn new(min: Port, max: Port) -> Result<Self, InvalidPortRangeError> {
        if max < min {
            Err(InvalidPortRangeError {
                min,
                max,
                reason: "max must be greater than or equal to min".into(),
            })
        } else {
            Ok(Self { min, max })
        }
    }

    /// Returns the minimum port in the range.
    #[must_use]
    pub const fn min(&self) -> Port {
        self.min
    }

    /// Returns the maximum port in the range.
    #[must_use]
    pub const fn max(&self) -> Port {
        self.max
    }

    /// Returns `true` if the range contains the given port.
    #[must_use]
    pub const fn contains(&self, port: Port) -> bool {
        port.value() >= self.min.value() && port.value() <= self.max.value()
    }

    /// Returns the number of ports in the range (inclusive).
    ///
    /// There is no matching `is_empty`: a constructed range always holds
    /// at least one port.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> u16 {
        self.max.value() - self.min.value() + 1
    }

    /// Returns an iterator over all ports in the range, ascending.
    #[must_use]
    pub fn iter(self) -> PortRangeIter {
        PortRangeIter {
            range: self,
            current: u32::from(self.min.value()),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl IntoIterator for PortRange {
    type Item = Port;
    type IntoIter = PortRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over ports in a [`PortRange`].
///
/// The cursor is kept as `u32` so a range ending at 65535 terminates
/// without overflowing.
#[derive(Debug)]
pub struct PortRangeIter {
    range: PortRange,
    current: u32,
}

impl Iterator for PortRangeIter {
    type Item = Port;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current <= u32::from(self.range.max.value()) {
            #[allow(clippy::cast_possible_truncation)]
            let port = Port(self.current as u16);
            self.current += 1;
            Some(port)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let max = u32::from(self.range.max.value());
        if self.current <= max {
            let remaining = (max - self.current + 1) as usize;
            (remaining, Some(remaining))
        } else {
            (0, Some(0))
        }
    }
}

impl ExactSizeIterator for PortRangeIter {
    fn len(&self) -> usize {
        self.size_hint().0
    }
}

/// Error type for invalid port ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPortRangeError {
    /// The minimum port.
    pub min: Port,
    /// The maximum port.
    pub max: Port,
    /// The reason the range is invalid.
    pub reason: String,
}

impl fmt::Display for InvalidPortRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid port range {}-{}: {}",
            self.min, self.max, self.reason
        )
    }
}

impl std::error::Error for InvalidPortRangeError {}
