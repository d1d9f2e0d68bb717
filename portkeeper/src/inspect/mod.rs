//! Live port inspection.
//!
//! Answers two questions about the running system: which ports have
//! listening sockets, and is one specific port bound. The system-backed
//! implementation shells out to platform tools (`lsof` on unix, `netstat`
//! on windows); a missing tool or unparseable output degrades to "nothing
//! found" so reconciliation falls back to reservation records alone.

pub(crate) mod command;
mod mock;
mod parse;
mod system;

pub use mock::MockInspector;
pub use system::SystemInspector;

use crate::error::Result;
use crate::reservation::ActivePort;

/// Read-only view of the operating system's listening sockets.
///
/// The service layer is generic over this trait so reconciliation logic
/// can be tested against a scripted [`MockInspector`] instead of live
/// sockets.
pub trait PortInspector: Send + Sync {
    /// Lists every port with a listening TCP socket.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedPlatform`] on operating systems
    /// without a known listing tool. Tool failures are not errors; they
    /// produce an empty list.
    fn scan_active(&self) -> Result<Vec<ActivePort>>;

    /// Reports whether anything is listening on the given port.
    ///
    /// Never fails: on unsupported platforms or when the probe tool is
    /// unavailable the port is reported unbound.
    fn is_bound(&self, port: u16) -> bool;

    /// Returns the pid of the process listening on the given port, if any.
    fn owner_pid(&self, port: u16) -> Option<u32>;
}
