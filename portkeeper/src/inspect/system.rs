//! System-backed inspector shelling out to platform tools.

use crate::error::{Error, Result};
use crate::reservation::ActivePort;

use super::command::{run_with_deadline, COMMAND_DEADLINE};
use super::parse;
use super::PortInspector;

/// Inspector backed by the host's socket listing tools.
///
/// Uses `lsof` on macOS and Linux and `netstat -ano` on Windows. Tool
/// failures and absent tools degrade to empty results; only a platform
/// with no known tool at all is reported as an error, and only from
/// [`PortInspector::scan_active`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInspector;

impl SystemInspector {
    /// Creates a system inspector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PortInspector for SystemInspector {
    fn scan_active(&self) -> Result<Vec<ActivePort>> {
        if cfg!(target_os = "macos") || cfg!(target_os = "linux") {
            let listing = run_with_deadline(
                "lsof",
                &["-nP", "-iTCP", "-sTCP:LISTEN"],
                COMMAND_DEADLINE,
            );
            Ok(listing
                .map(|output| parse::parse_lsof_listing(&output))
                .unwrap_or_default())
        } else if cfg!(target_os = "windows") {
            let listing = run_with_deadline("netstat", &["-ano"], COMMAND_DEADLINE);
            Ok(listing
                .map(|output| parse::parse_netstat_listing(&output))
                .unwrap_or_default())
        } else {
            Err(Error::UnsupportedPlatform {
                os: std::env::consts::OS.to_string(),
            })
        }
    }

    fn is_bound(&self, port: u16) -> bool {
        self.owner_pid(port).is_some()
    }

    fn owner_pid(&self, port: u16) -> Option<u32> {
        if cfg!(target_os = "macos") || cfg!(target_os = "linux") {
            // The LISTEN filter matters: without it lsof also matches
            // sockets whose remote end uses the port, so an outbound
            // client connection would read as a listener.
            let output = run_with_deadline(
                "lsof",
                &["-nP", &format!("-iTCP:{port}"), "-sTCP:LISTEN", "-t"],
                COMMAND_DEADLINE,
            )?;
            parse::parse_lsof_pids(&output).into_iter().next()
        } else if cfg!(target_os = "windows") {
            let output = run_with_deadline("netstat", &["-ano"], COMMAND_DEADLINE)?;
            parse::parse_netstat_listing(&output)
                .into_iter()
                .find(|active| active.port.value() == port)
                .map(|active| active.pid)
        } else {
            None
        }
    }
}
