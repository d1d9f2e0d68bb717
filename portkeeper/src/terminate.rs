//! Process signalling for freeing occupied ports.
//!
//! The service escalates from a polite stop to a forced kill; this module
//! supplies the signalling seam it escalates through. The system
//! implementation shells out (`kill` on unix, `taskkill` on windows) with
//! the same bounded deadline the inspectors use.

use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::inspect::command::{run_capturing, run_with_deadline, COMMAND_DEADLINE};

/// How long a process is given to exit after the polite stop before the
/// forced kill is considered.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(1);

/// Sends stop signals to processes.
///
/// A pid that is already gone is never an error: the goal is a free
/// port, and a vanished process means the goal is met.
pub trait ProcessControl: Send + Sync {
    /// Asks the process to exit (SIGTERM on unix).
    ///
    /// # Errors
    ///
    /// Returns an error only for signalling failures other than the
    /// process not existing.
    fn terminate(&self, pid: u32) -> Result<()>;

    /// Forcibly kills the process (SIGKILL on unix).
    ///
    /// # Errors
    ///
    /// Returns an error only for signalling failures other than the
    /// process not existing.
    fn force_kill(&self, pid: u32) -> Result<()>;

    /// Reports whether the process still exists.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Process control backed by the host's signalling tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessControl;

impl SystemProcessControl {
    /// Creates a system process controller.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessControl for SystemProcessControl {
    fn terminate(&self, pid: u32) -> Result<()> {
        debug!("sending polite stop to pid {pid}");
        if cfg!(windows) {
            deliver_signal("taskkill", &["/PID", &pid.to_string()])
        } else {
            deliver_signal("kill", &["-TERM", &pid.to_string()])
        }
    }

    fn force_kill(&self, pid: u32) -> Result<()> {
        debug!("force killing pid {pid}");
        if cfg!(windows) {
            deliver_signal("taskkill", &["/PID", &pid.to_string(), "/F"])
        } else {
            deliver_signal("kill", &["-KILL", &pid.to_string()])
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        if cfg!(windows) {
            run_with_deadline(
                "tasklist",
                &["/FI", &format!("PID eq {pid}"), "/NH"],
                COMMAND_DEADLINE,
            )
            .is_some_and(|output| output.contains(&pid.to_string()))
        } else {
            run_with_deadline(
                "ps",
                &["-p", &pid.to_string(), "-o", "pid="],
                COMMAND_DEADLINE,
            )
            .is_some_and(|output| !output.trim().is_empty())
        }
    }
}

/// Runs a signalling tool and maps its outcome onto the trait contract.
///
/// A report that the process does not exist is success: the pid vanished
/// on its own and the goal is already met. Every other failure, a
/// permission refusal above all, must surface so the caller never reports
/// a kill that did not happen. A tool that cannot be run at all counts as
/// a delivery failure too.
fn deliver_signal(program: &str, args: &[&str]) -> Result<()> {
    let Some(output) = run_capturing(program, args, COMMAND_DEADLINE) else {
        return Err(delivery_error(program, args, "tool could not be run"));
    };
    if output.success || reports_missing_process(&output.stderr) {
        return Ok(());
    }

    let detail = output.stderr.trim();
    let detail = if detail.is_empty() {
        "exited with failure"
    } else {
        detail
    };
    Err(delivery_error(program, args, detail))
}

// `kill` says "No such process"; `taskkill` says the process was
// "not found".
fn reports_missing_process(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such process") || lower.contains("not found")
}

fn delivery_error(program: &str, args: &[&str], detail: &str) -> crate::error::Error {
    std::io::Error::other(format!("{program} {}: {detail}", args.join(" "))).into()
}

/// Scripted process control for tests.
///
/// Records every signal sent. A pid registered as stubborn survives the
/// polite stop and only dies to a forced kill.
#[derive(Debug, Default)]
pub struct MockProcessControl {
    state: std::sync::Mutex<MockControlState>,
}

#[derive(Debug, Default)]
struct MockControlState {
    alive: std::collections::HashMap<u32, bool>,
    protected: std::collections::HashSet<u32>,
    terminated: Vec<u32>,
    force_killed: Vec<u32>,
}

impl MockProcessControl {
    /// Creates a controller with no known processes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a process that exits when politely stopped.
    pub fn spawn(&self, pid: u32) {
        self.state.lock().unwrap().alive.insert(pid, false);
    }

    /// Registers a process that ignores the polite stop.
    pub fn spawn_stubborn(&self, pid: u32) {
        self.state.lock().unwrap().alive.insert(pid, true);
    }

    /// Registers a process that refuses every signal, as a pid owned by
    /// another user would.
    pub fn spawn_protected(&self, pid: u32) {
        let mut state = self.state.lock().unwrap();
        state.alive.insert(pid, true);
        state.protected.insert(pid);
    }

    /// Returns the pids that received a polite stop, in order.
    #[must_use]
    pub fn terminated(&self) -> Vec<u32> {
        self.state.lock().unwrap().terminated.clone()
    }

    /// Returns the pids that were force killed, in order.
    #[must_use]
    pub fn force_killed(&self) -> Vec<u32> {
        self.state.lock().unwrap().force_killed.clone()
    }
}

impl ProcessControl for MockProcessControl {
    fn terminate(&self, pid: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.terminated.push(pid);
        if state.protected.contains(&pid) {
            return Err(std::io::Error::other("operation not permitted").into());
        }
        if let Some(&stubborn) = state.alive.get(&pid) {
            if !stubborn {
                state.alive.remove(&pid);
            }
        }
        Ok(())
    }

    fn force_kill(&self, pid: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.force_killed.push(pid);
        if state.protected.contains(&pid) {
            return Err(std::io::Error::other("operation not permitted").into());
        }
        state.alive.remove(&pid);
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().unwrap().alive.contains_key(&pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliant_process_dies_to_polite_stop() {
        let control = MockProcessControl::new();
        control.spawn(100);

        control.terminate(100).unwrap();
        assert!(!control.is_alive(100));
        assert_eq!(control.terminated(), [100]);
        assert!(control.force_killed().is_empty());
    }

    #[test]
    fn stubborn_process_survives_until_force_kill() {
        let control = MockProcessControl::new();
        control.spawn_stubborn(200);

        control.terminate(200).unwrap();
        assert!(control.is_alive(200));

        control.force_kill(200).unwrap();
        assert!(!control.is_alive(200));
        assert_eq!(control.force_killed(), [200]);
    }

    #[test]
    fn signalling_unknown_pid_is_not_an_error() {
        let control = MockProcessControl::new();
        assert!(control.terminate(999).is_ok());
        assert!(control.force_kill(999).is_ok());
        assert!(!control.is_alive(999));
    }

    #[test]
    fn protected_process_refuses_signals_and_stays_alive() {
        let control = MockProcessControl::new();
        control.spawn_protected(300);

        assert!(control.terminate(300).is_err());
        assert!(control.force_kill(300).is_err());
        assert!(control.is_alive(300));
    }

    #[cfg(unix)]
    #[test]
    fn refused_delivery_surfaces_the_tool_error() {
        let err = deliver_signal(
            "sh",
            &["-c", "echo 'Operation not permitted' >&2; exit 1"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Operation not permitted"));
    }

    #[cfg(unix)]
    #[test]
    fn missing_process_report_counts_as_delivered() {
        deliver_signal("sh", &["-c", "echo 'kill: No such process' >&2; exit 1"]).unwrap();
    }

    #[test]
    fn unavailable_signalling_tool_is_a_delivery_failure() {
        assert!(deliver_signal("definitely-not-a-real-signal-tool", &[]).is_err());
    }
}
