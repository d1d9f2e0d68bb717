//! Bounded execution of platform inspection tools.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Hard deadline on every shell-out. A wedged tool must never stall a
/// reconciliation pass indefinitely.
pub(crate) const COMMAND_DEADLINE: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a shell-out that ran to completion.
pub(crate) struct CommandOutput {
    pub(crate) success: bool,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

/// Runs a tool and captures its stdout, killing it at the deadline.
///
/// Returns `None` when the tool cannot be spawned (not installed) or
/// overruns the deadline; callers treat both the same as "no data".
/// A nonzero exit with output is not a failure: `lsof` exits 1 when it
/// simply finds no matching sockets.
pub(crate) fn run_with_deadline(program: &str, args: &[&str], deadline: Duration) -> Option<String> {
    run_capturing(program, args, deadline).map(|output| output.stdout)
}

/// Runs a tool and captures its exit status and both output streams,
/// killing it at the deadline.
///
/// Returns `None` for the same cases as [`run_with_deadline`]: the tool
/// could not be spawned or overran the deadline. Callers that care about
/// the exit status (the signal senders) inspect `success` and `stderr`
/// themselves.
pub(crate) fn run_capturing(
    program: &str,
    args: &[&str],
    deadline: Duration,
) -> Option<CommandOutput> {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!("{program} unavailable: {e}");
            return None;
        }
    };

    let mut stdout = child.stdout.take()?;
    let out_reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout.read_to_string(&mut buf);
        buf
    });
    let mut stderr = child.stderr.take()?;
    let err_reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= deadline {
                    warn!("{program} overran the {deadline:?} deadline, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    // Drain the readers so their threads exit.
                    let _ = out_reader.join();
                    let _ = err_reader.join();
                    return None;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!("waiting on {program} failed: {e}");
                let _ = child.kill();
                let _ = child.wait();
                let _ = out_reader.join();
                let _ = err_reader.join();
                return None;
            }
        }
    };

    Some(CommandOutput {
        success: status.success(),
        stdout: out_reader.join().ok()?,
        stderr: err_reader.join().ok()?,
    })
}
