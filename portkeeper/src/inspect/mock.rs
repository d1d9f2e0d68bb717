//! Scriptable inspector for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::reservation::ActivePort;
use crate::Port;

use super::PortInspector;

/// A scripted, in-memory inspector.
///
/// Tests bind and release ports explicitly instead of opening sockets.
/// `bind_after` arms a port to come up on its nth future probe, which
/// lets a test make a port appear occupied partway through a multi-port
/// allocation.
#[derive(Debug, Default)]
pub struct MockInspector {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    bound: HashMap<u16, u32>,
    pending: HashMap<u16, usize>,
}

impl MockInspector {
    /// Creates an inspector with no bound ports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a port as bound by the given pid.
    pub fn bind(&self, port: u16, pid: u32) {
        let mut state = self.state.lock().unwrap();
        state.bound.insert(port, pid);
    }

    /// Removes any binding on the port.
    pub fn release(&self, port: u16) {
        let mut state = self.state.lock().unwrap();
        state.bound.remove(&port);
        state.pending.remove(&port);
    }

    /// Arms the port to report free for `probes` further checks, then
    /// become bound by `pid`.
    pub fn bind_after(&self, port: u16, probes: usize, pid: u32) {
        let mut state = self.state.lock().unwrap();
        if probes == 0 {
            state.bound.insert(port, pid);
        } else {
            state.pending.insert(port, probes);
            state.bound.insert(port, pid);
        }
    }

    fn probe(&self, port: u16) -> Option<u32> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.pending.get_mut(&port) {
            *remaining -= 1;
            if *remaining == 0 {
                state.pending.remove(&port);
            }
            return None;
        }
        state.bound.get(&port).copied()
    }
}

impl PortInspector for MockInspector {
    fn scan_active(&self) -> Result<Vec<ActivePort>> {
        let state = self.state.lock().unwrap();
        let mut active: Vec<ActivePort> = state
            .bound
            .iter()
            .filter(|(port, _)| !state.pending.contains_key(port))
            .filter_map(|(&port, &pid)| {
                Some(ActivePort {
                    port: Port::try_from(port).ok()?,
                    pid,
                    process_name: Some("mock".to_string()),
                    state: Some("LISTEN".to_string()),
                    address: Some(format!("*:{port}")),
                })
            })
            .collect();
        active.sort_by_key(|a| a.port);
        Ok(active)
    }

    fn is_bound(&self, port: u16) -> bool {
        self.probe(port).is_some()
    }

    fn owner_pid(&self, port: u16) -> Option<u32> {
        self.probe(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_release() {
        let inspector = MockInspector::new();
        assert!(!inspector.is_bound(3000));

        inspector.bind(3000, 42);
        assert!(inspector.is_bound(3000));
        assert_eq!(inspector.owner_pid(3000), Some(42));

        inspector.release(3000);
        assert!(!inspector.is_bound(3000));
    }

    #[test]
    fn scan_reports_bound_ports_sorted() {
        let inspector = MockInspector::new();
        inspector.bind(8080, 2);
        inspector.bind(3000, 1);

        let active = inspector.scan_active().unwrap();
        let ports: Vec<u16> = active.iter().map(|a| a.port.value()).collect();
        assert_eq!(ports, [3000, 8080]);
    }

    #[test]
    fn bind_after_delays_visibility() {
        let inspector = MockInspector::new();
        inspector.bind_after(3000, 2, 7);

        assert!(!inspector.is_bound(3000));
        assert!(!inspector.is_bound(3000));
        assert!(inspector.is_bound(3000));
        assert_eq!(inspector.owner_pid(3000), Some(7));
    }
}
