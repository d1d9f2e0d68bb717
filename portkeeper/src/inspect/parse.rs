//! Parsers for platform tool output.
//!
//! Kept platform-independent so both parsers are unit tested everywhere.

use std::collections::HashSet;

use crate::reservation::ActivePort;
use crate::Port;

/// Parses full `lsof -nP -iTCP -sTCP:LISTEN` output.
///
/// Expected row shape (header skipped):
///
/// ```text
/// COMMAND  PID  USER  FD  TYPE  DEVICE  SIZE/OFF  NODE  NAME          (LISTEN)
/// node     123  dev   23u IPv4  0x..    0t0       TCP   *:3000        (LISTEN)
/// ```
///
/// Rows that do not fit are skipped. A process listening on the same port
/// over both IPv4 and IPv6 is reported once.
pub(crate) fn parse_lsof_listing(output: &str) -> Vec<ActivePort> {
    let mut seen: HashSet<(u16, u32)> = HashSet::new();
    let mut active = Vec::new();

    for line in output.lines().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 9 || tokens.last() != Some(&"(LISTEN)") {
            continue;
        }

        let Ok(pid) = tokens[1].parse::<u32>() else {
            continue;
        };
        let address = tokens[tokens.len() - 2];
        let Some(port) = port_from_address(address) else {
            continue;
        };

        if seen.insert((port.value(), pid)) {
            active.push(ActivePort {
                port,
                pid,
                process_name: Some(tokens[0].to_string()),
                state: Some("LISTEN".to_string()),
                address: Some(address.to_string()),
            });
        }
    }

    active
}

/// Parses terse `lsof -ti tcp:{port}` output into pids, one per line.
pub(crate) fn parse_lsof_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Parses `netstat -ano` output, keeping TCP rows in the LISTENING state.
///
/// Expected row shape:
///
/// ```text
/// TCP    0.0.0.0:3000    0.0.0.0:0    LISTENING    1234
/// ```
pub(crate) fn parse_netstat_listing(output: &str) -> Vec<ActivePort> {
    let mut seen: HashSet<(u16, u32)> = HashSet::new();
    let mut active = Vec::new();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 5 || !tokens[0].eq_ignore_ascii_case("tcp") {
            continue;
        }
        if !tokens[3].eq_ignore_ascii_case("listening") {
            continue;
        }

        let Ok(pid) = tokens[4].parse::<u32>() else {
            continue;
        };
        let address = tokens[1];
        let Some(port) = port_from_address(address) else {
            continue;
        };

        if seen.insert((port.value(), pid)) {
            active.push(ActivePort {
                port,
                pid,
                process_name: None,
                state: Some("LISTENING".to_string()),
                address: Some(address.to_string()),
            });
        }
    }

    active
}

/// Extracts the port from an `addr:port` token such as `*:3000`,
/// `127.0.0.1:8080`, or `[::1]:9000`.
fn port_from_address(address: &str) -> Option<Port> {
    let (_, port_text) = address.rsplit_once(':')?;
    let value: u16 = port_text.parse().ok()?;
    Port::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSOF_SAMPLE: &str = "\
COMMAND   PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
node     4242   dev   23u  IPv4 0x1a2b3c4d      0t0  TCP *:3000 (LISTEN)
node     4242   dev   24u  IPv6 0x1a2b3c4e      0t0  TCP *:3000 (LISTEN)
postgres  981   dev    7u  IPv4 0x5e6f7a8b      0t0  TCP 127.0.0.1:5432 (LISTEN)
chrome   1200   dev   88u  IPv4 0x9c0d1e2f      0t0  TCP 127.0.0.1:54321->142.250.0.1:443 (ESTABLISHED)
";

    const NETSTAT_SAMPLE: &str = "\
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:3000           0.0.0.0:0              LISTENING       4242
  TCP    127.0.0.1:5432         0.0.0.0:0              LISTENING       981
  TCP    192.168.1.5:54321      142.250.0.1:443        ESTABLISHED     1200
  UDP    0.0.0.0:5353           *:*                                    333
";

    #[test]
    fn lsof_listing_extracts_listeners() {
        let active = parse_lsof_listing(LSOF_SAMPLE);
        assert_eq!(active.len(), 2);

        assert_eq!(active[0].port.value(), 3000);
        assert_eq!(active[0].pid, 4242);
        assert_eq!(active[0].process_name.as_deref(), Some("node"));
        assert_eq!(active[0].state.as_deref(), Some("LISTEN"));
        assert_eq!(active[0].address.as_deref(), Some("*:3000"));

        assert_eq!(active[1].port.value(), 5432);
        assert_eq!(active[1].pid, 981);
    }

    #[test]
    fn lsof_listing_dedups_dual_stack_listeners() {
        let active = parse_lsof_listing(LSOF_SAMPLE);
        let on_3000: Vec<_> = active.iter().filter(|a| a.port.value() == 3000).collect();
        assert_eq!(on_3000.len(), 1);
    }

    #[test]
    fn lsof_listing_ignores_established_connections() {
        let active = parse_lsof_listing(LSOF_SAMPLE);
        assert!(active.iter().all(|a| a.pid != 1200));
    }

    #[test]
    fn lsof_listing_tolerates_garbage() {
        assert!(parse_lsof_listing("").is_empty());
        assert!(parse_lsof_listing("not lsof output at all\nstill not\n").is_empty());
    }

    #[test]
    fn lsof_pids_parses_one_per_line() {
        assert_eq!(parse_lsof_pids("4242\n981\n"), [4242, 981]);
        assert_eq!(parse_lsof_pids("  4242  \n"), [4242]);
        assert!(parse_lsof_pids("").is_empty());
        assert!(parse_lsof_pids("garbage\n").is_empty());
    }

    #[test]
    fn netstat_listing_extracts_listeners() {
        let active = parse_netstat_listing(NETSTAT_SAMPLE);
        assert_eq!(active.len(), 2);

        assert_eq!(active[0].port.value(), 3000);
        assert_eq!(active[0].pid, 4242);
        assert_eq!(active[0].process_name, None);
        assert_eq!(active[0].state.as_deref(), Some("LISTENING"));
    }

    #[test]
    fn netstat_listing_skips_udp_and_established() {
        let active = parse_netstat_listing(NETSTAT_SAMPLE);
        assert!(active.iter().all(|a| a.pid != 1200 && a.pid != 333));
    }

    #[test]
    fn address_parsing_handles_ipv6_brackets() {
        assert_eq!(port_from_address("[::1]:9000").unwrap().value(), 9000);
        assert_eq!(port_from_address("*:3000").unwrap().value(), 3000);
        assert!(port_from_address("no-port-here").is_none());
        assert!(port_from_address("*:0").is_none());
    }
}
