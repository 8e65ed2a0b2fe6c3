//! Source filtering for inbound datagrams.
//!
//! The listen socket usually sits on a shared port where unrelated broadcast
//! and multicast traffic also lands. Only datagrams from known logging-app
//! ports, or from local applications on low ports, are let through.

use std::net::SocketAddr;

/// Ports that logging applications are known to send from.
///
/// 2333 (this relay's default), 2237 (WSJT-X), 2442 (JS8Call) and
/// 12060 (N1MM Logger Plus).
pub const KNOWN_PORTS: [u16; 4] = [2333, 2237, 2442, 12060];

/// Loopback senders below this port are accepted regardless of port.
pub const LOOPBACK_PORT_LIMIT: u16 = 10000;

/// Decides which source addresses may feed the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFilter {
    listen_port: u16,
}

impl SourceFilter {
    /// Create a filter that also accepts datagrams from `listen_port`.
    pub fn new(listen_port: u16) -> Self {
        Self { listen_port }
    }

    /// The configured listen port.
    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Check whether a datagram from `source` should be processed.
    pub fn accepts(&self, source: SocketAddr) -> bool {
        let port = source.port();
        port == self.listen_port
            || KNOWN_PORTS.contains(&port)
            || (source.ip().to_canonical().is_loopback() && port < LOOPBACK_PORT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_known_ports_accepted_from_anywhere() {
        let filter = SourceFilter::new(2333);
        for port in KNOWN_PORTS {
            assert!(filter.accepts(SocketAddr::new("192.168.1.20".parse().unwrap(), port)));
        }
    }

    #[test]
    fn test_listen_port_accepted() {
        let filter = SourceFilter::new(5000);
        assert!(filter.accepts(addr("10.0.0.5:5000")));
        assert!(!filter.accepts(addr("10.0.0.5:5001")));
        assert_eq!(filter.listen_port(), 5000);
    }

    #[test]
    fn test_remote_ephemeral_port_rejected() {
        let filter = SourceFilter::new(2333);
        assert!(!filter.accepts(addr("192.168.1.20:55001")));
        assert!(!filter.accepts(addr("192.168.1.20:9999")));
    }

    #[test]
    fn test_loopback_low_ports() {
        let filter = SourceFilter::new(2333);
        assert!(filter.accepts(addr("127.0.0.1:9999")));
        assert!(filter.accepts(addr("[::1]:4000")));
        assert!(!filter.accepts(addr("127.0.0.1:10000")));
        assert!(!filter.accepts(addr("127.0.0.1:55001")));
    }

    #[test]
    fn test_ipv4_mapped_loopback() {
        // Local IPv4 apps as seen by a dual-stack `::` listener
        let filter = SourceFilter::new(2333);
        assert!(filter.accepts(addr("[::ffff:127.0.0.1]:4000")));
        assert!(!filter.accepts(addr("[::ffff:127.0.0.1]:55001")));
        assert!(!filter.accepts(addr("[::ffff:192.168.1.20]:4000")));
    }
}
