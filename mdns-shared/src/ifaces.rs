//! Network-interface address lookup.
//!
//! The responder advertises the addresses of the interface it is bound to.
//! [`InterfaceAddresses`] is the narrow seam it looks them up through;
//! [`SystemInterfaces`] asks the operating system and [`StaticInterfaces`]
//! answers from a fixed table, which is what tests and hosts without an
//! OS interface list use.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Looks up the local addresses assigned to a named interface.
pub trait InterfaceAddresses {
    /// First non-loopback IPv4 address of `interface`.
    fn local_ipv4(&self, interface: &str) -> Option<Ipv4Addr>;

    /// First IPv6 address of `interface`, link-local addresses preferred,
    /// together with the interface scope id.
    fn local_ipv6(&self, interface: &str) -> Option<(Ipv6Addr, u32)>;
}

/// Interface lookup backed by the operating system.
#[derive(Default, Debug, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceAddresses for SystemInterfaces {
    fn local_ipv4(&self, interface: &str) -> Option<Ipv4Addr> {
        let ifaces = match if_addrs::get_if_addrs() {
            Ok(ifaces) => ifaces,
            Err(_) => return None,
        };
        ifaces
            .iter()
            .filter(|iface| iface.name == interface && !iface.is_loopback())
            .find_map(|iface| match iface.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
    }

    fn local_ipv6(&self, interface: &str) -> Option<(Ipv6Addr, u32)> {
        let ifaces = if_addrs::get_if_addrs().ok()?;
        let mut candidates: Vec<(Ipv6Addr, u32)> = ifaces
            .iter()
            .filter(|iface| iface.name == interface)
            .filter_map(|iface| match iface.ip() {
                IpAddr::V6(ip) => Some((ip, iface.index.unwrap_or(0))),
                IpAddr::V4(_) => None,
            })
            .collect();
        candidates.sort_by_key(|(ip, _)| !is_link_local_v6(ip));
        candidates.into_iter().next()
    }
}

/// Fixed interface table.
#[derive(Default, Debug, Clone)]
pub struct StaticInterfaces {
    entries: Vec<StaticInterface>,
}

#[derive(Debug, Clone)]
struct StaticInterface {
    name: String,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<(Ipv6Addr, u32)>,
}

impl StaticInterfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ipv4(mut self, interface: &str, addr: Ipv4Addr) -> Self {
        self.entry(interface).ipv4 = Some(addr);
        self
    }

    pub fn with_ipv6(mut self, interface: &str, addr: Ipv6Addr, scope_id: u32) -> Self {
        self.entry(interface).ipv6 = Some((addr, scope_id));
        self
    }

    fn entry(&mut self, interface: &str) -> &mut StaticInterface {
        let pos = match self.entries.iter().position(|e| e.name == interface) {
            Some(pos) => pos,
            None => {
                self.entries.push(StaticInterface {
                    name: interface.to_owned(),
                    ipv4: None,
                    ipv6: None,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos]
    }
}

impl InterfaceAddresses for StaticInterfaces {
    fn local_ipv4(&self, interface: &str) -> Option<Ipv4Addr> {
        self.entries
            .iter()
            .find(|e| e.name == interface)
            .and_then(|e| e.ipv4)
    }

    fn local_ipv6(&self, interface: &str) -> Option<(Ipv6Addr, u32)> {
        self.entries
            .iter()
            .find(|e| e.name == interface)
            .and_then(|e| e.ipv6)
    }
}

fn is_link_local_v6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_interfaces() {
        let v6: Ipv6Addr = "fe80::1".parse().unwrap();
        let ifaces = StaticInterfaces::new()
            .with_ipv4("eth0", Ipv4Addr::new(192, 168, 1, 10))
            .with_ipv6("eth0", v6, 2)
            .with_ipv4("wlan0", Ipv4Addr::new(10, 0, 0, 7));

        assert_eq!(
            ifaces.local_ipv4("eth0"),
            Some(Ipv4Addr::new(192, 168, 1, 10))
        );
        assert_eq!(ifaces.local_ipv6("eth0"), Some((v6, 2)));
        assert_eq!(ifaces.local_ipv4("wlan0"), Some(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(ifaces.local_ipv6("wlan0"), None);
        assert_eq!(ifaces.local_ipv4("lo9"), None);
    }

    #[test]
    fn test_link_local_detection() {
        assert!(is_link_local_v6(&"fe80::abcd".parse().unwrap()));
        assert!(!is_link_local_v6(&"2001:db8::1".parse().unwrap()));
    }
}
