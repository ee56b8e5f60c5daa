//! Socket utilities for mDNS.
//!
//! This module provides [`MulticastSocket`], a builder for creating UDP
//! sockets joined to the mDNS group of one address family.
//!
//! # Example
//!
//! ```rust,ignore
//! use mdns_responder::MulticastSocket;
//! use shared::AddressFamily;
//!
//! let std_socket = MulticastSocket::new(AddressFamily::Ipv4)
//!     .with_hop_limit(255)
//!     .into_std()?;
//!
//! // For tokio:
//! let socket = tokio::net::UdpSocket::from_std(std_socket)?;
//! ```

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use shared::AddressFamily;
use socket2::{Domain, Protocol, Socket, Type};

use crate::config::{DEFAULT_RR_TTL_IP, ResponderConfig};
use crate::proto::{MDNS_MULTICAST_IPV4, MDNS_MULTICAST_IPV6, MDNS_PORT};

/// A builder for creating multicast UDP sockets suitable for mDNS.
///
/// The resulting socket is:
///
/// - Bound to port 5353 of the wildcard address (or of the group address
///   on Linux)
/// - Configured with `SO_REUSEADDR`, and `SO_REUSEPORT` where supported
/// - Non-blocking
/// - Joined to 224.0.0.251 or ff02::fb on the chosen interface
/// - Sending multicast with the configured TTL / hop limit, looped back
///   to the local host
///
/// # Examples
///
/// ```rust,ignore
/// use mdns_responder::MulticastSocket;
/// use shared::AddressFamily;
/// use std::net::Ipv4Addr;
///
/// let socket = MulticastSocket::new(AddressFamily::Ipv4)
///     .with_interface_v4(Ipv4Addr::new(192, 168, 1, 100))
///     .into_std()?;
/// ```
#[derive(Debug, Clone)]
pub struct MulticastSocket {
    family: AddressFamily,
    port: u16,
    interface_v4: Option<Ipv4Addr>,
    interface_index: u32,
    hop_limit: u32,
    loopback: bool,
}

impl Default for MulticastSocket {
    fn default() -> Self {
        Self::new(AddressFamily::Ipv4)
    }
}

impl MulticastSocket {
    /// Creates a builder for `family` on the standard mDNS port.
    ///
    /// ```rust
    /// use mdns_responder::MulticastSocket;
    /// use shared::AddressFamily;
    ///
    /// let builder = MulticastSocket::new(AddressFamily::Ipv6);
    /// ```
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            port: MDNS_PORT,
            interface_v4: None,
            interface_index: 0,
            hop_limit: DEFAULT_RR_TTL_IP,
            loopback: true,
        }
    }

    /// A builder matching a responder configuration: its family, its
    /// interface address or IPv6 scope, and its hop limit.
    pub fn for_config(config: &ResponderConfig) -> Self {
        let mut socket = Self::new(config.family).with_hop_limit(config.rr_ttl_ip);
        if let Some(addr) = config.ipv4 {
            socket = socket.with_interface_v4(addr);
        }
        if let Some((_, scope_id)) = config.ipv6 {
            socket = socket.with_interface_index(scope_id);
        }
        socket
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// IPv4 address of the interface to join the group on. Without one the
    /// group is joined on `INADDR_ANY`.
    pub fn with_interface_v4(mut self, interface: Ipv4Addr) -> Self {
        self.interface_v4 = Some(interface);
        self
    }

    /// Index of the interface to join the IPv6 group on; 0 lets the system
    /// choose.
    pub fn with_interface_index(mut self, index: u32) -> Self {
        self.interface_index = index;
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u32) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    fn bind_addr(&self) -> SocketAddr {
        let ip = match self.family {
            // the group address filters out other traffic to 5353 on Linux;
            // Mac and Windows only accept the wildcard
            AddressFamily::Ipv4 if cfg!(target_os = "linux") => IpAddr::V4(MDNS_MULTICAST_IPV4),
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        SocketAddr::new(ip, self.port)
    }

    /// Converts this builder into a configured `std::net::UdpSocket`.
    ///
    /// # Errors
    ///
    /// Returns an error if creating the socket, setting an option, binding
    /// or joining the group fails.
    pub fn into_std(self) -> io::Result<UdpSocket> {
        let domain = match self.family {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        if self.family == AddressFamily::Ipv6 {
            socket.set_only_v6(true)?;
        }

        let bind_addr = self.bind_addr();
        socket.bind(&bind_addr.into())?;
        log::debug!("mDNS socket bound to {bind_addr}");

        match self.family {
            AddressFamily::Ipv4 => {
                let iface = self.interface_v4.unwrap_or(Ipv4Addr::UNSPECIFIED);
                socket.join_multicast_v4(&MDNS_MULTICAST_IPV4, &iface)?;
                if let Some(iface) = self.interface_v4 {
                    socket.set_multicast_if_v4(&iface)?;
                }
                socket.set_multicast_ttl_v4(self.hop_limit)?;
                socket.set_multicast_loop_v4(self.loopback)?;
            }
            AddressFamily::Ipv6 => {
                socket.join_multicast_v6(&MDNS_MULTICAST_IPV6, self.interface_index)?;
                if self.interface_index != 0 {
                    socket.set_multicast_if_v6(self.interface_index)?;
                }
                socket.set_multicast_hops_v6(self.hop_limit)?;
                socket.set_multicast_loop_v6(self.loopback)?;
            }
        }

        Ok(socket.into())
    }
}
