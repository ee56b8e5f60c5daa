//! Configuration for an mDNS responder.
//!
//! This module provides [`ResponderConfig`], the builder every responder is
//! created from, and the protocol timing constants of RFC 6762.
//!
//! # Examples
//!
//! Advertise `mydevice.local` on `eth0` with a fixed address:
//!
//! ```rust
//! use mdns_responder::ResponderConfig;
//! use shared::AddressFamily;
//! use std::net::Ipv4Addr;
//!
//! let config = ResponderConfig::new("eth0", AddressFamily::Ipv4, "mydevice")
//!     .with_rr_ttl(120)
//!     .with_ipv4(Ipv4Addr::new(192, 168, 1, 100));
//! assert!(config.validate().is_ok());
//! ```
//!
//! Or look the addresses up from the interface:
//!
//! ```rust,ignore
//! use mdns_responder::ResponderConfig;
//! use shared::AddressFamily;
//! use shared::ifaces::SystemInterfaces;
//!
//! let config = ResponderConfig::new("eth0", AddressFamily::Ipv4, "mydevice")
//!     .resolve_addresses(&SystemInterfaces);
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use shared::AddressFamily;
use shared::error::{Error, Result};
use shared::ifaces::InterfaceAddresses;

/// Spacing between probes (RFC 6762 section 8.1).
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Probes sent before a name is considered owned.
pub(crate) const PROBE_COUNT: u32 = 3;

/// Spacing between unsolicited announcements (RFC 6762 section 8.3).
pub(crate) const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Announcements sent after a successful probe.
pub(crate) const ANNOUNCE_COUNT: u32 = 2;

/// Wait after losing a simultaneous-probe tie-break (RFC 6762 section 8.2).
pub(crate) const PROBE_DEFER_DELAY: Duration = Duration::from_secs(1);

/// Wait after any other conflict before probing again (RFC 6762 section 8.1).
pub(crate) const CONFLICT_HOLD: Duration = Duration::from_secs(5);

/// Hold applied to responses for shared records, standing in for the
/// 20-120 ms random delay of RFC 6762 section 6.
pub(crate) const SHARED_RESPONSE_DELAY: Duration = Duration::from_millis(200);

/// Default record TTL in seconds.
pub const DEFAULT_RR_TTL: u32 = 120;

/// TTL cap for replies to legacy unicast queries (RFC 6762 section 6.7).
pub(crate) const LEGACY_UNICAST_TTL: u32 = 10;

/// Default IP TTL / hop limit of outbound multicast.
pub const DEFAULT_RR_TTL_IP: u32 = 255;

/// Default number of service slots per responder.
pub const DEFAULT_MAX_SERVICES: usize = 4;

/// Default number of responder slots in a [`ResponderTable`](crate::ResponderTable).
pub const DEFAULT_MAX_RESPONDERS: usize = 1;

/// Configuration of one responder.
///
/// Only the interface, address family and host name are required; every
/// other field has a default. The address of the configured family must be
/// known before the responder is started, either set directly or looked up
/// with [`ResponderConfig::resolve_addresses`].
#[derive(Clone, Debug)]
pub struct ResponderConfig {
    /// Interface the responder runs on, e.g. `"eth0"`.
    pub interface: String,

    /// Address family of the socket the responder is driven through.
    pub family: AddressFamily,

    /// Base host name, without `.local`. Bytes outside `[A-Za-z0-9_-]` are
    /// replaced with `-`.
    pub host_name: String,

    /// TTL of advertised records, in seconds.
    ///
    /// Default: 120
    pub rr_ttl: u32,

    /// IP TTL (IPv4) or hop limit (IPv6) of outbound multicast, 1..=255.
    ///
    /// Default: 255
    pub rr_ttl_ip: u32,

    /// IPv4 address advertised in A records.
    pub ipv4: Option<Ipv4Addr>,

    /// IPv6 address advertised in AAAA records, with its scope id.
    pub ipv6: Option<(Ipv6Addr, u32)>,

    /// Service slots of this responder.
    ///
    /// Default: 4
    pub max_services: usize,

    /// Default: 250 ms
    pub probe_interval: Duration,

    /// Default: 1 s
    pub announce_interval: Duration,
}

impl ResponderConfig {
    /// Creates a configuration with default TTLs, intervals and capacity.
    pub fn new(interface: &str, family: AddressFamily, host_name: &str) -> Self {
        Self {
            interface: interface.to_owned(),
            family,
            host_name: host_name.to_owned(),
            rr_ttl: DEFAULT_RR_TTL,
            rr_ttl_ip: DEFAULT_RR_TTL_IP,
            ipv4: None,
            ipv6: None,
            max_services: DEFAULT_MAX_SERVICES,
            probe_interval: PROBE_INTERVAL,
            announce_interval: ANNOUNCE_INTERVAL,
        }
    }

    pub fn with_rr_ttl(mut self, rr_ttl: u32) -> Self {
        self.rr_ttl = rr_ttl;
        self
    }

    pub fn with_rr_ttl_ip(mut self, rr_ttl_ip: u32) -> Self {
        self.rr_ttl_ip = rr_ttl_ip;
        self
    }

    pub fn with_ipv4(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4 = Some(addr);
        self
    }

    pub fn with_ipv6(mut self, addr: Ipv6Addr, scope_id: u32) -> Self {
        self.ipv6 = Some((addr, scope_id));
        self
    }

    pub fn with_max_services(mut self, max_services: usize) -> Self {
        self.max_services = max_services;
        self
    }

    /// Set the spacing between probes.
    ///
    /// RFC 6762 fixes this at 250 ms; shorter values are only useful in
    /// tests. A zero interval falls back to the default.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = if interval.is_zero() {
            PROBE_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Set the spacing between announcements. A zero interval falls back to
    /// the default.
    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.announce_interval = if interval.is_zero() {
            ANNOUNCE_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Fills in addresses not already set from the addresses assigned to
    /// [`interface`](Self::interface).
    pub fn resolve_addresses(mut self, lookup: &impl InterfaceAddresses) -> Self {
        if self.ipv4.is_none() {
            self.ipv4 = lookup.local_ipv4(&self.interface);
        }
        if self.ipv6.is_none() {
            self.ipv6 = lookup.local_ipv6(&self.interface);
        }
        log::debug!(
            "resolved addresses of {}: ipv4={:?} ipv6={:?}",
            self.interface,
            self.ipv4,
            self.ipv6
        );
        self
    }

    /// Checks the configuration without building anything.
    pub fn validate(&self) -> Result<()> {
        if self.interface.is_empty() {
            return Err(Error::ErrNoInterface);
        }
        if self.host_name.is_empty() {
            return Err(Error::ErrHostnameEmpty);
        }
        if self.rr_ttl == 0 {
            return Err(Error::ErrInvalidTtl);
        }
        if self.rr_ttl_ip == 0 || self.rr_ttl_ip > 255 {
            return Err(Error::ErrInvalidHopLimit);
        }
        let has_address = match self.family {
            AddressFamily::Ipv4 => self.ipv4.is_some(),
            AddressFamily::Ipv6 => self.ipv6.is_some(),
        };
        if !has_address {
            return Err(Error::ErrNoAddressForFamily);
        }
        Ok(())
    }
}
