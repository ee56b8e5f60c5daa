//! Sans-I/O mDNS responder.
//!
//! This module provides [`Responder`], the per-host protocol engine. It
//! implements [`sansio::Protocol`]: the caller feeds it received datagrams
//! and clock ticks and sends whatever it queues.
//!
//! # Lifecycle
//!
//! ```text
//! Disabled ──new──▶ Probing ──3 probes──▶ Announcing ──2 announcements──▶ WaitingRequest
//!                     ▲  │                                                   │
//!                     │  └──conflict / lost tie-break──▶ ProbingWait         │
//!                     └──────────────hold elapsed─────────────┘              │
//!                     ▲                                                      │
//!                     └──────────────── service registered ◀─────────────────┘
//! ```
//!
//! Every probe, announcement and response goes out through
//! [`poll_write()`](sansio::Protocol::poll_write); state transitions and
//! renames come out of [`poll_event()`](sansio::Protocol::poll_event).
//!
//! ```rust
//! use mdns_responder::{Responder, ResponderConfig, ResponderState};
//! use sansio::Protocol;
//! use shared::AddressFamily;
//! use std::net::Ipv4Addr;
//! use std::time::{Duration, Instant};
//!
//! let config = ResponderConfig::new("eth0", AddressFamily::Ipv4, "mydevice")
//!     .with_ipv4(Ipv4Addr::new(192, 168, 1, 100));
//! let start = Instant::now();
//! let mut responder = Responder::new(config, start)?;
//!
//! // the first probe is queued right away
//! assert!(responder.poll_write().is_some());
//! assert_eq!(responder.state(), ResponderState::Probing);
//!
//! for ms in [250, 500, 750, 1750, 2750] {
//!     responder.handle_timeout(start + Duration::from_millis(ms))?;
//! }
//! assert_eq!(responder.state(), ResponderState::WaitingRequest);
//! # Ok::<(), shared::error::Error>(())
//! ```

#[cfg(test)]
mod mdns_test;

pub(crate) mod builder;
pub(crate) mod pending;
mod processor;

use std::collections::VecDeque;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use shared::error::{Error, Result};
use shared::{AddressFamily, TaggedBytesMut, TransportContext, TransportMessage};

use crate::config::{ANNOUNCE_COUNT, PROBE_COUNT, ResponderConfig};
use crate::hostname::HostName;
use crate::message::name::Name;
use crate::service::{Service, ServiceId, ServiceTable, TxtSupplier};
use builder::{RecordSet, ResponseOptions, build_probe, build_response};
use pending::{Pending, ResponseFlags};

/// The mDNS multicast group address (224.0.0.251).
pub const MDNS_MULTICAST_IPV4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The mDNS IPv6 multicast group address (ff02::fb).
pub const MDNS_MULTICAST_IPV6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// The standard mDNS port (5353).
pub const MDNS_PORT: u16 = 5353;

/// mDNS multicast destination address (224.0.0.251:5353).
///
/// ```rust
/// use mdns_responder::MDNS_DEST_ADDR;
///
/// assert_eq!(MDNS_DEST_ADDR.to_string(), "224.0.0.251:5353");
/// ```
pub const MDNS_DEST_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(MDNS_MULTICAST_IPV4), MDNS_PORT);

/// mDNS IPv6 multicast destination address ([ff02::fb]:5353), without a
/// scope id.
pub const MDNS_DEST_ADDR_V6: SocketAddr =
    SocketAddr::new(IpAddr::V6(MDNS_MULTICAST_IPV6), MDNS_PORT);

/// Where a responder is in claiming and defending its names.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResponderState {
    /// Not advertising anything.
    #[default]
    Disabled,
    /// Holding off after a conflict before probing again.
    ProbingWait,
    /// Sending probes for the host and service names.
    Probing,
    /// Sending unsolicited announcements.
    Announcing,
    /// Names established; answering queries.
    WaitingRequest,
}

impl fmt::Display for ResponderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ResponderState::Disabled => "Disabled",
            ResponderState::ProbingWait => "ProbingWait",
            ResponderState::Probing => "Probing",
            ResponderState::Announcing => "Announcing",
            ResponderState::WaitingRequest => "WaitingRequest",
        };
        write!(f, "{s}")
    }
}

/// Events emitted by a responder.
///
/// ```rust,ignore
/// while let Some(event) = responder.poll_event() {
///     match event {
///         ResponderEvent::StateChanged(state) => println!("now {state}"),
///         ResponderEvent::NameConflict { host_name } => save_name(&host_name),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderEvent {
    /// The responder moved to a new state.
    StateChanged(ResponderState),

    /// Another host owns the name; the responder renamed itself and will
    /// probe the new name. `host_name` is the new host label, without
    /// `.local`.
    NameConflict { host_name: String },
}

/// Sans-I/O mDNS responder for one host identity and its services.
///
/// # Sans-I/O Pattern
///
/// The responder never touches a socket or a clock. The caller:
///
/// 1. Passes every datagram received on port 5353 to
///    [`handle_read()`](sansio::Protocol::handle_read), with the sender in
///    `transport.peer_addr`
/// 2. Calls [`handle_timeout()`](sansio::Protocol::handle_timeout) when
///    [`poll_timeout()`](sansio::Protocol::poll_timeout) expires, or simply
///    on every pass of its poll loop
/// 3. Sends each datagram from [`poll_write()`](sansio::Protocol::poll_write)
///    to its `transport.peer_addr`
/// 4. Drains [`poll_event()`](sansio::Protocol::poll_event)
///
/// [`driver::tick`](crate::driver::tick) does all four against a
/// non-blocking socket.
pub struct Responder {
    config: ResponderConfig,
    state: ResponderState,
    host_name: HostName,
    services: ServiceTable,

    /// Multicast answers owed, merged across queries.
    pending: Pending,
    pending_family: AddressFamily,
    /// Set while a shared-record response is held back.
    shared_deadline: Option<Instant>,

    probe_count: u32,
    announce_count: u32,
    last_send: Option<Instant>,
    hold_until: Option<Instant>,
    last_conflict: Option<Instant>,
    host_announced: bool,
    last_now: Instant,

    write_outs: VecDeque<TaggedBytesMut>,
    event_outs: VecDeque<ResponderEvent>,
    closed: bool,
}

impl Responder {
    /// Validates `config` and starts probing: the first probe is queued
    /// immediately.
    pub fn new(config: ResponderConfig, now: Instant) -> Result<Self> {
        config.validate()?;
        let host_name = HostName::new(&config.host_name)?;
        let services = ServiceTable::new(config.max_services);
        let pending = Pending::new(services.capacity());
        let pending_family = config.family;

        let mut responder = Self {
            config,
            state: ResponderState::Disabled,
            host_name,
            services,
            pending,
            pending_family,
            shared_deadline: None,
            probe_count: 0,
            announce_count: 0,
            last_send: None,
            hold_until: None,
            last_conflict: None,
            host_announced: false,
            last_now: now,
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
            closed: false,
        };
        log::info!(
            "starting mDNS responder for {} on {}",
            responder.host_name.fqdn(),
            responder.config.interface
        );
        responder.start_probing();
        responder.send_probe(now);
        Ok(responder)
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    /// Current host label, `mydevice` or `mydevice-2` after a rename.
    pub fn host_name(&self) -> &str {
        self.host_name.label()
    }

    /// Current fully-qualified host name.
    pub fn fqdn(&self) -> &Name {
        self.host_name.fqdn()
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        !self.closed && self.state != ResponderState::Disabled
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn last_conflict(&self) -> Option<Instant> {
        self.last_conflict
    }

    /// Fully-qualified instance name of a registered service.
    pub fn service_instance_name(&self, id: ServiceId) -> Option<&Name> {
        self.services.get(id).map(|svc| &svc.instance_name)
    }

    /// Adds a service such as `_http._tcp` on `port`.
    ///
    /// Once the responder is past the wait after a conflict, the new service
    /// sends it back to probing so every name is claimed again together.
    pub fn register_service(
        &mut self,
        service_type: &str,
        port: u16,
        txt: Option<Box<dyn TxtSupplier>>,
    ) -> Result<ServiceId> {
        if self.closed {
            return Err(Error::ErrResponderClosed);
        }
        let service = Service::new(service_type, port, txt, self.host_name.instance())?;
        let id = self.services.insert(service)?;
        self.pending.remove_service(id.slot(), ResponseFlags::ALL);
        log::debug!("registered {service_type} on port {port}");

        match self.state {
            ResponderState::Probing
            | ResponderState::Announcing
            | ResponderState::WaitingRequest => self.start_probing(),
            ResponderState::Disabled | ResponderState::ProbingWait => {}
        }
        Ok(id)
    }

    /// Removes a service, saying goodbye for it if it was announced.
    pub fn unregister_service(&mut self, id: ServiceId) -> Result<()> {
        if self.closed {
            return Err(Error::ErrResponderClosed);
        }
        let announced = self
            .services
            .get(id)
            .ok_or(Error::ErrInvalidHandle)?
            .announced;
        if announced {
            let mut goodbye = Pending::new(self.services.capacity());
            goodbye.insert_service(id.slot(), ResponseFlags::PTR | ResponseFlags::INSTANCE);
            let opts = self.goodbye_options();
            let dest = self.multicast_dest(self.config.family);
            self.send_response(&goodbye, &opts, dest, self.last_now);
        }
        let service = self.services.remove(id)?;
        self.pending.remove_service(id.slot(), ResponseFlags::ALL);
        log::debug!("unregistered {}", service.instance_name);
        Ok(())
    }

    /// Announces again without probing, e.g. after the addresses changed.
    /// Does nothing while names are still being claimed.
    pub fn announce(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrResponderClosed);
        }
        match self.state {
            ResponderState::Announcing | ResponderState::WaitingRequest => {
                self.enter_announcing();
            }
            _ => log::debug!("announce ignored in state {}", self.state),
        }
        Ok(())
    }

    /// Replaces the advertised addresses and re-announces.
    pub fn set_addresses(
        &mut self,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<(Ipv6Addr, u32)>,
    ) -> Result<()> {
        let mut config = self.config.clone();
        config.ipv4 = ipv4;
        config.ipv6 = ipv6;
        config.validate()?;
        self.config = config;
        self.announce()
    }

    fn set_state(&mut self, state: ResponderState) {
        if self.state != state {
            log::debug!(
                "{}: state {} -> {}",
                self.host_name.label(),
                self.state,
                state
            );
            self.state = state;
            self.event_outs
                .push_back(ResponderEvent::StateChanged(state));
        }
    }

    // Probing restarts from the first probe, due at the next timeout.
    fn start_probing(&mut self) {
        self.drop_pending();
        self.probe_count = 0;
        self.last_send = None;
        self.hold_until = None;
        self.set_state(ResponderState::Probing);
    }

    fn enter_probing_wait(&mut self, now: Instant, hold: Duration) {
        self.drop_pending();
        self.hold_until = Some(now + hold);
        self.set_state(ResponderState::ProbingWait);
    }

    fn enter_announcing(&mut self) {
        self.announce_count = 0;
        self.last_send = None;
        self.set_state(ResponderState::Announcing);
    }

    fn drop_pending(&mut self) {
        self.pending.clear();
        self.shared_deadline = None;
    }

    fn due(&self, now: Instant, interval: Duration) -> bool {
        self.last_send
            .is_none_or(|last| now.saturating_duration_since(last) >= interval)
    }

    fn record_set(&self) -> RecordSet<'_> {
        RecordSet {
            host: self.host_name.fqdn(),
            ipv4: self.config.ipv4,
            ipv6: self.config.ipv6.map(|(addr, _)| addr),
            services: &self.services,
        }
    }

    fn multicast_dest(&self, family: AddressFamily) -> SocketAddr {
        match family {
            AddressFamily::Ipv4 => MDNS_DEST_ADDR,
            AddressFamily::Ipv6 => {
                let scope_id = self.config.ipv6.map_or(0, |(_, scope)| scope);
                SocketAddr::V6(SocketAddrV6::new(MDNS_MULTICAST_IPV6, MDNS_PORT, 0, scope_id))
            }
        }
    }

    fn local_addr(&self, family: AddressFamily) -> SocketAddr {
        let ip = match family {
            AddressFamily::Ipv4 => self.config.ipv4.map(IpAddr::V4),
            AddressFamily::Ipv6 => self.config.ipv6.map(|(addr, _)| IpAddr::V6(addr)),
        };
        SocketAddr::new(ip.unwrap_or_else(|| family.unspecified()), MDNS_PORT)
    }

    fn queue(&mut self, now: Instant, peer_addr: SocketAddr, message: &[u8]) {
        let local_addr = self.local_addr(AddressFamily::of(&peer_addr.ip()));
        self.write_outs.push_back(TransportMessage {
            now,
            transport: TransportContext {
                local_addr,
                peer_addr,
            },
            message: BytesMut::from(message),
        });
    }

    fn send_probe(&mut self, now: Instant) {
        self.last_send = Some(now);
        let built = build_probe(&self.record_set(), self.config.rr_ttl);
        match built {
            Ok(msg) => {
                self.probe_count += 1;
                log::trace!(
                    "Queuing probe {}/{} for {}",
                    self.probe_count,
                    PROBE_COUNT,
                    self.host_name.fqdn()
                );
                let dest = self.multicast_dest(self.config.family);
                self.queue(now, dest, &msg);
            }
            Err(err) => log::warn!("Failed to build probe: {err}"),
        }
    }

    fn send_announcement(&mut self, now: Instant) {
        self.last_send = Some(now);
        let slots: Vec<usize> = self.services.iter().map(|(slot, _)| slot).collect();
        let all = Pending::all(slots, self.services.capacity());
        let opts = ResponseOptions {
            id: 0,
            ttl: self.config.rr_ttl,
            cache_flush: true,
            additionals: false,
        };
        let dest = self.multicast_dest(self.config.family);
        if self.send_response(&all, &opts, dest, now) {
            self.announce_count += 1;
            self.host_announced = true;
            for (_, svc) in self.services.iter_mut() {
                svc.announced = true;
            }
        }
    }

    fn goodbye_options(&self) -> ResponseOptions {
        ResponseOptions {
            id: 0,
            ttl: 0,
            cache_flush: true,
            additionals: false,
        }
    }

    /// Sends everything owed to multicast queriers.
    fn flush_pending(&mut self, now: Instant) {
        self.shared_deadline = None;
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::replace(
            &mut self.pending,
            Pending::new(self.services.capacity()),
        );
        let opts = ResponseOptions {
            id: 0,
            ttl: self.config.rr_ttl,
            cache_flush: true,
            additionals: true,
        };
        let dest = self.multicast_dest(self.pending_family);
        self.send_response(&pending, &opts, dest, now);
    }

    /// Builds and queues one response. Returns whether anything was queued.
    fn send_response(
        &mut self,
        pending: &Pending,
        opts: &ResponseOptions,
        dest: SocketAddr,
        now: Instant,
    ) -> bool {
        let built = build_response(&self.record_set(), pending, opts);
        match built {
            Ok(Some(msg)) => {
                log::trace!(
                    "Queuing mDNS response ({} bytes, ttl {}) to {dest}",
                    msg.len(),
                    opts.ttl
                );
                self.queue(now, dest, &msg);
                true
            }
            Ok(None) => false,
            Err(err) => {
                log::warn!("Failed to build response: {err}");
                false
            }
        }
    }

    fn rename(&mut self) -> Result<()> {
        self.host_name.bump()?;
        let instance = self.host_name.instance().to_owned();
        for (_, svc) in self.services.iter_mut() {
            svc.rename(&instance)?;
            svc.announced = false;
        }
        log::info!("renamed to {}", self.host_name.fqdn());
        self.event_outs.push_back(ResponderEvent::NameConflict {
            host_name: self.host_name.label().to_owned(),
        });
        Ok(())
    }

    fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            ResponderState::ProbingWait => self.hold_until,
            ResponderState::Probing => Some(
                self.last_send
                    .map_or(self.last_now, |last| last + self.config.probe_interval),
            ),
            ResponderState::Announcing => Some(
                self.last_send
                    .map_or(self.last_now, |last| last + self.config.announce_interval),
            ),
            ResponderState::Disabled | ResponderState::WaitingRequest => None,
        }
    }
}

impl sansio::Protocol<TaggedBytesMut, (), ()> for Responder {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = ResponderEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrResponderClosed);
        }
        self.last_now = self.last_now.max(msg.now);
        let peer = msg.transport.peer_addr;
        if let Err(err) = self.process_message(&msg.message, peer, msg.now) {
            if err.is_malformed() {
                log::trace!("Discarding datagram from {peer}: {err}");
            } else {
                log::debug!("Ignoring datagram from {peer}: {err}");
            }
        }
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Self::Time) -> Result<()> {
        if self.closed {
            return Err(Error::ErrResponderClosed);
        }
        self.last_now = self.last_now.max(now);

        match self.state {
            ResponderState::Disabled | ResponderState::WaitingRequest => {}
            ResponderState::ProbingWait => {
                if self.hold_until.is_none_or(|until| now >= until) {
                    self.start_probing();
                    self.send_probe(now);
                }
            }
            ResponderState::Probing => {
                if self.due(now, self.config.probe_interval) {
                    if self.probe_count < PROBE_COUNT {
                        self.send_probe(now);
                    } else {
                        self.enter_announcing();
                        self.send_announcement(now);
                    }
                }
            }
            ResponderState::Announcing => {
                if self.due(now, self.config.announce_interval) {
                    if self.announce_count < ANNOUNCE_COUNT {
                        self.send_announcement(now);
                    } else {
                        self.set_state(ResponderState::WaitingRequest);
                    }
                }
            }
        }

        if self.shared_deadline.is_some_and(|deadline| now >= deadline) {
            self.flush_pending(now);
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        if self.closed {
            return None;
        }
        match (self.next_deadline(), self.shared_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Stops the responder. Announced records are withdrawn with a goodbye
    /// that stays queued for [`poll_write`](sansio::Protocol::poll_write).
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.host_announced {
            let slots: Vec<usize> = self
                .services
                .iter()
                .filter(|(_, svc)| svc.announced)
                .map(|(slot, _)| slot)
                .collect();
            let all = Pending::all(slots, self.services.capacity());
            let opts = self.goodbye_options();
            let dest = self.multicast_dest(self.config.family);
            self.send_response(&all, &opts, dest, self.last_now);
        }
        self.drop_pending();
        self.set_state(ResponderState::Disabled);
        self.closed = true;
        log::info!("mDNS responder for {} closed", self.host_name.fqdn());
        Ok(())
    }
}
