//! Poll-loop driver for responders over a non-blocking datagram socket.
//!
//! One call to [`tick`] is one pass of the cooperative loop: everything the
//! socket has queued is fed to the responder, its timers are run, and the
//! datagrams it produced are sent. Nothing here blocks, so the caller
//! decides how often to tick (typically every few tens of milliseconds, or
//! at [`poll_timeout`](sansio::Protocol::poll_timeout)).
//!
//! ```rust,ignore
//! use mdns_responder::{MulticastSocket, Responder, ResponderConfig, driver};
//! use std::time::{Duration, Instant};
//!
//! let socket = MulticastSocket::for_config(&config).into_std()?;
//! let mut responder = Responder::new(config, Instant::now())?;
//! loop {
//!     driver::tick(&mut responder, &socket, Instant::now());
//!     std::thread::sleep(Duration::from_millis(20));
//! }
//! ```

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

use bytes::BytesMut;
use sansio::Protocol;
use shared::{TaggedBytesMut, TransportContext, TransportMessage};

use crate::message::MAX_INBOUND_SIZE;
use crate::proto::Responder;
use crate::registry::ResponderTable;

/// Upper bound of datagrams read in one tick, so a flood cannot starve the
/// timers.
pub const MAX_DATAGRAMS_PER_TICK: usize = 64;

/// A non-blocking datagram socket.
pub trait DatagramSocket {
    /// Receives one datagram, or `None` when nothing is pending.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl DatagramSocket for UdpSocket {
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match UdpSocket::recv_from(self, buf) {
            Ok(received) => Ok(Some(received)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// What one tick did.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TickStats {
    pub received: usize,
    pub sent: usize,
}

fn receive(socket: &impl DatagramSocket, now: Instant) -> Vec<TaggedBytesMut> {
    let local_addr = match socket.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            log::warn!("mDNS socket has no local address: {err}");
            return Vec::new();
        }
    };

    let mut buf = vec![0u8; MAX_INBOUND_SIZE + 1];
    let mut inbound = Vec::new();
    while inbound.len() < MAX_DATAGRAMS_PER_TICK {
        match socket.recv_from(&mut buf) {
            Ok(Some((n, peer_addr))) => inbound.push(TransportMessage {
                now,
                transport: TransportContext {
                    local_addr,
                    peer_addr,
                },
                message: BytesMut::from(&buf[..n]),
            }),
            Ok(None) => break,
            Err(err) => {
                log::debug!("mDNS receive failed: {err}");
                break;
            }
        }
    }
    inbound
}

fn flush(responder: &mut Responder, socket: &impl DatagramSocket) -> usize {
    let mut sent = 0;
    while let Some(msg) = responder.poll_write() {
        match socket.send_to(&msg.message, msg.transport.peer_addr) {
            Ok(_) => sent += 1,
            Err(err) => log::debug!(
                "Failed to send {} bytes to {}: {err}",
                msg.message.len(),
                msg.transport.peer_addr
            ),
        }
    }
    sent
}

fn step(responder: &mut Responder, inbound: &[TaggedBytesMut], now: Instant) {
    for msg in inbound {
        if let Err(err) = responder.handle_read(msg.clone()) {
            log::debug!("handle_read: {err}");
        }
    }
    if let Err(err) = responder.handle_timeout(now) {
        log::debug!("handle_timeout: {err}");
    }
}

/// Runs one pass for a single responder. A closed responder only has its
/// remaining datagrams, the goodbye among them, sent.
pub fn tick(responder: &mut Responder, socket: &impl DatagramSocket, now: Instant) -> TickStats {
    let mut stats = TickStats::default();
    if !responder.is_closed() {
        let inbound = receive(socket, now);
        stats.received = inbound.len();
        step(responder, &inbound, now);
    }
    stats.sent = flush(responder, socket);
    stats
}

/// Runs one pass for every responder of `table` sharing `socket`. Each
/// inbound datagram is seen by every responder.
pub fn tick_table(table: &mut ResponderTable, socket: &impl DatagramSocket, now: Instant) -> TickStats {
    let inbound = receive(socket, now);
    let mut stats = TickStats {
        received: inbound.len(),
        sent: 0,
    };
    for (_, responder) in table.iter_mut() {
        if !responder.is_closed() {
            step(responder, &inbound, now);
        }
        stats.sent += flush(responder, socket);
    }
    stats
}

/// Sends datagrams handed back by [`ResponderTable::release`].
pub fn send_all(socket: &impl DatagramSocket, outs: Vec<TaggedBytesMut>) -> usize {
    outs.into_iter()
        .filter(|msg| match socket.send_to(&msg.message, msg.transport.peer_addr) {
            Ok(_) => true,
            Err(err) => {
                log::debug!("Failed to send to {}: {err}", msg.transport.peer_addr);
                false
            }
        })
        .count()
}
