//! # mdns-responder
//!
//! A sans-I/O Multicast DNS / DNS-SD responder (RFC 6762, RFC 6763) for Rust.
//!
//! A [`Responder`] claims a host name such as `mydevice.local` and the
//! service instances registered on it (`mydevice._http._tcp.local`),
//! defends them against other hosts, and answers queries for them. It
//! implements the [`sansio::Protocol`] trait, so it runs under any I/O
//! framework (tokio, async-std, smol, or a plain poll loop) and is tested
//! without a network.
//!
//! ## Sans-I/O Design
//!
//! The caller is responsible for:
//! 1. Reading datagrams from port 5353 and calling `handle_read()`
//! 2. Sending datagrams returned by `poll_write()`
//! 3. Calling `handle_timeout()` when `poll_timeout()` expires
//! 4. Processing events from `poll_event()`
//!
//! [`driver::tick`] does all of that against a non-blocking socket built
//! with [`MulticastSocket`].
//!
//! ## What the responder does
//!
//! - **Probing**: three probes 250 ms apart before any name is used
//! - **Announcing**: two unsolicited announcements one second apart
//! - **Responding**: A/AAAA for the host name, PTR/SRV/TXT for services,
//!   with the additional records RFC 6763 recommends
//! - **Conflict handling**: simultaneous-probe tie-breaking, renaming to
//!   `mydevice-2` after a conflict while probing, a 5 s hold before
//!   re-probing
//! - **Known-answer suppression** and a 200 ms delay for shared answers
//! - **Legacy unicast** replies to queriers not on port 5353
//! - **Goodbyes** (TTL 0) for unregistered services and on close
//!
//! ## Quick Start
//!
//! ```rust
//! use mdns_responder::{Responder, ResponderConfig, ResponderEvent, TxtRecord};
//! use sansio::Protocol;
//! use shared::AddressFamily;
//! use std::net::Ipv4Addr;
//! use std::time::Instant;
//!
//! let config = ResponderConfig::new("eth0", AddressFamily::Ipv4, "mydevice")
//!     .with_ipv4(Ipv4Addr::new(192, 168, 1, 100));
//! let start = Instant::now();
//! let mut responder = Responder::new(config, start)?;
//!
//! let txt = TxtRecord::new().with_entry("path", "/")?;
//! responder.register_service("_http._tcp", 80, Some(Box::new(txt)))?;
//!
//! // the first probe goes to 224.0.0.251:5353
//! responder.handle_timeout(start)?;
//! let probe = responder.poll_write().expect("probe queued");
//! assert_eq!(probe.transport.peer_addr.to_string(), "224.0.0.251:5353");
//!
//! while let Some(event) = responder.poll_event() {
//!     if let ResponderEvent::NameConflict { host_name } = event {
//!         println!("renamed to {host_name}");
//!     }
//! }
//! # Ok::<(), shared::error::Error>(())
//! ```
//!
//! ## Integration with Tokio
//!
//! ```rust,ignore
//! use bytes::BytesMut;
//! use mdns_responder::{MulticastSocket, Responder, ResponderConfig};
//! use sansio::Protocol;
//! use shared::{TaggedBytesMut, TransportContext};
//! use std::time::{Duration, Instant};
//! use tokio::net::UdpSocket;
//!
//! async fn run(config: ResponderConfig) -> shared::error::Result<()> {
//!     let socket = UdpSocket::from_std(MulticastSocket::for_config(&config).into_std()?)?;
//!     let local_addr = socket.local_addr()?;
//!     let mut responder = Responder::new(config, Instant::now())?;
//!     let mut buf = vec![0u8; 9000];
//!
//!     loop {
//!         while let Some(pkt) = responder.poll_write() {
//!             socket.send_to(&pkt.message, pkt.transport.peer_addr).await.ok();
//!         }
//!         let wait = responder
//!             .poll_timeout()
//!             .map_or(Duration::from_secs(1), |t| t.saturating_duration_since(Instant::now()));
//!
//!         tokio::select! {
//!             Ok((len, peer_addr)) = socket.recv_from(&mut buf) => {
//!                 responder.handle_read(TaggedBytesMut {
//!                     now: Instant::now(),
//!                     transport: TransportContext { local_addr, peer_addr },
//!                     message: BytesMut::from(&buf[..len]),
//!                 })?;
//!             }
//!             _ = tokio::time::sleep(wait) => {
//!                 responder.handle_timeout(Instant::now())?;
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Protocol Details
//!
//! - **Multicast Address**: 224.0.0.251:5353 (IPv4), \[ff02::fb\]:5353 (IPv6)
//! - **Record Types**: A, AAAA, PTR, SRV, TXT; queries of type ANY
//! - **TTL**: 120 seconds by default, 10 seconds for legacy unicast
//! - **Message size**: at most 512 bytes out, up to 9000 bytes in
//! - **Compression**: names are compressed on output; backward pointer
//!   chains are followed on input

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub(crate) mod config;
pub mod driver;
pub(crate) mod hostname;
pub(crate) mod message;
pub(crate) mod proto;
pub(crate) mod registry;
pub(crate) mod service;
pub(crate) mod socket;

pub use config::{
    DEFAULT_MAX_RESPONDERS, DEFAULT_MAX_SERVICES, DEFAULT_RR_TTL, DEFAULT_RR_TTL_IP,
    ResponderConfig,
};
pub use message::name::Name;
pub use proto::{
    MDNS_DEST_ADDR, MDNS_DEST_ADDR_V6, MDNS_MULTICAST_IPV4, MDNS_MULTICAST_IPV6, MDNS_PORT,
    Responder, ResponderEvent, ResponderState,
};
pub use registry::{ResponderHandle, ResponderTable, ServiceHandle};
pub use service::{ServiceId, TxtRecord, TxtSupplier};

// Re-export socket utilities for convenience
pub use shared::ifaces;
pub use socket::MulticastSocket;
