#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[cfg(feature = "ifaces")]
pub mod ifaces;

pub mod error;
pub(crate) mod transport;

pub use transport::{AddressFamily, TaggedBytesMut, TransportContext, TransportMessage};
