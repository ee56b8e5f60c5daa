//! Fixed-capacity table of responders addressed by generational handles.
//!
//! ```rust
//! use mdns_responder::{ResponderConfig, ResponderTable};
//! use shared::AddressFamily;
//! use std::net::Ipv4Addr;
//! use std::time::Instant;
//!
//! let mut table = ResponderTable::new(1);
//! let config = ResponderConfig::new("eth0", AddressFamily::Ipv4, "mydevice")
//!     .with_ipv4(Ipv4Addr::new(192, 168, 1, 100));
//! let handle = table.init(config, Instant::now())?;
//! let http = table.service_register(handle, "_http._tcp", 80, None)?;
//! assert!(table.is_enabled(handle));
//!
//! table.service_unregister(http)?;
//! let goodbye = table.release(handle)?;
//! assert!(!table.is_enabled(handle));
//! # let _ = goodbye;
//! # Ok::<(), shared::error::Error>(())
//! ```

use std::time::Instant;

use sansio::Protocol;
use shared::TaggedBytesMut;
use shared::error::{Error, Result};

use crate::config::{DEFAULT_MAX_RESPONDERS, ResponderConfig};
use crate::proto::Responder;
use crate::service::{ServiceId, TxtSupplier};

/// Names a responder in a [`ResponderTable`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResponderHandle {
    slot: usize,
    generation: u32,
}

/// Names a service of a responder in a [`ResponderTable`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    responder: ResponderHandle,
    service: ServiceId,
}

impl ServiceHandle {
    pub fn responder(&self) -> ResponderHandle {
        self.responder
    }

    pub fn service_id(&self) -> ServiceId {
        self.service
    }
}

struct Slot {
    generation: u32,
    responder: Option<Responder>,
}

/// Responders of one process. Capacity is fixed at construction; a released
/// slot is reused, and handles to its previous occupant stay invalid.
pub struct ResponderTable {
    slots: Vec<Slot>,
}

impl Default for ResponderTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESPONDERS)
    }
}

impl ResponderTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|_| Slot {
                    generation: 0,
                    responder: None,
                })
                .collect(),
        }
    }

    /// Starts a responder. Fails without touching the table if the
    /// configuration is invalid or every slot is taken.
    pub fn init(&mut self, config: ResponderConfig, now: Instant) -> Result<ResponderHandle> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.responder.is_none())
            .ok_or(Error::ErrResponderTableFull)?;
        let responder = Responder::new(config, now)?;
        let entry = &mut self.slots[slot];
        entry.responder = Some(responder);
        Ok(ResponderHandle {
            slot,
            generation: entry.generation,
        })
    }

    /// Stops a responder and frees its slot. Returns the datagrams still
    /// queued, the goodbye among them, for the caller to send.
    pub fn release(&mut self, handle: ResponderHandle) -> Result<Vec<TaggedBytesMut>> {
        let entry = self
            .slots
            .get_mut(handle.slot)
            .filter(|s| s.generation == handle.generation)
            .ok_or(Error::ErrInvalidHandle)?;
        let mut responder = entry.responder.take().ok_or(Error::ErrInvalidHandle)?;
        entry.generation = entry.generation.wrapping_add(1);

        responder.close()?;
        let mut outs = Vec::new();
        while let Some(msg) = responder.poll_write() {
            outs.push(msg);
        }
        Ok(outs)
    }

    pub fn service_register(
        &mut self,
        handle: ResponderHandle,
        service_type: &str,
        port: u16,
        txt: Option<Box<dyn TxtSupplier>>,
    ) -> Result<ServiceHandle> {
        let responder = self.get_mut(handle).ok_or(Error::ErrInvalidHandle)?;
        let service = responder.register_service(service_type, port, txt)?;
        Ok(ServiceHandle {
            responder: handle,
            service,
        })
    }

    pub fn service_unregister(&mut self, handle: ServiceHandle) -> Result<()> {
        self.get_mut(handle.responder)
            .ok_or(Error::ErrInvalidHandle)?
            .unregister_service(handle.service)
    }

    pub fn announce(&mut self, handle: ResponderHandle) -> Result<()> {
        self.get_mut(handle)
            .ok_or(Error::ErrInvalidHandle)?
            .announce()
    }

    /// False for stale handles as well as for stopped responders.
    pub fn is_enabled(&self, handle: ResponderHandle) -> bool {
        self.get(handle).is_some_and(|r| r.is_enabled())
    }

    pub fn get(&self, handle: ResponderHandle) -> Option<&Responder> {
        self.slots
            .get(handle.slot)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.responder.as_ref())
    }

    pub fn get_mut(&mut self, handle: ResponderHandle) -> Option<&mut Responder> {
        self.slots
            .get_mut(handle.slot)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.responder.as_mut())
    }

    /// Live responders, for driving each from the poll loop.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ResponderHandle, &mut Responder)> {
        self.slots.iter_mut().enumerate().filter_map(|(slot, s)| {
            let generation = s.generation;
            s.responder
                .as_mut()
                .map(|r| (ResponderHandle { slot, generation }, r))
        })
    }
}
