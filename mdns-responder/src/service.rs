//! Service registrations and their TXT data.

use std::fmt;

use crate::message::name::Name;
use shared::error::{Error, Result};

// Longest service name label, underscore included (RFC 6763 section 7.2).
const MAX_SERVICE_NAME_LEN: usize = 16;

// Longest single TXT string.
const MAX_TXT_ENTRY_LEN: usize = 255;

/// Supplies the pre-encoded rdata of a service's TXT record: a sequence of
/// length-prefixed `key=value` strings. An empty slice is sent as a TXT
/// record holding one empty string.
pub trait TxtSupplier {
    fn txt_bytes(&self) -> &[u8];
}

impl TxtSupplier for Vec<u8> {
    fn txt_bytes(&self) -> &[u8] {
        self
    }
}

impl TxtSupplier for &'static [u8] {
    fn txt_bytes(&self) -> &[u8] {
        self
    }
}

impl TxtSupplier for fn() -> &'static [u8] {
    fn txt_bytes(&self) -> &[u8] {
        self()
    }
}

/// Builder for RFC 6763 section 6 TXT data.
///
/// ```rust
/// use mdns_responder::{TxtRecord, TxtSupplier};
///
/// let txt = TxtRecord::new()
///     .with_entry("path", "/index.html")?
///     .with_flag("secure")?;
/// assert_eq!(txt.txt_bytes(), b"\x10path=/index.html\x06secure");
/// # Ok::<(), shared::error::Error>(())
/// ```
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct TxtRecord {
    data: Vec<u8>,
}

impl TxtRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `key=value`.
    pub fn with_entry(self, key: &str, value: &str) -> Result<Self> {
        self.push(key, Some(value.as_bytes()))
    }

    /// Appends a boolean attribute: the key alone, without `=`.
    pub fn with_flag(self, key: &str) -> Result<Self> {
        self.push(key, None)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn push(mut self, key: &str, value: Option<&[u8]>) -> Result<Self> {
        if key.is_empty() || !key.bytes().all(|b| (0x20..=0x7e).contains(&b) && b != b'=') {
            return Err(Error::ErrInvalidTxtKey);
        }
        let len = key.len() + value.map_or(0, |v| 1 + v.len());
        if len > MAX_TXT_ENTRY_LEN {
            return Err(Error::ErrTxtEntryTooLong);
        }
        self.data.push(len as u8);
        self.data.extend_from_slice(key.as_bytes());
        if let Some(value) = value {
            self.data.push(b'=');
            self.data.extend_from_slice(value);
        }
        Ok(self)
    }
}

impl TxtSupplier for TxtRecord {
    fn txt_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Identifies a service within its responder. Stale once the service is
/// unregistered, even if the slot is reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    slot: usize,
    generation: u32,
}

impl ServiceId {
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }
}

/// One advertised service instance.
pub(crate) struct Service {
    pub(crate) service_type: String,
    pub(crate) port: u16,
    pub(crate) txt: Option<Box<dyn TxtSupplier>>,
    /// `_http._tcp.local`
    pub(crate) type_name: Name,
    /// `<host instance>._http._tcp.local`
    pub(crate) instance_name: Name,
    /// Set once an announcement carrying this service went out.
    pub(crate) announced: bool,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("instance_name", &self.instance_name)
            .field("port", &self.port)
            .field("has_txt", &self.txt.is_some())
            .field("announced", &self.announced)
            .finish()
    }
}

impl Service {
    pub(crate) fn new(
        service_type: &str,
        port: u16,
        txt: Option<Box<dyn TxtSupplier>>,
        instance: &str,
    ) -> Result<Self> {
        validate_service_type(service_type)?;
        let type_name = Name::new(&format!("{service_type}.local"))?;
        let instance_name = Name::with_prefix(instance, &type_name)?;
        Ok(Service {
            service_type: service_type.to_owned(),
            port,
            txt,
            type_name,
            instance_name,
            announced: false,
        })
    }

    pub(crate) fn rename(&mut self, instance: &str) -> Result<()> {
        self.instance_name = Name::with_prefix(instance, &self.type_name)?;
        Ok(())
    }

    pub(crate) fn txt_bytes(&self) -> &[u8] {
        match &self.txt {
            Some(txt) => txt.txt_bytes(),
            None => &[],
        }
    }
}

/// Accepts `_name._tcp` and `_name._udp`.
pub(crate) fn validate_service_type(service_type: &str) -> Result<()> {
    let mut labels = service_type.split('.');
    let (Some(name), Some(proto), None) = (labels.next(), labels.next(), labels.next()) else {
        return Err(Error::ErrInvalidServiceType);
    };
    let name_ok = name.len() >= 2
        && name.len() <= MAX_SERVICE_NAME_LEN
        && name.starts_with('_')
        && name[1..]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-');
    let proto_ok = proto.eq_ignore_ascii_case("_tcp") || proto.eq_ignore_ascii_case("_udp");
    if name_ok && proto_ok {
        Ok(())
    } else {
        Err(Error::ErrInvalidServiceType)
    }
}

struct ServiceSlot {
    generation: u32,
    service: Option<Service>,
}

/// Fixed-capacity service arena of one responder.
pub(crate) struct ServiceTable {
    slots: Vec<ServiceSlot>,
}

impl ServiceTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|_| ServiceSlot {
                    generation: 0,
                    service: None,
                })
                .collect(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.service.is_some()).count()
    }

    pub(crate) fn insert(&mut self, service: Service) -> Result<ServiceId> {
        let (slot, entry) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.service.is_none())
            .ok_or(Error::ErrServiceTableFull)?;
        entry.service = Some(service);
        Ok(ServiceId {
            slot,
            generation: entry.generation,
        })
    }

    pub(crate) fn remove(&mut self, id: ServiceId) -> Result<Service> {
        let entry = self
            .slots
            .get_mut(id.slot)
            .filter(|s| s.generation == id.generation)
            .ok_or(Error::ErrInvalidHandle)?;
        let service = entry.service.take().ok_or(Error::ErrInvalidHandle)?;
        entry.generation = entry.generation.wrapping_add(1);
        Ok(service)
    }

    pub(crate) fn get(&self, id: ServiceId) -> Option<&Service> {
        self.slots
            .get(id.slot)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.service.as_ref())
    }

    pub(crate) fn by_slot(&self, slot: usize) -> Option<&Service> {
        self.slots.get(slot).and_then(|s| s.service.as_ref())
    }

    /// Occupied slots in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Service)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.service.as_ref().map(|svc| (i, svc)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Service)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.service.as_mut().map(|svc| (i, svc)))
    }
}
