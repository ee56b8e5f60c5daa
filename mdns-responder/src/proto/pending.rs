use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::message::DnsType;

/// Record types owed to a querier, for the host or for one service.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct ResponseFlags(u8);

impl ResponseFlags {
    pub(crate) const NONE: ResponseFlags = ResponseFlags(0);
    pub(crate) const PTR: ResponseFlags = ResponseFlags(1 << 0);
    pub(crate) const TXT: ResponseFlags = ResponseFlags(1 << 1);
    pub(crate) const SRV: ResponseFlags = ResponseFlags(1 << 2);
    pub(crate) const A: ResponseFlags = ResponseFlags(1 << 3);
    pub(crate) const AAAA: ResponseFlags = ResponseFlags(1 << 4);
    pub(crate) const ALL: ResponseFlags = ResponseFlags(0x1f);

    /// Host-scoped flags.
    pub(crate) const ADDRESS: ResponseFlags = ResponseFlags(Self::A.0 | Self::AAAA.0);
    /// Flags answered for a service instance name.
    pub(crate) const INSTANCE: ResponseFlags = ResponseFlags(Self::SRV.0 | Self::TXT.0);

    /// ANY asks for everything.
    pub(crate) fn from_query_type(typ: DnsType) -> Self {
        match typ {
            DnsType::Ptr => Self::PTR,
            DnsType::Txt => Self::TXT,
            DnsType::Srv => Self::SRV,
            DnsType::A => Self::A,
            DnsType::Aaaa => Self::AAAA,
            DnsType::Any => Self::ALL,
            _ => Self::NONE,
        }
    }

    pub(crate) fn contains(self, other: ResponseFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub(crate) fn remove(&mut self, other: ResponseFlags) {
        self.0 &= !other.0;
    }

    pub(crate) fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ResponseFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        ResponseFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResponseFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ResponseFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        ResponseFlags(self.0 & rhs.0)
    }
}

/// What a response owes, accumulated over every question of a datagram (or
/// of several datagrams while a shared response is held back).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Pending {
    pub(crate) host: ResponseFlags,
    /// Indexed by service slot.
    pub(crate) services: Vec<ResponseFlags>,
}

impl Pending {
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            host: ResponseFlags::NONE,
            services: vec![ResponseFlags::NONE; slots],
        }
    }

    /// Everything the host and the given service slots can answer.
    pub(crate) fn all(slots: impl IntoIterator<Item = usize>, capacity: usize) -> Self {
        let mut pending = Self::new(capacity);
        pending.host = ResponseFlags::ADDRESS;
        for slot in slots {
            pending.insert_service(slot, ResponseFlags::PTR | ResponseFlags::INSTANCE);
        }
        pending
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.host.is_empty() && self.services.iter().all(|f| f.is_empty())
    }

    pub(crate) fn clear(&mut self) {
        self.host = ResponseFlags::NONE;
        self.services.fill(ResponseFlags::NONE);
    }

    pub(crate) fn service(&self, slot: usize) -> ResponseFlags {
        self.services.get(slot).copied().unwrap_or_default()
    }

    pub(crate) fn insert_service(&mut self, slot: usize, flags: ResponseFlags) {
        if let Some(f) = self.services.get_mut(slot) {
            *f |= flags;
        }
    }

    pub(crate) fn remove_service(&mut self, slot: usize, flags: ResponseFlags) {
        if let Some(f) = self.services.get_mut(slot) {
            f.remove(flags);
        }
    }

    pub(crate) fn merge(&mut self, other: &Pending) {
        self.host |= other.host;
        for (slot, flags) in other.services.iter().enumerate() {
            self.insert_service(slot, *flags);
        }
    }
}
