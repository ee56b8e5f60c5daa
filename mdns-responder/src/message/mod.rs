
pub(crate) mod compare;
pub(crate) mod header;
pub(crate) mod name;
pub(crate) mod parser;
pub(crate) mod question;
pub(crate) mod resource;
pub(crate) mod writer;

use std::fmt;

// Message formats

// A Type is a type of DNS request and response.
//
// Only the types an mDNS responder produces or inspects get their own
// variant; everything else keeps its numeric value so records can still be
// ordered for tie-breaking.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum DnsType {
    A,
    Ptr,
    Txt,
    Aaaa,
    Srv,
    Nsec,

    // question.Type
    Any,

    Other(u16),
}

impl Default for DnsType {
    fn default() -> Self {
        DnsType::Other(0)
    }
}

impl From<u16> for DnsType {
    fn from(v: u16) -> Self {
        match v {
            1 => DnsType::A,
            12 => DnsType::Ptr,
            16 => DnsType::Txt,
            28 => DnsType::Aaaa,
            33 => DnsType::Srv,
            47 => DnsType::Nsec,
            255 => DnsType::Any,
            other => DnsType::Other(other),
        }
    }
}

impl DnsType {
    pub(crate) fn value(&self) -> u16 {
        match *self {
            DnsType::A => 1,
            DnsType::Ptr => 12,
            DnsType::Txt => 16,
            DnsType::Aaaa => 28,
            DnsType::Srv => 33,
            DnsType::Nsec => 47,
            DnsType::Any => 255,
            DnsType::Other(v) => v,
        }
    }
}

impl fmt::Display for DnsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DnsType::A => write!(f, "A"),
            DnsType::Ptr => write!(f, "PTR"),
            DnsType::Txt => write!(f, "TXT"),
            DnsType::Aaaa => write!(f, "AAAA"),
            DnsType::Srv => write!(f, "SRV"),
            DnsType::Nsec => write!(f, "NSEC"),
            DnsType::Any => write!(f, "ANY"),
            DnsType::Other(v) => write!(f, "TYPE{v}"),
        }
    }
}

/// DNS class of a question or resource record, with the top bit stripped.
///
/// In mDNS the top bit of the class field is overloaded: in a resource
/// record it is the cache-flush bit, in a question it is the
/// unicast-response (QU) bit. Both are carried separately from the 15-bit
/// class value.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct DnsClass(pub(crate) u16);

/// Internet class (IN).
pub(crate) const DNSCLASS_INET: DnsClass = DnsClass(1);

/// Any class (*), only valid in questions.
pub(crate) const DNSCLASS_ANY: DnsClass = DnsClass(255);

/// Cache-flush bit of a record class, unicast-response bit of a question class.
pub(crate) const CLASS_TOP_BIT: u16 = 0x8000;

/// Mask selecting the 15-bit class value.
pub(crate) const CLASS_VALUE_MASK: u16 = 0x7FFF;

impl fmt::Display for DnsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DNSCLASS_INET => write!(f, "IN"),
            DNSCLASS_ANY => write!(f, "ANY"),
            DnsClass(other) => write!(f, "CLASS{other}"),
        }
    }
}

impl DnsClass {
    /// Splits a wire class field into its 15-bit value and the top bit.
    pub(crate) fn from_wire(v: u16) -> (Self, bool) {
        (DnsClass(v & CLASS_VALUE_MASK), v & CLASS_TOP_BIT != 0)
    }

    pub(crate) fn to_wire(self, top_bit: bool) -> u16 {
        let v = self.0 & CLASS_VALUE_MASK;
        if top_bit { v | CLASS_TOP_BIT } else { v }
    }
}

// Internal constants.

/// Largest message this responder ever emits (no EDNS0, no truncation).
pub(crate) const MAX_MESSAGE_SIZE: usize = 512;

/// Largest inbound datagram that is parsed (RFC 6762 section 17).
pub(crate) const MAX_INBOUND_SIZE: usize = 9000;

// UINT16LEN is the length (in bytes) of a uint16.
pub(crate) const UINT16LEN: usize = 2;

// UINT32LEN is the length (in bytes) of a uint32.
pub(crate) const UINT32LEN: usize = 4;

// HEADER_LEN is the length (in bytes) of a DNS header.
//
// A header is comprised of 6 uint16s and no padding.
pub(crate) const HEADER_LEN: usize = 6 * UINT16LEN;

// Smallest question: root name, type and class.
pub(crate) const MIN_QUESTION_LEN: usize = 1 + 2 * UINT16LEN;

/// Datagrams shorter than a header plus one question are ignored.
pub(crate) const MIN_PACKET_LEN: usize = HEADER_LEN + MIN_QUESTION_LEN;

pub(crate) const HEADER_BIT_QR: u16 = 1 << 15; // query/response (response=1)
pub(crate) const HEADER_BIT_AA: u16 = 1 << 10; // authoritative
pub(crate) const HEADER_BIT_TC: u16 = 1 << 9; // truncated
pub(crate) const HEADER_OPCODE_SHIFT: u16 = 11;
pub(crate) const HEADER_OPCODE_MASK: u16 = 0x0F;
pub(crate) const HEADER_RCODE_MASK: u16 = 0x0F;

pub(crate) fn unpack_uint16(msg: &[u8], off: usize) -> shared::error::Result<(u16, usize)> {
    let b = msg
        .get(off..off + UINT16LEN)
        .ok_or(shared::error::Error::ErrPacketTooShort)?;
    Ok((u16::from_be_bytes([b[0], b[1]]), off + UINT16LEN))
}

pub(crate) fn unpack_uint32(msg: &[u8], off: usize) -> shared::error::Result<(u32, usize)> {
    let b = msg
        .get(off..off + UINT32LEN)
        .ok_or(shared::error::Error::ErrPacketTooShort)?;
    Ok((u32::from_be_bytes([b[0], b[1], b[2], b[3]]), off + UINT32LEN))
}
