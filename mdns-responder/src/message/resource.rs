use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::name::*;
use super::writer::MessageWriter;
use super::*;
use shared::error::{Error, Result};

// Length of the fixed part of a resource record after the owner name.
pub(crate) const RESOURCE_HEADER_LEN: usize = 10;

// SRV rdata before the target: priority, weight, port.
const SRV_FIXED_LEN: usize = 3 * UINT16LEN;

/// Header for a DNS resource record, minus the owner name.
///
/// ```text
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TYPE                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |CF|                  CLASS                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TTL                      |
/// |                                               |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                   RDLENGTH                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub(crate) struct ResourceHeader {
    pub(crate) typ: DnsType,
    pub(crate) class: DnsClass,
    pub(crate) cache_flush: bool,
    pub(crate) ttl: u32,
    pub(crate) length: u16,
}

impl fmt::Display for ResourceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceHeader{{type: {}, class: {}, cache_flush: {}, ttl: {}, length: {}}}",
            self.typ, self.class, self.cache_flush, self.ttl, self.length,
        )
    }
}

impl ResourceHeader {
    // pack appends the fixed header and returns the offset of the length
    // field, to be patched by fix_len once the rdata is written.
    pub(crate) fn pack(&self, w: &mut MessageWriter) -> Result<usize> {
        w.put_u16(self.typ.value())?;
        w.put_u16(self.class.to_wire(self.cache_flush))?;
        w.put_u32(self.ttl)?;
        let len_off = w.len();
        w.put_u16(self.length)?;
        Ok(len_off)
    }

    pub(crate) fn unpack(msg: &[u8], off: usize) -> Result<(Self, usize)> {
        let (typ, off) = unpack_uint16(msg, off)?;
        let (class, off) = unpack_uint16(msg, off)?;
        let (ttl, off) = unpack_uint32(msg, off)?;
        let (length, off) = unpack_uint16(msg, off)?;
        let (class, cache_flush) = DnsClass::from_wire(class);
        Ok((
            ResourceHeader {
                typ: DnsType::from(typ),
                class,
                cache_flush,
                ttl,
                length,
            },
            off,
        ))
    }

    // fix_len updates a packed header with the length of the rdata written
    // since pre_len.
    pub(crate) fn fix_len(w: &mut MessageWriter, len_off: usize, pre_len: usize) -> Result<()> {
        let con_len = w.len().checked_sub(pre_len).ok_or(Error::ErrResourceLen)?;
        let con_len = u16::try_from(con_len).map_err(|_| Error::ErrMessageTooLarge)?;
        w.set_u16(len_off, con_len)
    }
}

/// A resource record as this responder reasons about it.
///
/// `rdata` is canonical: names embedded in PTR and SRV data are stored
/// uncompressed, so two records holding the same data compare equal byte for
/// byte no matter how each packet compressed them.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Record {
    pub(crate) name: Name,
    pub(crate) typ: DnsType,
    pub(crate) class: DnsClass,
    pub(crate) cache_flush: bool,
    pub(crate) ttl: u32,
    pub(crate) rdata: Vec<u8>,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record{{name: {}, type: {}, class: {}, cache_flush: {}, ttl: {}, rdlen: {}}}",
            self.name,
            self.typ,
            self.class,
            self.cache_flush,
            self.ttl,
            self.rdata.len()
        )
    }
}

impl Record {
    pub(crate) fn a(name: Name, ttl: u32, addr: Ipv4Addr) -> Self {
        Record {
            name,
            typ: DnsType::A,
            class: DNSCLASS_INET,
            cache_flush: true,
            ttl,
            rdata: addr.octets().to_vec(),
        }
    }

    pub(crate) fn aaaa(name: Name, ttl: u32, addr: Ipv6Addr) -> Self {
        Record {
            name,
            typ: DnsType::Aaaa,
            class: DNSCLASS_INET,
            cache_flush: true,
            ttl,
            rdata: addr.octets().to_vec(),
        }
    }

    pub(crate) fn ptr(name: Name, ttl: u32, target: &Name) -> Self {
        Record {
            name,
            typ: DnsType::Ptr,
            class: DNSCLASS_INET,
            cache_flush: false,
            ttl,
            rdata: target.wire().to_vec(),
        }
    }

    pub(crate) fn srv(name: Name, ttl: u32, port: u16, target: &Name) -> Self {
        let mut rdata = Vec::with_capacity(SRV_FIXED_LEN + target.wire().len());
        rdata.extend_from_slice(&0u16.to_be_bytes());
        rdata.extend_from_slice(&0u16.to_be_bytes());
        rdata.extend_from_slice(&port.to_be_bytes());
        rdata.extend_from_slice(target.wire());
        Record {
            name,
            typ: DnsType::Srv,
            class: DNSCLASS_INET,
            cache_flush: true,
            ttl,
            rdata,
        }
    }

    pub(crate) fn txt(name: Name, ttl: u32, data: &[u8]) -> Self {
        Record {
            name,
            typ: DnsType::Txt,
            class: DNSCLASS_INET,
            cache_flush: true,
            ttl,
            rdata: txt_rdata(data).to_vec(),
        }
    }

    /// Parses the record at `off`; the returned cursor is past its rdata.
    pub(crate) fn unpack(msg: &[u8], off: usize) -> Result<(Self, usize)> {
        let (name, off) = decode_name(msg, off)?;
        let (header, off) = ResourceHeader::unpack(msg, off)?;
        let end = off + header.length as usize;
        if end > msg.len() {
            return Err(Error::ErrResourceLen);
        }

        let rdata = match header.typ {
            DnsType::Ptr => {
                let (target, next) = decode_name(msg, off)?;
                if next > end {
                    return Err(Error::ErrResourceLen);
                }
                target.wire().to_vec()
            }
            DnsType::Srv => {
                if (header.length as usize) < SRV_FIXED_LEN + 1 {
                    return Err(Error::ErrResourceLen);
                }
                let (target, next) = decode_name(msg, off + SRV_FIXED_LEN)?;
                if next > end {
                    return Err(Error::ErrResourceLen);
                }
                let mut rdata = msg[off..off + SRV_FIXED_LEN].to_vec();
                rdata.extend_from_slice(target.wire());
                rdata
            }
            _ => msg[off..end].to_vec(),
        };

        Ok((
            Record {
                name,
                typ: header.typ,
                class: header.class,
                cache_flush: header.cache_flush,
                ttl: header.ttl,
                rdata,
            },
            end,
        ))
    }

    pub(crate) fn skip(msg: &[u8], off: usize) -> Result<usize> {
        let off = skip_name(msg, off)?;
        let (header, off) = ResourceHeader::unpack(msg, off)?;
        let end = off + header.length as usize;
        if end > msg.len() {
            return Err(Error::ErrResourceLen);
        }
        Ok(end)
    }
}

/// RFC 6763 section 6.1: a TXT record with no data holds one empty string.
pub(crate) fn txt_rdata(data: &[u8]) -> &[u8] {
    if data.is_empty() { &[0] } else { data }
}
