use std::fmt;

use super::name::*;
use super::writer::MessageWriter;
use super::*;
use shared::error::Result;

// A question is a DNS query.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub(crate) struct Question {
    pub(crate) name: Name,
    pub(crate) typ: DnsType,
    pub(crate) class: DnsClass,
    /// QU bit: the querier prefers a unicast reply.
    pub(crate) unicast_response: bool,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Question{{name: {}, type: {}, class: {}, qu: {}}}",
            self.name, self.typ, self.class, self.unicast_response
        )
    }
}

impl Question {
    // pack appends the wire format of the question after an owner name the
    // caller has already written.
    pub(crate) fn pack_tail(&self, w: &mut MessageWriter) -> Result<usize> {
        w.put_u16(self.typ.value())?;
        w.put_u16(self.class.to_wire(self.unicast_response))
    }

    pub(crate) fn unpack(msg: &[u8], off: usize) -> Result<(Self, usize)> {
        let (name, off) = decode_name(msg, off)?;
        let (typ, off) = unpack_uint16(msg, off)?;
        let (class, off) = unpack_uint16(msg, off)?;
        let (class, unicast_response) = DnsClass::from_wire(class);
        Ok((
            Question {
                name,
                typ: DnsType::from(typ),
                class,
                unicast_response,
            },
            off,
        ))
    }

    pub(crate) fn skip(msg: &[u8], off: usize) -> Result<usize> {
        let off = skip_name(msg, off)?;
        if off + 2 * UINT16LEN > msg.len() {
            return Err(shared::error::Error::ErrPacketTooShort);
        }
        Ok(off + 2 * UINT16LEN)
    }
}
