use std::fmt;

use super::writer::MessageWriter;
use super::*;
use shared::error::{Error, Result};

/// The fixed 12-byte DNS message header.
///
/// ```text
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT                    |
/// |                    ANCOUNT                    |
/// |                    NSCOUNT                    |
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) id: u16,
    pub(crate) response: bool,
    pub(crate) op_code: u16,
    pub(crate) authoritative: bool,
    pub(crate) truncated: bool,
    pub(crate) rcode: u16,
    pub(crate) questions: u16,
    pub(crate) answers: u16,
    pub(crate) authorities: u16,
    pub(crate) additionals: u16,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header{{id: {}, response: {}, opcode: {}, authoritative: {}, truncated: {}, qd: {}, an: {}, ns: {}, ar: {}}}",
            self.id,
            self.response,
            self.op_code,
            self.authoritative,
            self.truncated,
            self.questions,
            self.answers,
            self.authorities,
            self.additionals
        )
    }
}

impl Header {
    pub(crate) fn bits(&self) -> u16 {
        let mut bits = (self.op_code & HEADER_OPCODE_MASK) << HEADER_OPCODE_SHIFT
            | (self.rcode & HEADER_RCODE_MASK);
        if self.response {
            bits |= HEADER_BIT_QR;
        }
        if self.authoritative {
            bits |= HEADER_BIT_AA;
        }
        if self.truncated {
            bits |= HEADER_BIT_TC;
        }
        bits
    }

    pub(crate) fn pack(&self, w: &mut MessageWriter) -> Result<usize> {
        w.put_u16(self.id)?;
        w.put_u16(self.bits())?;
        w.put_u16(self.questions)?;
        w.put_u16(self.answers)?;
        w.put_u16(self.authorities)?;
        w.put_u16(self.additionals)
    }

    pub(crate) fn unpack(msg: &[u8]) -> Result<(Self, usize)> {
        if msg.len() < HEADER_LEN {
            return Err(Error::ErrPacketTooShort);
        }
        let (id, off) = unpack_uint16(msg, 0)?;
        let (bits, off) = unpack_uint16(msg, off)?;
        let (questions, off) = unpack_uint16(msg, off)?;
        let (answers, off) = unpack_uint16(msg, off)?;
        let (authorities, off) = unpack_uint16(msg, off)?;
        let (additionals, off) = unpack_uint16(msg, off)?;
        Ok((
            Header {
                id,
                response: bits & HEADER_BIT_QR != 0,
                op_code: (bits >> HEADER_OPCODE_SHIFT) & HEADER_OPCODE_MASK,
                authoritative: bits & HEADER_BIT_AA != 0,
                truncated: bits & HEADER_BIT_TC != 0,
                rcode: bits & HEADER_RCODE_MASK,
                questions,
                answers,
                authorities,
                additionals,
            },
            off,
        ))
    }

    /// A standard query: QR clear, opcode 0.
    pub(crate) fn is_query(&self) -> bool {
        !self.response && self.op_code == 0
    }

    /// A response: QR set, opcode 0, no questions, at least one record.
    pub(crate) fn is_response(&self) -> bool {
        self.response
            && self.op_code == 0
            && self.questions == 0
            && (self.answers > 0 || self.authorities > 0 || self.additionals > 0)
    }
}
