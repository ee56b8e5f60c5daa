use std::fmt;

use super::writer::MessageWriter;
use shared::error::{Error, Result};

// Maximum length of a name on the wire, terminating zero included.
pub(crate) const MAX_NAME_LEN: usize = 255;

// Maximum length of one label.
pub(crate) const MAX_LABEL_LEN: usize = 63;

// Top two bits of a length octet that mark a compression pointer.
const COMPRESSION_POINTER_BITS: u8 = 0xC0;

// Highest offset a 14-bit compression pointer can reach.
pub(crate) const MAX_COMPRESSION_OFFSET: usize = 0x3FFF;

// Pointer hops followed while decoding one name.
const MAX_POINTER_JUMPS: usize = 16;

/// A domain name held in uncompressed wire form: length-prefixed labels
/// ending with the zero-length root label.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
    wire: Vec<u8>,
}

impl Default for Name {
    fn default() -> Self {
        Name { wire: vec![0] }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for label in self.labels() {
            if !first {
                write!(f, ".")?;
            }
            first = false;
            write!(f, "{}", String::from_utf8_lossy(label))?;
        }
        if first {
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl Name {
    /// Builds a name from dotted text such as `"mydevice.local"`; a trailing
    /// dot is accepted. Labels must be 1..=63 bytes and the encoded name at
    /// most 255 bytes.
    pub fn new(text: &str) -> Result<Self> {
        let mut wire = Vec::with_capacity(text.len() + 2);
        let trimmed = text.strip_suffix('.').unwrap_or(text);
        if !trimmed.is_empty() {
            for label in trimmed.split('.') {
                push_label(&mut wire, label.as_bytes())?;
            }
        }
        wire.push(0);
        if wire.len() > MAX_NAME_LEN {
            return Err(Error::ErrNameTooLong);
        }
        Ok(Name { wire })
    }

    /// `label` prepended to `suffix`. The label may contain any byte,
    /// dots and spaces included, as service instance labels do.
    pub fn with_prefix(label: &str, suffix: &Name) -> Result<Self> {
        let mut wire = Vec::with_capacity(label.len() + 1 + suffix.wire.len());
        push_label(&mut wire, label.as_bytes())?;
        wire.extend_from_slice(&suffix.wire);
        if wire.len() > MAX_NAME_LEN {
            return Err(Error::ErrNameTooLong);
        }
        Ok(Name { wire })
    }

    pub(crate) fn from_wire(wire: Vec<u8>) -> Self {
        Name { wire }
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub(crate) fn labels(&self) -> Labels<'_> {
        Labels {
            wire: &self.wire,
            pos: 0,
        }
    }

    pub(crate) fn first_label(&self) -> Option<&[u8]> {
        self.labels().next()
    }

    /// Wire bytes after the first label.
    pub(crate) fn parent_wire(&self) -> &[u8] {
        match self.wire.first() {
            Some(&len) if len > 0 => &self.wire[1 + len as usize..],
            _ => &self.wire,
        }
    }

    /// DNS names compare ASCII case-insensitively.
    pub fn matches(&self, other: &Name) -> bool {
        self.wire.eq_ignore_ascii_case(&other.wire)
    }
}

pub(crate) struct Labels<'a> {
    wire: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.wire.get(self.pos)? as usize;
        if len == 0 {
            return None;
        }
        let label = self.wire.get(self.pos + 1..self.pos + 1 + len)?;
        self.pos += 1 + len;
        Some(label)
    }
}

fn push_label(wire: &mut Vec<u8>, label: &[u8]) -> Result<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(Error::ErrLabelTooLong);
    }
    wire.push(label.len() as u8);
    wire.extend_from_slice(label);
    Ok(())
}

/// Writes dotted `text` as length-prefixed labels. Nothing is left in the
/// writer if the name is invalid or does not fit.
pub(crate) fn encode_name(w: &mut MessageWriter, text: &str) -> Result<usize> {
    let name = Name::new(text)?;
    put_name(w, &name)
}

/// Writes an already validated name without compression.
pub(crate) fn put_name(w: &mut MessageWriter, name: &Name) -> Result<usize> {
    let start = w.len();
    w.put_slice(&name.wire).inspect_err(|_| w.truncate(start))
}

/// Writes a 2-byte compression pointer to `offset`.
pub(crate) fn encode_compressed_name(w: &mut MessageWriter, offset: usize) -> Result<usize> {
    if offset > MAX_COMPRESSION_OFFSET {
        return Err(Error::ErrInvalidPointer);
    }
    w.put_u16(0xC000 | offset as u16)
}

/// Reads the name starting at `off` in `msg`.
///
/// Returns the uncompressed name and the cursor just past the name as it is
/// encoded at `off`: past the first compression pointer if one is met,
/// otherwise past the terminating zero. Every pointer must jump strictly
/// backwards from the segment it appears in, which rules out loops.
pub(crate) fn decode_name(msg: &[u8], off: usize) -> Result<(Name, usize)> {
    let mut wire = Vec::with_capacity(32);
    let mut pos = off;
    let mut segment_start = off;
    let mut end: Option<usize> = None;
    let mut jumps = 0;

    loop {
        let len = *msg.get(pos).ok_or(Error::ErrPacketTooShort)?;
        match len & COMPRESSION_POINTER_BITS {
            0x00 => {
                if len == 0 {
                    wire.push(0);
                    if end.is_none() {
                        end = Some(pos + 1);
                    }
                    break;
                }
                let label_len = len as usize;
                let label = msg
                    .get(pos + 1..pos + 1 + label_len)
                    .ok_or(Error::ErrPacketTooShort)?;
                // room for this label and the root label
                if wire.len() + 1 + label_len + 1 > MAX_NAME_LEN {
                    return Err(Error::ErrNameTooLong);
                }
                wire.push(len);
                wire.extend_from_slice(label);
                pos += 1 + label_len;
            }
            COMPRESSION_POINTER_BITS => {
                let lo = *msg.get(pos + 1).ok_or(Error::ErrPacketTooShort)?;
                let ptr = (((len & !COMPRESSION_POINTER_BITS) as usize) << 8) | lo as usize;
                if end.is_none() {
                    end = Some(pos + 2);
                }
                if ptr >= msg.len() || ptr >= segment_start {
                    return Err(Error::ErrInvalidPointer);
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(Error::ErrTooManyPointers);
                }
                segment_start = ptr;
                pos = ptr;
            }
            // 0x40 and 0x80 are reserved / extended label types
            _ => return Err(Error::ErrInvalidLabel),
        }
    }

    let end = end.ok_or(Error::ErrPacketTooShort)?;
    Ok((Name { wire }, end))
}

/// Skips the name at `off` without materialising it.
pub(crate) fn skip_name(msg: &[u8], off: usize) -> Result<usize> {
    let mut pos = off;
    loop {
        let len = *msg.get(pos).ok_or(Error::ErrPacketTooShort)?;
        match len & COMPRESSION_POINTER_BITS {
            0x00 => {
                pos += 1;
                if len == 0 {
                    return Ok(pos);
                }
                pos += len as usize;
                if pos > msg.len() {
                    return Err(Error::ErrPacketTooShort);
                }
            }
            COMPRESSION_POINTER_BITS => {
                if pos + 2 > msg.len() {
                    return Err(Error::ErrPacketTooShort);
                }
                return Ok(pos + 2);
            }
            _ => return Err(Error::ErrInvalidLabel),
        }
    }
}
