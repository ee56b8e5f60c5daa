use super::*;
use shared::error::{Error, Result};

/// Bounded write cursor over one outbound message.
///
/// Every put is bounds-checked against [`MAX_MESSAGE_SIZE`] and fails with
/// [`Error::ErrMessageTooLarge`] instead of growing. The returned `usize` is
/// the cursor after the write.
#[derive(Clone)]
pub(crate) struct MessageWriter {
    buf: [u8; MAX_MESSAGE_SIZE],
    len: usize,
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageWriter {
    pub(crate) fn new() -> Self {
        Self {
            buf: [0u8; MAX_MESSAGE_SIZE],
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn remaining(&self) -> usize {
        MAX_MESSAGE_SIZE - self.len
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub(crate) fn put_u8(&mut self, v: u8) -> Result<usize> {
        self.put_slice(&[v])
    }

    pub(crate) fn put_u16(&mut self, v: u16) -> Result<usize> {
        self.put_slice(&v.to_be_bytes())
    }

    pub(crate) fn put_u32(&mut self, v: u32) -> Result<usize> {
        self.put_slice(&v.to_be_bytes())
    }

    pub(crate) fn put_slice(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() > self.remaining() {
            return Err(Error::ErrMessageTooLarge);
        }
        self.buf[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(self.len)
    }

    /// Overwrites a previously written uint16, used for counts and rdata
    /// lengths that are only known after the fact.
    pub(crate) fn set_u16(&mut self, off: usize, v: u16) -> Result<()> {
        if off + UINT16LEN > self.len {
            return Err(Error::ErrMessageTooLarge);
        }
        self.buf[off..off + UINT16LEN].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// Rolls the cursor back, discarding everything written after `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }
}
