#![allow(dead_code)]

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    //Configuration errors
    #[error("host name must not be empty")]
    ErrHostnameEmpty,
    #[error("label must be between 1 and 63 bytes")]
    ErrLabelTooLong,
    #[error("name exceeds 255 bytes on the wire")]
    ErrNameTooLong,
    #[error("invalid service type, expected \"_service._tcp\" or \"_service._udp\"")]
    ErrInvalidServiceType,
    #[error("no local address assigned for the configured address family")]
    ErrNoAddressForFamily,
    #[error("record TTL must be non-zero")]
    ErrInvalidTtl,
    #[error("IP hop limit must be non-zero")]
    ErrInvalidHopLimit,
    #[error("no interface is available")]
    ErrNoInterface,
    #[error("TXT entry exceeds 255 bytes")]
    ErrTxtEntryTooLong,
    #[error("TXT key must be printable ASCII without '='")]
    ErrInvalidTxtKey,

    //Resource exhaustion
    #[error("responder table is full")]
    ErrResponderTableFull,
    #[error("service table is full")]
    ErrServiceTableFull,
    #[error("message would exceed the maximum size")]
    ErrMessageTooLarge,

    //Malformed input
    #[error("packet is too short")]
    ErrPacketTooShort,
    #[error("packet is too long")]
    ErrPacketTooLong,
    #[error("invalid compression pointer")]
    ErrInvalidPointer,
    #[error("too many compression pointers")]
    ErrTooManyPointers,
    #[error("invalid label length")]
    ErrInvalidLabel,
    #[error("insufficient data for resource body length")]
    ErrResourceLen,
    #[error("parsing/packing of this section has completed")]
    ErrSectionDone,
    #[error("not a query or response message")]
    ErrNotMdnsMessage,

    //Handles and lifecycle
    #[error("invalid or stale handle")]
    ErrInvalidHandle,
    #[error("responder is closed")]
    ErrResponderClosed,

    #[error("{0}")]
    Io(#[source] IoError),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl Error {
    /// Malformed-input errors are the ones caused by a peer's bytes rather
    /// than by local configuration; they never abort the responder.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::ErrPacketTooShort
                | Error::ErrPacketTooLong
                | Error::ErrInvalidPointer
                | Error::ErrTooManyPointers
                | Error::ErrInvalidLabel
                | Error::ErrNameTooLong
                | Error::ErrResourceLen
                | Error::ErrNotMdnsMessage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_compares_by_kind() {
        let a: Error = io::Error::new(io::ErrorKind::WouldBlock, "a").into();
        let b: Error = io::Error::new(io::ErrorKind::WouldBlock, "b").into();
        let c: Error = io::Error::new(io::ErrorKind::TimedOut, "a").into();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_is_malformed() {
        assert!(Error::ErrInvalidPointer.is_malformed());
        assert!(Error::ErrPacketTooShort.is_malformed());
        assert!(!Error::ErrServiceTableFull.is_malformed());
        assert!(!Error::ErrHostnameEmpty.is_malformed());
    }
}
