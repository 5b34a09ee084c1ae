//! Error taxonomy for the servo link.
//!
//! Failures are layered: the transport and the codec report what went
//! wrong on the wire, and [`ServoLink`](crate::ServoLink) wraps every one of
//! them in a [`ServoError`] carrying the servo id and the protocol phase, so
//! a polling consumer can always attribute a failed read to a unit.

use crate::fault::FaultStatus;
use core::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Raw bytes rendered as space separated lowercase hex, e.g. `ff fe 01 04`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Failures of the serial line itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("write error: {0}")]
    Write(#[source] io::Error),
    #[error("failed to write complete command ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },
    #[error("timeout after {budget:?} ({received} of {expected} bytes received)")]
    Timeout {
        expected: usize,
        received: usize,
        budget: Duration,
    },
    #[error("read error: {0}")]
    Read(#[source] io::Error),
    #[error("serial port is closed")]
    Closed,
}

/// A reply that does not follow the framing rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid header markers: {raw}")]
    InvalidHeader { raw: HexBytes },
    #[error("mismatched servo id (expected {expected}): {raw}")]
    IdMismatch { expected: u8, raw: HexBytes },
    #[error("invalid length: {raw}")]
    InvalidLength { raw: HexBytes },
    #[error("checksum mismatch (expected {expected:02x}, got {actual:02x}): {raw}")]
    ChecksumMismatch {
        expected: u8,
        actual: u8,
        raw: HexBytes,
    },
}

/// Why a position could not be extracted from a complete reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("{0}")]
    Fault(FaultStatus),
}

/// Anything that can go wrong during one position read.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Frame(#[from] FrameError),
    #[error("{0}")]
    Fault(FaultStatus),
}

impl From<PayloadError> for LinkError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Frame(frame) => Self::Frame(frame),
            PayloadError::Fault(status) => Self::Fault(status),
        }
    }
}

/// Step of the request/response exchange where a read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Send,
    Header,
    Payload,
    Decode,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Send => "send",
            Self::Header => "header",
            Self::Payload => "payload",
            Self::Decode => "decode",
        })
    }
}

/// Coarse classification of a failure, used by consumers to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The port cannot be opened or is gone.
    Connection,
    Write,
    Timeout,
    Read,
    /// Bad markers, id mismatch, invalid length or corrupted checksum: bus noise.
    Frame,
    /// The unit reported a hardware condition.  Not a communication defect.
    ServoFault,
}

impl ErrorKind {
    /// Everything except a lost connection can be retried on the next cycle.
    pub const fn is_recoverable(self) -> bool {
        !matches!(self, Self::Connection)
    }
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } | Self::Closed => ErrorKind::Connection,
            Self::Write(_) | Self::ShortWrite { .. } => ErrorKind::Write,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Read(_) => ErrorKind::Read,
        }
    }
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(err) => err.kind(),
            Self::Frame(_) => ErrorKind::Frame,
            Self::Fault(_) => ErrorKind::ServoFault,
        }
    }
}

/// A failed position read, attributed to a servo and a phase.
#[derive(Debug, Error)]
#[error("error reading servo {id} ({phase}): {source}")]
pub struct ServoError {
    pub id: u8,
    pub phase: Phase,
    #[source]
    pub source: LinkError,
}

impl ServoError {
    pub fn new(id: u8, phase: Phase, source: impl Into<LinkError>) -> Self {
        Self {
            id,
            phase,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// The hardware status, when the unit itself reported the failure.
    pub fn fault(&self) -> Option<FaultStatus> {
        match self.source {
            LinkError::Fault(status) => Some(status),
            _ => None,
        }
    }
}
