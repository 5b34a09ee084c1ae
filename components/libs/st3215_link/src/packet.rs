//! ST3215 packet codec.
//!
//! Pure functions, no I/O.  A read request is always
//! `FF FF <id> 04 02 <address> <size> <checksum>`; a reply is
//! `FF FF <id> <length> <status> <data..> <checksum>` and is consumed as a
//! 4-byte [`ResponseHeader`] followed by `length` payload bytes.
//!
//! The checksum in both directions is the bitwise NOT of the 8-bit sum of
//! every byte from the id up to (excluding) the checksum itself.

use crate::error::{FrameError, HexBytes, PayloadError};
use crate::fault::FaultStatus;
use core::fmt;

pub const HEADER: [u8; 2] = [0xFF, 0xFF];
pub const INSTR_READ: u8 = 0x02;
/// Length field of a read request: instruction + address + size + checksum.
pub const READ_LENGTH: u8 = 4;
pub const PRESENT_POSITION: u8 = 0x38;
pub const POSITION_SIZE: u8 = 2;
pub const HEADER_LEN: usize = 4;
/// Smallest legal reply length: status + two data bytes + checksum.
pub const MIN_RESPONSE_LENGTH: u8 = 4;
pub const REQUEST_LEN: usize = 8;

/// Highest raw value of the 12-bit encoder.
pub const POSITION_MAX: u16 = 4095;

pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Builds a read command for `size` bytes at `address` on servo `id`.
pub fn encode_read(id: u8, address: u8, size: u8) -> [u8; REQUEST_LEN] {
    let mut frame = [
        HEADER[0],
        HEADER[1],
        id,
        READ_LENGTH,
        INSTR_READ,
        address,
        size,
        0,
    ];
    frame[REQUEST_LEN - 1] = checksum(&frame[2..REQUEST_LEN - 1]);
    frame
}

/// Read command for the present position register.
pub fn encode_position_read(id: u8) -> [u8; REQUEST_LEN] {
    encode_read(id, PRESENT_POSITION, POSITION_SIZE)
}

/// The validated first four bytes of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    id: u8,
    length: u8,
}

impl ResponseHeader {
    /// Checks markers, echoed id and length field against the request.
    pub fn decode(raw: [u8; HEADER_LEN], requested_id: u8) -> Result<Self, FrameError> {
        if raw[..2] != HEADER {
            return Err(FrameError::InvalidHeader {
                raw: HexBytes::from(&raw[..]),
            });
        }
        if raw[2] != requested_id {
            return Err(FrameError::IdMismatch {
                expected: requested_id,
                raw: HexBytes::from(&raw[..]),
            });
        }
        if raw[3] < MIN_RESPONSE_LENGTH {
            return Err(FrameError::InvalidLength {
                raw: HexBytes::from(&raw[..]),
            });
        }
        Ok(Self {
            id: raw[2],
            length: raw[3],
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Number of payload bytes still to be read (status + data + checksum).
    pub fn length(&self) -> usize {
        self.length as usize
    }
}

/// Raw reading of the position register.
///
/// Kept exactly as received: values above [`POSITION_MAX`] are legal on the
/// wire and clamping is left to whoever presents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position(pub u16);

impl Position {
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub fn clamped(self) -> u16 {
        self.0.min(POSITION_MAX)
    }

    /// Clamped position as a fraction of full scale, in `0.0..=1.0`.
    pub fn fraction(self) -> f32 {
        self.clamped() as f32 / POSITION_MAX as f32
    }
}

impl From<Position> for u16 {
    fn from(position: Position) -> Self {
        position.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Decodes the `length` bytes following the header: `[status, data.., checksum]`.
///
/// The checksum is verified before the status byte is trusted.  A nonzero
/// status becomes [`PayloadError::Fault`] and no position is extracted.
pub fn decode_payload(payload: &[u8], requested_id: u8) -> Result<Position, PayloadError> {
    let length = payload.len();
    if length < MIN_RESPONSE_LENGTH as usize || length > u8::MAX as usize {
        return Err(FrameError::InvalidLength {
            raw: HexBytes::from(payload),
        }
        .into());
    }

    let (body, received) = payload.split_at(length - 1);
    let expected = !body
        .iter()
        .fold(requested_id.wrapping_add(length as u8), |acc, &b| {
            acc.wrapping_add(b)
        });
    if received[0] != expected {
        return Err(FrameError::ChecksumMismatch {
            expected,
            actual: received[0],
            raw: HexBytes::from(payload),
        }
        .into());
    }

    let status = FaultStatus::from_bits(payload[0]);
    if !status.is_healthy() {
        return Err(PayloadError::Fault(status));
    }
    Ok(Position(u16::from_le_bytes([payload[1], payload[2]])))
}
