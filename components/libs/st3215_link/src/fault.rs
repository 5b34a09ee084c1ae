//! Hardware status byte reported by the servo in every reply.
//!
//! A zero status means the unit is healthy.  Any other value is a bitmask
//! of fault conditions detected by the servo firmware; when present, the
//! data bytes of the reply are not trustworthy and no position is decoded.

use core::fmt;

/// Fault bitmask carried in the first payload byte of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FaultStatus(u8);

impl FaultStatus {
    pub const INPUT_VOLTAGE: u8 = 0x01;
    pub const ANGLE_LIMIT: u8 = 0x02;
    pub const OVERHEATING: u8 = 0x04;
    pub const RANGE: u8 = 0x08;
    pub const CHECKSUM: u8 = 0x10;
    pub const OVERLOAD: u8 = 0x20;
    pub const INSTRUCTION: u8 = 0x40;

    /// Flag names in the order they are reported.
    const FLAGS: [(u8, &'static str); 7] = [
        (Self::INPUT_VOLTAGE, "Input Voltage"),
        (Self::ANGLE_LIMIT, "Angle Limit"),
        (Self::OVERHEATING, "Overheating"),
        (Self::RANGE, "Range"),
        (Self::CHECKSUM, "Checksum"),
        (Self::OVERLOAD, "Overload"),
        (Self::INSTRUCTION, "Instruction"),
    ];

    /// Bits the protocol does not assign a name to.
    const UNNAMED: u8 = 0x80;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_healthy(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Names of every set flag, in fixed bit order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::FLAGS
            .into_iter()
            .filter(move |(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| name)
    }
}

impl From<u8> for FaultStatus {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Servo errors:")?;
        for name in self.names() {
            write!(f, " {name}")?;
        }
        if self.0 & Self::UNNAMED != 0 {
            write!(f, " Unknown(0x{:02x})", self.0 & Self::UNNAMED)?;
        }
        Ok(())
    }
}
