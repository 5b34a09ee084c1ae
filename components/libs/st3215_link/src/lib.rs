//! Read-only driver for ST3215 (Feetech STS protocol) serial bus servos.
//!
//! The crate is built in three layers:
//!
//! - [`packet`]: pure request/response codec and checksum,
//! - [`transport`]: exclusive, timeout-bounded access to one serial line,
//! - [`link`]: the `read_position(id)` exchange on top of both.
//!
//! [`calibration`] and [`units`] turn readings into recorded ranges and
//! human units for the monitor.
//!
//! ```no_run
//! use st3215_link::ServoLink;
//!
//! let mut link = ServoLink::open("/dev/ttyUSB0", 1_000_000)?;
//! for id in 1..=6 {
//!     match link.read_position(id) {
//!         Ok(position) => println!("servo {id}: {position}"),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! # Ok::<(), st3215_link::TransportError>(())
//! ```

pub mod calibration;
pub mod error;
pub mod fault;
pub mod link;
pub mod packet;
pub mod transport;
pub mod units;

pub use calibration::{CalibrationData, CalibrationError, RangeTracker, ServoRange};
pub use error::{
    ErrorKind, FrameError, HexBytes, LinkError, PayloadError, Phase, ServoError, TransportError,
};
pub use fault::FaultStatus;
pub use link::{LinkTiming, ServoLink};
pub use packet::{Position, ResponseHeader};
pub use transport::SerialTransport;
pub use units::Units;

/// Baud rate the ST3215 ships with.
pub const DEFAULT_BAUD: u32 = 1_000_000;
