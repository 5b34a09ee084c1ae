//! One position read, start to finish.
//!
//! Each call walks `send -> settle -> header -> payload -> decode` with no
//! state carried over between calls and no retry.  Leftover input is dropped
//! before the request, so one bad reply cannot shift the ones after it.  The
//! next attempt is the caller's next polling cycle.  A link is not internally
//! synchronized: poll several units on one line serially, or give each line
//! its own link.

use crate::error::{Phase, ServoError, TransportError};
use crate::packet::{self, HEADER_LEN, Position, ResponseHeader};
use crate::transport::{DEFAULT_POLL_INTERVAL, SerialTransport};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

/// Delays and budgets applied to every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkTiming {
    /// Bus turnaround: wait after the request before expecting a reply.
    #[serde(rename = "settle_ms", with = "millis")]
    pub settle: Duration,
    #[serde(rename = "header_timeout_ms", with = "millis")]
    pub header_timeout: Duration,
    #[serde(rename = "payload_timeout_ms", with = "millis")]
    pub payload_timeout: Duration,
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(10),
            header_timeout: Duration::from_millis(100),
            payload_timeout: Duration::from_millis(100),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl LinkTiming {
    /// Longest a single read can block when both reads time out.
    pub fn worst_case(&self) -> Duration {
        self.settle + self.header_timeout + self.payload_timeout + 2 * self.poll_interval
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Read-only position link to the servos of one bus.
pub struct ServoLink<P: Read + Write = Box<dyn SerialPort>> {
    transport: SerialTransport<P>,
    timing: LinkTiming,
}

impl ServoLink {
    /// Opens the bus on `path`.  A failure here is fatal for the session.
    pub fn open(path: &str, baud: u32) -> Result<Self, TransportError> {
        Ok(Self::new(SerialTransport::open(path, baud)?))
    }
}

impl<P: Read + Write> ServoLink<P> {
    pub fn new(transport: SerialTransport<P>) -> Self {
        let timing = LinkTiming {
            poll_interval: transport.poll_interval(),
            ..LinkTiming::default()
        };
        Self { transport, timing }
    }

    pub fn with_timing(mut self, timing: LinkTiming) -> Self {
        self.transport = self.transport.with_poll_interval(timing.poll_interval);
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> &LinkTiming {
        &self.timing
    }

    pub fn transport_mut(&mut self) -> &mut SerialTransport<P> {
        &mut self.transport
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Reads the present position of servo `id`.
    ///
    /// Bytes left on the line by an earlier, failed or late reply are
    /// discarded before the request goes out.
    pub fn read_position(&mut self, id: u8) -> Result<Position, ServoError> {
        self.transport
            .discard_input(self.timing.header_timeout)
            .map_err(|e| ServoError::new(id, Phase::Send, e))?;

        let request = packet::encode_position_read(id);
        self.transport
            .write_all(&request)
            .map_err(|e| ServoError::new(id, Phase::Send, e))?;
        trace!("servo {id}: request sent");

        thread::sleep(self.timing.settle);

        let raw = self
            .transport
            .read_exact(HEADER_LEN, self.timing.header_timeout)
            .map_err(|e| ServoError::new(id, Phase::Header, e))?;
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&raw);
        let header = ResponseHeader::decode(header_bytes, id)
            .map_err(|e| ServoError::new(id, Phase::Header, e))?;

        let payload = self
            .transport
            .read_exact(header.length(), self.timing.payload_timeout)
            .map_err(|e| ServoError::new(id, Phase::Payload, e))?;

        let position = packet::decode_payload(&payload, id).map_err(|e| {
            let err = ServoError::new(id, Phase::Decode, e);
            debug!("{err}");
            err
        })?;
        trace!("servo {id}: position {position}");
        Ok(position)
    }

    /// Releases the bus.  Safe to call more than once.
    pub fn close(&mut self) {
        self.transport.close();
    }
}
