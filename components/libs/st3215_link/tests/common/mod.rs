//! In-memory servo bus: answers position reads the way real units do.

#![allow(dead_code)]

use st3215_link::packet::{self, INSTR_READ, PRESENT_POSITION, REQUEST_LEN};
use st3215_link::{LinkTiming, SerialTransport, ServoLink};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// How a unit on the fake bus answers.
#[derive(Debug, Clone)]
pub enum Unit {
    Healthy(u16),
    Faulty(u8),
    Silent,
    /// Sends only the first `n` bytes of a healthy reply.
    Truncated(u16, usize),
    /// Echoes a different id.
    Impostor(u8, u16),
    /// Exact bytes, regardless of the request.
    Raw(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct FakeBus {
    units: HashMap<u8, Unit>,
    rx: VecDeque<u8>,
    /// Bytes handed out per read call; 0 means everything available.
    pub chunk: usize,
    /// Bytes accepted per write call; `None` accepts everything.
    pub accept: Option<usize>,
    pub requests: Vec<Vec<u8>>,
    /// Time from a request until the first 4 reply bytes can be read.
    pub header_delay: Duration,
    /// Further time until the rest of the reply can be read.
    pub payload_delay: Duration,
    /// Time between the last request and the first read that followed it.
    pub first_read_gap: Option<Duration>,
    answered_at: Option<Instant>,
    delivered: usize,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, id: u8, unit: Unit) -> Self {
        self.units.insert(id, unit);
        self
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn with_delays(mut self, header_delay: Duration, payload_delay: Duration) -> Self {
        self.header_delay = header_delay;
        self.payload_delay = payload_delay;
        self
    }

    pub fn set_unit(&mut self, id: u8, unit: Unit) {
        self.units.insert(id, unit);
    }

    /// Puts bytes on the line that nobody asked for, like a reply arriving late.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Bytes still waiting to be read.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn position_reply(id: u8, position: u16) -> Vec<u8> {
        Self::reply(id, 0, position)
    }

    /// How many more reply bytes the delays let through right now.
    fn released(&self) -> usize {
        let Some(at) = self.answered_at else {
            return usize::MAX;
        };
        let elapsed = at.elapsed();
        let allowed = if elapsed < self.header_delay {
            0
        } else if elapsed < self.header_delay + self.payload_delay {
            packet::HEADER_LEN
        } else {
            usize::MAX
        };
        allowed.saturating_sub(self.delivered)
    }

    fn reply(id: u8, status: u8, position: u16) -> Vec<u8> {
        let [lo, hi] = position.to_le_bytes();
        let mut reply = vec![0xFF, 0xFF, id, 4, status, lo, hi];
        reply.push(packet::checksum(&reply[2..]));
        reply
    }

    fn answer(&mut self, request: &[u8]) {
        assert_eq!(request.len(), REQUEST_LEN, "unexpected request {request:02x?}");
        assert_eq!(&request[..2], &[0xFF, 0xFF]);
        assert_eq!(request[4], INSTR_READ);
        assert_eq!(request[5], PRESENT_POSITION);
        assert_eq!(
            request[7],
            packet::checksum(&request[2..7]),
            "bad request checksum"
        );
        let id = request[2];
        let bytes = match self.units.get(&id).cloned() {
            Some(Unit::Healthy(position)) => Self::reply(id, 0, position),
            Some(Unit::Faulty(status)) => Self::reply(id, status, 0),
            Some(Unit::Truncated(position, n)) => {
                let mut reply = Self::reply(id, 0, position);
                reply.truncate(n);
                reply
            }
            Some(Unit::Impostor(other, position)) => Self::reply(other, 0, position),
            Some(Unit::Raw(bytes)) => bytes,
            Some(Unit::Silent) | None => Vec::new(),
        };
        self.rx.extend(bytes);
    }
}

impl Read for FakeBus {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let (Some(at), None) = (self.answered_at, self.first_read_gap) {
            self.first_read_gap = Some(at.elapsed());
        }
        let limit = if self.chunk == 0 { buf.len() } else { self.chunk };
        let n = limit
            .min(buf.len())
            .min(self.rx.len())
            .min(self.released());
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "line idle"));
        }
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        self.delivered += n;
        Ok(n)
    }
}

impl Write for FakeBus {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.accept.unwrap_or(buf.len()).min(buf.len());
        if n == buf.len() {
            self.requests.push(buf.to_vec());
            self.answered_at = Some(Instant::now());
            self.first_read_gap = None;
            self.delivered = 0;
            self.answer(buf);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fast timings so failing reads do not slow the suite down.
pub fn test_timing() -> LinkTiming {
    LinkTiming {
        settle: Duration::ZERO,
        header_timeout: Duration::from_millis(30),
        payload_timeout: Duration::from_millis(30),
        poll_interval: Duration::from_micros(200),
    }
}

pub fn link(bus: FakeBus) -> ServoLink<FakeBus> {
    ServoLink::new(SerialTransport::from_port(bus)).with_timing(test_timing())
}

pub fn bus(link: &mut ServoLink<FakeBus>) -> &mut FakeBus {
    link.transport_mut().port_mut().expect("link is open")
}
