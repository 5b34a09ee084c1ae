//! Exclusive owner of one serial line.
//!
//! The line is opened 8N1 without flow control and with a very short OS read
//! timeout, so an idle bus shows up as an empty read rather than a blocked
//! thread.  [`SerialTransport::read_exact`] then accumulates partial reads
//! until it has the requested byte count or its time budget runs out.

use crate::error::TransportError;
use log::{debug, trace};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Sleep between two empty reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct SerialTransport<P: Read + Write = Box<dyn SerialPort>> {
    port: Option<P>,
    poll_interval: Duration,
}

impl SerialTransport {
    /// Opens and configures `path` at `baud` (8 data bits, 1 stop bit, no parity, no flow control).
    ///
    /// Configuration happens inside the open call; if any step fails the
    /// partially configured handle is dropped before the error is returned.
    pub fn open(path: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(DEFAULT_POLL_INTERVAL)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;
        debug!("opened {path} at {baud} baud");
        Ok(Self::from_port(port))
    }
}

impl<P: Read + Write> SerialTransport<P> {
    /// Wraps an already opened line.
    pub fn from_port(port: P) -> Self {
        Self {
            port: Some(port),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Direct access to the underlying line, if still open.
    pub fn port_mut(&mut self) -> Option<&mut P> {
        self.port.as_mut()
    }

    /// Writes the whole frame in one call.  Accepting fewer bytes is an error, not a retry.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        let written = port.write(bytes).map_err(TransportError::Write)?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        port.flush().map_err(TransportError::Write)?;
        trace!("tx {written} bytes");
        Ok(written)
    }

    /// Drops whatever is already waiting on the line and returns how many bytes that was.
    ///
    /// Stops at the first empty read, or once `budget` has elapsed if the
    /// line keeps talking.
    pub fn discard_input(&mut self, budget: Duration) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        let mut scratch = [0u8; 64];
        let mut discarded = 0;
        let start = Instant::now();

        loop {
            match port.read(&mut scratch) {
                Ok(0) => break,
                Ok(got) => discarded += got,
                Err(e) if is_idle(&e) => break,
                Err(e) => return Err(TransportError::Read(e)),
            }
            if start.elapsed() > budget {
                break;
            }
        }
        if discarded > 0 {
            debug!("discarded {discarded} stale bytes");
        }
        Ok(discarded)
    }

    /// Collects exactly `n` bytes or gives up once `budget` has elapsed.
    ///
    /// The budget covers this call only.  On timeout the partial buffer is dropped.
    pub fn read_exact(&mut self, n: usize, budget: Duration) -> Result<Vec<u8>, TransportError> {
        let poll_interval = self.poll_interval;
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        let start = Instant::now();

        while filled < n {
            let got = match port.read(&mut buf[filled..]) {
                Ok(got) => got,
                Err(e) if is_idle(&e) => 0,
                Err(e) => return Err(TransportError::Read(e)),
            };
            filled += got;
            if filled >= n {
                break;
            }
            if start.elapsed() > budget {
                trace!("rx timeout with {filled}/{n} bytes");
                return Err(TransportError::Timeout {
                    expected: n,
                    received: filled,
                    budget,
                });
            }
            if got == 0 {
                thread::sleep(poll_interval);
            }
        }
        trace!("rx {n} bytes");
        Ok(buf)
    }

    /// Releases the line.  Best effort: errors are swallowed and a second call does nothing.
    pub fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush() {
                trace!("ignoring flush error on close: {e}");
            }
            drop(port);
            debug!("serial port closed");
        }
    }
}

impl<P: Read + Write> Drop for SerialTransport<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An OS read timeout on the line just means nothing arrived yet.
fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Serves queued read results, one per call.
    #[derive(Default)]
    struct ScriptedPort {
        reads: VecDeque<io::Result<Vec<u8>>>,
        accept: Option<usize>,
        written: Vec<u8>,
        flush_fails: bool,
        flushes: Rc<Cell<usize>>,
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "idle")),
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = self.accept.unwrap_or(buf.len()).min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes.set(self.flushes.get() + 1);
            if self.flush_fails {
                Err(io::Error::other("flush failed"))
            } else {
                Ok(())
            }
        }
    }

    fn transport(port: ScriptedPort) -> SerialTransport<ScriptedPort> {
        SerialTransport::from_port(port).with_poll_interval(Duration::from_micros(100))
    }

    #[test]
    fn write_all_reports_length() {
        let mut t = transport(ScriptedPort::default());
        assert_eq!(t.write_all(&[1, 2, 3]).unwrap(), 3);
        assert_eq!(t.port_mut().unwrap().written, vec![1, 2, 3]);
    }

    #[test]
    fn short_write_is_an_error() {
        let mut t = transport(ScriptedPort {
            accept: Some(5),
            ..Default::default()
        });
        let err = t.write_all(&[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            TransportError::ShortWrite {
                written: 5,
                expected: 8
            }
        ));
    }

    #[test]
    fn read_exact_accumulates_partial_reads() {
        let mut t = transport(ScriptedPort {
            reads: VecDeque::from([
                Ok(vec![0xFF]),
                Err(io::Error::new(io::ErrorKind::TimedOut, "idle")),
                Ok(vec![]),
                Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
                Ok(vec![0xFF, 0x01]),
                Ok(vec![0x04]),
            ]),
            ..Default::default()
        });
        let bytes = t.read_exact(4, Duration::from_millis(100)).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x01, 0x04]);
    }

    #[test]
    fn read_exact_times_out_on_silent_line() {
        let mut t = transport(ScriptedPort::default());
        let start = Instant::now();
        let err = t.read_exact(4, Duration::from_millis(100)).unwrap_err();
        let elapsed = start.elapsed();
        assert!(matches!(
            err,
            TransportError::Timeout {
                expected: 4,
                received: 0,
                ..
            }
        ));
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn read_exact_reports_partial_count_on_timeout() {
        let mut t = transport(ScriptedPort {
            reads: VecDeque::from([Ok(vec![0xFF, 0xFF])]),
            ..Default::default()
        });
        let err = t.read_exact(4, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Timeout { received: 2, .. }
        ));
    }

    #[test]
    fn read_errors_are_surfaced() {
        let mut t = transport(ScriptedPort {
            reads: VecDeque::from([Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))]),
            ..Default::default()
        });
        let err = t.read_exact(4, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, TransportError::Read(_)));
    }

    #[test]
    fn discard_input_empties_the_line() {
        let mut t = transport(ScriptedPort {
            reads: VecDeque::from([
                Ok(vec![0xFF, 0xFF, 0x01, 0x04]),
                Ok(vec![0x00, 0xE8, 0x03, 0x0B]),
                Err(io::Error::new(io::ErrorKind::TimedOut, "idle")),
                Ok(vec![0xAA]),
            ]),
            ..Default::default()
        });
        assert_eq!(t.discard_input(Duration::from_millis(100)).unwrap(), 8);
        assert_eq!(t.read_exact(1, Duration::from_millis(20)).unwrap(), vec![0xAA]);
    }

    #[test]
    fn discard_input_on_quiet_line_is_a_no_op() {
        let mut t = transport(ScriptedPort::default());
        assert_eq!(t.discard_input(Duration::from_millis(100)).unwrap(), 0);
    }

    #[test]
    fn discard_input_surfaces_read_errors() {
        let mut t = transport(ScriptedPort {
            reads: VecDeque::from([Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))]),
            ..Default::default()
        });
        assert!(matches!(
            t.discard_input(Duration::from_millis(100)),
            Err(TransportError::Read(_))
        ));
    }

    #[test]
    fn close_is_idempotent_and_swallows_errors() {
        let flushes = Rc::new(Cell::new(0));
        let mut t = transport(ScriptedPort {
            flush_fails: true,
            flushes: flushes.clone(),
            ..Default::default()
        });
        t.close();
        t.close();
        assert!(!t.is_open());
        assert_eq!(flushes.get(), 1);
        drop(t);
        assert_eq!(flushes.get(), 1);
    }

    #[test]
    fn closed_transport_refuses_io() {
        let mut t = transport(ScriptedPort::default());
        t.close();
        assert!(matches!(t.write_all(&[1]), Err(TransportError::Closed)));
        assert!(matches!(
            t.discard_input(Duration::from_millis(1)),
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            t.read_exact(1, Duration::from_millis(1)),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn opening_missing_device_fails() {
        let err = SerialTransport::open("/dev/does-not-exist-st3215", 1_000_000)
            .err()
            .expect("open should fail");
        assert!(matches!(err, TransportError::Open { .. }));
        assert!(err.to_string().contains("/dev/does-not-exist-st3215"));
    }
}
