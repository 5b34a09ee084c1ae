//! The polling loop: one sweep over every servo per cycle until cancelled.

use log::{debug, info, warn};
use st3215_link::{CalibrationData, CalibrationError, Position, RangeTracker, ServoError, ServoLink};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

/// Shared stop request, set by the q key or a SIGINT.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Anything that can answer a position read for a servo id.
pub trait PositionSource {
    fn read_position(&mut self, id: u8) -> Result<Position, ServoError>;
}

impl<P: Read + Write> PositionSource for ServoLink<P> {
    fn read_position(&mut self, id: u8) -> Result<Position, ServoError> {
        ServoLink::read_position(self, id)
    }
}

/// Latest known state of one servo.
#[derive(Debug, Clone, PartialEq)]
pub struct ServoState {
    pub id: u8,
    /// Last good reading; kept when a later cycle fails.
    pub position: Option<Position>,
    /// Message and phase of the last failed read, cleared by the next success.
    pub error: Option<String>,
}

pub struct Session<S> {
    source: S,
    servos: Vec<ServoState>,
    tracker: RangeTracker,
    cycles: u64,
}

impl<S: PositionSource> Session<S> {
    pub fn new(source: S, ids: &[u8]) -> Self {
        Self {
            source,
            servos: ids
                .iter()
                .map(|&id| ServoState {
                    id,
                    position: None,
                    error: None,
                })
                .collect(),
            tracker: RangeTracker::new(),
            cycles: 0,
        }
    }

    /// Reads every servo once, in id order of the configuration.
    pub fn poll_cycle(&mut self) {
        for servo in &mut self.servos {
            match self.source.read_position(servo.id) {
                Ok(position) => {
                    servo.position = Some(position);
                    servo.error = None;
                    self.tracker.observe(servo.id, position);
                }
                Err(e) => {
                    debug!("{e}");
                    servo.error = Some(format!("{} ({})", e.source, e.phase));
                }
            }
        }
        self.cycles += 1;
    }

    pub fn servos(&self) -> &[ServoState] {
        &self.servos
    }

    pub fn tracker(&self) -> &RangeTracker {
        &self.tracker
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn snapshot(&self) -> CalibrationData {
        self.tracker.snapshot()
    }

    pub fn save(&self, path: &Path) -> Result<CalibrationData, CalibrationError> {
        let data = self.snapshot();
        data.save(path)?;
        Ok(data)
    }
}

/// Polls until `cancel` is set, rendering after every cycle and saving on request.
///
/// Each message on `save_requests` writes the current ranges to `output`.
/// A failed save is logged and polling goes on.
pub fn run<S: PositionSource>(
    session: &mut Session<S>,
    cancel: &CancelToken,
    period: Duration,
    save_requests: &Receiver<()>,
    output: &Path,
    mut render: impl FnMut(&Session<S>, Option<&str>),
) {
    let mut notice: Option<String> = None;
    while !cancel.is_cancelled() {
        let started = Instant::now();
        session.poll_cycle();

        while save_requests.try_recv().is_ok() {
            notice = Some(match session.save(output) {
                Ok(data) => {
                    info!("saved {} servo ranges to {}", data.servos.len(), output.display());
                    format!("Saved {} servos to {}", data.servos.len(), output.display())
                }
                Err(e) => {
                    warn!("cannot save {}: {e}", output.display());
                    format!("Save failed: {e}")
                }
            });
        }

        render(session, notice.as_deref());
        sleep_unless_cancelled(period.saturating_sub(started.elapsed()), cancel);
    }
    debug!("polling stopped after {} cycles", session.cycles());
}

fn sleep_unless_cancelled(duration: Duration, cancel: &CancelToken) {
    const STEP: Duration = Duration::from_millis(10);
    let deadline = Instant::now() + duration;
    while !cancel.is_cancelled() {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        thread::sleep(left.min(STEP));
    }
}
