//! Recorded joint ranges.
//!
//! The monitor feeds every good reading into a [`RangeTracker`] while the arm
//! is moved by hand, then writes [`RangeTracker::snapshot`] to disk.  A saved
//! file is read back later so deg/rad output can count from each joint's
//! midpoint.
//!
//! File format:
//!
//! ```json
//! { "servos": [ { "id": 1, "min": 1021, "max": 3070 } ] }
//! ```

use crate::packet::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("{} is not a calibration file: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot encode calibration: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Smallest and largest raw tick seen for each servo, keyed by id.
///
/// Only successful reads go in, so a failed cycle never widens or resets a range.
#[derive(Debug, Clone, Default)]
pub struct RangeTracker {
    seen: BTreeMap<u8, ServoRange>,
}

impl RangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, id: u8, position: Position) {
        let raw = position.raw();
        self.seen
            .entry(id)
            .and_modify(|r| {
                r.min = r.min.min(raw);
                r.max = r.max.max(raw);
            })
            .or_insert(ServoRange {
                id,
                min: raw,
                max: raw,
            });
    }

    pub fn range(&self, id: u8) -> Option<(u16, u16)> {
        self.seen.get(&id).map(|r| (r.min, r.max))
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Ranges recorded so far, ordered by id.
    pub fn snapshot(&self) -> CalibrationData {
        CalibrationData {
            servos: self.seen.values().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoRange {
    pub id: u8,
    pub min: u16,
    pub max: u16,
}

impl ServoRange {
    pub fn center(&self) -> f32 {
        (f32::from(self.min) + f32::from(self.max)) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationData {
    pub servos: Vec<ServoRange>,
}

impl CalibrationData {
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let text = std::fs::read_to_string(path).map_err(|source| CalibrationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CalibrationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let json = serde_json::to_string_pretty(self).map_err(CalibrationError::Encode)?;
        std::fs::write(path, json).map_err(|source| CalibrationError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Midpoint of servo `id`, if it was recorded.
    pub fn center(&self, id: u8) -> Option<f32> {
        self.servos
            .iter()
            .find(|s| s.id == id)
            .map(ServoRange::center)
    }
}
