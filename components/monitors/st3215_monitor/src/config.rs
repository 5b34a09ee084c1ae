//! Monitor settings: an optional RON file, then command-line overrides.

use anyhow::{Context, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use st3215_link::Units;
use st3215_link::{DEFAULT_BAUD, LinkTiming};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "st3215-monitor",
    version,
    about = "Live position monitor and range calibration for ST3215 servo arms"
)]
pub struct Cli {
    /// Serial device, e.g. /dev/ttyUSB0.  Prompted for when omitted.
    pub device: Option<String>,

    /// RON settings file (see monitorconfig.ron).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Comma separated servo ids, e.g. 1,2,3,4,5,6.
    #[arg(long, value_delimiter = ',')]
    pub ids: Option<Vec<u8>>,

    /// Delay between two polling cycles, in milliseconds.
    #[arg(long)]
    pub period_ms: Option<u64>,

    /// Where Enter saves the recorded ranges.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// raw, deg or rad.
    #[arg(long)]
    pub units: Option<Units>,

    /// Existing calibration whose centers are used for deg/rad display.
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// Send log output to this file instead of the terminal.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub device: Option<String>,
    pub baudrate: u32,
    pub ids: Vec<u8>,
    pub period_ms: u64,
    pub output: PathBuf,
    pub units: Units,
    pub calibration: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub timing: LinkTiming,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device: None,
            baudrate: DEFAULT_BAUD,
            ids: (1..=6).collect(),
            period_ms: 100,
            output: PathBuf::from("calibration.json"),
            units: Units::Raw,
            calibration: None,
            log_file: None,
            timing: LinkTiming::default(),
        }
    }
}

/// Highest id a unit can be given on the bus.
const MAX_SERVO_ID: u8 = 253;

impl MonitorConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("bad config {}", path.display()))
    }

    /// File settings (or defaults) with every flag given on the command line applied on top.
    pub fn resolve(cli: Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if cli.device.is_some() {
            config.device = cli.device;
        }
        if let Some(baud) = cli.baud {
            config.baudrate = baud;
        }
        if let Some(ids) = cli.ids {
            config.ids = ids;
        }
        if let Some(period_ms) = cli.period_ms {
            config.period_ms = period_ms;
        }
        if let Some(output) = cli.output {
            config.output = output;
        }
        if let Some(units) = cli.units {
            config.units = units;
        }
        if cli.calibration.is_some() {
            config.calibration = cli.calibration;
        }
        if cli.log_file.is_some() {
            config.log_file = cli.log_file;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.baudrate == 0 {
            bail!("baud rate must be positive");
        }
        if self.ids.is_empty() {
            bail!("at least one servo id is required");
        }
        if let Some(id) = self.ids.iter().find(|&&id| id == 0 || id > MAX_SERVO_ID) {
            bail!("servo id {id} is outside 1..={MAX_SERVO_ID}");
        }
        let mut seen = self.ids.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.ids.len() {
            bail!("servo ids must be unique");
        }
        let timing = &self.timing;
        if timing.poll_interval.is_zero() {
            bail!("timing.poll_interval_ms must be at least 1");
        }
        if timing.header_timeout.is_zero() || timing.payload_timeout.is_zero() {
            bail!("timing header and payload timeouts must be at least 1 ms");
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}
