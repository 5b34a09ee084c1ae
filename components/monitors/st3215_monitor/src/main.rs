//! Live position monitor for an ST3215 servo arm.
//!
//! ```sh
//! cargo run -p st3215-monitor -- /dev/ttyUSB0
//! cargo run -p st3215-monitor -- --config monitorconfig.ron --units deg
//! ```
//!
//! Every cycle reads each configured servo once, keeps the min and max seen
//! so far, and redraws the table.  Move every joint through its full range
//! and press Enter to save the ranges; q or Ctrl+C exits.

mod config;
mod display;
mod input;
mod ports;
mod session;

use anyhow::Context;
use clap::Parser;
use config::{Cli, MonitorConfig};
use display::View;
use log::{LevelFilter, debug, error, warn};
use session::{CancelToken, Session};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};
use st3215_link::{CalibrationData, ServoLink, TransportError};
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::mpsc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(open) = e.downcast_ref::<TransportError>() {
                print_setup_help(open);
            } else {
                eprintln!("ERROR: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let config = MonitorConfig::resolve(Cli::parse())?;
    init_logging(config.log_file.as_deref())?;
    debug!("{config:?}");

    let device = match &config.device {
        Some(device) => device.clone(),
        None => {
            let ports = ports::find_serial_ports()?;
            ports::select_port(&ports, io::stdin().lock(), io::stdout())?
        }
    };
    println!("Using serial port: {device}");

    let calibration = match &config.calibration {
        Some(path) => Some(
            CalibrationData::load(path)
                .with_context(|| format!("cannot load calibration {}", path.display()))?,
        ),
        None => None,
    };

    let link = ServoLink::open(&device, config.baudrate)?.with_timing(config.timing);

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || on_signal.cancel()).context("cannot install Ctrl+C handler")?;

    let (save_tx, save_rx) = mpsc::channel();
    let output = config.output.display().to_string();
    let view = View {
        units: config.units,
        calibration: calibration.as_ref(),
        output: &output,
    };
    let mut session = Session::new(link, &config.ids);

    let mut terminal = ratatui::try_init().context("cannot start the terminal UI")?;
    // Terminal log lines would tear through the table.
    let log_level = log::max_level();
    if config.log_file.is_none() {
        log::set_max_level(LevelFilter::Off);
    }
    let keys = input::spawn_key_reader(cancel.clone(), save_tx);

    session::run(
        &mut session,
        &cancel,
        config.period(),
        &save_rx,
        &config.output,
        |s, notice| {
            if let Err(e) = terminal.draw(|f| view.render(f, s.servos(), s.tracker(), notice)) {
                warn!("cannot draw: {e}");
            }
        },
    );

    ratatui::restore();
    log::set_max_level(log_level);
    cancel.cancel();
    if keys.join().is_err() {
        warn!("key reader panicked");
    }
    println!(
        "Stopped after {} cycles.  Last ranges: {}",
        session.cycles(),
        summarize(&session.snapshot())
    );
    Ok(())
}

fn summarize(data: &CalibrationData) -> String {
    if data.servos.is_empty() {
        return "none".to_string();
    }
    data.servos
        .iter()
        .map(|s| format!("{}:{}-{}", s.id, s.min, s.max))
        .collect::<Vec<_>>()
        .join(" ")
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            WriteLogger::init(LevelFilter::Debug, Config::default(), file)?;
        }
        None => {
            TermLogger::init(
                LevelFilter::Warn,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            )?;
        }
    }
    Ok(())
}

fn print_setup_help(e: &TransportError) {
    error!("{e}");
    eprintln!("ERROR: {e}\n");
    eprintln!("Check: USB adapter plugged in? Device path correct?");
    eprintln!("       Permission? Try: sudo usermod -aG dialout $USER");
}
