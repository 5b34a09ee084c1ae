//! Serial adapter discovery and interactive selection.

use anyhow::{Context, bail};
use std::io::{BufRead, Write};

/// USB serial adapters the servo driver boards show up as.
pub fn is_servo_adapter(name: &str) -> bool {
    name.contains("ttyUSB") || name.contains("ttyACM")
}

/// Candidate adapters, sorted by name.
pub fn find_serial_ports() -> anyhow::Result<Vec<String>> {
    let ports = serialport::available_ports().context("cannot enumerate serial ports")?;
    Ok(filter_ports(ports.into_iter().map(|p| p.port_name)))
}

pub fn filter_ports(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut ports: Vec<String> = names.into_iter().filter(|n| is_servo_adapter(n)).collect();
    ports.sort();
    ports.dedup();
    ports
}

/// Lists `ports` and asks until a valid number is entered.
pub fn select_port<R: BufRead, W: Write>(
    ports: &[String],
    mut input: R,
    mut out: W,
) -> anyhow::Result<String> {
    if ports.is_empty() {
        bail!("no serial ports found");
    }

    writeln!(out, "Available serial ports:")?;
    for (i, port) in ports.iter().enumerate() {
        writeln!(out, "{}: {port}", i + 1)?;
    }

    let mut line = String::new();
    loop {
        write!(out, "Select port (1-{}): ", ports.len())?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            bail!("no port selected");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=ports.len()).contains(&n) => return Ok(ports[n - 1].clone()),
            _ => continue,
        }
    }
}
