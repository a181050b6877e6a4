//! Command implementations.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serialport::SerialPort;

use pulsepin::comm::{MAX_LINE_LEN, TERMINATOR};
use pulsepin::defaults::{action_command, ACTIONS};

use crate::port::{self, Detection};

const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Check a command line and append the terminator.
pub fn frame_line(line: &str) -> Result<Vec<u8>> {
    let line = line.trim();
    if line.is_empty() {
        bail!("Command line is empty");
    }
    if !line.is_ascii() {
        bail!("Command line must be ASCII: {:?}", line);
    }
    if line.len() > MAX_LINE_LEN {
        bail!(
            "Command line is {} bytes; the device drops lines over {}",
            line.len(),
            MAX_LINE_LEN
        );
    }

    let mut framed = Vec::with_capacity(line.len() + 1);
    framed.extend_from_slice(line.as_bytes());
    framed.push(TERMINATOR);
    Ok(framed)
}

/// Resolve the action table entry for `name`.
pub fn resolve_action(name: &str) -> Result<&'static str> {
    match action_command(name) {
        Some(cmd) => Ok(cmd),
        None => {
            let known: Vec<&str> = ACTIONS.iter().map(|(name, _)| *name).collect();
            bail!("Unknown action '{}'; known actions: {}", name, known.join(", "))
        }
    }
}

/// List serial ports, marking the auto-detected one.
pub fn ports() -> Result<()> {
    let candidates = port::available_ports()?;
    if candidates.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    let detected = port::select_port(&candidates).map(|(p, how)| (p.name.clone(), how));
    for candidate in &candidates {
        let marker = match &detected {
            Some((name, _)) if *name == candidate.name => "*",
            _ => " ",
        };
        match candidate.usb_id {
            Some((vid, pid)) => println!(
                "{} {}  {:04X}:{:04X}  {}",
                marker, candidate.name, vid, pid, candidate.description
            ),
            None => println!("{} {}  {}", marker, candidate.name, candidate.description),
        }
    }

    match detected {
        Some((name, Detection::UsbId(label))) => println!("\nAuto-detected {} ({})", name, label),
        Some((name, Detection::Description(keyword))) => {
            println!("\nAuto-detected {} (description matches '{}')", name, keyword)
        }
        None => println!("\nNo board detected automatically; pass --port."),
    }
    Ok(())
}

/// List the named actions.
pub fn actions() {
    for (name, cmd) in ACTIONS {
        println!("{:<12} {}", name, cmd);
    }
}

/// Open the port given on the command line, or the auto-detected one.
pub fn open_port(port: Option<&str>, baud: u32) -> Result<Box<dyn SerialPort>> {
    let name = match port {
        Some(name) => name.to_string(),
        None => {
            let candidates = port::available_ports()?;
            match port::select_port(&candidates) {
                Some((candidate, _)) => candidate.name.clone(),
                None => bail!("No board detected automatically; pass --port"),
            }
        }
    };

    println!("Connecting to {} at {} baud...", name, baud);
    serialport::new(&name, baud)
        .timeout(READ_TIMEOUT)
        // Toggling DTR resets boards with auto-reset circuits
        .dtr_on_open(false)
        .open()
        .with_context(|| format!("Failed to open {}", name))
}

/// Send one command line, then optionally echo replies.
pub fn send(port: &mut dyn SerialPort, line: &str, listen_ms: u64) -> Result<()> {
    let framed = frame_line(line)?;
    port.write_all(&framed).context("Serial write failed")?;
    port.flush().context("Serial flush failed")?;
    println!("Sent command '{}'", line.trim());

    if listen_ms > 0 {
        listen(port, Duration::from_millis(listen_ms))?;
    }
    Ok(())
}

/// Copy device output to stdout until `window` elapses.
fn listen(port: &mut dyn SerialPort, window: Duration) -> Result<()> {
    let deadline = Instant::now() + window;
    let mut buf = [0u8; 256];
    let stdout = io::stdout();
    let mut out = stdout.lock();

    while Instant::now() < deadline {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                out.write_all(&buf[..n])?;
                out.flush()?;
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e).context("Serial read failed"),
        }
    }
    Ok(())
}
