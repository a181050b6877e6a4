//! Serial port discovery.
//!
//! A port is picked by USB VID/PID first, then by a description keyword,
//! so a board on a common USB-UART bridge is found without `--port`.

use anyhow::{Context, Result};
use serialport::{SerialPortInfo, SerialPortType};

use pulsepin::defaults::{KNOWN_USB_IDS, PORT_DESCRIPTION_KEYWORDS};

/// The parts of a serial port listing that detection looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub name: String,
    pub usb_id: Option<(u16, u16)>,
    pub description: String,
}

impl From<SerialPortInfo> for PortCandidate {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let description = [usb.manufacturer.as_deref(), usb.product.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                Self {
                    name: info.port_name,
                    usb_id: Some((usb.vid, usb.pid)),
                    description,
                }
            }
            other => Self {
                name: info.port_name,
                usb_id: None,
                description: format!("{:?}", other),
            },
        }
    }
}

/// How a port was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// USB VID/PID listed in the known table
    UsbId(&'static str),
    /// Description contains a known keyword
    Description(&'static str),
}

/// Pick the first port matching a known VID/PID, else the first whose
/// description contains a known keyword. Candidates are sorted by name.
pub fn select_port(candidates: &[PortCandidate]) -> Option<(&PortCandidate, Detection)> {
    let mut sorted: Vec<&PortCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    for &candidate in &sorted {
        if let Some((vid, pid)) = candidate.usb_id {
            if let Some(&(_, _, label)) = KNOWN_USB_IDS
                .iter()
                .find(|&&(v, p, _)| v == vid && p == pid)
            {
                return Some((candidate, Detection::UsbId(label)));
            }
        }
    }

    for &candidate in &sorted {
        let desc = candidate.description.to_lowercase();
        if let Some(&keyword) = PORT_DESCRIPTION_KEYWORDS.iter().find(|&&k| desc.contains(k)) {
            return Some((candidate, Detection::Description(keyword)));
        }
    }

    None
}

/// Enumerate serial ports on this host.
pub fn available_ports() -> Result<Vec<PortCandidate>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(ports.into_iter().map(PortCandidate::from).collect())
}
