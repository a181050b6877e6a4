/// Serial output protocol.
///
/// The device answers on the serial line with human-readable diagnostic
/// lines (CRLF terminated) for every received command, activation, expiry
/// and error. The one exception is the `status` command, which is answered
/// with a single newline-delimited JSON object.
use core::fmt;

use serde::Serialize;

use crate::command::{CommandConfig, CommandError};

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 192;

/// One diagnostic line written back to the serial host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic<'a> {
    /// Echo of a completed line
    Received(&'a [u8]),
    /// Channel driven HIGH
    Activating {
        pin: u8,
        hold_ms: u32,
        keyword: Option<&'a str>,
    },
    /// Channel dropped LOW after its hold time
    Expired { pin: u8 },
    /// `h<c>` with no configured pin `c`
    InvalidPin(u8),
    /// Special keyword whose pin is not configured
    PinNotConfigured(u8),
    /// Line matched no command shape
    Malformed,
    /// Line grew past the receive limit before its terminator
    Overflow,
    /// The pin write for an activation failed
    OutputFault { pin: u8 },
    /// Activation requested with a zero hold time
    ZeroHold { pin: u8 },
    /// Parsed channel index has no output behind it
    NoSuchChannel { pin: u8 },
}

impl From<CommandError> for Diagnostic<'static> {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Malformed => Diagnostic::Malformed,
            CommandError::InvalidPin(c) => Diagnostic::InvalidPin(c),
            CommandError::PinNotConfigured(pin) => Diagnostic::PinNotConfigured(pin),
        }
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Diagnostic::Received(line) => write!(f, "Received command: {}", line.escape_ascii()),
            Diagnostic::Activating {
                pin,
                hold_ms,
                keyword: None,
            } => write!(f, "Activating pin {} HIGH for {} ms.", pin, hold_ms),
            Diagnostic::Activating {
                pin,
                hold_ms,
                keyword: Some(keyword),
            } => write!(f, "Activating pin {} HIGH for {} ms ({}).", pin, hold_ms, keyword),
            Diagnostic::Expired { pin } => write!(f, "Pin {} LOW (timer expired).", pin),
            Diagnostic::InvalidPin(c) => write!(f, "Invalid pin specified: {}", c.escape_ascii()),
            Diagnostic::PinNotConfigured(pin) => {
                write!(f, "Error: Pin {} is not configured!", pin)
            }
            Diagnostic::Malformed => f.write_str(
                "Invalid command format. Use 'h' + pin number (e.g., h6) or 'h2dim'.",
            ),
            Diagnostic::Overflow => f.write_str("Input buffer overflow! Clearing."),
            Diagnostic::OutputFault { pin } => write!(f, "Error: Pin {} write failed.", pin),
            Diagnostic::ZeroHold { pin } => {
                write!(f, "Error: Pin {} hold time must be non-zero.", pin)
            }
            Diagnostic::NoSuchChannel { pin } => {
                write!(f, "Error: Pin {} has no output channel.", pin)
            }
        }
    }
}

/// Write the startup banner: configured pins and command usage.
pub fn write_banner<W: fmt::Write>(
    out: &mut W,
    board: &str,
    pins: &[u8],
    config: &CommandConfig,
) -> fmt::Result {
    write!(out, "Setting up pins: ")?;
    write_pin_list(out, pins, ", ")?;
    write!(out, " as OUTPUT, initially LOW.\r\n")?;

    write!(out, "PulsePin v{} ready on {}.\r\n", VERSION, board)?;
    write!(out, "Send 'h' followed by pin number (")?;
    write_pin_list(out, pins, " or ")?;
    write!(out, ") to turn it HIGH for {} ms.\r\n", config.default_hold_ms)?;
    for special in config.specials {
        write!(
            out,
            "Send '{}' to turn pin {} HIGH for {} ms.\r\n",
            special.keyword, special.pin, special.hold_ms
        )?;
    }
    write!(out, "Send 'status' for a JSON status line.\r\n")
}

fn write_pin_list<W: fmt::Write>(out: &mut W, pins: &[u8], last_sep: &str) -> fmt::Result {
    for (i, pin) in pins.iter().enumerate() {
        if i > 0 {
            let sep = if i + 1 == pins.len() { last_sep } else { ", " };
            out.write_str(sep)?;
        }
        write!(out, "{}", pin)?;
    }
    Ok(())
}

/// Messages sent from the device as JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// Device status report
    #[serde(rename = "status")]
    Status {
        /// Board identifier
        board: &'static str,
        /// Firmware version
        version: &'static str,
        /// Uptime in seconds
        uptime: u32,
        /// Configured output pins, in channel order
        pins: &'a [u8],
        /// Pins currently held HIGH
        active: &'a [u8],
    },
}
