//! Command parser for received serial lines.
//!
//! Recognized shapes, tried in this order:
//! 1. `status` — report channel state,
//! 2. a keyword from [`SPECIAL_COMMANDS`] — fixed pin, its own hold time,
//! 3. `h<digit>` — the pin whose number equals the digit, default hold time.
//!
//! Special keywords must be matched before the generic form; `h2dim` would
//! otherwise be rejected as a malformed `h<digit>` line.

use crate::defaults::{SpecialCommand, DEFAULT_HOLD_MS, SPECIAL_COMMANDS, STATUS_KEYWORD};

/// Runtime command configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandConfig {
    /// Hold time for the generic `h<digit>` form, in milliseconds
    pub default_hold_ms: u32,
    /// Keywords checked before the generic form
    pub specials: &'static [SpecialCommand],
}

impl CommandConfig {
    pub const fn new() -> Self {
        Self {
            default_hold_ms: DEFAULT_HOLD_MS,
            specials: SPECIAL_COMMANDS,
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A successfully parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drive channel `index` (pin `pin`) HIGH for `hold_ms`
    Activate {
        index: usize,
        pin: u8,
        hold_ms: u32,
        /// Special keyword that selected this activation, if any
        keyword: Option<&'static str>,
    },
    /// Report channel state
    Status,
}

/// Why a line produced no command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Line matches no known shape
    Malformed,
    /// `h<c>` where no configured pin matches `c` (raw byte kept for the report)
    InvalidPin(u8),
    /// Special keyword whose fixed pin is missing from the configured list
    PinNotConfigured(u8),
}

/// Parse a trimmed line against the configured pin list.
pub fn parse_command(
    line: &[u8],
    pins: &[u8],
    config: &CommandConfig,
) -> Result<Command, CommandError> {
    if line == STATUS_KEYWORD.as_bytes() {
        return Ok(Command::Status);
    }

    if let Some(special) = config
        .specials
        .iter()
        .find(|s| s.keyword.as_bytes() == line)
    {
        let index = pins
            .iter()
            .position(|&p| p == special.pin)
            .ok_or(CommandError::PinNotConfigured(special.pin))?;
        return Ok(Command::Activate {
            index,
            pin: special.pin,
            hold_ms: special.hold_ms,
            keyword: Some(special.keyword),
        });
    }

    match line {
        &[b'h', digit] => {
            // Only single-digit pins are addressable this way
            let index = pins
                .iter()
                .position(|&p| p < 10 && b'0' + p == digit)
                .ok_or(CommandError::InvalidPin(digit))?;
            Ok(Command::Activate {
                index,
                pin: pins[index],
                hold_ms: config.default_hold_ms,
                keyword: None,
            })
        }
        _ => Err(CommandError::Malformed),
    }
}
