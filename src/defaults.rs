//! Compiled-in command tables and timing defaults.
//!
//! The hold durations, the special keyword table, and the named actions used
//! by the host tool all live here so firmware and host agree on one source.

/// Hold time for the generic `h<digit>` command, in milliseconds.
pub const DEFAULT_HOLD_MS: u32 = 1700;

/// Hold time for the `h2dim` keyword, in milliseconds.
pub const DIM_HOLD_MS: u32 = 4000;

/// Serial baud rate shared by firmware and host.
pub const SERIAL_BAUD: u32 = 9600;

/// Keyword that requests a JSON status line instead of driving a pin.
pub const STATUS_KEYWORD: &str = "status";

/// A keyword that drives one fixed pin for its own hold time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialCommand {
    /// Exact line that selects this command
    pub keyword: &'static str,
    /// Pin number driven HIGH
    pub pin: u8,
    /// Hold time in milliseconds (non-zero)
    pub hold_ms: u32,
}

/// Special keywords, checked before the generic `h<digit>` form.
///
/// `h2dim` starts with `h2`; matching it first keeps the generic parser from
/// ever seeing it.
pub static SPECIAL_COMMANDS: &[SpecialCommand] = &[SpecialCommand {
    keyword: "h2dim",
    pin: 2,
    hold_ms: DIM_HOLD_MS,
}];

/// Named actions understood by the host tool, mapped to device commands.
///
/// Pin 2 drives the light relay; pins 3..6 pulse the fan remote buttons.
pub static ACTIONS: &[(&str, &str)] = &[
    ("light_on", "h2"),
    ("light_dim", "h2dim"),
    ("fan_high", "h3"),
    ("fan_medium", "h5"),
    ("fan_low", "h6"),
    ("fan_off", "h4"),
];

/// Look up the device command for a named action.
pub fn action_command(name: &str) -> Option<&'static str> {
    ACTIONS
        .iter()
        .find(|(action, _)| *action == name)
        .map(|&(_, cmd)| cmd)
}

/// USB VID/PID pairs of serial bridges the host tool auto-detects.
pub static KNOWN_USB_IDS: &[(u16, u16, &str)] = &[
    (0x303A, 0x1001, "Espressif USB JTAG/serial"),
    (0x10C4, 0xEA60, "CP210x UART bridge"),
    (0x1A86, 0x7523, "CH340 UART bridge"),
    (0x1A86, 0x55D4, "CH9102 UART bridge"),
    (0x2341, 0x0043, "Arduino Uno R3"),
    (0x2341, 0x0001, "Arduino Uno"),
    (0x2A03, 0x0043, "Arduino Uno R3 clone"),
    (0x239A, 0x800B, "Adafruit Feather M0"),
];

/// Lowercase description fragments used when no VID/PID matches.
pub static PORT_DESCRIPTION_KEYWORDS: &[&str] = &["arduino", "ch340", "cp210x", "usb serial"];
