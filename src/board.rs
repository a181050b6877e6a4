/// Hardware abstraction for supported boards.
///
/// Each board module defines pin assignments and capabilities
/// selected at compile time via feature flags. Output pins are listed in
/// the order they are set up, and double as the channel numbers used by
/// `h<digit>` commands, so they must be single-digit GPIOs.

#[cfg(feature = "board-xiao")]
mod hw {
    pub const OUTPUT_PINS: [u8; 5] = [6, 5, 4, 3, 2]; // D5..D1
    pub const UART_RX_PIN: u8 = 44; // D7
    pub const UART_TX_PIN: u8 = 43; // D6
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(all(feature = "board-devkit", not(feature = "board-xiao")))]
mod hw {
    // GPIO 6..11 are wired to the SPI flash on the WROOM module.
    pub const OUTPUT_PINS: [u8; 3] = [5, 4, 2];
    pub const UART_RX_PIN: u8 = 3; // USB bridge
    pub const UART_TX_PIN: u8 = 1;
    pub const BOARD_NAME: &str = "esp32_devkitc";
}

#[cfg(not(any(feature = "board-xiao", feature = "board-devkit")))]
mod hw {
    pub const OUTPUT_PINS: [u8; 5] = [6, 5, 4, 3, 2];
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;

/// Number of timed output channels on this board.
pub const NUM_OUTPUTS: usize = OUTPUT_PINS.len();
