//! Command-line interface definitions.

use clap::{Parser, Subcommand};

use pulsepin::defaults::SERIAL_BAUD;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "pulsepin-ctl")]
#[command(about = "Send timed-output commands to a PulsePin board")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyUSB0); auto-detected when omitted
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = SERIAL_BAUD)]
    pub baud: u32,

    /// After sending, echo device output for this many milliseconds
    #[arg(short, long, value_name = "MS", default_value = "0")]
    pub listen: u64,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// List serial ports and show which one would be auto-detected
    Ports,

    /// Send a raw command line (e.g., h6, h2dim, status)
    Send {
        #[arg(value_name = "LINE")]
        line: String,
    },

    /// Send the command mapped to a named action (e.g., fan_low)
    Action {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List named actions and their commands
    Actions,
}
