//! PulsePin library — serial-commanded timed digital outputs.
//!
//! A board listens on a serial line for short ASCII commands such as `h6`
//! or `h2dim` and drives the matching output pin HIGH for a fixed hold
//! time, reverting it LOW once the time has elapsed. Everything here is
//! platform independent and testable on any host with
//! `cargo test --no-default-features`; the firmware binary is a thin
//! consumer that supplies the UART, the GPIO outputs, and the clock.
//!
//! The control flow is a single cooperative polling loop:
//! - drain available input into the [`comm::LineReader`],
//! - parse a completed line with [`command::parse_command`] and apply it
//!   through [`comm::handle_command`],
//! - [`output::TimedOutputs::tick`] every channel, whether or not a line
//!   arrived.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod comm;
pub mod command;
pub mod defaults;
pub mod output;
pub mod protocol;
