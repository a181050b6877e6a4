//! Timed digital outputs.
//!
//! Each channel owns one output pin and is either idle (LOW) or held HIGH
//! until a deadline. Nothing here blocks: [`TimedOutputs::tick`] compares the
//! elapsed time of every held channel against its hold time once per loop
//! iteration and drops the expired ones back to LOW.
//!
//! Times are `u32` milliseconds from a free-running monotonic counter.
//! Elapsed time is computed with wrapping subtraction, so a hold that spans
//! the counter rollover still expires on time.

use embedded_hal::digital::OutputPin;
use heapless::Vec;

/// Per-channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Output LOW, no timer running
    Idle,
    /// Output HIGH until `since_ms + hold_ms`
    TimedHigh { since_ms: u32, hold_ms: u32 },
}

/// Errors from driving the timed outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError<E> {
    /// Channel index outside the configured list
    NoSuchChannel(usize),
    /// Activation requested with a zero hold time
    ZeroHold,
    /// The underlying pin write failed
    Pin(E),
}

/// One controllable output line.
pub struct Channel<P> {
    pin: u8,
    output: P,
    state: ChannelState,
}

impl<P> Channel<P> {
    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    fn remaining_ms(&self, now_ms: u32) -> Option<u32> {
        match self.state {
            ChannelState::Idle => None,
            ChannelState::TimedHigh { since_ms, hold_ms } => {
                Some(hold_ms.saturating_sub(now_ms.wrapping_sub(since_ms)))
            }
        }
    }
}

/// Fixed set of timed output channels, indexed by position.
///
/// Pin numbers are kept in a separate array so the command parser can scan
/// them without borrowing the outputs.
pub struct TimedOutputs<P, const N: usize> {
    pins: [u8; N],
    channels: [Channel<P>; N],
}

impl<P: OutputPin, const N: usize> TimedOutputs<P, N> {
    /// Take ownership of the outputs and drive every one of them LOW.
    pub fn new(outputs: [(u8, P); N]) -> Result<Self, OutputError<P::Error>> {
        let mut pins = [0u8; N];
        for (slot, (pin, _)) in pins.iter_mut().zip(outputs.iter()) {
            *slot = *pin;
        }

        let mut channels = outputs.map(|(pin, output)| Channel {
            pin,
            output,
            state: ChannelState::Idle,
        });
        for channel in channels.iter_mut() {
            channel.output.set_low().map_err(OutputError::Pin)?;
        }

        Ok(Self { pins, channels })
    }

    /// Configured pin numbers, in channel order.
    pub fn pins(&self) -> &[u8] {
        &self.pins
    }

    pub fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    /// Channel index of a pin number (linear scan).
    pub fn index_of(&self, pin: u8) -> Option<usize> {
        self.pins.iter().position(|&p| p == pin)
    }

    pub fn channel(&self, index: usize) -> Option<&Channel<P>> {
        self.channels.get(index)
    }

    pub fn state(&self, index: usize) -> Option<ChannelState> {
        self.channels.get(index).map(Channel::state)
    }

    pub fn is_active(&self, index: usize) -> bool {
        matches!(self.state(index), Some(ChannelState::TimedHigh { .. }))
    }

    /// Milliseconds left before the channel expires, `None` when idle.
    pub fn remaining_ms(&self, index: usize, now_ms: u32) -> Option<u32> {
        self.channels.get(index).and_then(|c| c.remaining_ms(now_ms))
    }

    /// Pin numbers currently held HIGH.
    pub fn active_pins(&self) -> Vec<u8, N> {
        self.channels
            .iter()
            .filter(|c| matches!(c.state, ChannelState::TimedHigh { .. }))
            .map(|c| c.pin)
            .collect()
    }

    /// Drive a channel HIGH for `hold_ms` starting at `now_ms`.
    ///
    /// A channel that is already held restarts with the new hold time; the
    /// previous deadline is discarded. State only changes once the pin write
    /// has succeeded.
    pub fn activate(
        &mut self,
        index: usize,
        hold_ms: u32,
        now_ms: u32,
    ) -> Result<(), OutputError<P::Error>> {
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(OutputError::NoSuchChannel(index))?;
        if hold_ms == 0 {
            return Err(OutputError::ZeroHold);
        }

        channel.output.set_high().map_err(OutputError::Pin)?;

        if let ChannelState::TimedHigh { .. } = channel.state {
            log::debug!("Pin {} timer restarted", channel.pin);
        }
        channel.state = ChannelState::TimedHigh {
            since_ms: now_ms,
            hold_ms,
        };
        Ok(())
    }

    /// Expire every held channel whose hold time has elapsed.
    ///
    /// Returns the pin numbers that went LOW on this tick. Idle channels are
    /// not touched. A channel whose LOW write fails stays held and is retried
    /// on the next tick.
    pub fn tick(&mut self, now_ms: u32) -> Vec<u8, N> {
        let mut expired = Vec::new();

        for channel in self.channels.iter_mut() {
            let ChannelState::TimedHigh { since_ms, hold_ms } = channel.state else {
                continue;
            };
            if now_ms.wrapping_sub(since_ms) < hold_ms {
                continue;
            }

            match channel.output.set_low() {
                Ok(()) => {
                    channel.state = ChannelState::Idle;
                    // Capacity is N, one entry per channel at most
                    let _ = expired.push(channel.pin);
                }
                Err(e) => log::warn!("Pin {} LOW failed, retrying: {:?}", channel.pin, e),
            }
        }

        expired
    }
}
