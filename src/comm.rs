/// Communication layer — serial line receiver and command dispatch.
///
/// Bytes from the serial port are accumulated by [`LineReader`] until a
/// newline arrives. Completed lines are parsed and applied to the timed
/// outputs by [`Controller`], which also writes the diagnostic replies.

use core::fmt::{self, Write};

use embedded_hal::digital::OutputPin;

use crate::board;
use crate::command::{parse_command, Command, CommandConfig};
use crate::output::{OutputError, TimedOutputs};
use crate::protocol::{DeviceMessage, Diagnostic, MAX_MSG_LEN, VERSION};

/// Longest accepted line, excluding the newline terminator.
pub const MAX_LINE_LEN: usize = 20;

/// Line terminator
pub const TERMINATOR: u8 = b'\n';

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written including the trailing newline, or
/// None if the message and its newline do not fit.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(msg, buf).ok()?;
    // NDJSON: a line without its newline is not a message
    let newline = buf.get_mut(len)?;
    *newline = b'\n';
    Some(len + 1)
}

// ── Serial line reader ─────────────────────────────────────────────────

/// Outcome of feeding one byte to a [`LineReader`].
#[derive(Debug, PartialEq, Eq)]
pub enum Feed<'a> {
    /// Byte buffered, no line yet
    Pending,
    /// Terminator seen; the trimmed line
    Line(&'a [u8]),
    /// Line exceeded [`MAX_LINE_LEN`] and was discarded
    Overflow,
}

/// Serial line reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_LINE_LEN],
    pos: usize,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_LINE_LEN],
            pos: 0,
        }
    }

    /// Feed a byte into the reader.
    ///
    /// A `\r` before the newline is buffered like any other byte and removed
    /// by trimming. A byte that would make the line longer than
    /// [`MAX_LINE_LEN`] discards everything received so far.
    pub fn feed(&mut self, byte: u8) -> Feed<'_> {
        if byte == TERMINATOR {
            let len = self.pos;
            self.pos = 0;
            Feed::Line(trim_ascii_whitespace(&self.buf[..len]))
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            Feed::Pending
        } else {
            // Overflow — discard and reset
            self.pos = 0;
            Feed::Overflow
        }
    }

    /// Number of bytes buffered for the current line.
    pub fn pending(&self) -> usize {
        self.pos
    }

    pub fn clear(&mut self) {
        self.pos = 0;
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_ascii_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &data[start..end]
}

// ── Command dispatch ───────────────────────────────────────────────────

/// Write one diagnostic line (CRLF terminated).
pub fn emit<W: Write>(out: &mut W, diag: &Diagnostic<'_>) -> fmt::Result {
    write!(out, "{}\r\n", diag)
}

/// Apply a parsed command to the outputs and write the reply.
pub fn handle_command<P: OutputPin, const N: usize, W: Write>(
    cmd: Command,
    outputs: &mut TimedOutputs<P, N>,
    now_ms: u32,
    out: &mut W,
) -> fmt::Result {
    match cmd {
        Command::Activate {
            index,
            pin,
            hold_ms,
            keyword,
        } => match outputs.activate(index, hold_ms, now_ms) {
            Ok(()) => {
                log::info!("Pin {} HIGH for {} ms", pin, hold_ms);
                emit(
                    out,
                    &Diagnostic::Activating {
                        pin,
                        hold_ms,
                        keyword,
                    },
                )
            }
            Err(e) => {
                log::warn!("Activation of pin {} failed: {:?}", pin, e);
                let diag = match e {
                    OutputError::ZeroHold => Diagnostic::ZeroHold { pin },
                    OutputError::NoSuchChannel(_) => Diagnostic::NoSuchChannel { pin },
                    OutputError::Pin(_) => Diagnostic::OutputFault { pin },
                };
                emit(out, &diag)
            }
        },
        Command::Status => {
            let active = outputs.active_pins();
            let msg = DeviceMessage::Status {
                board: board::BOARD_NAME,
                version: VERSION,
                uptime: now_ms / 1000,
                pins: outputs.pins(),
                active: &active,
            };

            let mut buf = [0u8; MAX_MSG_LEN];
            match serialize_message(&msg, &mut buf) {
                Some(len) => match core::str::from_utf8(&buf[..len]) {
                    Ok(json) => out.write_str(json),
                    Err(_) => Ok(()),
                },
                None => {
                    log::warn!("Status message does not fit in {} bytes", MAX_MSG_LEN);
                    Ok(())
                }
            }
        }
    }
}

/// The polling-loop core: line receiver, parser, and timed outputs.
///
/// Call [`Controller::receive`] with whatever bytes the serial port has
/// available, then [`Controller::tick`] once per loop iteration.
pub struct Controller<P, const N: usize> {
    reader: LineReader,
    outputs: TimedOutputs<P, N>,
    config: CommandConfig,
}

impl<P: OutputPin, const N: usize> Controller<P, N> {
    pub fn new(outputs: TimedOutputs<P, N>, config: CommandConfig) -> Self {
        Self {
            reader: LineReader::new(),
            outputs,
            config,
        }
    }

    pub fn outputs(&self) -> &TimedOutputs<P, N> {
        &self.outputs
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Consume received bytes, handling every line completed among them.
    ///
    /// A failed reply write never stops processing: every byte is fed and
    /// every completed line applied. The first write error is returned once
    /// all bytes are consumed.
    pub fn receive<W: Write>(&mut self, bytes: &[u8], now_ms: u32, out: &mut W) -> fmt::Result {
        let mut result = Ok(());
        for &byte in bytes {
            let written = match self.reader.feed(byte) {
                Feed::Pending => Ok(()),
                Feed::Overflow => {
                    log::warn!("Input line longer than {} bytes dropped", MAX_LINE_LEN);
                    emit(out, &Diagnostic::Overflow)
                }
                Feed::Line(line) => {
                    let echoed = emit(out, &Diagnostic::Received(line));
                    let replied = match parse_command(line, self.outputs.pins(), &self.config) {
                        Ok(cmd) => handle_command(cmd, &mut self.outputs, now_ms, out),
                        Err(e) => {
                            log::debug!("Rejected line: {:?}", e);
                            emit(out, &Diagnostic::from(e))
                        }
                    };
                    echoed.and(replied)
                }
            };
            result = result.and(written);
        }
        result
    }

    /// Expire held channels and report the ones that went LOW.
    ///
    /// Channels expire even when their report cannot be written.
    pub fn tick<W: Write>(&mut self, now_ms: u32, out: &mut W) -> fmt::Result {
        let mut result = Ok(());
        for pin in self.outputs.tick(now_ms) {
            log::info!("Pin {} LOW", pin);
            result = result.and(emit(out, &Diagnostic::Expired { pin }));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{DEFAULT_HOLD_MS, DIM_HOLD_MS};
    use crate::output::tests::{fail_pin, outputs, MockPin};
    use crate::output::ChannelState;

    fn feed_all<'a>(reader: &'a mut LineReader, bytes: &[u8]) -> Option<Feed<'a>> {
        let (last, rest) = bytes.split_last()?;
        for &b in rest {
            assert_eq!(reader.feed(b), Feed::Pending);
        }
        Some(reader.feed(*last))
    }

    fn controller() -> Controller<MockPin, 5> {
        Controller::new(outputs(), CommandConfig::new())
    }

    /// Sink that rejects its first `fail_first` writes, then records.
    struct FailingSink {
        fail_first: usize,
        written: String,
    }

    impl FailingSink {
        fn new(fail_first: usize) -> Self {
            Self {
                fail_first,
                written: String::new(),
            }
        }
    }

    impl Write for FailingSink {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if self.fail_first > 0 {
                self.fail_first -= 1;
                return Err(fmt::Error);
            }
            self.written.push_str(s);
            Ok(())
        }
    }

    // ── LineReader ──────────────────────────────────────────────────

    #[test]
    fn line_completes_on_newline() {
        let mut reader = LineReader::new();
        assert_eq!(feed_all(&mut reader, b"h6\n"), Some(Feed::Line(b"h6")));
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn line_is_trimmed() {
        let mut reader = LineReader::new();
        assert_eq!(feed_all(&mut reader, b"  h2dim\r\n"), Some(Feed::Line(b"h2dim")));
    }

    #[test]
    fn blank_line_is_yielded_empty() {
        let mut reader = LineReader::new();
        assert_eq!(reader.feed(b'\n'), Feed::Line(b""));
        assert_eq!(feed_all(&mut reader, b" \r\n"), Some(Feed::Line(b"")));
    }

    #[test]
    fn max_length_line_is_accepted() {
        let mut reader = LineReader::new();
        let line = [b'a'; MAX_LINE_LEN];
        for &b in &line {
            assert_eq!(reader.feed(b), Feed::Pending);
        }
        assert_eq!(reader.feed(b'\n'), Feed::Line(&line[..]));
    }

    #[test]
    fn overflow_discards_buffer() {
        let mut reader = LineReader::new();
        for _ in 0..MAX_LINE_LEN {
            assert_eq!(reader.feed(b'x'), Feed::Pending);
        }
        assert_eq!(reader.feed(b'x'), Feed::Overflow);
        assert_eq!(reader.pending(), 0);

        // The tail of the long line arrives as a fresh, short line
        assert_eq!(feed_all(&mut reader, b"yz\n"), Some(Feed::Line(b"yz")));
    }

    #[test]
    fn trim_helper() {
        assert_eq!(trim_ascii_whitespace(b""), b"");
        assert_eq!(trim_ascii_whitespace(b" \t\r"), b"");
        assert_eq!(trim_ascii_whitespace(b" a b\r"), b"a b");
    }

    // ── Controller ──────────────────────────────────────────────────

    #[test]
    fn generic_command_activates_with_default_hold() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h6\n", 100, &mut out).unwrap();

        assert_eq!(
            out,
            "Received command: h6\r\nActivating pin 6 HIGH for 1700 ms.\r\n"
        );
        assert_eq!(
            ctl.outputs().state(0),
            Some(ChannelState::TimedHigh {
                since_ms: 100,
                hold_ms: DEFAULT_HOLD_MS
            })
        );
    }

    #[test]
    fn special_command_activates_with_alternate_hold() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h2dim\r\n", 0, &mut out).unwrap();

        assert!(out.ends_with("Activating pin 2 HIGH for 4000 ms (h2dim).\r\n"));
        assert_eq!(
            ctl.outputs().state(4),
            Some(ChannelState::TimedHigh {
                since_ms: 0,
                hold_ms: DIM_HOLD_MS
            })
        );
    }

    #[test]
    fn invalid_pin_changes_nothing() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h9\n", 0, &mut out).unwrap();

        assert_eq!(
            out,
            "Received command: h9\r\nInvalid pin specified: 9\r\n"
        );
        assert!(ctl.outputs().active_pins().is_empty());
    }

    #[test]
    fn malformed_line_is_reported() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"hello\n", 0, &mut out).unwrap();
        assert!(out.ends_with("Invalid command format. Use 'h' + pin number (e.g., h6) or 'h2dim'.\r\n"));
        assert!(ctl.outputs().active_pins().is_empty());
    }

    #[test]
    fn overflowed_line_produces_no_command() {
        let mut ctl = controller();
        let mut out = String::new();
        // 21 bytes before the newline
        ctl.receive(b"h6h6h6h6h6h6h6h6h6h6h\n", 0, &mut out).unwrap();

        assert_eq!(
            out,
            "Input buffer overflow! Clearing.\r\nReceived command: \r\nInvalid command format. Use 'h' + pin number (e.g., h6) or 'h2dim'.\r\n"
        );
        assert!(ctl.outputs().active_pins().is_empty());
    }

    #[test]
    fn partial_lines_across_receives() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h", 0, &mut out).unwrap();
        ctl.receive(b"5", 10, &mut out).unwrap();
        assert!(out.is_empty());
        ctl.receive(b"\nh4\n", 20, &mut out).unwrap();
        assert_eq!(ctl.outputs().active_pins().as_slice(), &[5, 4]);
    }

    #[test]
    fn tick_reports_expiry() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h3\n", 1000, &mut out).unwrap();
        out.clear();

        ctl.tick(2699, &mut out).unwrap();
        assert!(out.is_empty());
        ctl.tick(2700, &mut out).unwrap();
        assert_eq!(out, "Pin 3 LOW (timer expired).\r\n");

        out.clear();
        ctl.tick(10_000, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn reactivation_restarts_timer() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h2\n", 0, &mut out).unwrap();
        ctl.receive(b"h2dim\n", 1000, &mut out).unwrap();
        out.clear();

        ctl.tick(1700, &mut out).unwrap();
        assert!(out.is_empty());
        ctl.tick(5000, &mut out).unwrap();
        assert_eq!(out, "Pin 2 LOW (timer expired).\r\n");
    }

    #[test]
    fn status_reports_json() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h4\nstatus\n", 12_345, &mut out).unwrap();

        let json = out.lines().last().unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""uptime":12"#));
        assert!(json.contains(r#""pins":[6,5,4,3,2]"#));
        assert!(json.contains(r#""active":[4]"#));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn failed_reply_write_still_applies_every_line() {
        let mut ctl = controller();
        let mut sink = FailingSink::new(1);
        assert_eq!(ctl.receive(b"h6\nh5\n", 0, &mut sink), Err(fmt::Error));

        assert_eq!(ctl.outputs().active_pins().as_slice(), &[6, 5]);
        assert_eq!(ctl.reader.pending(), 0);
        assert!(sink
            .written
            .ends_with("Received command: h5\r\nActivating pin 5 HIGH for 1700 ms.\r\n"));
    }

    #[test]
    fn failed_reply_write_keeps_partial_line_intact() {
        let mut ctl = controller();
        let mut sink = FailingSink::new(1);
        assert!(ctl.receive(b"hello\nh", 0, &mut sink).is_err());
        assert_eq!(ctl.reader.pending(), 1);

        let mut out = String::new();
        ctl.receive(b"3\n", 10, &mut out).unwrap();
        assert_eq!(
            out,
            "Received command: h3\r\nActivating pin 3 HIGH for 1700 ms.\r\n"
        );
    }

    #[test]
    fn failed_expiry_report_still_expires() {
        let mut ctl = controller();
        let mut out = String::new();
        ctl.receive(b"h6\nh4\n", 0, &mut out).unwrap();

        let mut sink = FailingSink::new(1);
        assert_eq!(ctl.tick(DEFAULT_HOLD_MS, &mut sink), Err(fmt::Error));
        assert!(ctl.outputs().active_pins().is_empty());
        assert_eq!(sink.written, "Pin 4 LOW (timer expired).\r\n");
    }

    #[test]
    fn zero_hold_is_not_reported_as_write_fault() {
        let config = CommandConfig {
            default_hold_ms: 0,
            ..CommandConfig::new()
        };
        let mut ctl = Controller::new(outputs(), config);
        let mut out = String::new();
        ctl.receive(b"h4\n", 0, &mut out).unwrap();

        assert_eq!(
            out,
            "Received command: h4\r\nError: Pin 4 hold time must be non-zero.\r\n"
        );
        assert!(ctl.outputs().active_pins().is_empty());
    }

    #[test]
    fn unknown_channel_is_reported() {
        let mut pins = outputs();
        let mut out = String::new();
        let cmd = Command::Activate {
            index: 9,
            pin: 9,
            hold_ms: 100,
            keyword: None,
        };
        handle_command(cmd, &mut pins, 0, &mut out).unwrap();
        assert_eq!(out, "Error: Pin 9 has no output channel.\r\n");
    }

    #[test]
    fn pin_write_failure_is_reported() {
        let mut pins = outputs();
        fail_pin(&mut pins, 1);
        let mut out = String::new();
        let cmd = Command::Activate {
            index: 1,
            pin: 5,
            hold_ms: 100,
            keyword: None,
        };
        handle_command(cmd, &mut pins, 0, &mut out).unwrap();
        assert_eq!(out, "Error: Pin 5 write failed.\r\n");
        assert!(!pins.is_active(1));
    }

    #[test]
    fn serialize_appends_newline() {
        let msg = DeviceMessage::Status {
            board: "b",
            version: "0.1.0",
            uptime: 0,
            pins: &[],
            active: &[],
        };
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = serialize_message(&msg, &mut buf).unwrap();
        assert_eq!(buf[len - 1], b'\n');
    }

    #[test]
    fn serialize_rejects_buffer_without_room_for_newline() {
        let msg = DeviceMessage::Status {
            board: "b",
            version: "0.1.0",
            uptime: 0,
            pins: &[],
            active: &[],
        };
        let mut buf = [0u8; MAX_MSG_LEN];
        let line_len = serialize_message(&msg, &mut buf).unwrap();

        // Exactly fits the JSON, not the newline
        let mut exact = vec![0u8; line_len - 1];
        assert_eq!(serialize_message(&msg, &mut exact), None);

        let mut roomy = vec![0u8; line_len];
        assert_eq!(serialize_message(&msg, &mut roomy), Some(line_len));
        assert_eq!(roomy.last(), Some(&b'\n'));
    }

    #[test]
    fn serialize_fails_on_tiny_buffer() {
        let msg = DeviceMessage::Status {
            board: "b",
            version: "0.1.0",
            uptime: 0,
            pins: &[],
            active: &[],
        };
        let mut buf = [0u8; 8];
        assert_eq!(serialize_message(&msg, &mut buf), None);
    }
}
