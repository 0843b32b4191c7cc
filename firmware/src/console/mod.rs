//! Operator console carried over the USB CDC-ACM interface.
//!
//! Raw packets from the host land in [`LineEditor`], which echoes keystrokes,
//! handles backspace and tab completion, and hands finished lines to the
//! interconnect task. Replies and autodetect notices travel back as
//! [`ConsoleReply`] values and are re-framed for the USB endpoint here.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt::{self, Write as _};
use core::mem;
use core::str;

use embassy_sync::channel::Channel;
use heapless::{String, Vec};
use interconnect_core::control::Transition;
use interconnect_core::probe::AnalogSampler;
use interconnect_core::repl::CommandExecutor;
use interconnect_core::repl::completion::CompletionEngine;
use interconnect_core::routing::InterconnectPins;
use interconnect_core::telemetry::TelemetryInstant;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

/// Maximum number of bytes accepted on a single console line.
pub const MAX_LINE_LEN: usize = 96;
/// Largest payload moved per USB packet.
pub const FRAME_CAPACITY: usize = 64;
pub const ECHO_CAPACITY: usize = 256;
pub const REPLY_CAPACITY: usize = 256;
pub const PROMPT: &str = "> ";

const FRAME_QUEUE_DEPTH: usize = 8;
const LINE_QUEUE_DEPTH: usize = 2;
const REPLY_QUEUE_DEPTH: usize = 4;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const ERASE: &[u8] = b"\x08 \x08";

#[cfg(target_os = "none")]
type ConsoleMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ConsoleMutex = NoopRawMutex;

pub type ConsoleFrame = Vec<u8, FRAME_CAPACITY>;
pub type ConsoleLine = String<MAX_LINE_LEN>;
pub type EchoBuffer = Vec<u8, ECHO_CAPACITY>;

pub type FrameQueue = Channel<ConsoleMutex, ConsoleFrame, FRAME_QUEUE_DEPTH>;
pub type LineQueue = Channel<ConsoleMutex, ConsoleLine, LINE_QUEUE_DEPTH>;
pub type ReplyQueue = Channel<ConsoleMutex, ConsoleReply, REPLY_QUEUE_DEPTH>;

/// Errors surfaced while assembling a console line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    /// Input exceeded [`MAX_LINE_LEN`]; the whole line was discarded.
    LineOverflow,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::LineOverflow => write!(f, "line longer than {MAX_LINE_LEN} bytes"),
        }
    }
}

/// Whether a reply answers a submitted line or arrived unprompted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyKind {
    Response,
    Notice,
}

/// Text sent from the interconnect task back to the console.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleReply {
    pub kind: ReplyKind,
    pub text: String<REPLY_CAPACITY>,
}

impl ConsoleReply {
    const fn new(kind: ReplyKind) -> Self {
        Self {
            kind,
            text: String::new(),
        }
    }
}

/// Runs `line` through the executor and renders the console reply.
pub fn render_response<S, P, TInstant, const N: usize>(
    executor: &mut CommandExecutor<S, P, TInstant, N>,
    line: &str,
    now: TInstant,
) -> ConsoleReply
where
    S: AnalogSampler,
    P: InterconnectPins,
    TInstant: TelemetryInstant,
{
    let mut reply = ConsoleReply::new(ReplyKind::Response);
    let rendered = match executor.execute(line, now) {
        Ok(outcome) => outcome.write_to(&mut reply.text),
        Err(error) => writeln!(reply.text, "{error}"),
    };

    if rendered.is_err() {
        reply.text.clear();
        let _ = reply.text.push_str("ERR reply truncated\n");
    }
    reply
}

/// Console line announcing an autodetect commit.
pub fn render_notice(transition: Transition) -> ConsoleReply {
    let mut reply = ConsoleReply::new(ReplyKind::Notice);
    let _ = match transition {
        Transition::AutoEnabled(route) => writeln!(reply.text, "UART autoenable ({route})"),
        Transition::AutoDisabled => writeln!(reply.text, "UART autodisable"),
    };
    reply
}

/// Queues `reply` without waiting for the console to drain.
///
/// Returns `false` when the queue is full and the reply was dropped.
pub fn post_reply(replies: &ReplyQueue, reply: ConsoleReply) -> bool {
    replies.try_send(reply).is_ok()
}

/// Appends `text` to `out`, expanding bare `\n` into `\r\n` for terminals.
///
/// Output past the buffer capacity is dropped.
pub fn push_crlf(out: &mut EchoBuffer, text: &str) {
    for byte in text.bytes() {
        if byte == b'\n' {
            push_echo(out, b"\r\n");
        } else {
            push_echo(out, &[byte]);
        }
    }
}

/// Splits outgoing bytes into USB-sized frames.
pub fn frames(bytes: &[u8]) -> impl Iterator<Item = ConsoleFrame> + '_ {
    bytes
        .chunks(FRAME_CAPACITY)
        .filter_map(|chunk| ConsoleFrame::from_slice(chunk).ok())
}

fn push_echo(out: &mut EchoBuffer, bytes: &[u8]) {
    let room = out.capacity() - out.len();
    let _ = out.extend_from_slice(&bytes[..bytes.len().min(room)]);
}

/// Line discipline for the operator console.
pub struct LineEditor {
    buffer: Vec<u8, MAX_LINE_LEN>,
    completion: CompletionEngine,
    overflowed: bool,
    after_cr: bool,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            completion: CompletionEngine::new(),
            overflowed: false,
            after_cr: false,
        }
    }

    /// Bytes typed so far on the current line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drops any partial line, e.g. after the host closes the port.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
        self.after_cr = false;
    }

    /// Feeds one byte from the host, writing terminal echo into `echo`.
    ///
    /// Returns the completed line once CR or LF arrives. A CR LF pair counts
    /// as a single terminator. Blank lines only redraw the prompt.
    pub fn ingest(
        &mut self,
        byte: u8,
        echo: &mut EchoBuffer,
    ) -> Result<Option<ConsoleLine>, ConsoleError> {
        let after_cr = mem::replace(&mut self.after_cr, byte == b'\r');

        match byte {
            b'\n' if after_cr => Ok(None),
            b'\r' | b'\n' => self.submit(echo),
            BACKSPACE | DELETE => {
                if !self.overflowed && self.buffer.pop().is_some() {
                    push_echo(echo, ERASE);
                }
                Ok(None)
            }
            b'\t' => {
                if !self.overflowed {
                    self.complete(echo);
                }
                Ok(None)
            }
            0x20..=0x7e => {
                if self.overflowed || self.buffer.push(byte).is_err() {
                    self.overflowed = true;
                } else {
                    push_echo(echo, &[byte]);
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn submit(&mut self, echo: &mut EchoBuffer) -> Result<Option<ConsoleLine>, ConsoleError> {
        push_echo(echo, b"\r\n");
        let bytes = mem::take(&mut self.buffer);
        if mem::take(&mut self.overflowed) {
            return Err(ConsoleError::LineOverflow);
        }

        // Only printable ASCII is ever buffered.
        let text = str::from_utf8(&bytes).unwrap_or_default();
        if text.trim().is_empty() {
            push_echo(echo, PROMPT.as_bytes());
            return Ok(None);
        }

        let mut line = ConsoleLine::new();
        let _ = line.push_str(text);
        Ok(Some(line))
    }

    fn complete(&mut self, echo: &mut EchoBuffer) {
        let Ok(text) = str::from_utf8(&self.buffer) else {
            return;
        };
        let result = self.completion.complete(text, text.len());

        if let Some(replacement) = &result.replacement {
            let mut edited: Vec<u8, MAX_LINE_LEN> = Vec::new();
            let suffix: &[u8] = if replacement.append_space { b" " } else { b"" };
            let overflow = edited
                .extend_from_slice(&self.buffer[..replacement.start])
                .is_err()
                || edited.extend_from_slice(replacement.value.as_bytes()).is_err()
                || edited.extend_from_slice(suffix).is_err();
            if overflow {
                return;
            }

            if result.options.len() <= 1 {
                for _ in replacement.start..replacement.end {
                    push_echo(echo, &[BACKSPACE]);
                }
                push_echo(echo, &edited[replacement.start..]);
            }
            self.buffer = edited;
        }

        if result.options.len() > 1 {
            push_echo(echo, b"\r\n");
            for (index, option) in result.options.iter().enumerate() {
                if index > 0 {
                    push_echo(echo, b"  ");
                }
                push_echo(echo, option.as_bytes());
            }
            push_echo(echo, b"\r\n");
            push_echo(echo, PROMPT.as_bytes());
            push_echo(echo, &self.buffer);
        }
    }
}
