//! Frame encoding/decoding for the energy controller API.
//!
//! Requests are one code byte from the command catalog, the argument as
//! signed ASCII decimal when the command takes one, and a newline:
//!
//! ```text
//! +------+----------------------+----+
//! | code | argument (optional)  | \n |
//! +------+----------------------+----+
//! ```
//!
//! Replies are a signed ASCII decimal integer followed by a newline. A
//! carriage return before the newline is accepted.

use crate::commands::{Arity, Command};
use crate::constants::{CARRIAGE_RETURN, FRAME_TERMINATOR, GAUGE_LED_COUNT, LED_INTENSITY_BITS};
use crate::error::{EnergyError, Result};

/// One command invocation, checked against the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    command: Command,
    argument: Option<i32>,
}

impl Request {
    /// Build a request, rejecting argument counts the catalog does not allow
    pub fn new(command: Command, argument: Option<i32>) -> Result<Self> {
        let supplied = usize::from(argument.is_some());
        let expected = command.arity();
        if supplied != expected.count() {
            return Err(EnergyError::ArityMismatch {
                command,
                expected,
                supplied,
            });
        }
        Ok(Request { command, argument })
    }

    /// Catalog command of this request
    pub fn command(&self) -> Command {
        self.command
    }

    /// Integer argument, if the command takes one
    pub fn argument(&self) -> Option<i32> {
        self.argument
    }

    /// Wire bytes for this request, terminator included
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.command.code()];
        if let Some(argument) = self.argument {
            frame.extend_from_slice(argument.to_string().as_bytes());
        }
        frame.push(FRAME_TERMINATOR);
        frame
    }

    /// Parse a request frame as the peer receives it
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let body = strip_terminator(frame);
        let (&code, payload) = body.split_first().ok_or_else(|| malformed(frame))?;
        let command = Command::from_code(code)?;

        match (command.arity(), payload.is_empty()) {
            (Arity::None, true) => Request::new(command, None),
            (Arity::One, false) => Request::new(command, Some(parse_integer(payload)?)),
            (expected, _) => Err(EnergyError::ArityMismatch {
                command,
                expected,
                supplied: usize::from(!payload.is_empty()),
            }),
        }
    }
}

/// Encode a command and optional argument into a request frame
pub fn encode(command: Command, argument: Option<i32>) -> Result<Vec<u8>> {
    Ok(Request::new(command, argument)?.encode())
}

/// Encode a reply frame as the peer sends it
pub fn encode_reply(value: i32) -> Vec<u8> {
    let mut frame = value.to_string().into_bytes();
    frame.push(FRAME_TERMINATOR);
    frame
}

/// Decode one reply frame into its integer value
pub fn decode(frame: &[u8]) -> Result<i32> {
    parse_integer(strip_terminator(frame))
}

/// Pack per-LED intensities into one `SET_LEDS` argument.
///
/// LED `i` occupies bits `3i..3i+3`; intensities above 7 are clamped.
pub fn pack_leds(leds: &[u8; GAUGE_LED_COUNT]) -> i32 {
    let max = (1 << LED_INTENSITY_BITS) - 1;
    leds.iter().enumerate().fold(0, |packed, (i, &level)| {
        packed | (i32::from(level).min(max) << (LED_INTENSITY_BITS * i as u32))
    })
}

/// Unpack a `SET_LEDS` argument into per-LED intensities
pub fn unpack_leds(packed: i32) -> [u8; GAUGE_LED_COUNT] {
    let mask = (1 << LED_INTENSITY_BITS) - 1;
    let mut leds = [0u8; GAUGE_LED_COUNT];
    for (i, led) in leds.iter_mut().enumerate() {
        *led = ((packed >> (LED_INTENSITY_BITS * i as u32)) & mask) as u8;
    }
    leds
}

fn strip_terminator(frame: &[u8]) -> &[u8] {
    let frame = frame.strip_suffix(&[FRAME_TERMINATOR]).unwrap_or(frame);
    frame.strip_suffix(&[CARRIAGE_RETURN]).unwrap_or(frame)
}

fn parse_integer(bytes: &[u8]) -> Result<i32> {
    std::str::from_utf8(bytes)
        .ok()
        .map(str::trim)
        .and_then(|text| text.parse::<i32>().ok())
        .ok_or_else(|| malformed(bytes))
}

fn malformed(bytes: &[u8]) -> EnergyError {
    EnergyError::MalformedReply {
        reply: String::from_utf8_lossy(bytes).into_owned(),
    }
}
