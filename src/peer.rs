//! In-memory energy controller.
//!
//! [`SimulatedPeer`] speaks the controller's half of the protocol over a plain
//! `Read + Write` stream so that the host side can run without hardware.

use crate::codec::{encode_reply, unpack_leds, Request};
use crate::commands::{BatteryType, ButtonEvent, Command};
use crate::constants::{API_VERSION, FRAME_TERMINATOR, GAUGE_LED_COUNT};
use crate::transport::SerialLink;
use log::{debug, warn};
use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// Simulated energy controller state
#[derive(Debug, Clone)]
pub struct SimulatedPeer {
    pub api_version: i32,
    pub hw_revision: i32,
    pub board_id: i32,
    pub fw_version: i32,
    pub battery_type: BatteryType,
    pub battery_voltage_mv: i32,
    pub battery_percentage: i32,
    pub leds: [u8; GAUGE_LED_COUNT],
    pub led_gauge: Option<i32>,
    pub load_switch: bool,
    pub voltage_low_mv: Option<i32>,
    pub voltage_3_mv: Option<i32>,
    pub voltage_6_mv: Option<i32>,
    /// Duration of the active critical section, if any
    pub critical_section_ms: Option<i32>,
    pub reset_requests: usize,
    pub shutdown_requested: bool,
    /// Never answer while set
    pub silent: bool,
    /// Sent instead of the next reply, then cleared
    pub garbage_reply: Option<Vec<u8>>,
    button_events: VecDeque<ButtonEvent>,
    requests: Vec<Request>,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
}

impl Default for SimulatedPeer {
    fn default() -> Self {
        SimulatedPeer {
            api_version: API_VERSION,
            hw_revision: 2,
            board_id: 1,
            fw_version: 3,
            battery_type: BatteryType::LiPo,
            battery_voltage_mv: 12_400,
            battery_percentage: 80,
            leds: [0; GAUGE_LED_COUNT],
            led_gauge: None,
            load_switch: false,
            voltage_low_mv: None,
            voltage_3_mv: None,
            voltage_6_mv: None,
            critical_section_ms: None,
            reset_requests: 0,
            shutdown_requested: false,
            silent: false,
            garbage_reply: None,
            button_events: VecDeque::new(),
            requests: Vec::new(),
            inbox: Vec::new(),
            outbox: VecDeque::new(),
        }
    }
}

impl SimulatedPeer {
    /// Controller with default identification and a charged LiPo battery
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a button event for a later `GET_BUTTON_EVENT`
    pub fn push_button_event(&mut self, event: ButtonEvent) {
        self.button_events.push_back(event);
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Received requests other than the periodic getters
    pub fn actions(&self) -> Vec<(Command, Option<i32>)> {
        self.requests
            .iter()
            .filter(|request| !request.command().expects_reply())
            .map(|request| (request.command(), request.argument()))
            .collect()
    }

    /// Forget the recorded requests
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    /// True between `ENTER_CRITICAL_SECTION` and `LEAVE_CRITICAL_SECTION`
    pub fn critical_section_active(&self) -> bool {
        self.critical_section_ms.is_some()
    }

    fn handle(&mut self, request: Request) {
        debug!(
            "peer received {} {:?}",
            request.command(),
            request.argument()
        );
        self.requests.push(request);

        let argument = request.argument().unwrap_or_default();
        match request.command() {
            Command::GetApiVersion => self.reply(self.api_version),
            Command::GetHwRevision => self.reply(self.hw_revision),
            Command::GetBoardId => self.reply(self.board_id),
            Command::GetFwVersion => self.reply(self.fw_version),
            Command::GetBatteryType => self.reply(self.battery_type.into()),
            Command::GetBatteryVoltage => self.reply(self.battery_voltage_mv),
            Command::GetBatteryPercentage => self.reply(self.battery_percentage),
            Command::GetButtonEvent => {
                let event = self.button_events.pop_front().unwrap_or(ButtonEvent::None);
                self.reply(event.into());
            }
            Command::SetLeds => self.leds = unpack_leds(argument),
            Command::SetLedGauge => self.led_gauge = Some(argument),
            Command::SetLoadSwitch => self.load_switch = argument != 0,
            Command::SetBatteryVoltageLow => self.voltage_low_mv = Some(argument),
            Command::SetBatteryVoltage3 => self.voltage_3_mv = Some(argument),
            Command::SetBatteryVoltage6 => self.voltage_6_mv = Some(argument),
            Command::EnterCriticalSection => self.critical_section_ms = Some(argument),
            Command::LeaveCriticalSection => self.critical_section_ms = None,
            Command::RequestReset => self.reset_requests += 1,
            Command::RequestShutdown => self.shutdown_requested = true,
        }
    }

    fn reply(&mut self, value: i32) {
        if self.silent {
            return;
        }
        let frame = self.garbage_reply.take().unwrap_or_else(|| encode_reply(value));
        self.outbox.extend(frame);
    }
}

/// Scripted main button clicks for running the sequence without a person
/// at the button.
///
/// Each click is preceded by `idle_polls` NONE events, so clicks arrive
/// once every `idle_polls + 1` button polls. Nothing is queued until the
/// sequence has begun, since clicks in `STARTUP` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickScript {
    remaining: usize,
    idle_polls: usize,
}

impl ClickScript {
    /// Script of `clicks` clicks, each after `idle_polls` idle polls
    pub fn new(clicks: usize, idle_polls: usize) -> Self {
        ClickScript {
            remaining: clicks,
            idle_polls,
        }
    }

    /// Clicks not yet queued
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Queue the next click once `begun` is set and the peer has reported
    /// every event queued before.
    pub fn feed(&mut self, peer: &mut SimulatedPeer, begun: bool) {
        if !begun || self.remaining == 0 || !peer.button_events.is_empty() {
            return;
        }
        for _ in 0..self.idle_polls {
            peer.push_button_event(ButtonEvent::None);
        }
        peer.push_button_event(ButtonEvent::Click);
        self.remaining -= 1;
    }
}

impl Write for SimulatedPeer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.inbox.push(byte);
            if byte == FRAME_TERMINATOR {
                let frame = std::mem::take(&mut self.inbox);
                match Request::decode(&frame) {
                    Ok(request) => self.handle(request),
                    Err(e) => warn!("peer dropped frame {:?}: {}", frame, e),
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedPeer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outbox.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no reply"));
        }
        let count = buf.len().min(self.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbox.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl SerialLink for SimulatedPeer {
    fn clear_input(&mut self) -> crate::Result<()> {
        self.outbox.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    fn roundtrip(peer: &mut SimulatedPeer, command: Command, argument: Option<i32>) -> Vec<u8> {
        peer.write_all(&encode(command, argument).unwrap()).unwrap();
        let mut reply = Vec::new();
        let mut buf = [0u8; 8];
        while let Ok(n) = peer.read(&mut buf) {
            reply.extend_from_slice(&buf[..n]);
        }
        reply
    }

    #[test]
    fn test_answers_getters() {
        let mut peer = SimulatedPeer::new();
        peer.battery_voltage_mv = 13_050;
        let reply = roundtrip(&mut peer, Command::GetBatteryVoltage, None);
        assert_eq!(decode(&reply).unwrap(), 13_050);
    }

    #[test]
    fn test_setters_send_no_reply() {
        let mut peer = SimulatedPeer::new();
        let reply = roundtrip(&mut peer, Command::SetBatteryVoltage6, Some(14_000));
        assert!(reply.is_empty());
        assert_eq!(peer.voltage_6_mv, Some(14_000));
    }

    #[test]
    fn test_button_events_are_consumed_once() {
        let mut peer = SimulatedPeer::new();
        peer.push_button_event(ButtonEvent::Click);

        let first = roundtrip(&mut peer, Command::GetButtonEvent, None);
        let second = roundtrip(&mut peer, Command::GetButtonEvent, None);
        assert_eq!(decode(&first).unwrap(), i32::from(ButtonEvent::Click));
        assert_eq!(decode(&second).unwrap(), i32::from(ButtonEvent::None));
    }

    #[test]
    fn test_frames_split_across_writes() {
        let mut peer = SimulatedPeer::new();
        peer.write_all(b"O80").unwrap();
        assert!(peer.requests().is_empty());
        peer.write_all(b"00\n").unwrap();
        assert_eq!(peer.critical_section_ms, Some(8000));
    }

    #[test]
    fn test_click_script_waits_for_begin() {
        let mut peer = SimulatedPeer::new();
        let mut script = ClickScript::new(2, 1);

        script.feed(&mut peer, false);
        assert_eq!(script.remaining(), 2);
        assert_eq!(roundtrip(&mut peer, Command::GetButtonEvent, None), b"0\n");

        script.feed(&mut peer, true);
        script.feed(&mut peer, true);
        assert_eq!(script.remaining(), 1);
        assert_eq!(roundtrip(&mut peer, Command::GetButtonEvent, None), b"0\n");
        assert_eq!(roundtrip(&mut peer, Command::GetButtonEvent, None), b"1\n");

        script.feed(&mut peer, true);
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn test_bad_frames_are_dropped() {
        let mut peer = SimulatedPeer::new();
        peer.write_all(b"?\nK\n").unwrap();
        assert!(peer.requests().is_empty());
        assert!(!peer.load_switch);
    }
}
