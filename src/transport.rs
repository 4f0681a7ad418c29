use crate::codec::{self, pack_leds};
use crate::commands::{BatteryType, ButtonEvent, Command};
use crate::constants::*;
use crate::error::{EnergyError, Result};
use crate::types::{ApiVersionCheck, TransportConfig};
use log::{trace, warn};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Byte stream the transport talks over
pub trait SerialLink: Read + Write {
    /// Drop any unread input before a new request goes out
    fn clear_input(&mut self) -> Result<()> {
        Ok(())
    }
}

impl SerialLink for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> Result<()> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Half-duplex request/response channel to the energy controller
pub struct Transport<S: SerialLink> {
    link: S,
    timeout: Duration,
    pending: Option<Command>,
}

impl Transport<Box<dyn SerialPort>> {
    /// Open the serial port described by `config`
    pub fn open(config: &TransportConfig) -> Result<Self> {
        let port = serialport::new(config.port_name.as_str(), config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open()?;

        Ok(Transport::new(port, Duration::from_millis(config.timeout_ms)))
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }
}

impl<S: SerialLink> Transport<S> {
    /// Wrap an already open link
    pub fn new(link: S, timeout: Duration) -> Self {
        Transport {
            link,
            timeout,
            pending: None,
        }
    }

    /// Underlying byte stream
    pub fn link(&self) -> &S {
        &self.link
    }

    /// Mutable access to the underlying byte stream
    pub fn link_mut(&mut self) -> &mut S {
        &mut self.link
    }

    /// Bound on the wait for one reply
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Command whose reply has not been read yet
    pub fn pending(&self) -> Option<Command> {
        self.pending
    }

    /// Encode and write one request. Does not wait for a reply.
    pub fn send_command(&mut self, command: Command, argument: Option<i32>) -> Result<()> {
        if let Some(pending) = self.pending {
            return Err(EnergyError::ReplyPending { pending });
        }
        let frame = codec::encode(command, argument)?;

        self.link.clear_input()?;
        trace!("TX {}: {:?}", command, String::from_utf8_lossy(&frame));
        self.link.write_all(&frame)?;
        self.link.flush()?;

        if command.expects_reply() {
            self.pending = Some(command);
        }
        Ok(())
    }

    /// Wait for the reply to the last request, at most `timeout`.
    ///
    /// Returns [`EnergyError::Timeout`] if nothing arrived and
    /// [`EnergyError::MalformedReply`] for an incomplete or unparseable
    /// reply. Either way the request is no longer pending.
    pub fn read_answer(&mut self) -> Result<i32> {
        let command = self.pending.take();
        let deadline = Instant::now() + self.timeout;
        let mut reply = Vec::with_capacity(MAX_REPLY_LEN);
        let mut byte = [0u8; 1];

        loop {
            match self.link.read(&mut byte) {
                Ok(0) => {}
                Ok(_) if byte[0] == FRAME_TERMINATOR => break,
                Ok(_) => {
                    reply.push(byte[0]);
                    if reply.len() > MAX_REPLY_LEN {
                        return Err(EnergyError::MalformedReply {
                            reply: String::from_utf8_lossy(&reply).into_owned(),
                        });
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                if reply.is_empty() {
                    return Err(EnergyError::Timeout);
                }
                return Err(EnergyError::MalformedReply {
                    reply: String::from_utf8_lossy(&reply).into_owned(),
                });
            }
        }

        let value = codec::decode(&reply)?;
        match command {
            Some(command) => trace!("RX {}: {}", command, value),
            None => trace!("RX: {}", value),
        }
        Ok(value)
    }

    /// Send a reply-expected command and read its answer
    pub fn query(&mut self, command: Command) -> Result<i32> {
        self.send_command(command, None)?;
        self.read_answer()
    }

    /// Hardware revision of the energy controller board
    pub fn hw_revision(&mut self) -> Result<i32> {
        self.query(Command::GetHwRevision)
    }

    /// Board identifier
    pub fn board_id(&mut self) -> Result<i32> {
        self.query(Command::GetBoardId)
    }

    /// Energy controller firmware version
    pub fn fw_version(&mut self) -> Result<i32> {
        self.query(Command::GetFwVersion)
    }

    /// API version implemented by the energy controller
    pub fn api_version(&mut self) -> Result<i32> {
        self.query(Command::GetApiVersion)
    }

    /// Compare the peer's API version with [`API_VERSION`]. A mismatch is
    /// logged, not returned as an error.
    pub fn check_api_version(&mut self) -> Result<ApiVersionCheck> {
        let check = ApiVersionCheck {
            host: API_VERSION,
            peer: self.api_version()?,
        };
        if let Some(mismatch) = check.mismatch() {
            warn!("{}", mismatch);
        }
        Ok(check)
    }

    /// Battery chemistry configured on the peer
    pub fn battery_type(&mut self) -> Result<BatteryType> {
        BatteryType::try_from(self.query(Command::GetBatteryType)?)
    }

    /// Battery voltage in millivolts
    pub fn battery_voltage_mv(&mut self) -> Result<i32> {
        self.query(Command::GetBatteryVoltage)
    }

    /// Battery charge in percent
    pub fn battery_percentage(&mut self) -> Result<i32> {
        self.query(Command::GetBatteryPercentage)
    }

    /// Latest main button event. The peer forgets it once reported.
    pub fn button_event(&mut self) -> Result<ButtonEvent> {
        ButtonEvent::try_from(self.query(Command::GetButtonEvent)?)
    }

    /// Set the six gauge LEDs individually
    pub fn set_leds(&mut self, leds: &[u8; GAUGE_LED_COUNT]) -> Result<()> {
        self.send_command(Command::SetLeds, Some(pack_leds(leds)))
    }

    /// Show a percentage on the LED gauge
    pub fn set_led_gauge(&mut self, percentage: i32) -> Result<()> {
        self.send_command(Command::SetLedGauge, Some(percentage))
    }

    /// Enable or disable the load switch
    pub fn set_load_switch(&mut self, enabled: bool) -> Result<()> {
        self.send_command(Command::SetLoadSwitch, Some(i32::from(enabled)))
    }

    /// Suspend shutdown on the peer for `duration_ms`
    pub fn enter_critical_section(&mut self, duration_ms: i32) -> Result<()> {
        self.send_command(Command::EnterCriticalSection, Some(duration_ms))
    }

    /// Cancel the critical section before its deadline
    pub fn leave_critical_section(&mut self) -> Result<()> {
        self.send_command(Command::LeaveCriticalSection, None)
    }

    /// Ask the energy controller to reset itself
    pub fn request_reset(&mut self) -> Result<()> {
        self.send_command(Command::RequestReset, None)
    }

    /// Ask the energy controller to power down
    pub fn request_shutdown(&mut self) -> Result<()> {
        self.send_command(Command::RequestShutdown, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::SimulatedPeer;

    fn transport(peer: SimulatedPeer) -> Transport<SimulatedPeer> {
        Transport::new(peer, Duration::from_millis(TIMEOUT_MS))
    }

    #[test]
    fn test_query_reads_reply() {
        let mut peer = SimulatedPeer::new();
        peer.battery_voltage_mv = 12_600;
        let mut transport = transport(peer);

        assert_eq!(transport.battery_voltage_mv().unwrap(), 12_600);
        assert_eq!(transport.pending(), None);
    }

    #[test]
    fn test_timeout_is_reported_once() {
        let mut peer = SimulatedPeer::new();
        peer.silent = true;
        let mut transport = transport(peer);

        transport.send_command(Command::GetBatteryVoltage, None).unwrap();
        let started = Instant::now();
        assert!(matches!(transport.read_answer(), Err(EnergyError::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(1));

        // The failed request is no longer outstanding
        assert_eq!(transport.pending(), None);
        transport.link_mut().silent = false;
        assert_eq!(transport.battery_percentage().unwrap(), 80);
    }

    #[test]
    fn test_malformed_reply() {
        let mut peer = SimulatedPeer::new();
        peer.garbage_reply = Some(b"x1\n".to_vec());
        let mut transport = transport(peer);

        let err = transport.board_id().unwrap_err();
        assert!(matches!(err, EnergyError::MalformedReply { ref reply } if reply == "x1"));
    }

    #[test]
    fn test_unterminated_reply_is_malformed() {
        let mut peer = SimulatedPeer::new();
        peer.garbage_reply = Some(b"12".to_vec());
        let mut transport = transport(peer);

        assert!(matches!(
            transport.hw_revision(),
            Err(EnergyError::MalformedReply { .. })
        ));
    }

    #[test]
    fn test_over_length_reply_is_malformed() {
        let mut peer = SimulatedPeer::new();
        peer.garbage_reply = Some(b"12345678901234567890\n".to_vec());
        let mut transport = transport(peer);

        let err = transport.board_id().unwrap_err();
        assert!(
            matches!(err, EnergyError::MalformedReply { ref reply } if reply == "12345678901234567")
        );
        assert_eq!(transport.pending(), None);

        // Leftover digits are cleared before the next request
        assert_eq!(transport.board_id().unwrap(), 1);
    }

    #[test]
    fn test_second_command_refused_while_reply_pending() {
        let mut transport = transport(SimulatedPeer::new());
        transport.send_command(Command::GetBoardId, None).unwrap();

        let err = transport.set_load_switch(true).unwrap_err();
        assert!(matches!(
            err,
            EnergyError::ReplyPending {
                pending: Command::GetBoardId
            }
        ));
        assert!(!transport.link().load_switch);

        transport.read_answer().unwrap();
        transport.set_load_switch(true).unwrap();
        assert!(transport.link().load_switch);
    }

    #[test]
    fn test_arity_mismatch_sends_nothing() {
        let mut transport = transport(SimulatedPeer::new());
        assert!(matches!(
            transport.send_command(Command::RequestReset, Some(1)),
            Err(EnergyError::ArityMismatch { .. })
        ));
        assert!(transport.link().requests().is_empty());
    }

    #[test]
    fn test_battery_type_is_stable() {
        let mut peer = SimulatedPeer::new();
        peer.battery_type = BatteryType::LiFe;
        let mut transport = transport(peer);

        for _ in 0..5 {
            assert_eq!(transport.battery_type().unwrap(), BatteryType::LiFe);
        }
    }

    #[test]
    fn test_api_version_mismatch_is_not_an_error() {
        let mut peer = SimulatedPeer::new();
        peer.api_version = API_VERSION + 1;
        let mut transport = transport(peer);

        let check = transport.check_api_version().unwrap();
        assert!(!check.is_match());
        assert_eq!(check.peer, API_VERSION + 1);
    }

    #[test]
    fn test_set_leds_reaches_peer() {
        let mut transport = transport(SimulatedPeer::new());
        transport.set_leds(&[0, 1, 4, 2, 0, 0]).unwrap();
        assert_eq!(transport.link().leds, [0, 1, 4, 2, 0, 0]);
    }

    #[test]
    fn test_request_shutdown_reaches_peer() {
        let mut transport = transport(SimulatedPeer::new());
        transport.request_shutdown().unwrap();

        assert!(transport.link().shutdown_requested);
        assert_eq!(transport.pending(), None);
        assert_eq!(
            transport.link().actions().last(),
            Some(&(Command::RequestShutdown, None))
        );
    }
}
