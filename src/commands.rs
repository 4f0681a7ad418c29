//! Command catalog for the energy controller API.
//!
//! Every command the peer understands is listed here together with its
//! code byte, the number of integer arguments it takes and whether the peer
//! answers it. Enum-valued replies have their decode tables here too.

use crate::error::{EnergyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of integer arguments a command takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
}

impl Arity {
    /// Argument count as a number
    pub fn count(self) -> usize {
        match self {
            Arity::None => 0,
            Arity::One => 1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::None => write!(f, "no argument"),
            Arity::One => write!(f, "one argument"),
        }
    }
}

/// Catalog entry describing one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub code: u8,
    pub name: &'static str,
    pub arity: Arity,
    pub expects_reply: bool,
}

/// Commands understood by the energy controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    GetApiVersion,
    GetHwRevision,
    GetBoardId,
    GetFwVersion,
    GetBatteryType,
    GetBatteryVoltage,
    GetBatteryPercentage,
    GetButtonEvent,
    SetLeds,
    SetLedGauge,
    SetLoadSwitch,
    SetBatteryVoltageLow,
    SetBatteryVoltage3,
    SetBatteryVoltage6,
    EnterCriticalSection,
    LeaveCriticalSection,
    RequestReset,
    RequestShutdown,
}

/// Every catalog command, in code order
pub const CATALOG: [Command; 18] = [
    Command::GetApiVersion,
    Command::GetHwRevision,
    Command::GetBoardId,
    Command::GetFwVersion,
    Command::GetBatteryType,
    Command::GetBatteryVoltage,
    Command::GetBatteryPercentage,
    Command::GetButtonEvent,
    Command::SetLeds,
    Command::SetLedGauge,
    Command::SetLoadSwitch,
    Command::SetBatteryVoltageLow,
    Command::SetBatteryVoltage3,
    Command::SetBatteryVoltage6,
    Command::EnterCriticalSection,
    Command::LeaveCriticalSection,
    Command::RequestReset,
    Command::RequestShutdown,
];

const fn getter(code: u8, name: &'static str) -> CommandSpec {
    CommandSpec {
        code,
        name,
        arity: Arity::None,
        expects_reply: true,
    }
}

const fn setter(code: u8, name: &'static str) -> CommandSpec {
    CommandSpec {
        code,
        name,
        arity: Arity::One,
        expects_reply: false,
    }
}

const fn request(code: u8, name: &'static str) -> CommandSpec {
    CommandSpec {
        code,
        name,
        arity: Arity::None,
        expects_reply: false,
    }
}

impl Command {
    /// Catalog entry for this command
    pub const fn spec(self) -> CommandSpec {
        match self {
            Command::GetApiVersion => getter(b'A', "GET_API_VERSION"),
            Command::GetHwRevision => getter(b'B', "GET_HW_REVISION"),
            Command::GetBoardId => getter(b'C', "GET_BOARD_ID"),
            Command::GetFwVersion => getter(b'D', "GET_FW_VERSION"),
            Command::GetBatteryType => getter(b'E', "GET_BATTERY_TYPE"),
            Command::GetBatteryVoltage => getter(b'F', "GET_BATTERY_VOLTAGE"),
            Command::GetBatteryPercentage => getter(b'G', "GET_BATTERY_PERCENTAGE"),
            Command::GetButtonEvent => getter(b'H', "GET_BUTTON_EVENT"),
            Command::SetLeds => setter(b'I', "SET_LEDS"),
            Command::SetLedGauge => setter(b'J', "SET_LED_GAUGE"),
            Command::SetLoadSwitch => setter(b'K', "SET_LOAD_SWITCH"),
            Command::SetBatteryVoltageLow => setter(b'L', "SET_BATTERY_VOLTAGE_LOW"),
            Command::SetBatteryVoltage3 => setter(b'M', "SET_BATTERY_VOLTAGE_3"),
            Command::SetBatteryVoltage6 => setter(b'N', "SET_BATTERY_VOLTAGE_6"),
            Command::EnterCriticalSection => setter(b'O', "ENTER_CRITICAL_SECTION"),
            Command::LeaveCriticalSection => request(b'P', "LEAVE_CRITICAL_SECTION"),
            Command::RequestReset => request(b'Q', "REQUEST_RESET"),
            Command::RequestShutdown => request(b'R', "REQUEST_SHUTDOWN"),
        }
    }

    pub const fn code(self) -> u8 {
        self.spec().code
    }

    pub const fn arity(self) -> Arity {
        self.spec().arity
    }

    pub const fn expects_reply(self) -> bool {
        self.spec().expects_reply
    }

    /// Look a command up by its code byte
    pub fn from_code(code: u8) -> Result<Self> {
        CATALOG
            .iter()
            .copied()
            .find(|command| command.code() == code)
            .ok_or(EnergyError::UnknownCommand(code))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// Battery chemistry reported by `GET_BATTERY_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryType {
    LiPo,
    LiFe,
    Custom,
}

impl BatteryType {
    pub fn description(self) -> &'static str {
        match self {
            BatteryType::LiPo => "LiPo",
            BatteryType::LiFe => "LiFe",
            BatteryType::Custom => "custom",
        }
    }
}

impl TryFrom<i32> for BatteryType {
    type Error = EnergyError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(BatteryType::LiPo),
            1 => Ok(BatteryType::LiFe),
            2 => Ok(BatteryType::Custom),
            _ => Err(EnergyError::UnknownValue {
                kind: "battery type",
                value,
            }),
        }
    }
}

impl From<BatteryType> for i32 {
    fn from(battery: BatteryType) -> Self {
        match battery {
            BatteryType::LiPo => 0,
            BatteryType::LiFe => 1,
            BatteryType::Custom => 2,
        }
    }
}

/// Main push button event reported by `GET_BUTTON_EVENT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonEvent {
    None,
    Click,
    DoubleClick,
}

impl TryFrom<i32> for ButtonEvent {
    type Error = EnergyError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(ButtonEvent::None),
            1 => Ok(ButtonEvent::Click),
            2 => Ok(ButtonEvent::DoubleClick),
            _ => Err(EnergyError::UnknownValue {
                kind: "button event",
                value,
            }),
        }
    }
}

impl From<ButtonEvent> for i32 {
    fn from(event: ButtonEvent) -> Self {
        match event {
            ButtonEvent::None => 0,
            ButtonEvent::Click => 1,
            ButtonEvent::DoubleClick => 2,
        }
    }
}
