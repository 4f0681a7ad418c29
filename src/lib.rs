//! # Energy Protocol Library
//!
//! Host-side driver for the STM32 energy controller of the KXKM ESP32 audio &
//! battery module. The controller handles the battery, the LED gauge and the
//! load switch, and is driven over a half-duplex serial command/response link.
//!
//! ## Features
//!
//! - Command catalog with argument arity and reply flags
//! - Frame encoding/decoding for requests and integer replies
//! - Serial transport with a bounded reply wait
//! - Interactive hardware test sequence advanced by the main push button
//! - Cooperative poller for battery telemetry, button events and LED tests
//! - In-memory simulated controller for running without hardware
//!
//! ## Example
//!
//! ```no_run
//! use energy_protocol::{Transport, TransportConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport = Transport::open(&TransportConfig::default())?;
//!     let voltage = transport.battery_voltage_mv()?;
//!     println!("Battery voltage: {} mV", voltage);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod commands;
pub mod constants;
pub mod error;
pub mod peer;
pub mod poller;
pub mod sequencer;
pub mod transport;
pub mod types;

pub use commands::{Arity, BatteryType, ButtonEvent, Command};
pub use error::{EnergyError, Result};
pub use peer::{ClickScript, SimulatedPeer};
pub use poller::{ConsoleCommand, Poller};
pub use sequencer::{Sequencer, TestState};
pub use transport::{SerialLink, Transport};
pub use types::*;
