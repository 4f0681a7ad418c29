use crate::commands::BatteryType;
use crate::constants::*;
use crate::error::EnergyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub port_name: String,
    pub baud_rate: u32,
    /// Bound on the wait for one reply
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: BAUD_RATE,
            timeout_ms: TIMEOUT_MS,
        }
    }
}

/// Periods of the cooperative polling loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub battery_period_ms: u64,
    pub button_period_ms: u64,
    pub led_chase_period_ms: u64,
    pub led_gauge_period_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            battery_period_ms: BATTERY_CHECK_PERIOD_MS,
            button_period_ms: BUTTON_CHECK_PERIOD_MS,
            led_chase_period_ms: LED_CHASE_PERIOD_MS,
            led_gauge_period_ms: LED_GAUGE_PERIOD_MS,
        }
    }
}

/// Full host configuration, as loaded by the demo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transport: TransportConfig,
    pub poller: PollerConfig,
}

/// Host and peer API versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionCheck {
    pub host: i32,
    pub peer: i32,
}

impl ApiVersionCheck {
    pub fn is_match(&self) -> bool {
        self.host == self.peer
    }

    /// Diagnostic error when the versions differ
    pub fn mismatch(&self) -> Option<EnergyError> {
        (!self.is_match()).then_some(EnergyError::ProtocolVersionMismatch {
            host: self.host,
            peer: self.peer,
        })
    }
}

/// Result of the one-time identification queries run by `begin`.
///
/// A field is `None` when its query timed out or returned garbage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationReport {
    pub timestamp: DateTime<Utc>,
    pub hw_revision: Option<i32>,
    pub board_id: Option<i32>,
    pub api_version: Option<ApiVersionCheck>,
    pub fw_version: Option<i32>,
    pub battery_type: Option<BatteryType>,
}

/// One battery telemetry poll
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub timestamp: DateTime<Utc>,
    pub voltage_mv: Option<i32>,
    pub percentage: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: Config =
            serde_json::from_str(r#"{"transport": {"port_name": "/dev/ttyS3"}}"#).unwrap();
        assert_eq!(config.transport.port_name, "/dev/ttyS3");
        assert_eq!(config.transport.baud_rate, 115_200);
        assert_eq!(config.transport.timeout_ms, 10);
        assert_eq!(config.poller, PollerConfig::default());
        assert_eq!(config.poller.battery_period_ms, 2000);
        assert_eq!(config.poller.button_period_ms, 200);
    }

    #[test]
    fn test_api_version_mismatch_is_diagnostic() {
        let check = ApiVersionCheck { host: 1, peer: 1 };
        assert!(check.is_match());
        assert!(check.mismatch().is_none());

        let check = ApiVersionCheck { host: 1, peer: 2 };
        let err = check.mismatch().unwrap();
        assert_eq!(err.to_string(), "API version mismatch: host 1, peer 2");
    }
}
