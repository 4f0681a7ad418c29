//! Protocol constants for the energy controller serial API.
//!
//! This module defines the framing bytes, serial port defaults, polling
//! periods and the fixed values pushed to the peer by the test sequence.

/// API version implemented by this host library
pub const API_VERSION: i32 = 1;

/// Terminates every request and reply frame
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Optional carriage return tolerated before the terminator in replies
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Longest reply accepted before it is treated as malformed
pub const MAX_REPLY_LEN: usize = 16;

/// Baud rate (115200 bps, 8N1)
pub const BAUD_RATE: u32 = 115_200;

/// Read timeout in milliseconds
pub const TIMEOUT_MS: u64 = 10;

/// Battery voltage/percentage poll period
pub const BATTERY_CHECK_PERIOD_MS: u64 = 2000;

/// Button event poll period
pub const BUTTON_CHECK_PERIOD_MS: u64 = 200;

/// LED chase step period while in `TEST_LED_1`
pub const LED_CHASE_PERIOD_MS: u64 = 100;

/// Gauge percentage step period while in `TEST_LED_2`
pub const LED_GAUGE_PERIOD_MS: u64 = 20;

/// Number of LEDs on the gauge
pub const GAUGE_LED_COUNT: usize = 6;

/// Bits used per LED in a packed `SET_LEDS` argument
pub const LED_INTENSITY_BITS: u32 = 3;

/// Intensity of the chasing LED
pub const LED_BRIGHT: u8 = 4;

/// Intensity of the LED ahead of the chasing one
pub const LED_DIM: u8 = 2;

/// Intensity of the LED behind the chasing one
pub const LED_DIMMEST: u8 = 1;

/// Gauge percentage wraps back to zero when it reaches this value
pub const GAUGE_PERCENTAGE_WRAP: i32 = 100;

/// Custom battery low-voltage threshold (mV)
pub const CUSTOM_BATTERY_VOLTAGE_LOW_MV: i32 = 12_000;

/// Custom battery 3-LED threshold (mV)
pub const CUSTOM_BATTERY_VOLTAGE_3_MV: i32 = 12_500;

/// Custom battery 6-LED threshold (mV)
pub const CUSTOM_BATTERY_VOLTAGE_6_MV: i32 = 14_000;

/// Duration of the critical section requested by the test sequence
pub const CRITICAL_SECTION_DURATION_MS: i32 = 8000;

/// Sleep between scheduler ticks in [`crate::Poller::run`]
pub const TICK_INTERVAL_MS: u64 = 1;
