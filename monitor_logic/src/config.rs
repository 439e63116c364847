//! Fixed thresholds, intervals, and tone patterns for the monitor.
//!
//! The constants are the canonical set; `MonitorConfig::default()` gathers
//! them so the controller and the tests can be handed one value.

use crate::feedback::TonePattern;

// Heart rate, in BPM.
pub const HEART_NORMAL_LOW: u16 = 60;
pub const HEART_NORMAL_HIGH: u16 = 100;
pub const HEART_CRITICAL_LOW: u16 = 50;

// Raw pulse intensity below this means nothing is on the sensor.
pub const CONTACT_THRESHOLD: u32 = 50_000;

// Humidity band, in %RH.
pub const HUMIDITY_LOW: f32 = 50.0;
pub const HUMIDITY_HIGH: f32 = 65.0;

pub const TEMP_ALERT_THRESHOLD: f32 = 30.0; // in °C
pub const CONSECUTIVE_TEMP_REQUIRED: u8 = 5; // Valid reads in a row.

// Intervals, in milliseconds.
pub const TICK_PERIOD_MS: u64 = 50;
pub const ENVIRONMENT_READ_INTERVAL_MS: u64 = 2_000;
pub const HEART_RATE_DISPLAY_INTERVAL_MS: u64 = 10_000;
pub const DIAGNOSTICS_INTERVAL_MS: u64 = 10_000;
pub const TELEMETRY_INTERVAL_MS: u64 = 60_000;
pub const CRITICAL_ALERT_COOLDOWN_MS: u64 = 30_000;
pub const READVERTISE_SETTLE_MS: u32 = 500;

pub const ROUTINE_PATTERN: TonePattern = TonePattern {
    frequency_hz: 4_000,
    tone_ms: 150,
    pause_ms: 100,
    gap_ms: 50,
    count: 10,
};

pub const CRITICAL_PATTERN: TonePattern = TonePattern {
    frequency_hz: 9_000,
    tone_ms: 200,
    pause_ms: 100,
    gap_ms: 50,
    count: 20,
};

/// Which temperatures count as out-of-band for the debounced alert.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TemperatureLimit {
    /// Strictly above the given °C.
    Above(f32),
    /// Strictly below `low` or strictly above `high`.
    Outside { low: f32, high: f32 },
}

impl TemperatureLimit {
    pub fn is_out_of_band(&self, celsius: f32) -> bool {
        match *self {
            TemperatureLimit::Above(limit) => celsius > limit,
            TemperatureLimit::Outside { low, high } => celsius < low || celsius > high,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    pub heart_normal_low: u16,
    pub heart_normal_high: u16,
    pub heart_critical_low: u16,
    pub contact_threshold: u32,
    pub humidity_low: f32,
    pub humidity_high: f32,
    pub temperature_limit: TemperatureLimit,
    pub consecutive_temp_required: u8,
    pub environment_read_interval_ms: u64,
    pub heart_rate_display_interval_ms: u64,
    pub diagnostics_interval_ms: u64,
    pub telemetry_interval_ms: u64,
    pub critical_cooldown_ms: u64,
    pub readvertise_settle_ms: u32,
    pub routine_pattern: TonePattern,
    pub critical_pattern: TonePattern,
}

impl MonitorConfig {
    pub const CANONICAL: MonitorConfig = MonitorConfig {
        heart_normal_low: HEART_NORMAL_LOW,
        heart_normal_high: HEART_NORMAL_HIGH,
        heart_critical_low: HEART_CRITICAL_LOW,
        contact_threshold: CONTACT_THRESHOLD,
        humidity_low: HUMIDITY_LOW,
        humidity_high: HUMIDITY_HIGH,
        temperature_limit: TemperatureLimit::Above(TEMP_ALERT_THRESHOLD),
        consecutive_temp_required: CONSECUTIVE_TEMP_REQUIRED,
        environment_read_interval_ms: ENVIRONMENT_READ_INTERVAL_MS,
        heart_rate_display_interval_ms: HEART_RATE_DISPLAY_INTERVAL_MS,
        diagnostics_interval_ms: DIAGNOSTICS_INTERVAL_MS,
        telemetry_interval_ms: TELEMETRY_INTERVAL_MS,
        critical_cooldown_ms: CRITICAL_ALERT_COOLDOWN_MS,
        readvertise_settle_ms: READVERTISE_SETTLE_MS,
        routine_pattern: ROUTINE_PATTERN,
        critical_pattern: CRITICAL_PATTERN,
    };
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::CANONICAL
    }
}
