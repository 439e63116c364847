//! Telemetry record sent to the connected peer once per interval.
//!
//! The wire shape is a compact JSON object with fixed keys in a fixed order:
//! `{"h":72,"t":24.5,"m":55.0,"a":0,"tx":0,"hm":0}`. Readings that have never
//! been valid are sent as `null`.

use arrayvec::ArrayString;
use core::fmt::Write;

use crate::alerts::AlertState;
use crate::environment::EnvironmentReading;
use crate::heart_rate::BeatEstimate;

// Enough for two full-width f32 values with one decimal.
pub const PAYLOAD_CAPACITY: usize = 128;

pub type Payload = ArrayString<PAYLOAD_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    Encode, // The payload did not fit or failed to format.
}

impl From<core::fmt::Error> for TelemetryError {
    fn from(_: core::fmt::Error) -> Self {
        TelemetryError::Encode
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub heart_rate: u16,
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub heart_alert: bool,
    pub temperature_alert: bool,
    pub humidity_alert: bool,
}

impl TelemetryRecord {
    pub fn pack(estimate: &BeatEstimate, env: &EnvironmentReading, alerts: &AlertState) -> Self {
        Self {
            heart_rate: estimate.average_bpm,
            temperature_c: env.temperature_c,
            humidity_pct: env.humidity_pct,
            heart_alert: alerts.heart_alert,
            temperature_alert: alerts.temperature_alert,
            humidity_alert: alerts.humidity_alert,
        }
    }

    pub fn encode(&self) -> Result<Payload, TelemetryError> {
        let mut out = Payload::new();
        write!(&mut out, "{{\"h\":{}", self.heart_rate)?;
        out.try_push_str(",\"t\":").map_err(|_| TelemetryError::Encode)?;
        write_reading(&mut out, self.temperature_c)?;
        out.try_push_str(",\"m\":").map_err(|_| TelemetryError::Encode)?;
        write_reading(&mut out, self.humidity_pct)?;
        write!(
            &mut out,
            ",\"a\":{},\"tx\":{},\"hm\":{}}}",
            u8::from(self.heart_alert),
            u8::from(self.temperature_alert),
            u8::from(self.humidity_alert),
        )?;
        Ok(out)
    }
}

fn write_reading(out: &mut Payload, value: Option<f32>) -> Result<(), TelemetryError> {
    match value {
        Some(v) => write!(out, "{:.1}", v)?,
        None => out.try_push_str("null").map_err(|_| TelemetryError::Encode)?,
    }
    Ok(())
}
