//! Human-readable status for the periodic log output.

use arrayvec::ArrayString;
use core::fmt::Write;

use crate::alerts::AlertState;
use crate::config::MonitorConfig;
use crate::heart_rate::BeatEstimate;
use crate::monitor::TickReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeartStatus {
    NoContact,
    Acquiring, // On skin, no average yet.
    CriticalLow,
    Low,
    High,
    Normal,
}

impl HeartStatus {
    pub fn classify(estimate: &BeatEstimate, config: &MonitorConfig) -> Self {
        let bpm = estimate.average_bpm;
        if !estimate.contact_detected {
            HeartStatus::NoContact
        } else if bpm == 0 {
            HeartStatus::Acquiring
        } else if bpm < config.heart_critical_low {
            HeartStatus::CriticalLow
        } else if bpm < config.heart_normal_low {
            HeartStatus::Low
        } else if bpm > config.heart_normal_high {
            HeartStatus::High
        } else {
            HeartStatus::Normal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HeartStatus::NoContact => "No Signal",
            HeartStatus::Acquiring => "Acquiring",
            HeartStatus::CriticalLow => "CRITICAL",
            HeartStatus::Low => "LOW",
            HeartStatus::High => "HIGH",
            HeartStatus::Normal => "Normal",
        }
    }
}

/// Space-separated alert names for a telemetry send, e.g. `HEART_ALERT_LOW TEMP_ALERT`.
pub fn alert_summary(alerts: &AlertState, average_bpm: u16, config: &MonitorConfig) -> ArrayString<48> {
    let mut out = ArrayString::<48>::new();
    if alerts.heart_alert {
        if average_bpm < config.heart_normal_low {
            out.push_str("HEART_ALERT_LOW ");
        } else {
            out.push_str("HEART_ALERT_HIGH ");
        }
    }
    if alerts.temperature_alert {
        out.push_str("TEMP_ALERT ");
    }
    if alerts.humidity_alert {
        out.push_str("HUMIDITY_ALERT ");
    }
    if !alerts.any() {
        out.push_str("ALL_NORMAL");
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

fn write_reading(out: &mut ArrayString<160>, value: Option<f32>, unit: &str) -> core::fmt::Result {
    match value {
        Some(v) => write!(out, "{:.1}{}", v, unit),
        None => out.try_push_str("N/A").map_err(|_| core::fmt::Error),
    }
}

/// One-line snapshot of every reading, e.g.
/// `Heart: 72 BPM [Normal] | Temp: 24.5C [OK] | Humidity: 55.0% [OK] | BLE: Connected`.
pub fn snapshot_line(
    report: &TickReport,
    connected: bool,
    config: &MonitorConfig,
) -> Result<ArrayString<160>, core::fmt::Error> {
    let mut out = ArrayString::<160>::new();
    let status = HeartStatus::classify(&report.estimate, config);
    out.try_push_str("Heart: ").map_err(|_| core::fmt::Error)?;
    if report.estimate.average_bpm > 0 {
        write!(out, "{} BPM", report.estimate.average_bpm)?;
    } else {
        out.try_push_str("No Signal").map_err(|_| core::fmt::Error)?;
    }
    let heart_label = match status {
        HeartStatus::NoContact | HeartStatus::Acquiring => "Normal",
        other => other.label(),
    };
    write!(out, " [{}] | Temp: ", heart_label)?;
    write_reading(&mut out, report.environment.temperature_c, "C")?;
    write!(out, " [{}] | Humidity: ", if report.alerts.temperature_alert { "HIGH" } else { "OK" })?;
    write_reading(&mut out, report.environment.humidity_pct, "%")?;
    write!(
        out,
        " [{}] | BLE: {}",
        if report.alerts.humidity_alert { "ALERT" } else { "OK" },
        if connected { "Connected" } else { "Waiting" },
    )?;
    Ok(out)
}
