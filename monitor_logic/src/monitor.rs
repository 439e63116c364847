//! The main cycle: one `tick` samples the pulse sensor, refreshes the
//! environment on its own interval, evaluates alerts, sends telemetry to a
//! connected peer, plays any pending feedback, and handles link edges, in that
//! order.

use embedded_hal_async::delay::DelayNs;

use crate::alerts::{AlertEvaluator, AlertState};
use crate::config::MonitorConfig;
use crate::environment::{EnvironmentReading, EnvironmentSample};
use crate::feedback::{Buzzer, FeedbackScheduler, Played};
use crate::heart_rate::{BeatEstimate, HeartRateMonitor, PulseSample};
use crate::peak_detector::BeatDetector;
use crate::telemetry::{Payload, TelemetryError, TelemetryRecord};
use crate::timestamp::{Timestamp, TimestampError};

/// The pulse and environment sensors.
#[allow(async_fn_in_trait)]
pub trait Sensors {
    async fn read_pulse_intensity(&mut self) -> u32;
    async fn read_environment(&mut self) -> EnvironmentSample;
}

/// The wireless link to the single peer.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Fire-and-forget delivery to the connected peer.
    async fn send(&mut self, payload: &[u8]);
    async fn restart_advertising(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionState {
    pub connected: bool,
    pub previous_connected: bool, // As of the end of the last tick.
}

/// Everything one tick observed and did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub now: Timestamp,
    pub intensity: u32,
    pub estimate: BeatEstimate,
    pub alerts: AlertState,
    pub critical: bool, // The critical condition holds this tick.
    pub critical_requested: bool, // And the cooldown let it through.
    pub environment_read: Option<EnvironmentSample>,
    pub environment: EnvironmentReading,
    pub telemetry: Option<Result<Payload, TelemetryError>>,
    pub played: Played,
    pub link_established: bool,
    pub link_dropped: bool,
    pub heart_rate_display_due: bool,
    pub diagnostics_due: bool,
}

pub struct Monitor<D, B> {
    config: MonitorConfig,
    heart: HeartRateMonitor<D>,
    evaluator: AlertEvaluator,
    environment: EnvironmentReading,
    alerts: AlertState,
    feedback: FeedbackScheduler<B>,
    link: ConnectionState,
    dropped_since_tick: bool, // A Disconnected event arrived since the last tick.
    last_tick: Option<Timestamp>,
    last_environment_read: Timestamp, // Starts at boot, so the first read waits one interval.
    last_heart_rate_display: Option<Timestamp>,
    last_diagnostics: Option<Timestamp>,
    last_telemetry: Option<Timestamp>, // None also after a (re)connect, to send at once.
}

impl<D: BeatDetector, B: Buzzer> Monitor<D, B> {
    pub fn new(config: MonitorConfig, detector: D, buzzer: B) -> Self {
        Self {
            config,
            heart: HeartRateMonitor::new(detector, config.contact_threshold),
            evaluator: AlertEvaluator::new(config),
            environment: EnvironmentReading::default(),
            alerts: AlertState::default(),
            feedback: FeedbackScheduler::new(
                buzzer,
                config.routine_pattern,
                config.critical_pattern,
                config.critical_cooldown_ms,
            ),
            link: ConnectionState::default(),
            dropped_since_tick: false,
            last_tick: None,
            last_environment_read: Timestamp::default(),
            last_heart_rate_display: None,
            last_diagnostics: None,
            last_telemetry: None,
        }
    }

    /// Apply a connection change reported by the transport.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                self.link.connected = true;
                self.last_telemetry = None;
            }
            LinkEvent::Disconnected => {
                self.link.connected = false;
                self.dropped_since_tick = true;
            }
        }
    }

    /// Run one cycle at `now`. A `now` earlier than the previous tick is
    /// rejected before anything is touched.
    pub async fn tick<S, T, W>(
        &mut self,
        now: Timestamp,
        sensors: &mut S,
        transport: &mut T,
        delay: &mut W,
    ) -> Result<TickReport, TimestampError>
    where
        S: Sensors,
        T: Transport,
        W: DelayNs,
    {
        now.validate_after(self.last_tick)?;
        self.last_tick = Some(now);

        let intensity = sensors.read_pulse_intensity().await;
        let estimate = self.heart.observe(PulseSample { timestamp: now, intensity });

        let environment_read = if now.has_elapsed(Some(self.last_environment_read), self.config.environment_read_interval_ms) {
            let sample = sensors.read_environment().await;
            self.environment.update(sample);
            self.last_environment_read = now;
            Some(sample)
        } else {
            None
        };

        let heart_rate_display_due =
            take_if_due(now, &mut self.last_heart_rate_display, self.config.heart_rate_display_interval_ms);

        let alerts = self.evaluator.evaluate(&estimate, &self.environment, &mut self.alerts);
        let critical = self.evaluator.is_critical(&estimate);
        let critical_requested = critical && self.feedback.request_critical(now);

        let telemetry = if self.link.connected && now.has_elapsed(self.last_telemetry, self.config.telemetry_interval_ms) {
            self.last_telemetry = Some(now);
            let encoded = TelemetryRecord::pack(&estimate, &self.environment, &alerts).encode();
            if let Ok(payload) = &encoded {
                transport.send(payload.as_bytes()).await;
                self.feedback.request_routine();
            }
            Some(encoded)
        } else {
            None
        };

        let played = self.feedback.run(delay).await;

        let (link_established, link_dropped) = self.handle_connection_edges(transport, delay).await;

        let diagnostics_due = take_if_due(now, &mut self.last_diagnostics, self.config.diagnostics_interval_ms);

        Ok(TickReport {
            now,
            intensity,
            estimate,
            alerts,
            critical,
            critical_requested,
            environment_read,
            environment: self.environment,
            telemetry,
            played,
            link_established,
            link_dropped,
            heart_rate_display_due,
            diagnostics_due,
        })
    }

    async fn handle_connection_edges<T: Transport, W: DelayNs>(&mut self, transport: &mut T, delay: &mut W) -> (bool, bool) {
        if core::mem::take(&mut self.dropped_since_tick) {
            self.alerts.reset();
            self.feedback.clear_pending();
        }

        let established = self.link.connected && !self.link.previous_connected;
        let dropped = !self.link.connected && self.link.previous_connected;
        if dropped {
            delay.delay_ms(self.config.readvertise_settle_ms).await;
            transport.restart_advertising().await;
        }
        self.link.previous_connected = self.link.connected;
        (established, dropped)
    }

    pub fn connection(&self) -> ConnectionState {
        self.link
    }

    pub fn alerts(&self) -> AlertState {
        self.alerts
    }

    pub fn environment(&self) -> EnvironmentReading {
        self.environment
    }

    pub fn estimate(&self) -> BeatEstimate {
        self.heart.estimate()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn feedback(&self) -> &FeedbackScheduler<B> {
        &self.feedback
    }
}

fn take_if_due(now: Timestamp, last: &mut Option<Timestamp>, interval_ms: u64) -> bool {
    if now.has_elapsed(*last, interval_ms) {
        *last = Some(now);
        true
    } else {
        false
    }
}
