//! This module contains the alert logic for heart rate, humidity and
//! temperature, plus the separate critical low heart rate condition.
//!
//! Heart rate and humidity alerts follow the current readings directly. The
//! temperature alert only fires after several out-of-band evaluations in a
//! row, so one noisy reading cannot raise it.

use crate::config::MonitorConfig;
use crate::environment::EnvironmentReading;
use crate::heart_rate::BeatEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlertState {
    pub heart_alert: bool,
    pub humidity_alert: bool,
    pub temperature_alert: bool,
    pub consecutive_high_temp_count: u8, // The only value carried between evaluations.
}

impl AlertState {
    /// Back to rest: no alerts, debounce counter cleared.
    pub fn reset(&mut self) {
        self.heart_alert = false;
        self.humidity_alert = false;
        self.temperature_alert = false;
        self.consecutive_high_temp_count = 0;
    }

    pub fn any(&self) -> bool {
        self.heart_alert || self.humidity_alert || self.temperature_alert
    }
}

pub struct AlertEvaluator {
    config: MonitorConfig,
}

impl AlertEvaluator {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Recompute every alert flag from the latest readings.
    pub fn evaluate(&self, estimate: &BeatEstimate, env: &EnvironmentReading, state: &mut AlertState) -> AlertState {
        state.heart_alert = self.heart_alert(estimate.average_bpm);
        state.humidity_alert = self.humidity_alert(env.humidity_pct);
        self.debounce_temperature(env, state);
        *state
    }

    pub fn heart_alert(&self, average_bpm: u16) -> bool {
        average_bpm > 0
            && (average_bpm < self.config.heart_normal_low || average_bpm > self.config.heart_normal_high)
    }

    pub fn humidity_alert(&self, humidity_pct: Option<f32>) -> bool {
        match humidity_pct {
            Some(h) => h < self.config.humidity_low || h > self.config.humidity_high,
            None => false,
        }
    }

    /// True when a detected pulse is dangerously slow.
    pub fn is_critical(&self, estimate: &BeatEstimate) -> bool {
        estimate.contact_detected
            && estimate.average_bpm > 0
            && estimate.average_bpm < self.config.heart_critical_low
    }

    fn debounce_temperature(&self, env: &EnvironmentReading, state: &mut AlertState) {
        // Counts every evaluation with a known temperature, held values included.
        if let Some(t) = env.temperature_c {
            if self.config.temperature_limit.is_out_of_band(t) {
                state.consecutive_high_temp_count = state.consecutive_high_temp_count.saturating_add(1);
            } else {
                state.consecutive_high_temp_count = 0;
            }
        }
        state.temperature_alert = state.consecutive_high_temp_count >= self.config.consecutive_temp_required;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentSample;

    fn evaluator() -> AlertEvaluator {
        AlertEvaluator::new(MonitorConfig::default())
    }

    fn estimate(average_bpm: u16) -> BeatEstimate {
        BeatEstimate { instantaneous_bpm: average_bpm as f32, average_bpm, contact_detected: true }
    }

    fn read_temperature(env: &mut EnvironmentReading, celsius: f32) {
        env.update(EnvironmentSample { temperature_c: Some(celsius), humidity_pct: Some(55.0) });
    }

    #[test]
    fn test_heart_alert_band() {
        let eval = evaluator();
        assert!(!eval.heart_alert(0));
        assert!(eval.heart_alert(1));
        assert!(eval.heart_alert(59));
        assert!(!eval.heart_alert(60));
        assert!(!eval.heart_alert(100));
        assert!(eval.heart_alert(101));
    }

    #[test]
    fn test_humidity_alert_band() {
        let eval = evaluator();
        assert!(!eval.humidity_alert(None));
        assert!(eval.humidity_alert(Some(49.9)));
        assert!(!eval.humidity_alert(Some(50.0)));
        assert!(!eval.humidity_alert(Some(65.0)));
        assert!(eval.humidity_alert(Some(65.1)));
    }

    #[test]
    fn test_critical_needs_contact_and_signal() {
        let eval = evaluator();
        assert!(eval.is_critical(&estimate(45)));
        assert!(!eval.is_critical(&estimate(50)));
        assert!(!eval.is_critical(&estimate(0)));
        let no_contact = BeatEstimate { contact_detected: false, ..estimate(45) };
        assert!(!eval.is_critical(&no_contact));
    }

    #[test]
    fn test_temperature_needs_five_in_a_row() {
        let eval = evaluator();
        let mut env = EnvironmentReading::default();
        let mut state = AlertState::default();

        for _ in 0..4 {
            read_temperature(&mut env, 32.0);
            assert!(!eval.evaluate(&estimate(70), &env, &mut state).temperature_alert);
        }
        assert_eq!(state.consecutive_high_temp_count, 4);

        // One in-band read resets the run.
        read_temperature(&mut env, 25.0);
        assert!(!eval.evaluate(&estimate(70), &env, &mut state).temperature_alert);
        assert_eq!(state.consecutive_high_temp_count, 0);

        for read in 1..=5 {
            read_temperature(&mut env, 32.0);
            let alerts = eval.evaluate(&estimate(70), &env, &mut state);
            assert_eq!(alerts.temperature_alert, read == 5, "read {}", read);
        }

        // Still alerting while out of band.
        read_temperature(&mut env, 33.0);
        assert!(eval.evaluate(&estimate(70), &env, &mut state).temperature_alert);
    }

    #[test]
    fn test_held_temperature_counts_every_evaluation() {
        let eval = evaluator();
        let mut env = EnvironmentReading::default();
        let mut state = AlertState::default();

        // One read, then evaluations against the held value.
        read_temperature(&mut env, 32.0);
        for tick in 1..=5 {
            let alerts = eval.evaluate(&estimate(70), &env, &mut state);
            assert_eq!(alerts.temperature_alert, tick == 5, "tick {}", tick);
        }
        assert_eq!(state.consecutive_high_temp_count, 5);

        // A failed read keeps the held value, which keeps counting.
        env.update(EnvironmentSample::INVALID);
        assert!(eval.evaluate(&estimate(70), &env, &mut state).temperature_alert);
        assert_eq!(state.consecutive_high_temp_count, 6);
    }

    #[test]
    fn test_counter_saturates() {
        let eval = evaluator();
        let mut env = EnvironmentReading::default();
        let mut state = AlertState::default();
        read_temperature(&mut env, 40.0);
        for _ in 0..300 {
            eval.evaluate(&estimate(70), &env, &mut state);
        }
        assert_eq!(state.consecutive_high_temp_count, u8::MAX);
        assert!(state.temperature_alert);
    }

    #[test]
    fn test_unknown_temperature_never_alerts() {
        let eval = evaluator();
        let env = EnvironmentReading::default();
        let mut state = AlertState::default();
        let alerts = eval.evaluate(&estimate(0), &env, &mut state);
        assert!(!alerts.any());
    }

    #[test]
    fn test_reset_returns_to_rest() {
        let eval = evaluator();
        let mut env = EnvironmentReading::default();
        let mut state = AlertState::default();
        for _ in 0..6 {
            env.update(EnvironmentSample { temperature_c: Some(35.0), humidity_pct: Some(80.0) });
            eval.evaluate(&estimate(120), &env, &mut state);
        }
        assert!(state.heart_alert && state.humidity_alert && state.temperature_alert);

        state.reset();
        assert!(!state.any());
        assert_eq!(state.consecutive_high_temp_count, 0);

        // The held reading starts a new run from one.
        let alerts = eval.evaluate(&estimate(120), &env, &mut state);
        assert_eq!(state.consecutive_high_temp_count, 1);
        assert!(!alerts.temperature_alert);
    }

    #[test]
    fn test_dual_band_temperature() {
        let config = MonitorConfig {
            temperature_limit: crate::config::TemperatureLimit::Outside { low: 18.0, high: 30.0 },
            consecutive_temp_required: 2,
            ..MonitorConfig::default()
        };
        let eval = AlertEvaluator::new(config);
        let mut env = EnvironmentReading::default();
        let mut state = AlertState::default();
        read_temperature(&mut env, 10.0);
        eval.evaluate(&estimate(70), &env, &mut state);
        read_temperature(&mut env, 12.0);
        assert!(eval.evaluate(&estimate(70), &env, &mut state).temperature_alert);
    }
}
