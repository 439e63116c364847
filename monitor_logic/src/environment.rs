//! Ambient temperature and humidity with last-good-value hold.

/// One raw read from the temperature/humidity sensor. `None` marks a field
/// the sensor failed to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvironmentSample {
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
}

impl EnvironmentSample {
    pub const INVALID: EnvironmentSample = EnvironmentSample { temperature_c: None, humidity_pct: None };
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvironmentReading {
    pub temperature_c: Option<f32>, // None until the first valid read.
    pub humidity_pct: Option<f32>, // None until the first valid read.
}

impl EnvironmentReading {
    /// Take each valid field of the sample, keep the previous value otherwise.
    pub fn update(&mut self, sample: EnvironmentSample) {
        if let Some(t) = sample.temperature_c.filter(|t| t.is_finite()) {
            self.temperature_c = Some(t);
        }
        if let Some(h) = sample.humidity_pct.filter(|h| h.is_finite()) {
            self.humidity_pct = Some(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let env = EnvironmentReading::default();
        assert_eq!(env.temperature_c, None);
        assert_eq!(env.humidity_pct, None);
    }

    #[test]
    fn test_fields_update_independently() {
        let mut env = EnvironmentReading::default();
        env.update(EnvironmentSample { temperature_c: Some(24.5), humidity_pct: None });
        assert_eq!(env.temperature_c, Some(24.5));
        assert_eq!(env.humidity_pct, None);

        env.update(EnvironmentSample { temperature_c: None, humidity_pct: Some(55.0) });
        assert_eq!(env.temperature_c, Some(24.5));
        assert_eq!(env.humidity_pct, Some(55.0));
    }

    #[test]
    fn test_invalid_read_holds_last_good_value() {
        let mut env = EnvironmentReading::default();
        env.update(EnvironmentSample { temperature_c: Some(31.0), humidity_pct: Some(70.0) });
        env.update(EnvironmentSample::INVALID);
        env.update(EnvironmentSample { temperature_c: Some(f32::NAN), humidity_pct: Some(f32::INFINITY) });
        assert_eq!(env.temperature_c, Some(31.0));
        assert_eq!(env.humidity_pct, Some(70.0));
    }
}
