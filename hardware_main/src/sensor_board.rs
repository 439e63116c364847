//! Both sensors behind the `Sensors` trait. A failed read is logged and
//! reported the way the monitor expects: no light for the pulse sensor, an
//! invalid sample for the climate sensor.

use monitor_logic::environment::EnvironmentSample;
use monitor_logic::monitor::Sensors;

use crate::climate_sensor::ClimateSensor;
use crate::pulse_sensor::PulseSensor;

pub struct SensorBoard<I2C> {
    pulse: PulseSensor<I2C>,
    climate: ClimateSensor,
}

impl<I2C> SensorBoard<I2C> {
    pub fn new(pulse: PulseSensor<I2C>, climate: ClimateSensor) -> Self {
        Self { pulse, climate }
    }
}

impl<I2C> Sensors for SensorBoard<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    async fn read_pulse_intensity(&mut self) -> u32 {
        match self.pulse.read_ir().await {
            Ok(ir) => ir,
            Err(_) => {
                warn!("Failed to read from pulse sensor");
                0
            }
        }
    }

    async fn read_environment(&mut self) -> EnvironmentSample {
        match self.climate.read().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Failed to read DHT11: {}", e);
                EnvironmentSample::INVALID
            }
        }
    }
}
