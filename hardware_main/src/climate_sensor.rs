//! DHT11 temperature and humidity sensor on a single open-drain data line.
//!
//! The start signal is timed with the embassy timer. The 40 response bits are
//! too short for the 32.768 kHz tick, so they are timed against the DWT cycle
//! counter with interrupts masked.

use cortex_m::peripheral::DWT;
use embassy_stm32::gpio::{Flex, Speed};
use embassy_time::{Duration, Timer};

use monitor_logic::environment::EnvironmentSample;

const START_LOW: Duration = Duration::from_millis(20); // Host pulls low for at least 18 ms.
const CYCLES_PER_US: u32 = 48; // HCLK is 48 MHz.
const EDGE_TIMEOUT_US: u32 = 100;
const ONE_THRESHOLD_US: u32 = 40; // A high phase of ~26 us is a 0, ~70 us is a 1.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DhtError {
    Timeout,
    Checksum,
}

pub struct ClimateSensor {
    pin: Flex<'static>,
}

impl ClimateSensor {
    /// The DWT cycle counter must already be running.
    pub fn new(mut pin: Flex<'static>) -> Self {
        pin.set_high();
        pin.set_as_input_output(Speed::Low);
        Self { pin }
    }

    pub async fn read(&mut self) -> Result<EnvironmentSample, DhtError> {
        self.pin.set_low();
        Timer::after(START_LOW).await;
        self.pin.set_high();

        let frame = cortex_m::interrupt::free(|_| self.read_frame())?;
        let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if sum != frame[4] {
            return Err(DhtError::Checksum);
        }

        // DHT11 sends whole units in the first byte and tenths in the second.
        let humidity = f32::from(frame[0]) + f32::from(frame[1]) * 0.1;
        let magnitude = f32::from(frame[2]) + f32::from(frame[3] & 0x7F) * 0.1;
        let temperature = if frame[3] & 0x80 != 0 { -magnitude } else { magnitude };
        Ok(EnvironmentSample { temperature_c: Some(temperature), humidity_pct: Some(humidity) })
    }

    fn read_frame(&mut self) -> Result<[u8; 5], DhtError> {
        // Response: 80 us low, 80 us high, then the first bit's low phase.
        self.wait_for(false)?;
        self.wait_for(true)?;
        self.wait_for(false)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.wait_for(true)?;
            let high_us = self.wait_for(false)?;
            if high_us > ONE_THRESHOLD_US {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
        Ok(frame)
    }

    /// Spin until the line reaches `level`, returning the microseconds waited.
    fn wait_for(&self, level: bool) -> Result<u32, DhtError> {
        let start = DWT::cycle_count();
        loop {
            let elapsed_us = DWT::cycle_count().wrapping_sub(start) / CYCLES_PER_US;
            if self.pin.is_high() == level {
                return Ok(elapsed_us);
            }
            if elapsed_us > EDGE_TIMEOUT_US {
                return Err(DhtError::Timeout);
            }
        }
    }
}
