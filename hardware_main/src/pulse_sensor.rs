//! MAX30102 optical pulse sensor on I2C. Only the IR channel feeds beat
//! detection; the red LED runs at low power so the sensor stays in SpO2 mode.

use embassy_time::{Duration, Timer};

pub const PULSE_ADDRESS: u8 = 0x57;

const REG_FIFO_WR_PTR: u8 = 0x04;
const REG_OVF_COUNTER: u8 = 0x05;
const REG_FIFO_RD_PTR: u8 = 0x06;
const REG_FIFO_DATA: u8 = 0x07;
const REG_FIFO_CONFIG: u8 = 0x08;
const REG_MODE_CONFIG: u8 = 0x09;
const REG_SPO2_CONFIG: u8 = 0x0A;
const REG_LED1_PA: u8 = 0x0C; // Red
const REG_LED2_PA: u8 = 0x0D; // IR
const REG_PART_ID: u8 = 0xFF;

const EXPECTED_PART_ID: u8 = 0x15;
const MODE_RESET: u8 = 0x40;
const MODE_SPO2: u8 = 0x03;
const FIFO_AVERAGE_4_ROLLOVER: u8 = 0x40 | 0x10;
const SPO2_4096NA_400SPS_411US: u8 = 0x20 | 0x0C | 0x03;
const RED_AMPLITUDE: u8 = 0x0A;
const IR_AMPLITUDE: u8 = 0x1F;
const FIFO_DEPTH: u8 = 32;
const SAMPLE_MASK: u32 = 0x3_FFFF; // 18-bit ADC.
const RESET_TIME: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseSensorError<E> {
    Bus(E),
    WrongPart(u8),
}

impl<E> From<E> for PulseSensorError<E> {
    fn from(e: E) -> Self {
        PulseSensorError::Bus(e)
    }
}

pub struct PulseSensor<I2C> {
    i2c: I2C,
    address: u8,
    last_ir: u32, // Returned again when the FIFO has nothing new.
}

impl<I2C> PulseSensor<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address, last_ir: 0 }
    }
}

impl<I2C> PulseSensor<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    /// Reset the part and configure it for continuous sampling.
    pub async fn init(&mut self) -> Result<(), PulseSensorError<I2C::Error>> {
        let part_id = self.read_register(REG_PART_ID).await?;
        if part_id != EXPECTED_PART_ID {
            return Err(PulseSensorError::WrongPart(part_id));
        }

        self.write_register(REG_MODE_CONFIG, MODE_RESET).await?;
        Timer::after(RESET_TIME).await;

        self.write_register(REG_FIFO_CONFIG, FIFO_AVERAGE_4_ROLLOVER).await?;
        self.write_register(REG_MODE_CONFIG, MODE_SPO2).await?;
        self.write_register(REG_SPO2_CONFIG, SPO2_4096NA_400SPS_411US).await?;
        self.write_register(REG_LED1_PA, RED_AMPLITUDE).await?;
        self.write_register(REG_LED2_PA, IR_AMPLITUDE).await?;

        for reg in [REG_FIFO_WR_PTR, REG_OVF_COUNTER, REG_FIFO_RD_PTR] {
            self.write_register(reg, 0).await?;
        }
        Ok(())
    }

    /// Drain the FIFO and return the newest IR reading.
    pub async fn read_ir(&mut self) -> Result<u32, PulseSensorError<I2C::Error>> {
        let write_ptr = self.read_register(REG_FIFO_WR_PTR).await?;
        let read_ptr = self.read_register(REG_FIFO_RD_PTR).await?;
        let available = write_ptr.wrapping_sub(read_ptr) % FIFO_DEPTH;

        let mut sample = [0u8; 6]; // Red then IR, three bytes each.
        for _ in 0..available {
            self.i2c.write_read(self.address, &[REG_FIFO_DATA], &mut sample).await?;
            self.last_ir = u32::from_be_bytes([0, sample[3], sample[4], sample[5]]) & SAMPLE_MASK;
        }
        Ok(self.last_ir)
    }

    async fn read_register(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buf).await?;
        Ok(buf[0])
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg, value]).await
    }
}
