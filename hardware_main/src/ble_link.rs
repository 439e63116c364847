//! HM-10 BLE module on a UART. The module forwards whatever it receives on
//! its serial input to the connected central, and its STATE pin is high while
//! a central is connected.

use embassy_stm32::mode::Async;
use embassy_stm32::usart::UartTx;
use embassy_time::{Duration, Timer};

use monitor_logic::monitor::Transport;

pub const BAUD_RATE: u32 = 9600;
const RESET_COMMAND: &[u8] = b"AT+RESET"; // Restarts the module, which resumes advertising.
const RESET_TIME: Duration = Duration::from_millis(100);

pub struct BleLink {
    tx: UartTx<'static, Async>,
}

impl BleLink {
    pub fn new(tx: UartTx<'static, Async>) -> Self {
        Self { tx }
    }
}

impl Transport for BleLink {
    async fn send(&mut self, payload: &[u8]) {
        if self.tx.write(payload).await.is_err() || self.tx.write(b"\n").await.is_err() {
            warn!("BLE telemetry write failed");
        }
    }

    async fn restart_advertising(&mut self) {
        if self.tx.write(RESET_COMMAND).await.is_err() {
            warn!("BLE reset command failed");
            return;
        }
        Timer::after(RESET_TIME).await;
        info!("Advertising restarted");
    }
}
