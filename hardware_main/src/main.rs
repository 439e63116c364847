#![no_std]
#![no_main]

#[macro_use]
mod fmt;
mod ble_link;
mod buzzer;
mod climate_sensor;
mod pulse_sensor;
mod sensor_board;

// External libraries
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_stm32::{bind_interrupts, exti::ExtiInput, peripherals};
use embassy_stm32::{gpio::{Flex, OutputType, Pull}, i2c::{ErrorInterruptHandler, EventInterruptHandler, I2c}, time::Hertz, Config};
use embassy_stm32::timer::{low_level::CountingMode, simple_pwm::{PwmPin, SimplePwm}};
use embassy_stm32::usart::{self, UartTx};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Sender};
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
#[cfg(not(feature = "defmt"))]
use panic_halt as _;

// Internal modules, both this crate and the logic crate.
use monitor_logic::config::{MonitorConfig, TICK_PERIOD_MS};
use monitor_logic::diagnostics::{alert_summary, snapshot_line, HeartStatus};
use monitor_logic::monitor::{LinkEvent, Monitor, TickReport};
use monitor_logic::peak_detector::PeakDetector;
use monitor_logic::timestamp::Timestamp;
use ble_link::{BleLink, BAUD_RATE};
use buzzer::PwmBuzzer;
use climate_sensor::ClimateSensor;
use pulse_sensor::{PulseSensor, PULSE_ADDRESS};
use sensor_board::SensorBoard;

// Link state changes from the STATE pin task to the main loop.
static CHANNEL: Channel<ThreadModeRawMutex, LinkEvent, 8> = Channel::new();

const STATE_DEBOUNCE: Duration = Duration::from_millis(20);
const STATE_RESYNC: Duration = Duration::from_secs(1); // Re-read the pin even without an edge.

bind_interrupts!(struct Irqs {
    I2C1_EV => EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => ErrorInterruptHandler<peripherals::I2C1>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // The DHT11 bit timing runs off the cycle counter.
    let mut cp = unwrap!(cortex_m::Peripherals::take());
    cp.DCB.enable_trace();
    cp.DWT.enable_cycle_counter();

    // Chip peripheral configuration
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        use embassy_stm32::rcc::mux::I2c1sel;

        config.rcc.msi = Some(MSIRange::RANGE4M); // Multi-speed Osc. = 4 MHz

        // PLL creates 48 MHz at its output (PLLCLK).
        config.rcc.pll = Some(Pll {
            source: PllSource::MSI,
            prediv: PllPreDiv::DIV1,
            mul: PllMul::MUL24,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2), // for sysclk of 48 MHz
        });

        // Clock busses
        config.rcc.sys = Sysclk::PLL1_R; // 48 MHz
        config.rcc.ahb_pre = AHBPrescaler::DIV1; // HCLK = 48 MHz, see climate_sensor::CYCLES_PER_US
        config.rcc.apb1_pre = APBPrescaler::DIV1;
        config.rcc.apb2_pre = APBPrescaler::DIV1;

        config.rcc.mux.i2c1sel = I2c1sel::PCLK1;
    }
    let p = embassy_stm32::init(config);

    // Pulse sensor on I2C1.
    let i2c = I2c::new(
        p.I2C1,
        p.PB6,
        p.PB7,
        Irqs,
        p.DMA1_CH6,
        p.DMA1_CH7,
        Hertz(400_000),
        Default::default(),
    );
    let mut pulse = PulseSensor::new(i2c, PULSE_ADDRESS);
    unwrap!(pulse.init().await);
    info!("MAX30102 ready");
    let climate = ClimateSensor::new(Flex::new(p.PA1));
    let mut sensors = SensorBoard::new(pulse, climate);

    // Buzzer on TIM2 CH1.
    let buzzer_pin = PwmPin::new_ch1(p.PA0, OutputType::PushPull);
    let pwm = SimplePwm::new(p.TIM2, Some(buzzer_pin), None, None, None, Hertz(4_000), CountingMode::EdgeAlignedUp);

    // HM-10 on USART1, STATE pin on PB5.
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = BAUD_RATE;
    let tx = unwrap!(UartTx::new(p.USART1, p.PA9, p.DMA1_CH4, uart_config));
    let mut link = BleLink::new(tx);
    let state = ExtiInput::new(p.PB5, p.EXTI5, Pull::Down);

    let mut monitor = Monitor::new(MonitorConfig::default(), PeakDetector::new(), PwmBuzzer::new(pwm));

    unwrap!(spawner.spawn(link_state(state, CHANNEL.sender())));

    warn!("Starting main loop");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));
    loop {
        while let Ok(event) = CHANNEL.try_receive() {
            monitor.handle_link_event(event);
        }

        let now = Timestamp::from_millis(Instant::now().as_millis());
        match monitor.tick(now, &mut sensors, &mut link, &mut Delay).await {
            Ok(report) => log_report(&report, monitor.connection().connected, monitor.config()),
            Err(e) => warn!("Tick skipped: {}", e),
        }

        ticker.next().await;
    }
}

fn log_report(report: &TickReport, connected: bool, config: &MonitorConfig) {
    if report.link_established {
        info!(">>> BLE client connected <<<");
    }
    if report.link_dropped {
        info!(">>> BLE client disconnected, advertising again <<<");
    }

    if let Some(sample) = report.environment_read {
        if sample.temperature_c.is_none() || sample.humidity_pct.is_none() {
            warn!("Climate read invalid, keeping last values");
        }
    }

    match report.telemetry {
        Some(Ok(payload)) => {
            info!("Telemetry sent: {=str}", payload.as_str());
            info!("Alerts: {=str}", alert_summary(&report.alerts, report.estimate.average_bpm, config).as_str());
        }
        Some(Err(e)) => warn!("Telemetry not sent: {}", e),
        None => {}
    }

    if report.critical_requested {
        warn!("CRITICAL: heart rate {} BPM", report.estimate.average_bpm);
    }
    if report.played.critical {
        info!("Critical pattern played");
    }
    if report.played.routine {
        info!("Routine pattern played");
    }

    if report.heart_rate_display_due {
        match HeartStatus::classify(&report.estimate, config) {
            HeartStatus::NoContact => info!("Heart rate: no finger detected"),
            HeartStatus::Acquiring => info!("Heart rate: acquiring"),
            status => info!("Heart rate: {} BPM [{=str}]", report.estimate.average_bpm, status.label()),
        }
    }

    if report.diagnostics_due {
        match snapshot_line(report, connected, config) {
            Ok(line) => info!("{=str}", line.as_str()),
            Err(_) => warn!("Snapshot line did not fit"),
        }
        info!("Uptime: {=str}", report.now.create_iso8601_str().as_str());
    }
}

/// Watches the HM-10 STATE pin. The module must be set to `AT+PIO11` so the
/// pin stays low while advertising instead of blinking.
#[embassy_executor::task]
async fn link_state(mut state: ExtiInput<'static>, msg: Sender<'static, ThreadModeRawMutex, LinkEvent, 8>) {
    let mut connected = false;
    loop {
        let now_connected = state.is_high();
        if now_connected != connected {
            connected = now_connected;
            let event = if connected { LinkEvent::Connected } else { LinkEvent::Disconnected };
            info!("STATE pin: {}", event);
            msg.send(event).await;
        }
        select(state.wait_for_any_edge(), Timer::after(STATE_RESYNC)).await;
        Timer::after(STATE_DEBOUNCE).await;
    }
}
