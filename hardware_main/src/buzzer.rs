//! Piezo buzzer driven by a PWM channel at 50% duty.

use embassy_stm32::time::Hertz;
use embassy_stm32::timer::GeneralInstance4Channel;
use embassy_stm32::timer::simple_pwm::SimplePwm;

use monitor_logic::feedback::Buzzer;

pub struct PwmBuzzer<T: GeneralInstance4Channel> {
    pwm: SimplePwm<'static, T>,
}

impl<T: GeneralInstance4Channel> PwmBuzzer<T> {
    pub fn new(mut pwm: SimplePwm<'static, T>) -> Self {
        pwm.ch1().disable();
        Self { pwm }
    }
}

impl<T: GeneralInstance4Channel> Buzzer for PwmBuzzer<T> {
    // The scheduler times the tone, so the duration is not needed here.
    fn play_tone(&mut self, frequency_hz: u32, _duration_ms: u32) {
        self.pwm.set_frequency(Hertz(frequency_hz));
        let mut ch = self.pwm.ch1();
        ch.set_duty_cycle_percent(50);
        ch.enable();
    }

    fn silence(&mut self) {
        self.pwm.ch1().disable();
    }
}
