//! Audible feedback: the routine pattern after each telemetry send and the
//! rate-limited critical pattern. The scheduler owns the buzzer, so a pattern
//! has the output to itself from its first pulse to its final silence.

use embedded_hal_async::delay::DelayNs;

use crate::timestamp::Timestamp;

/// Drives the audible output.
pub trait Buzzer {
    /// Start a tone; it keeps sounding until `silence` unless the hardware
    /// times it out after `duration_ms` itself.
    fn play_tone(&mut self, frequency_hz: u32, duration_ms: u32);
    fn silence(&mut self);
}

/// A fixed sequence of identical pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TonePattern {
    pub frequency_hz: u32,
    pub tone_ms: u32,
    pub pause_ms: u32, // Held after the tone, before silencing.
    pub gap_ms: u32, // Between pulses, not after the last one.
    pub count: u8,
}

impl TonePattern {
    /// Total time a full run of the pattern holds the output.
    pub fn duration_ms(&self) -> u32 {
        let pulses = u32::from(self.count);
        pulses * (self.tone_ms + self.pause_ms) + pulses.saturating_sub(1) * self.gap_ms
    }

    async fn play<B: Buzzer, D: DelayNs>(&self, buzzer: &mut B, delay: &mut D) {
        for pulse in 1..=self.count {
            buzzer.play_tone(self.frequency_hz, self.tone_ms);
            delay.delay_ms(self.tone_ms + self.pause_ms).await;
            buzzer.silence();
            if pulse < self.count {
                delay.delay_ms(self.gap_ms).await;
            }
        }
        buzzer.silence();
    }
}

/// Which patterns one `run` played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Played {
    pub critical: bool,
    pub routine: bool,
}

pub struct FeedbackScheduler<B> {
    buzzer: B,
    routine: TonePattern,
    critical: TonePattern,
    critical_cooldown_ms: u64,
    pending_routine: bool,
    pending_critical: bool,
    last_critical: Timestamp, // Boot counts as a firing.
}

impl<B: Buzzer> FeedbackScheduler<B> {
    pub fn new(buzzer: B, routine: TonePattern, critical: TonePattern, critical_cooldown_ms: u64) -> Self {
        Self {
            buzzer,
            routine,
            critical,
            critical_cooldown_ms,
            pending_routine: false,
            pending_critical: false,
            last_critical: Timestamp::default(),
        }
    }

    /// Queue the critical pattern if the cooldown allows it. Accepting the
    /// request restarts the cooldown.
    pub fn request_critical(&mut self, now: Timestamp) -> bool {
        if !now.has_elapsed(Some(self.last_critical), self.critical_cooldown_ms) {
            return false;
        }
        self.pending_critical = true;
        self.last_critical = now;
        true
    }

    pub fn request_routine(&mut self) {
        self.pending_routine = true;
    }

    pub fn clear_pending(&mut self) {
        self.pending_routine = false;
        self.pending_critical = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending_routine || self.pending_critical
    }

    /// Play what is pending, critical first, each to completion.
    pub async fn run<D: DelayNs>(&mut self, delay: &mut D) -> Played {
        let mut played = Played::default();
        if self.pending_critical {
            self.pending_critical = false;
            self.critical.play(&mut self.buzzer, delay).await;
            played.critical = true;
        }
        if self.pending_routine {
            self.pending_routine = false;
            self.routine.play(&mut self.buzzer, delay).await;
            played.routine = true;
        }
        played
    }

    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }
}
