//! Rolling heart-rate estimation from detected beats.
//!
//! Each confirmed beat yields an instantaneous rate from the time since the
//! previous beat. Plausible rates go into a small ring of byte-sized slots and
//! the displayed average is the truncated mean of the filled slots.

use crate::peak_detector::BeatDetector;
use crate::timestamp::Timestamp;

pub const RATE_SIZE: usize = 4;
const MIN_ACCEPTED_BPM: f32 = 20.0; // Exclusive.
const MAX_ACCEPTED_BPM: f32 = 255.0; // Exclusive.

/// One raw reading from the optical pulse sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseSample {
    pub timestamp: Timestamp,
    pub intensity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeatEstimate {
    pub instantaneous_bpm: f32,
    pub average_bpm: u16,
    pub contact_detected: bool,
}

/// Fixed ring of accepted BPM values, overwritten oldest-first.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateBuffer {
    rates: [u8; RATE_SIZE],
    next_slot: usize,
    filled: usize,
}

impl RateBuffer {
    pub fn push(&mut self, bpm: u8) {
        self.rates[self.next_slot] = bpm;
        self.next_slot = (self.next_slot + 1) % RATE_SIZE;
        if self.filled < RATE_SIZE {
            self.filled += 1;
        }
    }

    /// Truncated integer mean of the filled slots, 0 when empty.
    pub fn average(&self) -> u16 {
        if self.filled == 0 {
            return 0;
        }
        let sum: u16 = self.rates.iter().map(|&r| u16::from(r)).sum();
        sum / self.filled as u16
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }
}

pub struct HeartRateMonitor<D> {
    detector: D,
    contact_threshold: u32,
    last_beat: Timestamp, // Starts at boot, as if a beat happened then.
    rates: RateBuffer,
    estimate: BeatEstimate,
}

impl<D: BeatDetector> HeartRateMonitor<D> {
    pub fn new(detector: D, contact_threshold: u32) -> Self {
        Self {
            detector,
            contact_threshold,
            last_beat: Timestamp::default(),
            rates: RateBuffer::default(),
            estimate: BeatEstimate::default(),
        }
    }

    /// Feed one raw sample; call on every tick.
    pub fn observe(&mut self, sample: PulseSample) -> BeatEstimate {
        if self.detector.check_for_beat(sample.intensity) {
            let delta_ms = sample.timestamp.millis_since(self.last_beat);
            self.last_beat = sample.timestamp;

            if delta_ms > 0 {
                let bpm = 60.0 / (delta_ms as f32 / 1000.0);
                self.estimate.instantaneous_bpm = bpm;
                if bpm > MIN_ACCEPTED_BPM && bpm < MAX_ACCEPTED_BPM {
                    self.rates.push(bpm as u8);
                    self.estimate.average_bpm = self.rates.average();
                }
            }
        }

        // The ring is left alone, only the reported average drops.
        if sample.intensity < self.contact_threshold {
            self.estimate.average_bpm = 0;
            self.estimate.contact_detected = false;
        } else {
            self.estimate.contact_detected = true;
        }

        self.estimate
    }

    pub fn estimate(&self) -> BeatEstimate {
        self.estimate
    }

    pub fn rates(&self) -> &RateBuffer {
        &self.rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Reports a beat on exactly the samples it was told to.
    struct ScriptedDetector {
        beat_next: bool,
    }

    impl BeatDetector for ScriptedDetector {
        fn check_for_beat(&mut self, _sample: u32) -> bool {
            core::mem::take(&mut self.beat_next)
        }
    }

    const ON_SKIN: u32 = 90_000;

    fn monitor() -> HeartRateMonitor<ScriptedDetector> {
        HeartRateMonitor::new(ScriptedDetector { beat_next: false }, 50_000)
    }

    fn beat_at(hr: &mut HeartRateMonitor<ScriptedDetector>, millis: u64, intensity: u32) -> BeatEstimate {
        hr.detector.beat_next = true;
        hr.observe(PulseSample { timestamp: Timestamp::from_millis(millis), intensity })
    }

    #[test]
    fn test_one_second_beats_average_sixty() {
        let mut hr = monitor();
        assert!(hr.rates().is_empty());
        for second in 1..=4 {
            let estimate = beat_at(&mut hr, second * 1000, ON_SKIN);
            assert!((estimate.instantaneous_bpm - 60.0).abs() < 0.01);
            assert_eq!(estimate.average_bpm, 60);
            assert!(estimate.contact_detected);
        }
        assert_eq!(hr.rates().len(), 4);
    }

    #[test]
    fn test_average_uses_filled_slots_only() {
        let mut hr = monitor();
        beat_at(&mut hr, 1000, ON_SKIN); // 60
        let estimate = beat_at(&mut hr, 1750, ON_SKIN); // 80
        assert_eq!(estimate.average_bpm, 70);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut hr = monitor();
        // 60, 60, 60, 60, then 120 pushes out the first 60.
        for second in 1..=4 {
            beat_at(&mut hr, second * 1000, ON_SKIN);
        }
        let estimate = beat_at(&mut hr, 4500, ON_SKIN);
        assert_eq!(estimate.average_bpm, (60 + 60 + 60 + 120) / 4);
    }

    #[test]
    fn test_implausible_rates_are_rejected() {
        let mut hr = monitor();
        beat_at(&mut hr, 1000, ON_SKIN); // 60, accepted.

        // 4 s gap: 15 BPM, rejected but still resets the beat clock.
        let estimate = beat_at(&mut hr, 5000, ON_SKIN);
        assert!((estimate.instantaneous_bpm - 15.0).abs() < 0.01);
        assert_eq!(estimate.average_bpm, 60);

        // 200 ms gap: 300 BPM, a double-counted beat.
        let estimate = beat_at(&mut hr, 5200, ON_SKIN);
        assert!(estimate.instantaneous_bpm > 255.0);
        assert_eq!(estimate.average_bpm, 60);

        // Exactly 3 s is 20 BPM, which sits on the excluded edge.
        let estimate = beat_at(&mut hr, 8200, ON_SKIN);
        assert_eq!(estimate.average_bpm, 60);
        assert_eq!(hr.rates().len(), 1);
    }

    #[test]
    fn test_same_instant_beat_is_ignored() {
        let mut hr = monitor();
        beat_at(&mut hr, 1000, ON_SKIN);
        let estimate = beat_at(&mut hr, 1000, ON_SKIN);
        assert_eq!(estimate.average_bpm, 60);
        assert!((estimate.instantaneous_bpm - 60.0).abs() < 0.01);
        assert_eq!(hr.rates().len(), 1);
    }

    #[test]
    fn test_contact_loss_zeroes_average_but_keeps_ring() {
        let mut hr = monitor();
        for second in 1..=4 {
            beat_at(&mut hr, second * 1000, ON_SKIN);
        }

        let estimate = hr.observe(PulseSample { timestamp: Timestamp::from_millis(4050), intensity: 10_000 });
        assert_eq!(estimate.average_bpm, 0);
        assert!(!estimate.contact_detected);
        assert_eq!(hr.rates().len(), 4);

        // Contact again, no beat yet: the average stays at 0.
        let estimate = hr.observe(PulseSample { timestamp: Timestamp::from_millis(4100), intensity: ON_SKIN });
        assert!(estimate.contact_detected);
        assert_eq!(estimate.average_bpm, 0);

        // The next accepted beat brings the old slots back into the mean.
        let estimate = beat_at(&mut hr, 5000, ON_SKIN);
        assert_eq!(estimate.average_bpm, 60);
    }

    #[test]
    fn test_beat_without_contact_reports_zero() {
        let mut hr = monitor();
        let estimate = beat_at(&mut hr, 1000, 49_999);
        assert_eq!(estimate.average_bpm, 0);
        assert!(!estimate.contact_detected);
        // The beat itself was still accepted into the ring.
        assert_eq!(hr.rates().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_average_is_mean_of_last_accepted(intervals in proptest::collection::vec(100u64..5000, 1..40)) {
            let mut hr = monitor();
            let mut now = 0;
            let mut accepted: Vec<u8> = Vec::new();
            for interval in intervals {
                now += interval;
                let estimate = beat_at(&mut hr, now, ON_SKIN);
                let bpm = 60.0 / (interval as f32 / 1000.0);
                if bpm > 20.0 && bpm < 255.0 {
                    accepted.push(bpm as u8);
                }
                let window = &accepted[accepted.len().saturating_sub(RATE_SIZE)..];
                if !window.is_empty() {
                    let expected = window.iter().map(|&r| u16::from(r)).sum::<u16>() / window.len() as u16;
                    prop_assert_eq!(estimate.average_bpm, expected);
                    prop_assert!(window.iter().all(|&r| r > 20));
                }
            }
        }

        #[test]
        fn prop_contact_loss_always_zero(intervals in proptest::collection::vec(300u64..3000, 0..10), dark in 0u32..50_000) {
            let mut hr = monitor();
            let mut now = 0;
            for interval in intervals {
                now += interval;
                beat_at(&mut hr, now, ON_SKIN);
            }
            let estimate = hr.observe(PulseSample { timestamp: Timestamp::from_millis(now + 50), intensity: dark });
            prop_assert_eq!(estimate.average_bpm, 0);
            prop_assert!(!estimate.contact_detected);
        }
    }
}
