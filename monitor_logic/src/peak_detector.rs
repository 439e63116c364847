//! Beat detection on a raw optical pulse stream.
//!
//! The raw intensity has its DC level removed by a slow running average, is
//! smoothed by a 23-tap symmetric low-pass FIR, and a beat is reported on each
//! rising zero crossing whose preceding cycle had a plausible amplitude.

const FIR_COEFFS: [i64; 12] = [172, 321, 579, 927, 1360, 1858, 2390, 2916, 3391, 3768, 4012, 4096];
const FIR_BUFFER_LEN: usize = 32; // Power of two, indexes are masked.
const FIR_SHIFT: u32 = 15;
const DC_SHIFT: u32 = 15;
const DC_WEIGHT_SHIFT: u32 = 4; // Running average weight of 1/16.
const MIN_BEAT_AMPLITUDE: i64 = 20;
const MAX_BEAT_AMPLITUDE: i64 = 1000;

/// Reports when a new heartbeat edge has been confirmed in a sample stream.
pub trait BeatDetector {
    fn check_for_beat(&mut self, sample: u32) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Half {
    Unknown,
    Rising, // After a rising zero crossing, tracking the maximum.
    Falling, // After a falling zero crossing, tracking the minimum.
}

#[derive(Debug, Clone)]
pub struct PeakDetector {
    dc_register: i64, // DC estimate scaled by 2^15.
    fir_buffer: [i64; FIR_BUFFER_LEN], // Wide enough for any u32 sample and its filtered value.
    fir_offset: usize,
    ac_current: i64,
    ac_previous: i64,
    cycle_max: i64, // Highest filtered value in the current positive half.
    cycle_min: i64, // Lowest filtered value in the current negative half.
    half: Half,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self {
            dc_register: 0,
            fir_buffer: [0; FIR_BUFFER_LEN],
            fir_offset: 0,
            ac_current: 0,
            ac_previous: 0,
            cycle_max: 0,
            cycle_min: 0,
            half: Half::Unknown,
        }
    }
}

impl PeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn estimate_dc(&mut self, sample: u32) -> i64 {
        let scaled = i64::from(sample) << DC_SHIFT;
        self.dc_register += (scaled - self.dc_register) >> DC_WEIGHT_SHIFT;
        self.dc_register >> DC_SHIFT
    }

    fn low_pass(&mut self, input: i64) -> i64 {
        let mask = FIR_BUFFER_LEN - 1;
        let offset = self.fir_offset;
        self.fir_buffer[offset] = input;

        let tap = |back: usize| self.fir_buffer[offset.wrapping_sub(back) & mask];
        let mut acc = FIR_COEFFS[11] * tap(11);
        for (i, coeff) in FIR_COEFFS.iter().take(11).enumerate() {
            acc += coeff * (tap(i) + tap(22 - i));
        }

        self.fir_offset = (offset + 1) & mask;
        acc >> FIR_SHIFT
    }
}

impl BeatDetector for PeakDetector {
    fn check_for_beat(&mut self, sample: u32) -> bool {
        let mut beat = false;
        self.ac_previous = self.ac_current;
        let dc = self.estimate_dc(sample);
        self.ac_current = self.low_pass(i64::from(sample) - dc);

        // Rising zero crossing: the cycle that just ended decides the beat.
        if self.ac_previous < 0 && self.ac_current >= 0 {
            let amplitude = self.cycle_max - self.cycle_min;
            self.half = Half::Rising;
            self.cycle_max = 0;
            beat = amplitude > MIN_BEAT_AMPLITUDE && amplitude < MAX_BEAT_AMPLITUDE;
        }

        if self.ac_previous > 0 && self.ac_current <= 0 {
            self.half = Half::Falling;
            self.cycle_min = 0;
        }

        match self.half {
            Half::Rising if self.ac_current > self.ac_previous => self.cycle_max = self.ac_current,
            Half::Falling if self.ac_current < self.ac_previous => self.cycle_min = self.ac_current,
            _ => {}
        }

        beat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One sample every 50 ms, so 20 samples per second.
    fn pulse_wave(n: usize, period: usize, amplitude: f64) -> u32 {
        let phase = 2.0 * core::f64::consts::PI * n as f64 / period as f64;
        (100_000.0 + amplitude * phase.sin()) as u32
    }

    #[test]
    fn test_flat_signal_has_no_beats() {
        let mut detector = PeakDetector::new();
        for _ in 0..400 {
            assert!(!detector.check_for_beat(100_000));
        }
    }

    #[test]
    fn test_steady_pulse_beats_once_per_period() {
        let mut detector = PeakDetector::new();
        let mut beats = Vec::new();
        for n in 0..400 {
            if detector.check_for_beat(pulse_wave(n, 20, 200.0)) {
                beats.push(n);
            }
        }

        // The DC estimate needs time to settle before any beat is plausible.
        assert!(beats.iter().all(|&n| n > 100), "beats during warm-up: {:?}", beats);
        let settled: Vec<usize> = beats.iter().copied().filter(|&n| n >= 200).collect();
        assert_eq!(settled.len(), 10);
        for pair in settled.windows(2) {
            assert_eq!(pair[1] - pair[0], 20);
        }
    }

    #[test]
    fn test_huge_swing_is_rejected() {
        // A step onto the sensor produces one enormous excursion, never a beat.
        let mut detector = PeakDetector::new();
        for _ in 0..200 {
            assert!(!detector.check_for_beat(1_000));
        }
        for _ in 0..40 {
            assert!(!detector.check_for_beat(120_000));
        }
    }

    #[test]
    fn test_full_scale_samples_do_not_overflow() {
        let mut detector = PeakDetector::new();
        for n in 0..400 {
            let sample = if n % 2 == 0 { u32::MAX } else { 0 };
            detector.check_for_beat(sample);
        }
        // Settled at full scale, a small pulse on top is still found.
        for _ in 0..600 {
            detector.check_for_beat(u32::MAX - 1_000);
        }
        let beats = (0..400)
            .filter(|&n| detector.check_for_beat(u32::MAX - 101_000 + pulse_wave(n, 20, 200.0)))
            .count();
        assert!(beats > 10, "beats: {}", beats);
    }
}
