use arrayvec::ArrayString;
use core::fmt::Write;

const MILLIS_PER_SECOND: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimestampError {
    OutOfOrder, // A timestamp earlier than one already processed.
}

/// Represents an instant as milliseconds of uptime since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    pub millis: u64,
}

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub const fn from_secs(seconds: u64) -> Self {
        Self { millis: seconds * MILLIS_PER_SECOND }
    }

    /// Milliseconds from `earlier` to `self`, or 0 if `earlier` is later.
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.millis.saturating_sub(earlier.millis)
    }

    /// True if at least `interval_ms` has passed since `last`, or if there
    /// was no `last` at all.
    pub fn has_elapsed(&self, last: Option<Timestamp>, interval_ms: u64) -> bool {
        match last {
            Some(last) => self.millis_since(last) >= interval_ms,
            None => true,
        }
    }

    /// Check that `self` does not go back in time relative to `previous`.
    pub fn validate_after(&self, previous: Option<Timestamp>) -> Result<(), TimestampError> {
        match previous {
            Some(previous) if self.millis < previous.millis => Err(TimestampError::OutOfOrder),
            _ => Ok(()),
        }
    }

    /// Create an ISO 8601 Duration string of the uptime, whole seconds only.
    pub fn create_iso8601_str(&self) -> ArrayString<32> {
        let (days, hours, minutes, remaining_seconds) = self.to_dhms();
        let mut result = ArrayString::<32>::new();
        // A u64 of seconds needs at most 20 digits, so "P{}D" always fits.
        let _ = write!(&mut result, "P{}D", days);
        if hours > 0 || minutes > 0 || remaining_seconds > 0 {
            let _ = write!(&mut result, "T{}H{}M{}S", hours, minutes, remaining_seconds);
        } else {
            result.push_str("T0S");
        }
        result
    }

    /// Converts uptime to days, hours, minutes, and seconds.
    pub fn to_dhms(&self) -> (u64, u64, u64, u64) {
        let seconds = self.millis / MILLIS_PER_SECOND;
        let days = seconds / 86400;
        let seconds_of_day = seconds - days * 86400;
        let hours = seconds_of_day / 3600;
        let remaining_seconds = seconds_of_day - hours * 3600;
        let minutes = remaining_seconds / 60;
        let remaining_seconds = remaining_seconds - minutes * 60;
        (days, hours, minutes, remaining_seconds)
    }
}
