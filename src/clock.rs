//! Time-of-day sources and the DIANE packed time encoding.
//!
//! Time fields never read the system clock directly: they ask a [`Clock`],
//! so a model can be driven by a fixed time in tests.

use std::time::{SystemTime, UNIX_EPOCH};

pub const DAY_MICROSECONDS: u64 = 86_400_000_000;
pub const DAY_MILLISECONDS: u64 = 86_400_000;
const HOUR_MICROSECONDS: i64 = 3_600_000_000;

/// Divisor producing the HPF sub-field (units of 10 s).
const HPF_DIV: u64 = 10_000_000;
/// Divisor producing the Hpf sub-field (milliseconds within the 10 s slot).
const HPF_FRACTION_DIV: u64 = 1_000;

/// Source of the current time of day.
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// Microseconds elapsed since midnight, already adjusted to local time.
    fn day_microseconds(&self) -> u64;

    fn day_milliseconds(&self) -> u64 {
        self.day_microseconds() / 1_000
    }
}

/// Wall clock shifted by a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    pub utc_offset_hours: i64,
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock { utc_offset_hours: 2 }
    }
}

impl SystemClock {
    pub fn with_utc_offset(hours: i64) -> Self {
        SystemClock {
            utc_offset_hours: hours,
        }
    }

    fn epoch_microseconds() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

impl Clock for SystemClock {
    fn day_microseconds(&self) -> u64 {
        let shifted = Self::epoch_microseconds() as i128
            + (self.utc_offset_hours as i128) * (HOUR_MICROSECONDS as i128);
        shifted.rem_euclid(DAY_MICROSECONDS as i128) as u64
    }
}

/// Clock frozen at a given microsecond of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn day_microseconds(&self) -> u64 {
        self.0 % DAY_MICROSECONDS
    }
}

/// DIANE packed time: three sub-fields of a microsecond-of-day value, the
/// upper two carrying an odd-parity marker in bit 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DianeTime {
    /// Tens of seconds since midnight (with parity bit).
    pub hpf: u16,
    /// Milliseconds within the current 10 s slot (with parity bit).
    pub hpf_fraction: u16,
    /// Microseconds within the current millisecond.
    pub hhr: u16,
}

impl DianeTime {
    pub fn from_day_microseconds(mut us: u64) -> Self {
        // Only values past one full day wrap; exactly one day is kept as is.
        if us > DAY_MICROSECONDS {
            us %= DAY_MICROSECONDS;
        }
        let hpf = (us / HPF_DIV) as u16;
        let rest = us % HPF_DIV;
        let hpf_fraction = (rest / HPF_FRACTION_DIV) as u16;
        let hhr = (rest % HPF_FRACTION_DIV) as u16;
        DianeTime {
            hpf: with_parity(hpf),
            hpf_fraction: with_parity(hpf_fraction),
            hhr,
        }
    }

    pub fn to_u64(self) -> u64 {
        (u64::from(self.hpf) << 32) | (u64::from(self.hpf_fraction) << 16) | u64::from(self.hhr)
    }
}

fn with_parity(v: u16) -> u16 {
    if v.count_ones() % 2 == 1 {
        v | 0x8000
    } else {
        v
    }
}

/// Packed DIANE value for a microsecond duration.
pub fn diane_value(day_microseconds: u64) -> u64 {
    DianeTime::from_day_microseconds(day_microseconds).to_u64()
}

/// Sample `clock` and return `(time_of_day_us, packed_diane)`.
pub fn diane_now(clock: &dyn Clock) -> (u64, u64) {
    let now = clock.day_microseconds();
    (now, diane_value(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_bit_set_only_for_odd_population() {
        assert_eq!(with_parity(0b0110), 0b0110);
        assert_eq!(with_parity(0b0111), 0x8000 | 0b0111);
        assert_eq!(with_parity(0), 0);
    }

    #[test]
    fn fixed_clock_reports_both_units() {
        let clock = FixedClock(11_824_300_123);
        assert_eq!(clock.day_microseconds(), 11_824_300_123);
        assert_eq!(clock.day_milliseconds(), 11_824_300);
    }

    #[test]
    fn system_clock_stays_within_one_day() {
        let clock = SystemClock::with_utc_offset(-5);
        assert!(clock.day_microseconds() < DAY_MICROSECONDS);
        assert!(SystemClock::default().day_milliseconds() < DAY_MILLISECONDS);
    }

    #[test]
    fn exactly_one_day_is_not_wrapped() {
        let t = DianeTime::from_day_microseconds(DAY_MICROSECONDS);
        assert_eq!(t.hpf & 0x7fff, 8640);
    }

    #[test]
    fn diane_now_uses_clock_sample() {
        let (now, packed) = diane_now(&FixedClock(66_100_045));
        assert_eq!(now, 66_100_045);
        assert_eq!(packed, 26_169_573_421);
    }
}
