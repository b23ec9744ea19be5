//! DIANE packed time conversions.

use modgen::clock::DAY_MICROSECONDS as DAY;
use modgen::{diane_now, diane_value, Clock, DianeTime, FixedClock};

#[test]
fn reference_values() {
    assert_eq!(diane_value(90_000_000_000), 1_546_188_226_560);
    assert_eq!(diane_value(101_505_000_000), 147_225_364_135_936);
    assert_eq!(diane_value(11_824_300_000), 5_079_080_632_320);
    assert_eq!(diane_value(66_100_045), 26_169_573_421);
}

#[test]
fn day_boundaries() {
    assert_eq!(diane_value(0), 0);
    assert_eq!(diane_value(86_399_999_999), 177_842_366_120_935);
    // exactly one day is not reduced
    assert_eq!(diane_value(DAY), 37_108_517_437_440);
    assert_eq!(diane_value(DAY + 66_100_045), diane_value(66_100_045));
}

#[test]
fn sub_fields_carry_odd_parity_marker() {
    let t = DianeTime::from_day_microseconds(101_505_000_000);
    assert_eq!(t.hpf, 1510 | 0x8000);
    assert_eq!(t.hpf_fraction, 5000 | 0x8000);
    assert_eq!(t.hhr, 0);
    for v in [t.hpf, t.hpf_fraction] {
        assert_eq!(v.count_ones() % 2, 0);
    }

    let t = DianeTime::from_day_microseconds(66_100_045);
    assert_eq!((t.hpf, t.hpf_fraction, t.hhr), (6, 6100, 45));
}

#[test]
fn diane_now_samples_clock_once() {
    let clock = FixedClock(11_824_300_000);
    let (now, packed) = diane_now(&clock);
    assert_eq!(now, clock.day_microseconds());
    assert_eq!(packed, 5_079_080_632_320);
}
