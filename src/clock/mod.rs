//! Monotonic tick source, per spec §4.1.
//!
//! A [`Tick`] is a signed count of ticks at [`FREQUENCY`] ticks per second.
//! `0` is a legal interval ("poll"); negative is used by callers to mean
//! "indefinite" (see [`crate::mux::Multiplexer::wait`]).

use std::ops::{Add, Sub};

use crate::ffi::syscall;

/// Ticks per second. Chosen to give nanosecond resolution, matching the
/// source library's default clock frequency.
pub const FREQUENCY: i64 = 1_000_000_000;

/// A signed count of monotonic clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub i64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    pub fn whole_seconds(self) -> i64 {
        ticks_to_wholeseconds(self.0, FREQUENCY)
    }

    pub fn fractional_units(self, units_per_second: i64) -> i64 {
        ticks_to_fractionalseconds(self.0, FREQUENCY, units_per_second)
    }
}

impl Add for Tick {
    type Output = Tick;
    fn add(self, rhs: Tick) -> Tick {
        Tick(self.0 + rhs.0)
    }
}

impl Sub for Tick {
    type Output = Tick;
    fn sub(self, rhs: Tick) -> Tick {
        Tick(self.0 - rhs.0)
    }
}

/// Returns the number of whole seconds in `ticks` at `frequency` ticks/sec.
pub fn ticks_to_wholeseconds(ticks: i64, frequency: i64) -> i64 {
    ticks / frequency
}

/// Returns the fractional remainder of `ticks`, rescaled from `frequency`
/// ticks/sec to `units_per_second` units/sec (e.g. nanoseconds).
pub fn ticks_to_fractionalseconds(ticks: i64, frequency: i64, units_per_second: i64) -> i64 {
    let remainder = ticks % frequency;
    if units_per_second >= frequency {
        remainder * (units_per_second / frequency)
    } else {
        remainder / (frequency / units_per_second)
    }
}

/// Converts `(whole_seconds, fractional_units)` at `units_per_second` back
/// to ticks at [`FREQUENCY`].
pub fn seconds_to_ticks(whole_seconds: i64, fractional_units: i64, units_per_second: i64) -> i64 {
    whole_seconds * FREQUENCY + fractional_units * (FREQUENCY / units_per_second)
}

/// Computes an interarrival interval in ticks for `numerator/denominator`
/// events per second, rounding up (ceiling division), per spec §4.4.
pub fn interarrival_time(numerator: u64, denominator: u64, frequency: i64) -> i64 {
    let mut increment = frequency;
    if denominator > 1 {
        increment *= denominator as i64;
    }
    if numerator <= 1 {
        increment
    } else {
        let numerator = numerator as i64;
        if increment % numerator > 0 {
            increment / numerator + 1
        } else {
            increment / numerator
        }
    }
}

/// A monotonic clock. Stateless: every call queries the kernel directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct Clock;

impl Clock {
    pub fn new() -> Self {
        Clock
    }

    /// Ticks per second.
    pub fn frequency(&self) -> i64 {
        FREQUENCY
    }

    /// The current monotonic time. Not safe to call from a signal handler:
    /// `clock_gettime` is not guaranteed async-signal-safe on every
    /// implementation, so callers must assume it is not (spec §4.1).
    ///
    /// `CLOCK_MONOTONIC` is always present on the platforms this crate
    /// targets; a failure here means the process is out of other resources
    /// and there is no sane ticks value to hand back.
    pub fn now(&self) -> Tick {
        match syscall::clock_gettime_monotonic() {
            Ok(ticks) => Tick(ticks),
            Err(err) => panic!("clock_gettime(CLOCK_MONOTONIC) failed: {err}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let clock = Clock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn interarrival_time_matches_literal_scenario() {
        // spec §8 scenario 4: H=1_000_000, rate 100 events/s => i=10_000.
        assert_eq!(interarrival_time(100, 1, 1_000_000), 10_000);
    }

    #[test]
    fn interarrival_time_rounds_up() {
        // 3 events per 2 seconds at frequency 10 => 10*2/3 = 6.67 -> ceil 7.
        assert_eq!(interarrival_time(3, 2, 10), 7);
    }
}
