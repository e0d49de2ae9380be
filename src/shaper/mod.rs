//! Peak-plus-sustained traffic shaper, per spec §4.5.
//!
//! Grounded on `diminuto_shaper.c`/`diminuto_shaper.h`: a pair of
//! [`Throttle`]s run in parallel, one contracting the peak (minimum)
//! inter-arrival time with a jitter tolerance, the other the sustained
//! (mean) inter-arrival time with a burst tolerance. Every query is the
//! pairwise combination of the same query on both throttles: `request`
//! takes the larger delay, predicates that describe a held state take the
//! logical AND of both throttles holding it (both contracts must agree
//! the stream is idle), and predicates that describe a transition take the
//! OR (either throttle moving is enough to call the shaper's state
//! changed, since both moving on the same commit is unlikely).

use crate::clock::Tick;
use crate::throttle::Throttle;

/// A shaper combining a peak-rate throttle and a sustained-rate throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shaper {
    peak: Throttle,
    sustained: Throttle,
}

impl Shaper {
    /// Builds a shaper contracting `peak_increment` (minimum inter-arrival
    /// time) with `jitter_tolerance`, and `sustained_increment` (mean
    /// inter-arrival time) with `burst_tolerance`, as of `now`.
    pub fn new(
        peak_increment: Tick,
        jitter_tolerance: Tick,
        sustained_increment: Tick,
        burst_tolerance: Tick,
        now: Tick,
    ) -> Self {
        Shaper {
            peak: Throttle::new(peak_increment, jitter_tolerance, now),
            sustained: Throttle::new(sustained_increment, burst_tolerance, now),
        }
    }

    /// Resets both underlying throttles as of `now`.
    pub fn reset(&mut self, now: Tick) {
        self.peak.reset(now);
        self.sustained.reset(now);
    }

    /// The larger of the peak and sustained throttles' requested delay.
    pub fn request(&mut self, now: Tick) -> Tick {
        let peak = self.peak.request(now);
        let sustained = self.sustained.request(now);
        peak.max(sustained)
    }

    /// Commits `events` on both throttles. True if either is now alarmed.
    pub fn commit_n(&mut self, events: u64) -> bool {
        let peak = self.peak.commit_n(events);
        let sustained = self.sustained.commit_n(events);
        peak || sustained
    }

    /// Commits a single event.
    pub fn commit(&mut self) -> bool {
        self.commit_n(1)
    }

    /// Combines a request and commit of `events`, without delaying.
    pub fn admit_n(&mut self, now: Tick, events: u64) -> bool {
        let peak = self.peak.admit_n(now, events);
        let sustained = self.sustained.admit_n(now, events);
        peak || sustained
    }

    /// Combines a request and commit of a single event, without delaying.
    pub fn admit(&mut self, now: Tick) -> bool {
        self.admit_n(now, 1)
    }

    /// Commits zero events, aging both throttles forward to `now`.
    pub fn update(&mut self, now: Tick) -> bool {
        self.admit_n(now, 0)
    }

    /// The larger of the two throttles' currently expected inter-arrival
    /// time.
    pub fn expected(&self) -> Tick {
        self.peak.expected().max(self.sustained.expected())
    }

    /// True only if both throttles' buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.peak.is_empty() && self.sustained.is_empty()
    }

    /// True if either throttle's bucket is full.
    pub fn is_full(&self) -> bool {
        self.peak.is_full() || self.sustained.is_full()
    }

    /// True if either throttle is alarmed.
    pub fn is_alarmed(&self) -> bool {
        self.peak.is_alarmed() || self.sustained.is_alarmed()
    }

    /// True if either throttle's bucket just emptied.
    pub fn emptied(&self) -> bool {
        self.peak.emptied() || self.sustained.emptied()
    }

    /// True if either throttle's bucket just filled.
    pub fn filled(&self) -> bool {
        self.peak.filled() || self.sustained.filled()
    }

    /// True if either throttle just alarmed.
    pub fn alarmed(&self) -> bool {
        self.peak.alarmed() || self.sustained.alarmed()
    }

    /// True if either throttle just cleared.
    pub fn cleared(&self) -> bool {
        self.peak.cleared() || self.sustained.cleared()
    }
}

/// Computes a burst tolerance in ticks from the peak increment, its jitter
/// tolerance, the sustained increment, and the maximum burst size in
/// events. Yields just the jitter tolerance when a burst of more than one
/// event can't widen the sustained contract (equal rates, or a
/// single-event burst).
pub fn burst_tolerance(
    peak_increment: Tick,
    jitter_tolerance: Tick,
    sustained_increment: Tick,
    maximum_burst_size: u64,
) -> Tick {
    if maximum_burst_size <= 1 || sustained_increment <= peak_increment {
        jitter_tolerance
    } else {
        let increment = sustained_increment - peak_increment;
        jitter_tolerance + increment * (maximum_burst_size as i64 - 1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn burst_tolerance_matches_literal_scenario() {
        // spec §8 scenario 5: peak i=1, jitter=0, sustained i=10, burst=5
        // => (5-1)*(10-1) + 0 = 36.
        assert_eq!(
            burst_tolerance(Tick(1), Tick::ZERO, Tick(10), 5),
            Tick(36)
        );
    }

    #[test]
    fn admits_a_burst_within_tolerance_then_throttles() {
        // A burst of 5 back-to-back events needs the *peak* throttle to
        // carry its own jitter tolerance for 5 events at rate 1, not just
        // the sustained throttle's wider burst tolerance.
        let jitter = crate::throttle::jitter_tolerance(Tick(1), 5);
        let bt = burst_tolerance(Tick(1), jitter, Tick(10), 5);
        let mut shaper = Shaper::new(Tick(1), jitter, Tick(10), bt, Tick::ZERO);
        for _ in 0..5 {
            assert_eq!(shaper.request(Tick::ZERO), Tick::ZERO);
            assert!(!shaper.commit());
        }
        // A sixth event immediately exceeds both contracts.
        let delay = shaper.request(Tick::ZERO);
        assert!(delay > Tick::ZERO);
        assert!(shaper.commit());
        assert!(shaper.is_alarmed());
    }

    #[test]
    fn single_event_never_alarms() {
        let mut shaper = Shaper::new(Tick(1), Tick::ZERO, Tick(10), Tick::ZERO, Tick::ZERO);
        assert_eq!(shaper.request(Tick::ZERO), Tick::ZERO);
        assert!(!shaper.commit());
    }
}
