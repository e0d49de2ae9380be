//! GCRA virtual-scheduler rate limiter, per spec §4.4.
//!
//! Grounded on `diminuto_throttle.c`/`diminuto_throttle.h`: a Generic Cell
//! Rate Algorithm implemented as a virtual scheduler, tracking the expected
//! and actual inter-arrival time of events and a three-generation history of
//! the leaky bucket's full/empty/alarmed flags so edge predicates
//! (`filled`, `emptied`, `alarmed`, `cleared`) can be derived without extra
//! bookkeeping at the call site.

use crate::clock::Tick;

pub use crate::clock::interarrival_time;

/// A contracted inter-arrival interval `increment` and burst `limit`,
/// applied against a stream of [`Tick`]-stamped events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Throttle {
    now: Tick,
    then: Tick,
    increment: Tick,
    limit: Tick,
    expected: Tick,
    actual: Tick,
    full0: bool,
    full1: bool,
    full2: bool,
    empty0: bool,
    empty1: bool,
    empty2: bool,
    alarmed1: bool,
    alarmed2: bool,
}

impl Throttle {
    /// Builds a throttle with the given contracted `increment` and `limit`,
    /// as of `now`.
    pub fn new(increment: Tick, limit: Tick, now: Tick) -> Self {
        let mut throttle = Throttle {
            now,
            then: now,
            increment,
            limit,
            expected: Tick::ZERO,
            actual: Tick::ZERO,
            full0: false,
            full1: false,
            full2: false,
            empty0: true,
            empty1: true,
            empty2: true,
            alarmed1: false,
            alarmed2: false,
        };
        throttle.reset(now);
        throttle
    }

    /// Resets the throttle to a debt-free, unalarmed state as of `now`, as
    /// though no event had ever occurred.
    pub fn reset(&mut self, now: Tick) {
        self.now = now;
        self.then = now - self.increment;
        self.expected = Tick::ZERO;
        self.actual = Tick::ZERO;
        self.full0 = false;
        self.full1 = false;
        self.full2 = false;
        self.empty0 = true;
        self.empty1 = true;
        self.empty2 = true;
        self.alarmed1 = false;
        self.alarmed2 = false;
    }

    /// Asks whether an event emitted at `now` would conform to the
    /// contract, returning the delay in ticks until it would. `Tick::ZERO`
    /// means the event is admissible right now.
    pub fn request(&mut self, now: Tick) -> Tick {
        self.now = now;
        let elapsed = self.now - self.then;
        if self.expected <= elapsed {
            self.actual = Tick::ZERO;
            self.full0 = false;
            self.empty0 = true;
            Tick::ZERO
        } else {
            self.actual = self.expected - elapsed;
            if self.actual <= self.limit {
                self.full0 = false;
                self.empty0 = false;
                Tick::ZERO
            } else {
                self.full0 = true;
                self.empty0 = false;
                self.actual - self.limit
            }
        }
    }

    /// Tells the throttle that `events` previously requested events were
    /// emitted, whether admissible or not. Returns whether the throttle is
    /// now alarmed.
    pub fn commit_n(&mut self, events: u64) -> bool {
        self.then = self.now;
        self.expected = self.actual + self.increment * events as i64;
        self.full2 = self.full1;
        self.full1 = self.full0;
        self.empty2 = self.empty1;
        self.empty1 = self.empty0;
        self.alarmed2 = self.alarmed1;
        if self.emptied() {
            self.alarmed1 = false;
        } else if self.filled() {
            self.alarmed1 = true;
        }
        self.alarmed1
    }

    /// Commits a single event. Equivalent to `commit_n(1)`.
    pub fn commit(&mut self) -> bool {
        self.commit_n(1)
    }

    /// Combines a request and a commit of `events`, without delaying.
    pub fn admit_n(&mut self, now: Tick, events: u64) -> bool {
        self.request(now);
        self.commit_n(events)
    }

    /// Combines a request and commit of a single event, without delaying.
    pub fn admit(&mut self, now: Tick) -> bool {
        self.admit_n(now, 1)
    }

    /// Commits zero events, letting the throttle's state age forward to
    /// `now` without the caller having emitted anything.
    pub fn update(&mut self, now: Tick) -> bool {
        self.admit_n(now, 0)
    }

    /// The currently expected inter-arrival time, unchanged by this call.
    pub fn expected(&self) -> Tick {
        self.expected
    }

    /// True if the leaky bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.empty1
    }

    /// True if the leaky bucket is full.
    pub fn is_full(&self) -> bool {
        self.full1
    }

    /// True if the throttle is alarmed.
    pub fn is_alarmed(&self) -> bool {
        self.alarmed1
    }

    /// True only on the commit where the bucket transitioned to empty.
    pub fn emptied(&self) -> bool {
        self.empty1 && !self.empty2
    }

    /// True only on the commit where the bucket transitioned to full.
    pub fn filled(&self) -> bool {
        self.full1 && !self.full2
    }

    /// True only on the commit where the throttle transitioned to alarmed.
    pub fn alarmed(&self) -> bool {
        self.alarmed1 && !self.alarmed2
    }

    /// True only on the commit where the throttle cleared its alarm.
    pub fn cleared(&self) -> bool {
        !self.alarmed1 && self.alarmed2
    }
}

/// Computes a jitter tolerance (GCRA limit) in ticks from an inter-arrival
/// `increment` and the largest burst size in events.
pub fn jitter_tolerance(increment: Tick, maximum_burst_size: u64) -> Tick {
    if maximum_burst_size > 1 {
        increment * (maximum_burst_size as i64 - 1)
    } else {
        Tick::ZERO
    }
}

impl std::ops::Mul<i64> for Tick {
    type Output = Tick;
    fn mul(self, rhs: i64) -> Tick {
        Tick(self.0 * rhs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_event_is_always_admissible() {
        let mut t = Throttle::new(Tick(10), Tick::ZERO, Tick::ZERO);
        assert_eq!(t.request(Tick::ZERO), Tick::ZERO);
        assert!(!t.commit());
        assert!(!t.is_alarmed());
    }

    #[test]
    fn bursts_past_the_limit_alarm() {
        // Contract: one event per 10 ticks, no burst tolerance.
        let mut t = Throttle::new(Tick(10), Tick::ZERO, Tick::ZERO);
        assert_eq!(t.request(Tick::ZERO), Tick::ZERO);
        t.commit();
        // Second event arrives immediately, far ahead of schedule.
        let delay = t.request(Tick::ZERO);
        assert_eq!(delay, Tick(10));
        assert!(t.commit());
        assert!(t.is_alarmed());
        assert!(t.alarmed());
    }

    #[test]
    fn waiting_out_the_delay_clears_the_alarm() {
        let mut t = Throttle::new(Tick(10), Tick::ZERO, Tick::ZERO);
        t.request(Tick::ZERO);
        t.commit();
        t.request(Tick::ZERO);
        t.commit();
        assert!(t.is_alarmed());
        // Now arrive exactly on schedule.
        t.request(Tick(10));
        assert!(!t.commit());
        assert!(t.cleared());
    }

    #[test]
    fn jitter_tolerance_matches_literal_scenario() {
        assert_eq!(jitter_tolerance(Tick(10), 4), Tick(30));
        assert_eq!(jitter_tolerance(Tick(10), 1), Tick::ZERO);
    }
}
