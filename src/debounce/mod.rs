//! Three-sample majority debouncer and edge detector, per spec §4.3.
//!
//! Grounded on `diminuto_cue.c`/`diminuto_cue.h`: the debounced output is a
//! majority vote over the last three raw samples, gated so it can only
//! change once the vote is unanimous; a one-sample history of the debounced
//! output itself then drives the edge classification.

/// Edge classification of the debounced output, relative to its own prior
/// value: `Low`/`High` mean "no change, currently deasserted/asserted";
/// `Rising`/`Falling` mean "changed since the last debounced result".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Edge {
    Low,
    Rising,
    High,
    Falling,
}

/// Holds the rolling window of raw samples plus the current and prior
/// debounced results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Debouncer {
    a: bool,
    b: bool,
    c: bool,
    r: bool,
    p: bool,
}

impl Debouncer {
    /// Initializes all samples and both results to `initial`, so the first
    /// call to [`Self::edge`] after construction reports `Low` or `High`
    /// rather than a spurious edge.
    pub fn new(initial: bool) -> Self {
        Debouncer {
            a: initial,
            b: initial,
            c: initial,
            r: initial,
            p: initial,
        }
    }

    /// Feeds the next raw sample and returns the debounced output.
    ///
    /// The output only changes when all three of the last raw samples
    /// agree; otherwise it holds its prior value. This is the majority
    /// vote `p & (a | b | c) | (a & b & c)` from the source algorithm.
    pub fn debounce(&mut self, input: bool) -> bool {
        self.c = self.b;
        self.b = self.a;
        self.a = input;
        self.p = self.r;
        self.r = (self.p && (self.a || self.b || self.c)) || (self.a && self.b && self.c);
        self.r
    }

    /// The most recently computed debounced output, without sampling.
    pub fn state(&self) -> bool {
        self.r
    }

    /// Classifies the debounced output against its own prior value.
    pub fn edge(&self) -> Edge {
        match (self.p, self.r) {
            (false, false) => Edge::Low,
            (false, true) => Edge::Rising,
            (true, true) => Edge::High,
            (true, false) => Edge::Falling,
        }
    }

    /// True if the raw (undebounced) input just transitioned low-to-high.
    pub fn is_rising_raw(&self) -> bool {
        self.a && !self.b
    }

    /// True if the raw (undebounced) input just transitioned high-to-low.
    pub fn is_falling_raw(&self) -> bool {
        !self.a && self.b
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn holds_through_a_single_bounce() {
        let mut d = Debouncer::new(false);
        assert!(!d.debounce(true));
        assert!(!d.debounce(false));
        assert!(!d.debounce(true));
        assert_eq!(d.edge(), Edge::Low);
    }

    #[test]
    fn rises_after_three_consistent_samples() {
        let mut d = Debouncer::new(false);
        d.debounce(true);
        d.debounce(true);
        assert!(d.debounce(true));
        assert_eq!(d.edge(), Edge::Rising);
        assert!(d.debounce(true));
        assert_eq!(d.edge(), Edge::High);
    }

    #[test]
    fn falls_after_three_consistent_low_samples() {
        let mut d = Debouncer::new(true);
        d.debounce(false);
        d.debounce(false);
        assert!(!d.debounce(false));
        assert_eq!(d.edge(), Edge::Falling);
    }

    #[test]
    fn raw_edges_track_the_immediate_sample() {
        let mut d = Debouncer::new(false);
        d.debounce(true);
        assert!(d.is_rising_raw());
        assert!(!d.is_falling_raw());
        d.debounce(false);
        assert!(d.is_falling_raw());
    }
}
