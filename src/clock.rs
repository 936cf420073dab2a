//! Tick clock for a single test run

/// Counts elapsed ticks for one running test.
///
/// The counter is a `u64`, far beyond any timeout a test would declare,
/// so no wraparound handling is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickClock {
    elapsed: u64,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by exactly one tick and return the new count
    pub fn advance(&mut self) -> u64 {
        self.elapsed += 1;
        self.elapsed
    }

    /// Ticks elapsed so far
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_counts_from_one() {
        let mut clock = TickClock::new();
        assert_eq!(clock.elapsed(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.elapsed(), 2);
    }
}
