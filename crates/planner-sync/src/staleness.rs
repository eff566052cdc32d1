//! Staleness guard
//!
//! A strictly increasing flush sequence. A response is authoritative only if
//! no flush has started since its own.

/// Sequence number taken when a flush begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlushTicket(u64);

impl FlushTicket {
    /// Raw sequence value
    #[inline]
    #[must_use]
    pub fn seq(self) -> u64 {
        self.0
    }
}

/// Monotonic flush counter for one view
#[derive(Debug, Clone, Default)]
pub struct StalenessGuard {
    seq: u64,
}

impl StalenessGuard {
    /// Create guard at sequence 0
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a flush
    #[inline]
    pub fn begin(&mut self) -> FlushTicket {
        self.seq += 1;
        FlushTicket(self.seq)
    }

    /// Check that no flush started after `ticket`
    #[inline]
    #[must_use]
    pub fn is_current(&self, ticket: FlushTicket) -> bool {
        ticket.0 == self.seq
    }

    /// Latest issued sequence
    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_increase() {
        let mut guard = StalenessGuard::new();
        let a = guard.begin();
        let b = guard.begin();
        assert!(b > a);
        assert_eq!(guard.current(), 2);
    }

    #[test]
    fn only_latest_is_current() {
        let mut guard = StalenessGuard::new();
        let first = guard.begin();
        assert!(guard.is_current(first));

        let second = guard.begin();
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));
    }
}
