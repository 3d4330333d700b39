//! Last-request-wins bookkeeping for asynchronous derived values.

/// Identifies one issued request. Only the most recently issued ticket of a
/// tracker may update displayed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default, Clone)]
pub struct RequestTracker {
    latest: u64,
    pending: bool,
}

impl RequestTracker {
    /// Issue a new ticket; every earlier ticket becomes stale.
    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        self.pending = true;
        Ticket {
            generation: self.latest,
        }
    }

    /// Make every outstanding ticket stale without issuing a new one.
    pub fn supersede(&mut self) {
        self.latest += 1;
        self.pending = false;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.pending && ticket.generation == self.latest
    }

    /// Mark the current request as answered. Returns false for stale tickets.
    pub fn resolve(&mut self, ticket: Ticket) -> bool {
        if self.is_current(ticket) {
            self.pending = false;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_ticket_resolves() {
        let mut tracker = RequestTracker::default();
        let first = tracker.issue();
        let second = tracker.issue();
        assert!(!tracker.is_current(first));
        assert!(tracker.resolve(second));
        assert!(!tracker.is_pending());
        // A ticket resolves once.
        assert!(!tracker.resolve(second));
        assert!(!tracker.resolve(first));
    }

    #[test]
    fn supersede_stales_outstanding_ticket() {
        let mut tracker = RequestTracker::default();
        let ticket = tracker.issue();
        tracker.supersede();
        assert!(!tracker.is_pending());
        assert!(!tracker.resolve(ticket));
        assert!(tracker.issue().generation() > ticket.generation());
    }
}
