use std::{
    cmp::Reverse,
    time::{Duration, Instant},
};

use keyed_priority_queue::KeyedPriorityQueue;

use crate::utils::Seq;

/// The single timer a driver makes available to an engine.
///
/// The ledger never calls `start_timer` while it believes the timer is running.
pub trait PhysicalTimer {
    fn start_timer(&mut self, timeout: Duration);
    fn stop_timer(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    // creation order among equal instants
    tick: u64,
}

/// Per-packet retransmission deadlines multiplexed onto one [`PhysicalTimer`].
///
/// Every entry has the same duration, so the earliest deadline is always the
/// oldest entry. Deadlines are absolute: the time left on an entry is
/// `deadline - now`, which is what a running decrement of every remaining
/// timeout would produce.
pub struct TimerLedger {
    deadlines: KeyedPriorityQueue<Seq, Reverse<Deadline>>,
    timeout: Duration,
    next_tick: u64,
    // what the physical timer currently counts down to
    armed: Option<Deadline>,
}

impl TimerLedger {
    fn check_rep(&self) {
        if let Some(armed) = self.armed {
            assert!(self.deadlines.len() > 0);
            let (_, Reverse(head)) = self.deadlines.peek().unwrap();
            assert_eq!(*head, armed);
        }
    }

    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let this = TimerLedger {
            deadlines: KeyedPriorityQueue::new(),
            timeout,
            next_tick: 0,
            armed: None,
        };
        this.check_rep();
        this
    }

    #[must_use]
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    #[must_use]
    pub fn contains(&self, seq: Seq) -> bool {
        self.deadlines.get_priority(&seq).is_some()
    }

    /// Time left before `seq` expires, `None` if it has no entry.
    #[must_use]
    pub fn remaining(&self, seq: Seq, now: Instant) -> Option<Duration> {
        self.deadlines
            .get_priority(&seq)
            .map(|Reverse(deadline)| deadline.at.saturating_duration_since(now))
    }

    /// The entry that will expire first.
    #[must_use]
    pub fn earliest(&self) -> Option<Seq> {
        self.deadlines.peek().map(|(&seq, _)| seq)
    }

    /// Appends a full-duration entry for `seq`, replacing any existing one.
    pub fn schedule(&mut self, seq: Seq, now: Instant) {
        let deadline = Deadline {
            at: now + self.timeout,
            tick: self.next_tick,
        };
        self.next_tick += 1;
        self.deadlines.push(seq, Reverse(deadline));
    }

    /// Removes the entry for `seq`. Returns whether there was one.
    pub fn cancel(&mut self, seq: Seq) -> bool {
        self.deadlines.remove(&seq).is_some()
    }

    /// Pops the earliest entry after the physical timer has fired.
    ///
    /// The physical timer is considered stopped afterwards.
    pub fn expire(&mut self) -> Option<Seq> {
        self.armed = None;
        let expired = self.deadlines.pop().map(|(seq, _)| seq);
        self.check_rep();
        expired
    }

    /// Re-anchors the physical timer on the earliest entry.
    ///
    /// Stops it if the ledger is empty. Does nothing if it already counts
    /// down to the earliest entry.
    pub fn sync(&mut self, timer: &mut impl PhysicalTimer, now: Instant) {
        let head = self.deadlines.peek().map(|(_, Reverse(deadline))| *deadline);
        if head == self.armed {
            return;
        }
        if self.armed.take().is_some() {
            timer.stop_timer();
        }
        if let Some(deadline) = head {
            timer.start_timer(deadline.at.saturating_duration_since(now));
            self.armed = Some(deadline);
        }
        self.check_rep();
    }
}
