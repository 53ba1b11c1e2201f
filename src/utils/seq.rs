use std::fmt;

/// Size of the circular sequence space.
pub const MAX_SEQ: u8 = 32;

/// A sequence number on the `MAX_SEQ` ring.
///
/// No `Ord` impl: on a ring of this size "before" only
/// means something relative to a window, so comparisons go through
/// [`in_window`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub struct Seq {
    n: u8,
}

impl Seq {
    #[must_use]
    pub fn zero() -> Self {
        Seq { n: 0 }
    }

    /// Returns `None` if `n` is outside the sequence space.
    #[must_use]
    pub fn from_u8(n: u8) -> Option<Self> {
        if n < MAX_SEQ {
            Some(Seq { n })
        } else {
            None
        }
    }

    #[must_use]
    #[inline]
    pub fn to_u8(self) -> u8 {
        self.n
    }

    #[must_use]
    #[inline]
    pub fn index(self) -> usize {
        self.n as usize
    }

    #[must_use]
    pub fn add_usize(self, n: usize) -> Self {
        let n = (n % MAX_SEQ as usize) as u8;
        Seq {
            n: (self.n + n) % MAX_SEQ,
        }
    }

    #[must_use]
    pub fn sub_usize(self, n: usize) -> Self {
        let n = (n % MAX_SEQ as usize) as u8;
        Seq {
            n: (self.n + MAX_SEQ - n) % MAX_SEQ,
        }
    }

    /// Forward distance from `other` to `self` around the ring.
    #[must_use]
    pub fn sub(self, other: Seq) -> usize {
        ((self.n + MAX_SEQ - other.n) % MAX_SEQ) as usize
    }

    pub fn increment(&mut self) {
        *self = self.add_usize(1);
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.n)
    }
}

/// Whether `test` lies in the half-open interval `[low, high)` on the ring.
///
/// `low == high` is the empty interval.
#[must_use]
pub fn in_window(low: Seq, high: Seq, test: Seq) -> bool {
    if low.n <= high.n {
        low.n <= test.n && test.n < high.n
    } else {
        // wraps past MAX_SEQ - 1
        low.n <= test.n || test.n < high.n
    }
}
