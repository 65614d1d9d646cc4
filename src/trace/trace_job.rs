use crate::roots::WORD;
use std::ops::Range;
use std::ptr;

/// A byte range waiting to be scanned for candidate addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceJob {
    start: usize,
    end: usize,
}

impl TraceJob {
    pub fn new(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start.saturating_add(len),
        }
    }

    pub fn from_range(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() < WORD
    }

    /// Iterates over every aligned word that lies fully inside the range.
    ///
    /// # Safety
    ///
    /// The whole range must stay readable for as long as the iterator is used.
    pub unsafe fn words(&self) -> Words {
        let aligned = self.start.checked_add(WORD - 1).map(|a| a & !(WORD - 1));

        Words {
            cur: aligned.unwrap_or(self.end),
            end: self.end,
        }
    }
}

/// The values of consecutive aligned words in memory.
pub struct Words {
    cur: usize,
    end: usize,
}

impl Iterator for Words {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let next = self.cur.checked_add(WORD)?;

        if next > self.end {
            return None;
        }

        // SAFETY: readability of the range is guaranteed by `TraceJob::words`.
        // Volatile so the compiler can't assume anything about stack memory
        // it considers dead.
        let word = unsafe { ptr::read_volatile(self.cur as *const usize) };

        self.cur = next;

        Some(word)
    }
}
