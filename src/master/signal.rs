//! Cross-domain level flags.

use core::sync::atomic::{AtomicBool, Ordering};

/// Single-writer, single-reader level signal between the base-tick domain
/// and the bit-clock domain.
///
/// The writer publishes with `Release` and the reader samples with
/// `Acquire`, so data written before a level change is visible to whoever
/// observes the new level. Each flag has exactly one writing side: `ready`
/// belongs to the command side, `complete` to the shifter.
pub(crate) struct Flag(AtomicBool);

impl Flag {
    pub const fn new(level: bool) -> Self {
        Self(AtomicBool::new(level))
    }

    #[inline]
    pub fn set(&self, level: bool) {
        self.0.store(level, Ordering::Release);
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_the_last_written_level() {
        let flag = Flag::new(false);
        assert!(!flag.get());
        flag.set(true);
        assert!(flag.get());
        flag.set(false);
        assert!(!flag.get());
    }
}
