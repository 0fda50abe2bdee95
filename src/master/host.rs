//! Command-side handshake.
//!
//! Stepped once per base tick. The only things it shares with the shifter
//! are the latched request, the `ready` flag it owns, and the completion
//! flag it samples.

use crate::word::Word;

/// Transfer parameters, latched when a request is accepted and stable until
/// the next one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<W> {
    /// Number of bits to exchange.
    pub bits: u32,
    /// Transmit data in the low `bits` bits, most significant of those
    /// shifted out first.
    pub tx: W,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    /// Accepting requests.
    Idle,
    /// Request latched; waiting for the shifter to acknowledge the start by
    /// dropping the completion level left over from the previous transfer.
    Arming,
    /// Waiting for the completion level to assert.
    Busy,
}

pub(crate) struct Handshake<W> {
    phase: Phase,
    pub request: Request<W>,
}

impl<W: Word> Handshake<W> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            request: Request {
                bits: 0,
                tx: W::default(),
            },
        }
    }

    /// Latch a non-empty request and leave `Idle`. The caller publishes the
    /// request to the shifter domain by dropping `ready` afterwards.
    pub fn arm(&mut self, bits: u32, tx: W) {
        debug_assert!(self.phase == Phase::Idle && bits > 0);
        self.request = Request { bits, tx };
        self.phase = Phase::Arming;
    }

    /// One base tick. `complete` is the completion level sampled this tick.
    /// Returns true on the tick the transfer is observed complete.
    pub fn step(&mut self, complete: bool) -> bool {
        match self.phase {
            Phase::Idle => false,
            Phase::Arming => {
                if !complete {
                    self.phase = Phase::Busy;
                }
                false
            }
            Phase::Busy => {
                if complete {
                    self.phase = Phase::Idle;
                }
                complete
            }
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.request = Request {
            bits: 0,
            tx: W::default(),
        };
    }
}
