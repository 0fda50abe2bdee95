#![cfg_attr(not(test), no_std)]

//! Soft SPI master core over four GPIO lines.
//!
//! The core is paced by an externally driven base tick (a timer interrupt or
//! a polled loop) and derives its own bit clock from a configurable divider.
//! Internally it is two synchronous state machines: a command-side handshake
//! stepped on every base tick, and a bit-level shifter stepped on rising
//! edges of the divided clock. The two sides communicate only through a pair
//! of single-writer level flags, so the shifter can later move behind an
//! interrupt without changing the protocol.

pub mod clkgen;
pub mod master;
pub mod word;

pub use clkgen::{BitClock, ConfigError};
pub use master::{Config, Error, SpiMaster};
pub use word::Word;
