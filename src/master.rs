//! SPI master

/*
Fixed-mode master core:
- SCK idles low, MISO sampled on the rising edge, MOSI driven on the
  falling edge, MSB of the requested field first
- select active-low, asserted one bit-clock period before the first pulse
  and released one period after the last
- transfer length 0..=W::BITS bits per request, one request in flight
- paced by an external base tick; SCK = base / (2 * clock_divide)
*/

mod engine;
mod host;
mod signal;

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Mode, MODE_0};
use fugit::HertzU32 as Hertz;

use crate::clkgen::{BitClock, ConfigError};
use crate::word::Word;
use self::engine::Shifter;
use self::host::Handshake;
use self::signal::Flag;

/// Master configuration.
#[non_exhaustive]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Base ticks per generated bit-clock period. Even, at least 2.
    pub clock_divide: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { clock_divide: 4 }
    }
}

impl Config {
    /// SCK rate for a given base tick rate. The shifter spends two generated
    /// periods on every SCK cycle.
    pub fn sck_rate(&self, base: Hertz) -> Hertz {
        Hertz::from_raw(base.raw() / (2 * self.clock_divide))
    }
}

/// Master error.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Invalid configuration.
    Config(ConfigError),
    /// Requested more bits than the word holds.
    TooLong,
    /// Error driving or reading a line.
    Pin(E),
}

impl<E> From<ConfigError> for Error<E> {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl<E: core::fmt::Debug> embedded_hal::spi::Error for Error<E> {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

/// Tick-driven SPI master over four GPIO lines.
///
/// `W` fixes the widest transfer; a request may use any prefix of it. One
/// request is in flight at a time, gated by [`ready`](SpiMaster::ready).
pub struct SpiMaster<W: Word, SEL, SCK, MOSI, MISO> {
    clk: BitClock,
    level: bool,
    host: Handshake<W>,
    shifter: Shifter<W, SEL, SCK, MOSI, MISO>,
    ready: Flag,
    complete: Flag,
    result: Option<W>,
}

impl<W, SEL, SCK, MOSI, MISO, E> SpiMaster<W, SEL, SCK, MOSI, MISO>
where
    W: Word,
    SEL: OutputPin<Error = E>,
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
{
    /// Clock mode equivalent of the generated waveform.
    pub const MODE: Mode = MODE_0;
    /// Widest supported transfer.
    pub const MAX_BITS: u32 = W::BITS;

    /// Take ownership of the lines, drive them to their idle levels and
    /// validate the divider.
    pub fn new(sel: SEL, sck: SCK, mosi: MOSI, miso: MISO, config: Config) -> Result<Self, Error<E>> {
        let clk = BitClock::new(config.clock_divide)?;
        let shifter = Shifter::new(sel, sck, mosi, miso).map_err(Error::Pin)?;
        Ok(Self {
            clk,
            level: false,
            host: Handshake::new(),
            shifter,
            ready: Flag::new(true),
            complete: Flag::new(false),
            result: None,
        })
    }

    /// True while a new request can be accepted.
    #[inline]
    pub fn ready(&self) -> bool {
        self.ready.get()
    }

    /// True from acceptance of a request until its completion is observed.
    #[inline]
    pub fn is_busy(&self) -> bool {
        !self.ready.get()
    }

    /// Request a transfer of the low `bits` bits of `tx`, most significant
    /// of those first. Returns whether the request was accepted.
    ///
    /// Ignored (returns `false`) unless [`ready`](SpiMaster::ready), or if
    /// `bits` exceeds [`MAX_BITS`](SpiMaster::MAX_BITS). A zero-length
    /// request completes immediately without touching the lines.
    pub fn start(&mut self, bits: u32, tx: W) -> bool {
        if !self.ready.get() || bits > W::BITS {
            return false;
        }
        debug_assert!(self.host.is_idle());
        self.result = None;
        if bits == 0 {
            self.result = Some(W::default());
            return true;
        }
        self.host.arm(bits, tx);
        // Publish the request before readiness drops; the shifter reads it
        // only after observing `ready` low.
        self.ready.set(false);
        true
    }

    /// One base-clock period: advance the divider, step the shifter on a
    /// rising edge of the generated clock, then step the handshake.
    pub fn tick(&mut self) -> Result<(), Error<E>> {
        let level = self.clk.tick();
        let rising = level && !self.level;
        self.level = level;

        if rising {
            self.shifter
                .clock_edge(self.ready.get(), &self.host.request, &self.complete)
                .map_err(Error::Pin)?;
        }

        if self.host.step(self.complete.get()) {
            self.result = Some(self.shifter.rx());
            // Readiness doubles as the shifter's reset; apply it here as
            // well so a reset window shorter than one generated period
            // still takes effect.
            self.shifter.enter_reset().map_err(Error::Pin)?;
            self.ready.set(true);
        }
        Ok(())
    }

    /// Received bits of the last completed transfer, right-aligned in the
    /// low `bits` of the word. `Some` from the tick completion is observed
    /// until the result is taken, a new request is accepted, or a reset.
    #[inline]
    pub fn result(&self) -> Option<W> {
        self.result
    }

    /// Take the received word, consuming the completion notification.
    #[inline]
    pub fn take_result(&mut self) -> Option<W> {
        self.result.take()
    }

    /// Deterministic re-initialization: both state machines back to idle,
    /// all lines to their idle levels, divider window restarted. An
    /// in-flight transfer is discarded silently, with no completion.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.clk.reset();
        self.level = false;
        self.host.reset();
        self.ready.set(true);
        self.complete.set(false);
        self.result = None;
        self.shifter.hard_reset().map_err(Error::Pin)
    }

    /// Run a whole transfer, driving [`tick`](SpiMaster::tick) until it
    /// completes.
    pub fn blocking_transfer(&mut self, bits: u32, tx: W) -> Result<W, Error<E>> {
        if bits > W::BITS {
            return Err(Error::TooLong);
        }
        while !self.start(bits, tx) {
            self.tick()?;
        }
        loop {
            if let Some(rx) = self.take_result() {
                return Ok(rx);
            }
            self.tick()?;
        }
    }

    /// Release the owned lines.
    pub fn free(self) -> (SEL, SCK, MOSI, MISO) {
        self.shifter.free()
    }
}

impl<W, SEL, SCK, MOSI, MISO, E> embedded_hal::spi::ErrorType for SpiMaster<W, SEL, SCK, MOSI, MISO>
where
    W: Word,
    SEL: OutputPin<Error = E>,
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    E: core::fmt::Debug,
{
    type Error = Error<E>;
}

/// Non-blocking full-width word interface. Each blocked poll advances the
/// core by one base tick, so `nb::block!` drives a transfer to completion.
impl<W, SEL, SCK, MOSI, MISO, E> embedded_hal_nb::spi::FullDuplex<W>
    for SpiMaster<W, SEL, SCK, MOSI, MISO>
where
    W: Word,
    SEL: OutputPin<Error = E>,
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    E: core::fmt::Debug,
{
    fn read(&mut self) -> nb::Result<W, Self::Error> {
        match self.take_result() {
            Some(rx) => Ok(rx),
            None => {
                self.tick().map_err(nb::Error::Other)?;
                Err(nb::Error::WouldBlock)
            }
        }
    }

    fn write(&mut self, word: W) -> nb::Result<(), Self::Error> {
        if self.start(W::BITS, word) {
            Ok(())
        } else {
            self.tick().map_err(nb::Error::Other)?;
            Err(nb::Error::WouldBlock)
        }
    }
}
