//! Bit-level shifter.
//!
//! Stepped once per rising edge of the generated bit clock, one state per
//! generated period:
//!
//! - select asserts one period before the first SCK pulse and holds one
//!   period after the last
//! - SCK idles low; MISO is captured while driving SCK high, the next MOSI
//!   bit goes out while driving it low
//! - a full SCK cycle therefore spans two generated periods

use embedded_hal::digital::{InputPin, OutputPin, PinState};

use super::host::Request;
use super::signal::Flag;
use crate::word::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    /// Lines idle; a finished transfer holds select for one trailing period
    /// before this state releases it.
    Idle,
    /// Select asserted, SCK held low for one lead period.
    Setup,
    /// SCK high; MISO captured into the exchange's bit position.
    Sample,
    /// SCK low; next MOSI bit driven; exchange counted.
    Shift,
}

pub(crate) struct Shifter<W, SEL, SCK, MOSI, MISO> {
    sel: SEL,
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
    state: State,
    ctr: u32,
    rx: W,
    in_reset: bool,
    // Driven line levels; writes that would not change a line are skipped.
    sel_active: bool,
    sck_high: bool,
    mosi_high: bool,
}

impl<W, SEL, SCK, MOSI, MISO, E> Shifter<W, SEL, SCK, MOSI, MISO>
where
    W: Word,
    SEL: OutputPin<Error = E>,
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
{
    /// Take ownership of the lines and drive them to their idle levels
    /// (select deasserted, SCK low, MOSI low).
    pub fn new(sel: SEL, sck: SCK, mosi: MOSI, miso: MISO) -> Result<Self, E> {
        let mut shifter = Self {
            sel,
            sck,
            mosi,
            miso,
            state: State::Idle,
            ctr: 0,
            rx: W::default(),
            in_reset: true,
            // Opposite of idle so the first drive writes every line once.
            sel_active: true,
            sck_high: true,
            mosi_high: true,
        };
        shifter.drive_idle()?;
        Ok(shifter)
    }

    /// Select is active-low on the wire.
    fn drive_sel(&mut self, active: bool) -> Result<(), E> {
        if self.sel_active != active {
            self.sel.set_state(PinState::from(!active))?;
            self.sel_active = active;
        }
        Ok(())
    }

    fn drive_sck(&mut self, high: bool) -> Result<(), E> {
        if self.sck_high != high {
            self.sck.set_state(PinState::from(high))?;
            self.sck_high = high;
        }
        Ok(())
    }

    fn drive_mosi(&mut self, high: bool) -> Result<(), E> {
        if self.mosi_high != high {
            self.mosi.set_state(PinState::from(high))?;
            self.mosi_high = high;
        }
        Ok(())
    }

    fn drive_idle(&mut self) -> Result<(), E> {
        self.drive_sel(false)?;
        self.drive_sck(false)?;
        self.drive_mosi(false)
    }

    /// Hold the shifter in its reset state: `Idle`, counter cleared, lines
    /// idle. The completion flag keeps its level; only the next transfer's
    /// first edge drops it, which is what the command side waits for.
    ///
    /// Called by the command side the moment readiness rises, so even a
    /// reset window shorter than one generated period cannot be missed.
    pub fn enter_reset(&mut self) -> Result<(), E> {
        if !self.in_reset {
            self.in_reset = true;
            self.state = State::Idle;
            self.ctr = 0;
            self.drive_idle()?;
        }
        Ok(())
    }

    /// Full re-initialization: reset state plus a cleared receive word.
    pub fn hard_reset(&mut self) -> Result<(), E> {
        self.in_reset = false; // force the drive even if already held
        self.rx = W::default();
        self.enter_reset()
    }

    /// Step once on a rising edge of the generated bit clock. `reset` is the
    /// level of the command side's readiness flag, which doubles as this
    /// machine's reset input.
    pub fn clock_edge(&mut self, reset: bool, req: &Request<W>, complete: &Flag) -> Result<(), E> {
        if reset {
            return self.enter_reset();
        }
        self.in_reset = false;

        match self.state {
            State::Idle => {
                if self.ctr == req.bits {
                    complete.set(true);
                    self.drive_sel(false)?;
                } else {
                    complete.set(false);
                    self.rx = W::default();
                    self.drive_sel(true)?;
                    self.state = State::Setup;
                }
            }
            State::Setup => {
                // One full period of SCK low between select assert and the
                // first pulse.
                self.state = State::Sample;
            }
            State::Sample => {
                let pos = req.bits - self.ctr - 1;
                let level = self.miso.is_high()?;
                self.rx = self.rx.with_bit(pos, level);
                self.drive_sck(true)?;
                self.state = State::Shift;
            }
            State::Shift => {
                let pos = req.bits - self.ctr - 1;
                self.drive_mosi(req.tx.bit(pos))?;
                self.drive_sck(false)?;
                self.ctr += 1;
                self.state = if self.ctr == req.bits {
                    State::Idle
                } else {
                    State::Sample
                };
            }
        }
        Ok(())
    }

    #[inline]
    pub fn rx(&self) -> W {
        self.rx
    }

    /// Release the owned lines.
    pub fn free(self) -> (SEL, SCK, MOSI, MISO) {
        (self.sel, self.sck, self.mosi, self.miso)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock, State as Pin, Transaction};

    fn req(bits: u32, tx: u8) -> Request<u8> {
        Request { bits, tx }
    }

    #[test]
    fn construction_drives_lines_idle_once() {
        let sel = Mock::new(&[Transaction::set(Pin::High)]);
        let sck = Mock::new(&[Transaction::set(Pin::Low)]);
        let mosi = Mock::new(&[Transaction::set(Pin::Low)]);
        let miso = Mock::new(&[]);

        let shifter = Shifter::<u8, _, _, _, _>::new(sel, sck, mosi, miso).unwrap();

        let (mut sel, mut sck, mut mosi, mut miso) = shifter.free();
        sel.done();
        sck.done();
        mosi.done();
        miso.done();
    }

    #[test]
    fn held_in_reset_the_lines_stay_quiet() {
        let sel = Mock::new(&[Transaction::set(Pin::High)]);
        let sck = Mock::new(&[Transaction::set(Pin::Low)]);
        let mosi = Mock::new(&[Transaction::set(Pin::Low)]);
        let miso = Mock::new(&[]);

        let mut shifter = Shifter::<u8, _, _, _, _>::new(sel, sck, mosi, miso).unwrap();
        let complete = Flag::new(false);
        for _ in 0..10 {
            shifter.clock_edge(true, &req(8, 0xff), &complete).unwrap();
        }
        assert!(!complete.get());

        let (mut sel, mut sck, mut mosi, mut miso) = shifter.free();
        sel.done();
        sck.done();
        mosi.done();
        miso.done();
    }

    #[test]
    fn single_bit_exchange_waveform() {
        // new():   SEL high, SCK low, MOSI low
        // edge 0:  Idle -> Setup, select asserts
        // edge 1:  Setup -> Sample
        // edge 2:  Sample: read MISO, SCK high
        // edge 3:  Shift: MOSI <- tx bit 0 (high), SCK low, count -> Idle
        // edge 4:  Idle: completion raised, select released
        let sel = Mock::new(&[
            Transaction::set(Pin::High),
            Transaction::set(Pin::Low),
            Transaction::set(Pin::High),
        ]);
        let sck = Mock::new(&[
            Transaction::set(Pin::Low),
            Transaction::set(Pin::High),
            Transaction::set(Pin::Low),
        ]);
        let mosi = Mock::new(&[Transaction::set(Pin::Low), Transaction::set(Pin::High)]);
        let miso = Mock::new(&[Transaction::get(Pin::High)]);

        let mut shifter = Shifter::<u8, _, _, _, _>::new(sel, sck, mosi, miso).unwrap();
        let complete = Flag::new(true); // stale level from a previous transfer
        let request = req(1, 0b1);

        shifter.clock_edge(false, &request, &complete).unwrap();
        assert!(!complete.get()); // start acknowledged
        for _ in 0..4 {
            shifter.clock_edge(false, &request, &complete).unwrap();
        }
        assert!(complete.get());
        assert_eq!(shifter.rx(), 0b1);

        let (mut sel, mut sck, mut mosi, mut miso) = shifter.free();
        sel.done();
        sck.done();
        mosi.done();
        miso.done();
    }

    #[test]
    fn reset_leaves_the_completion_level_alone() {
        let sel = Mock::new(&[Transaction::set(Pin::High)]);
        let sck = Mock::new(&[Transaction::set(Pin::Low)]);
        let mosi = Mock::new(&[Transaction::set(Pin::Low)]);
        let miso = Mock::new(&[]);

        let mut shifter = Shifter::<u8, _, _, _, _>::new(sel, sck, mosi, miso).unwrap();
        let complete = Flag::new(true);
        shifter.clock_edge(true, &req(0, 0), &complete).unwrap();
        assert!(complete.get());

        let (mut sel, mut sck, mut mosi, mut miso) = shifter.free();
        sel.done();
        sck.done();
        mosi.done();
        miso.done();
    }
}
