use std::time::Duration;

use log::{trace, warn};
use rand::{SeedableRng, rngs::StdRng};

use crate::error::Chip8Error;
use crate::instruction::{Instruction, decode};
use crate::state::{ADDRESS_MASK, Chip8State, Framebuffer, Keypad, Mode};
use crate::timing::FRAME_PERIOD;

/// Runs a [`Chip8State`] against two logical clocks: an instruction clock
/// advanced by each instruction's VIP latency, and a 60 Hz frame clock that
/// drives the timers and presentation.
///
/// Time is passed in by the caller as the elapsed time since the run
/// started, so the engine never reads a wall clock itself.
pub struct Interpreter {
    state: Chip8State,
    rng: StdRng,
    next_cycle: Duration,
    next_frame: Duration,
    halted: bool,
}

impl Interpreter {
    pub fn new(mode: Mode, rom: &[u8]) -> Result<Self, Chip8Error> {
        Ok(Self::with_rng(Chip8State::new(mode, rom)?, StdRng::from_os_rng()))
    }

    /// Like [`Interpreter::new`], with a fixed seed for `CXNN`.
    pub fn with_seed(mode: Mode, rom: &[u8], seed: u64) -> Result<Self, Chip8Error> {
        Ok(Self::with_rng(
            Chip8State::new(mode, rom)?,
            StdRng::seed_from_u64(seed),
        ))
    }

    fn with_rng(state: Chip8State, rng: StdRng) -> Self {
        Interpreter {
            state,
            rng,
            next_cycle: Duration::ZERO,
            next_frame: Duration::ZERO,
            halted: false,
        }
    }

    pub fn state(&self) -> &Chip8State {
        &self.state
    }

    pub fn keypad_mut(&mut self) -> &mut Keypad {
        &mut self.state.keypad
    }

    pub fn display(&self) -> &Framebuffer {
        &self.state.display
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Logical time at which the next instruction may run.
    pub fn next_cycle(&self) -> Duration {
        self.next_cycle
    }

    /// Logical time of the next frame tick.
    pub fn next_frame(&self) -> Duration {
        self.next_frame
    }

    /// True when an instruction is due at `now` and no redraw is waiting to
    /// be presented.
    pub fn cycle_due(&self, now: Duration) -> bool {
        !self.halted && !self.state.redraw_pending && now >= self.next_cycle
    }

    pub fn frame_due(&self, now: Duration) -> bool {
        now >= self.next_frame
    }

    fn fetch_instruction(&mut self) -> Result<Instruction, Chip8Error> {
        let pc = self.state.pc & ADDRESS_MASK;
        let raw = self.state.memory.read_word(pc);

        // Move the program counter to next instruction
        self.state.pc = pc.wrapping_add(2) & ADDRESS_MASK;

        let instruction = decode(raw).ok_or(Chip8Error::UnknownOpcode { opcode: raw, pc })?;
        trace!("{pc:#05X}: {raw:04X} {instruction:?}");
        Ok(instruction)
    }

    /// Executes one instruction and pushes the instruction clock forward by
    /// its latency, which is returned.
    ///
    /// Any error halts the interpreter for good.
    pub fn step(&mut self) -> Result<Duration, Chip8Error> {
        if self.halted {
            return Err(Chip8Error::Halted);
        }

        let result = self.fetch_instruction().and_then(|instruction| {
            instruction.execute(&mut self.state, &mut self.rng)?;
            Ok(instruction.latency())
        });

        match result {
            Ok(latency) => {
                self.next_cycle += latency;
                Ok(latency)
            }
            Err(err) => {
                warn!("halting: {err}");
                self.halted = true;
                Err(err)
            }
        }
    }

    /// Runs one 60 Hz frame: decrements the timers, releases the redraw
    /// hold and schedules the next frame one period after `now`. Returns
    /// whether a sprite was drawn since the previous tick.
    pub fn tick_frame(&mut self, now: Duration) -> bool {
        self.next_frame = now + FRAME_PERIOD;
        self.state.tick_timers();
        std::mem::take(&mut self.state.redraw_pending)
    }
}
