//! CHIP-8 interpreter core paced by COSMAC VIP instruction timings.
//!
//! [`Interpreter`] owns the machine state and exposes the two operations a
//! host loop needs: [`Interpreter::step`] for one instruction and
//! [`Interpreter::tick_frame`] for one 60 Hz frame.

pub mod error;
pub mod instruction;
pub mod interpreter;
pub mod state;
pub mod timing;

pub use error::Chip8Error;
pub use instruction::{Instruction, decode};
pub use interpreter::Interpreter;
pub use state::{Chip8State, DISPLAY_HEIGHT, DISPLAY_WIDTH, Key, MAX_ROM_SIZE, Mode};
pub use timing::FRAME_PERIOD;
