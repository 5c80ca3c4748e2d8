use crate::state::Address;

/// Failures the interpreter core can report.
///
/// Every variant except `RomTooLarge` halts the interpreter: once `step` has
/// returned one of them, every later `step` returns `Halted`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("Stack underflow: return at {pc:#05X} with an empty call stack")]
    StackUnderflow { pc: Address },

    #[error("Unknown opcode {opcode:#06X} at {pc:#05X}")]
    UnknownOpcode { opcode: u16, pc: Address },

    #[error("Interpreter is halted")]
    Halted,
}
