//! Execution times of the COSMAC VIP interpreter, used to pace emulation.

use std::time::Duration;

use crate::instruction::Instruction;

/// Time between frame ticks (60 Hz).
pub const FRAME_PERIOD: Duration = Duration::from_micros(16_670);

/// Wait for the vertical blank that precedes every sprite draw.
const DRAW_BASE_US: u64 = 22_734;
const DRAW_ROW_US: u64 = 68;
const BLOCK_COPY_US: u64 = 64;

impl Instruction {
    /// Time the VIP took to execute this instruction. Variable-cost
    /// instructions scale with their operand.
    pub fn latency(&self) -> Duration {
        use Instruction::*;

        let micros = match *self {
            ClearScreen => 109,
            SubroutineReturn | Jump(_) | SubroutineCall(_) | JumpWithOffset(..) => 105,
            SkipEqImmediate(..) | SkipNeqImmediate(..) | SetIndex(_) => 55,
            SkipXEqY(..) | SkipXNeqY(..) => 73,
            SetImmediate(..) => 27,
            AddImmediate(..) => 45,
            SetXToY(..)
            | BinaryOr(..)
            | BinaryAnd(..)
            | LogicalXor(..)
            | BinaryAdd(..)
            | SubtractYFromX(..)
            | RightShift(..)
            | SubtractXFromY(..)
            | LeftShift(..) => 200,
            Random(..) => 164,
            Display(_, _, rows) => DRAW_BASE_US + DRAW_ROW_US * u64::from(rows),
            SkipIfKeyPressed(_) | SkipIfKeyNotPressed(_) => 73,
            // Charged on every re-execution while waiting.
            GetKey(_) => 73,
            SetVxFromTimer(_) | SetDelayTimer(_) | SetSoundTimer(_) => 45,
            AddToIndex(_) => 86,
            FontChar(_) => 91,
            BinaryCodedDecimal(_) => 927,
            Store(reg_x) | Load(reg_x) => BLOCK_COPY_US * (reg_x as u64 + 1),
        };
        Duration::from_micros(micros)
    }
}
