use log::debug;
use rand::Rng;

use crate::error::Chip8Error;
use crate::state::{
    ADDRESS_MASK, Address, Chip8State, DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT_ADDR, FONT_HEIGHT, Key,
    Mode, Register,
};

/// Raw operand fields of an instruction word. Pure bit masking; every field
/// is extracted whether or not the opcode uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// First nibble. Represents the operation code.
    pub opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    pub x: u8,
    /// Third nibble. Used to look up one of the 16 registers.
    pub y: u8,
    /// Fourth nibble. A 4-bit number.
    pub n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    pub nn: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    pub nnn: Address,
}
impl DecodedInstruction {
    pub fn new(raw: u16) -> Self {
        DecodedInstruction {
            opcode: (raw >> 12) as u8,
            x: ((raw >> 8) & 0x0F) as u8,
            y: ((raw >> 4) & 0x0F) as u8,
            n: (raw & 0x0F) as u8,
            nn: (raw & 0x00FF) as u8,
            nnn: raw & 0x0FFF,
        }
    }

    fn reg_x(&self) -> Register {
        Register::from_nibble(self.x)
    }

    fn reg_y(&self) -> Register {
        Register::from_nibble(self.y)
    }
}

/// One of the 35 CHIP-8 instructions with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    ClearScreen,
    /// 00EE
    SubroutineReturn,
    /// 1NNN
    Jump(Address),
    /// 2NNN
    SubroutineCall(Address),
    /// 3XNN
    SkipEqImmediate(Register, u8),
    /// 4XNN
    SkipNeqImmediate(Register, u8),
    /// 5XY0
    SkipXEqY(Register, Register),
    /// 9XY0
    SkipXNeqY(Register, Register),
    /// 6XNN
    SetImmediate(Register, u8),
    /// 7XNN
    AddImmediate(Register, u8),
    /// 8XY0
    SetXToY(Register, Register),
    /// 8XY1
    BinaryOr(Register, Register),
    /// 8XY2
    BinaryAnd(Register, Register),
    /// 8XY3
    LogicalXor(Register, Register),
    /// 8XY4
    BinaryAdd(Register, Register),
    /// 8XY5
    SubtractYFromX(Register, Register),
    /// 8XY6
    RightShift(Register, Register),
    /// 8XY7
    SubtractXFromY(Register, Register),
    /// 8XYE
    LeftShift(Register, Register),
    /// ANNN
    SetIndex(Address),
    /// BNNN. The register is VX, taken from the top nibble of NNN; it is
    /// only used in modern mode.
    JumpWithOffset(Register, Address),
    /// CXNN
    Random(Register, u8),
    /// DXYN
    Display(Register, Register, u8),
    /// EX9E
    SkipIfKeyPressed(Register),
    /// EXA1
    SkipIfKeyNotPressed(Register),
    /// FX07
    SetVxFromTimer(Register),
    /// FX15
    SetDelayTimer(Register),
    /// FX18
    SetSoundTimer(Register),
    /// FX1E
    AddToIndex(Register),
    /// FX0A
    GetKey(Register),
    /// FX29
    FontChar(Register),
    /// FX33
    BinaryCodedDecimal(Register),
    /// FX55
    Store(Register),
    /// FX65
    Load(Register),
}

/// Decodes an instruction word. Returns `None` for words that have no
/// CHIP-8 meaning, including `0NNN` machine-code calls.
pub fn decode(raw: u16) -> Option<Instruction> {
    use Instruction::*;

    let decoded = DecodedInstruction::new(raw);
    let (x, y) = (decoded.reg_x(), decoded.reg_y());

    let instruction = match decoded.opcode {
        0x0 => match decoded.nnn {
            0x0E0 => ClearScreen,
            0x0EE => SubroutineReturn,
            _ => return None,
        },
        0x1 => Jump(decoded.nnn),
        0x2 => SubroutineCall(decoded.nnn),
        0x3 => SkipEqImmediate(x, decoded.nn),
        0x4 => SkipNeqImmediate(x, decoded.nn),
        0x5 if decoded.n == 0 => SkipXEqY(x, y),
        0x6 => SetImmediate(x, decoded.nn),
        0x7 => AddImmediate(x, decoded.nn),
        0x8 => match decoded.n {
            0x0 => SetXToY(x, y),
            0x1 => BinaryOr(x, y),
            0x2 => BinaryAnd(x, y),
            0x3 => LogicalXor(x, y),
            0x4 => BinaryAdd(x, y),
            0x5 => SubtractYFromX(x, y),
            0x6 => RightShift(x, y),
            0x7 => SubtractXFromY(x, y),
            0xE => LeftShift(x, y),
            _ => return None,
        },
        0x9 if decoded.n == 0 => SkipXNeqY(x, y),
        0xA => SetIndex(decoded.nnn),
        0xB => JumpWithOffset(x, decoded.nnn),
        0xC => Random(x, decoded.nn),
        0xD => Display(x, y, decoded.n),
        0xE => match decoded.nn {
            0x9E => SkipIfKeyPressed(x),
            0xA1 => SkipIfKeyNotPressed(x),
            _ => return None,
        },
        0xF => match decoded.nn {
            0x07 => SetVxFromTimer(x),
            0x0A => GetKey(x),
            0x15 => SetDelayTimer(x),
            0x18 => SetSoundTimer(x),
            0x1E => AddToIndex(x),
            0x29 => FontChar(x),
            0x33 => BinaryCodedDecimal(x),
            0x55 => Store(x),
            0x65 => Load(x),
            _ => return None,
        },
        _ => return None,
    };
    Some(instruction)
}

fn skip_next(state: &mut Chip8State) {
    state.pc = state.pc.wrapping_add(2) & ADDRESS_MASK;
}

/// Key named by VX for the key-test instructions. Values of 0xF and above
/// name no testable key.
fn tested_key(state: &Chip8State, reg_x: Register) -> Option<Key> {
    let value = state.registers.read(reg_x);
    if value < 0xF {
        Key::from_index(value)
    } else {
        None
    }
}

impl Instruction {
    /// Applies the instruction to `state`. PC must already point past the
    /// instruction word.
    pub fn execute<R: Rng>(
        &self,
        state: &mut Chip8State,
        rng: &mut R,
    ) -> Result<(), Chip8Error> {
        use Instruction::*;

        match *self {
            ClearScreen => state.clear_display(),
            SubroutineReturn => {
                let Some(return_address) = state.stack.pop() else {
                    return Err(Chip8Error::StackUnderflow {
                        pc: state.pc.wrapping_sub(2) & ADDRESS_MASK,
                    });
                };
                state.pc = return_address;
            }
            Jump(nnn) => state.pc = nnn,
            SubroutineCall(nnn) => {
                state.stack.push(state.pc);
                state.pc = nnn;
            }
            SkipEqImmediate(reg_x, nn) => {
                if state.registers.read(reg_x) == nn {
                    skip_next(state);
                }
            }
            SkipNeqImmediate(reg_x, nn) => {
                if state.registers.read(reg_x) != nn {
                    skip_next(state);
                }
            }
            SkipXEqY(reg_x, reg_y) => {
                if state.registers.read(reg_x) == state.registers.read(reg_y) {
                    skip_next(state);
                }
            }
            SkipXNeqY(reg_x, reg_y) => {
                if state.registers.read(reg_x) != state.registers.read(reg_y) {
                    skip_next(state);
                }
            }
            SetImmediate(reg_x, nn) => state.registers.write(reg_x, nn),
            AddImmediate(reg_x, nn) => {
                let value_x = state.registers.read(reg_x);
                state.registers.write(reg_x, value_x.wrapping_add(nn));
            }
            SetXToY(reg_x, reg_y) => {
                let value_y = state.registers.read(reg_y);
                state.registers.write(reg_x, value_y);
            }
            BinaryOr(reg_x, reg_y) => {
                let value = state.registers.read(reg_x) | state.registers.read(reg_y);
                state.registers.write(reg_x, value);
            }
            BinaryAnd(reg_x, reg_y) => {
                let value = state.registers.read(reg_x) & state.registers.read(reg_y);
                state.registers.write(reg_x, value);
            }
            LogicalXor(reg_x, reg_y) => {
                let value = state.registers.read(reg_x) ^ state.registers.read(reg_y);
                state.registers.write(reg_x, value);
            }
            BinaryAdd(reg_x, reg_y) => {
                let value_x = state.registers.read(reg_x);
                let value_y = state.registers.read(reg_y);
                let (sum, carry) = value_x.overflowing_add(value_y);
                state.registers.write_with_flag(reg_x, sum, carry);
            }
            SubtractYFromX(reg_x, reg_y) => {
                let value_x = state.registers.read(reg_x);
                let value_y = state.registers.read(reg_y);
                // VF is 1 when no borrow occurred
                state
                    .registers
                    .write_with_flag(reg_x, value_x.wrapping_sub(value_y), value_x >= value_y);
            }
            SubtractXFromY(reg_x, reg_y) => {
                let value_x = state.registers.read(reg_x);
                let value_y = state.registers.read(reg_y);
                state
                    .registers
                    .write_with_flag(reg_x, value_y.wrapping_sub(value_x), value_y >= value_x);
            }
            RightShift(reg_x, reg_y) => {
                let value = shift_source(state, reg_x, reg_y);
                state
                    .registers
                    .write_with_flag(reg_x, value >> 1, value & 0x01 == 1);
            }
            LeftShift(reg_x, reg_y) => {
                let value = shift_source(state, reg_x, reg_y);
                state
                    .registers
                    .write_with_flag(reg_x, value << 1, value & 0x80 != 0);
            }
            SetIndex(nnn) => state.index = nnn,
            JumpWithOffset(reg_x, nnn) => {
                let offset_reg = match state.mode() {
                    Mode::Modern => reg_x,
                    Mode::CosmicVip => Register::V0,
                };
                let offset = Address::from(state.registers.read(offset_reg));
                state.pc = nnn.wrapping_add(offset) & ADDRESS_MASK;
            }
            Random(reg_x, nn) => {
                let random_value = rng.random::<u8>() & nn;
                state.registers.write(reg_x, random_value);
            }
            Display(reg_x, reg_y, rows) => {
                let x = usize::from(state.registers.read(reg_x)) % DISPLAY_WIDTH;
                let y = usize::from(state.registers.read(reg_y)) % DISPLAY_HEIGHT;
                let collision = state.draw_sprite(x, y, rows);
                state.registers.write(Register::VF, u8::from(collision));
            }
            SkipIfKeyPressed(reg_x) => {
                if let Some(key) = tested_key(state, reg_x) {
                    if state.keypad.is_key_pressed(key) {
                        skip_next(state);
                    }
                }
            }
            SkipIfKeyNotPressed(reg_x) => {
                if let Some(key) = tested_key(state, reg_x) {
                    if !state.keypad.is_key_pressed(key) {
                        skip_next(state);
                    }
                }
            }
            SetVxFromTimer(reg_x) => state.registers.write(reg_x, state.delay_timer),
            SetDelayTimer(reg_x) => state.delay_timer = state.registers.read(reg_x),
            SetSoundTimer(reg_x) => state.sound_timer = state.registers.read(reg_x),
            AddToIndex(reg_x) => {
                let value_x = Address::from(state.registers.read(reg_x));
                let sum = state.index.wrapping_add(value_x);
                if state.mode() == Mode::Modern {
                    state
                        .registers
                        .write(Register::VF, u8::from(sum > ADDRESS_MASK));
                }
                state.index = sum;
            }
            GetKey(reg_x) => match state.keypad.first_pressed() {
                Some(key) => state.registers.write(reg_x, key.index()),
                None => {
                    // Re-run this instruction next cycle
                    debug!("waiting for key at {:#05X}", state.pc.wrapping_sub(2));
                    state.pc = state.pc.wrapping_sub(2) & ADDRESS_MASK;
                }
            },
            FontChar(reg_x) => {
                let digit = Address::from(state.registers.read(reg_x) & 0x0F);
                state.index = FONT_ADDR + digit * FONT_HEIGHT;
            }
            BinaryCodedDecimal(reg_x) => {
                let value_x = state.registers.read(reg_x);
                let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
                for (offset, digit) in (0..).zip(bcd) {
                    state.memory.write(state.index.wrapping_add(offset), digit);
                }
            }
            Store(reg_x) => {
                for (offset, reg) in (0..).zip(reg_x.through()) {
                    let value = state.registers.read(reg);
                    state.memory.write(state.index.wrapping_add(offset), value);
                }
                advance_index(state, reg_x);
            }
            Load(reg_x) => {
                for (offset, reg) in (0..).zip(reg_x.through()) {
                    let value = state.memory.read(state.index.wrapping_add(offset));
                    state.registers.write(reg, value);
                }
                advance_index(state, reg_x);
            }
        }
        Ok(())
    }
}

/// Value the shift instructions operate on. The VIP copied VY into VX
/// before shifting; modern interpreters shift VX in place.
fn shift_source(state: &mut Chip8State, reg_x: Register, reg_y: Register) -> u8 {
    if state.mode() == Mode::CosmicVip {
        debug!("shift copies {reg_y:?} into {reg_x:?}");
        let value_y = state.registers.read(reg_y);
        state.registers.write(reg_x, value_y);
    }
    state.registers.read(reg_x)
}

/// The VIP left I pointing just past the last register copied by FX55/FX65.
fn advance_index(state: &mut Chip8State, reg_x: Register) {
    if state.mode() == Mode::CosmicVip {
        state.index = state.index.wrapping_add(reg_x as Address + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PC_START_ADDR;
    use rand::{SeedableRng, rngs::StdRng};

    fn setup(mode: Mode) -> Chip8State {
        let mut state = Chip8State::new(mode, &[]).expect("empty ROM always fits");
        // Execution assumes PC has already moved past the instruction.
        state.pc = PC_START_ADDR + 2;
        state
    }

    fn run(state: &mut Chip8State, raw: u16) -> Result<(), Chip8Error> {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let instruction = decode(raw).expect("test opcode must decode");
        instruction.execute(state, &mut rng)
    }

    #[test]
    fn fields_are_extracted_from_every_position() {
        let decoded = DecodedInstruction::new(0xD3A7);
        assert_eq!(decoded.opcode, 0xD);
        assert_eq!(decoded.x, 0x3);
        assert_eq!(decoded.y, 0xA);
        assert_eq!(decoded.n, 0x7);
        assert_eq!(decoded.nn, 0xA7);
        assert_eq!(decoded.nnn, 0x3A7);
    }

    #[test]
    fn decode_dispatches_on_secondary_fields() {
        assert_eq!(decode(0x00E0), Some(Instruction::ClearScreen));
        assert_eq!(decode(0x00EE), Some(Instruction::SubroutineReturn));
        assert_eq!(
            decode(0x8AB6),
            Some(Instruction::RightShift(Register::VA, Register::VB))
        );
        assert_eq!(
            decode(0xB2F0),
            Some(Instruction::JumpWithOffset(Register::V2, 0x2F0))
        );
        assert_eq!(
            decode(0xF40A),
            Some(Instruction::GetKey(Register::V4))
        );
        assert_eq!(
            decode(0xD125),
            Some(Instruction::Display(Register::V1, Register::V2, 5))
        );
    }

    #[test]
    fn undefined_words_do_not_decode() {
        for raw in [0x0000, 0x0123, 0x00E1, 0x5121, 0x912F, 0x8128, 0x812F, 0xE19F, 0xF1FF] {
            assert_eq!(decode(raw), None, "{raw:#06X} should be undefined");
        }
    }

    #[test]
    fn add_immediate_wraps_without_touching_vf() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V1, 0xFF);
        state.registers.write(Register::VF, 7);
        run(&mut state, 0x7102)?;
        assert_eq!(state.registers.read(Register::V1), 0x01);
        assert_eq!(state.registers.read(Register::VF), 7);
        Ok(())
    }

    #[test]
    fn add_sets_and_clears_carry() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V0, 0xF0);
        state.registers.write(Register::V1, 0x20);
        run(&mut state, 0x8014)?;
        assert_eq!(state.registers.read(Register::V0), 0x10);
        assert_eq!(state.registers.read(Register::VF), 1);

        run(&mut state, 0x8014)?;
        assert_eq!(state.registers.read(Register::V0), 0x30);
        assert_eq!(state.registers.read(Register::VF), 0);
        Ok(())
    }

    #[test]
    fn subtract_flags_no_borrow() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V0, 5);
        state.registers.write(Register::V1, 5);
        run(&mut state, 0x8015)?;
        assert_eq!(state.registers.read(Register::V0), 0);
        assert_eq!(state.registers.read(Register::VF), 1);

        run(&mut state, 0x8015)?;
        assert_eq!(state.registers.read(Register::V0), 0xFB);
        assert_eq!(state.registers.read(Register::VF), 0);
        Ok(())
    }

    #[test]
    fn reverse_subtract_flags_no_borrow() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V0, 3);
        state.registers.write(Register::V1, 10);
        run(&mut state, 0x8017)?;
        assert_eq!(state.registers.read(Register::V0), 7);
        assert_eq!(state.registers.read(Register::VF), 1);

        state.registers.write(Register::V0, 11);
        run(&mut state, 0x8017)?;
        assert_eq!(state.registers.read(Register::V0), 0xFF);
        assert_eq!(state.registers.read(Register::VF), 0);
        Ok(())
    }

    #[test]
    fn flag_overwrites_result_when_x_is_vf() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::VF, 0xFF);
        state.registers.write(Register::V1, 0x02);
        run(&mut state, 0x8F14)?;
        assert_eq!(state.registers.read(Register::VF), 1);

        state.registers.write(Register::VF, 0x10);
        run(&mut state, 0x8F15)?;
        assert_eq!(state.registers.read(Register::VF), 1);

        state.registers.write(Register::VF, 0x03);
        run(&mut state, 0x8FF6)?;
        assert_eq!(state.registers.read(Register::VF), 1);

        // 0x05 - 0x20 borrows, so the flag 0 replaces the difference
        state.registers.write(Register::VF, 0x20);
        state.registers.write(Register::V1, 0x05);
        run(&mut state, 0x8F17)?;
        assert_eq!(state.registers.read(Register::VF), 0);

        // 0x40 << 1 is 0x80 with MSB 0 shifted out
        state.registers.write(Register::VF, 0x40);
        run(&mut state, 0x8FFE)?;
        assert_eq!(state.registers.read(Register::VF), 0);

        state.registers.write(Register::VF, 0x81);
        run(&mut state, 0x8FFE)?;
        assert_eq!(state.registers.read(Register::VF), 1);
        Ok(())
    }

    #[test]
    fn logical_ops_leave_vf_alone() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::CosmicVip);
        state.registers.write(Register::V0, 0b1100);
        state.registers.write(Register::V1, 0b1010);
        state.registers.write(Register::VF, 9);
        run(&mut state, 0x8011)?;
        assert_eq!(state.registers.read(Register::V0), 0b1110);
        run(&mut state, 0x8012)?;
        assert_eq!(state.registers.read(Register::V0), 0b1010);
        run(&mut state, 0x8013)?;
        assert_eq!(state.registers.read(Register::V0), 0);
        assert_eq!(state.registers.read(Register::VF), 9);
        Ok(())
    }

    #[test]
    fn modern_shift_ignores_vy() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V0, 0b1000_0011);
        state.registers.write(Register::V1, 0xAA);
        run(&mut state, 0x8016)?;
        assert_eq!(state.registers.read(Register::V0), 0b0100_0001);
        assert_eq!(state.registers.read(Register::VF), 1);
        assert_eq!(state.registers.read(Register::V1), 0xAA);

        run(&mut state, 0x801E)?;
        assert_eq!(state.registers.read(Register::V0), 0b1000_0010);
        assert_eq!(state.registers.read(Register::VF), 0);
        Ok(())
    }

    #[test]
    fn legacy_shift_copies_vy_first() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::CosmicVip);
        state.registers.write(Register::V0, 0x01);
        state.registers.write(Register::V1, 0b1000_0010);
        run(&mut state, 0x8016)?;
        assert_eq!(state.registers.read(Register::V0), 0b0100_0001);
        assert_eq!(state.registers.read(Register::VF), 0);

        run(&mut state, 0x801E)?;
        assert_eq!(state.registers.read(Register::V0), 0b0000_0100);
        assert_eq!(state.registers.read(Register::VF), 1);
        Ok(())
    }

    #[test]
    fn jump_with_offset_follows_mode() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V0, 0x10);
        state.registers.write(Register::V3, 0x04);
        run(&mut state, 0xB300)?;
        assert_eq!(state.pc, 0x304);

        let mut state = setup(Mode::CosmicVip);
        state.registers.write(Register::V0, 0x10);
        state.registers.write(Register::V3, 0x04);
        run(&mut state, 0xB300)?;
        assert_eq!(state.pc, 0x310);
        Ok(())
    }

    #[test]
    fn add_to_index_overflow_flag_is_modern_only() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.index = 0xFFE;
        state.registers.write(Register::V2, 0x03);
        run(&mut state, 0xF21E)?;
        assert_eq!(state.index, 0x1001);
        assert_eq!(state.registers.read(Register::VF), 1);

        state.index = 0x100;
        run(&mut state, 0xF21E)?;
        assert_eq!(state.registers.read(Register::VF), 0);

        let mut state = setup(Mode::CosmicVip);
        state.index = 0xFFE;
        state.registers.write(Register::V2, 0x03);
        state.registers.write(Register::VF, 5);
        run(&mut state, 0xF21E)?;
        assert_eq!(state.index, 0x1001);
        assert_eq!(state.registers.read(Register::VF), 5);
        Ok(())
    }

    #[test]
    fn store_and_load_advance_index_only_in_legacy_mode() -> Result<(), Chip8Error> {
        for (mode, final_index) in [(Mode::Modern, 0x300), (Mode::CosmicVip, 0x303)] {
            let mut state = setup(mode);
            state.index = 0x300;
            state.registers.write(Register::V0, 1);
            state.registers.write(Register::V1, 2);
            state.registers.write(Register::V2, 3);
            state.registers.write(Register::V3, 4);
            run(&mut state, 0xF255)?;
            assert_eq!(state.index, final_index);
            assert_eq!(state.memory.read(0x300), 1);
            assert_eq!(state.memory.read(0x302), 3);
            assert_eq!(state.memory.read(0x303), 0);

            state.index = 0x300;
            state.memory.write(0x300, 0xA0);
            state.memory.write(0x301, 0xA1);
            state.memory.write(0x302, 0xA2);
            run(&mut state, 0xF265)?;
            assert_eq!(state.index, final_index);
            assert_eq!(state.registers.read(Register::V0), 0xA0);
            assert_eq!(state.registers.read(Register::V2), 0xA2);
            assert_eq!(state.registers.read(Register::V3), 4);
        }
        Ok(())
    }

    #[test]
    fn bcd_writes_three_digits() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.index = 0x400;
        state.registers.write(Register::V7, 254);
        run(&mut state, 0xF733)?;
        assert_eq!(state.memory.read(0x400), 2);
        assert_eq!(state.memory.read(0x401), 5);
        assert_eq!(state.memory.read(0x402), 4);
        assert_eq!(state.index, 0x400);
        Ok(())
    }

    #[test]
    fn font_char_uses_low_nibble() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V1, 0x3A);
        run(&mut state, 0xF129)?;
        assert_eq!(state.index, FONT_ADDR + 10 * 5);
        Ok(())
    }

    #[test]
    fn skips_advance_pc_by_one_instruction() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V1, 0x42);
        run(&mut state, 0x3142)?;
        assert_eq!(state.pc, 0x204);
        run(&mut state, 0x4142)?;
        assert_eq!(state.pc, 0x204);
        run(&mut state, 0x5110)?;
        assert_eq!(state.pc, 0x206);
        run(&mut state, 0x9100)?;
        assert_eq!(state.pc, 0x208);
        Ok(())
    }

    #[test]
    fn key_skips_ignore_key_f() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.registers.write(Register::V0, 0x5);
        state.keypad.press_key(Key::Key5);
        run(&mut state, 0xE09E)?;
        assert_eq!(state.pc, 0x204);
        run(&mut state, 0xE0A1)?;
        assert_eq!(state.pc, 0x204);

        state.registers.write(Register::V0, 0xF);
        state.keypad.press_key(Key::KeyF);
        run(&mut state, 0xE09E)?;
        run(&mut state, 0xE0A1)?;
        assert_eq!(state.pc, 0x204);
        Ok(())
    }

    #[test]
    fn get_key_rewinds_until_a_key_is_down() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        run(&mut state, 0xF30A)?;
        assert_eq!(state.pc, PC_START_ADDR);

        state.pc += 2;
        state.keypad.press_key(Key::KeyC);
        state.keypad.press_key(Key::Key9);
        run(&mut state, 0xF30A)?;
        assert_eq!(state.pc, PC_START_ADDR + 2);
        assert_eq!(state.registers.read(Register::V3), 0x9);
        Ok(())
    }

    #[test]
    fn call_and_return_use_the_stack() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        run(&mut state, 0x2400)?;
        assert_eq!(state.pc, 0x400);
        assert_eq!(state.stack, vec![0x202]);

        state.pc = 0x402;
        run(&mut state, 0x00EE)?;
        assert_eq!(state.pc, 0x202);
        assert!(state.stack.is_empty());
        Ok(())
    }

    #[test]
    fn return_with_empty_stack_is_an_error() {
        let mut state = setup(Mode::Modern);
        assert_eq!(
            run(&mut state, 0x00EE),
            Err(Chip8Error::StackUnderflow { pc: PC_START_ADDR })
        );
    }

    #[test]
    fn random_is_masked() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        for _ in 0..32 {
            run(&mut state, 0xC50F)?;
            assert_eq!(state.registers.read(Register::V5) & 0xF0, 0);
        }
        run(&mut state, 0xC500)?;
        assert_eq!(state.registers.read(Register::V5), 0);
        Ok(())
    }

    #[test]
    fn drawing_twice_restores_the_screen() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.index = FONT_ADDR;
        state.registers.write(Register::V0, 70);
        state.registers.write(Register::V1, 40);
        run(&mut state, 0xD015)?;
        assert_eq!(state.registers.read(Register::VF), 0);
        // Coordinates wrap before drawing: (70, 40) lands on (6, 8).
        assert!(state.pixel(6, 8));
        let lit = state.display.count_ones();
        assert_eq!(lit, 14);

        run(&mut state, 0xD015)?;
        assert_eq!(state.registers.read(Register::VF), 1);
        assert_eq!(state.display.count_ones(), 0);
        Ok(())
    }

    #[test]
    fn clear_screen_does_not_hold_for_redraw() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.display.set(5, true);
        run(&mut state, 0x00E0)?;
        assert!(state.display.not_any());
        assert!(!state.redraw_pending);
        Ok(())
    }

    #[test]
    fn zero_row_draw_clears_vf() -> Result<(), Chip8Error> {
        let mut state = setup(Mode::Modern);
        state.index = FONT_ADDR;
        state.registers.write(Register::VF, 1);
        run(&mut state, 0xD010)?;
        assert_eq!(state.registers.read(Register::VF), 0);
        assert!(state.display.not_any());
        Ok(())
    }
}
