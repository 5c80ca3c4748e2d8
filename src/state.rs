use bitvec::{BitArr, array::BitArray};

use crate::error::Chip8Error;

pub type Timer = u8;
pub type Address = u16;
pub type CallStack = Vec<Address>;
pub type Framebuffer = BitArr!(for DISPLAY_WIDTH * DISPLAY_HEIGHT);

pub const MEM_SIZE: usize = 4096;
pub const ADDRESS_MASK: Address = 0x0FFF;
pub const FONT_ADDR: Address = 0x050;
pub const FONT_HEIGHT: Address = 5;
pub const PC_START_ADDR: Address = 0x200;
/// Everything from the program start to the top of memory.
pub const MAX_ROM_SIZE: usize = MEM_SIZE - PC_START_ADDR as usize;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

const FONT_DATA: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Selects between the two documented quirk sets.
///
/// `CosmicVip` reproduces the original COSMAC VIP interpreter: shifts read
/// VY, `BNNN` always offsets by V0, `FX1E` leaves VF alone and `FX55`/`FX65`
/// advance I past the last register copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Modern,
    CosmicVip,
}

/// 4 KiB of RAM. Every access wraps modulo 0x1000, so no address is ever
/// out of bounds.
pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            let font = usize::from(FONT_ADDR);
            data[font..font + FONT_DATA.len()].copy_from_slice(&FONT_DATA);
            data
        };

        Memory { data }
    }

    pub fn read(&self, addr: Address) -> u8 {
        self.data[usize::from(addr & ADDRESS_MASK)]
    }

    pub fn write(&mut self, addr: Address, value: u8) {
        self.data[usize::from(addr & ADDRESS_MASK)] = value;
    }

    /// Reads the big-endian instruction word at `addr`.
    pub fn read_word(&self, addr: Address) -> u16 {
        let high_byte = u16::from(self.read(addr));
        let low_byte = u16::from(self.read(addr.wrapping_add(1)));
        (high_byte << 8) | low_byte
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            });
        }
        let start = usize::from(PC_START_ADDR);
        self.data[start..start + rom.len()].copy_from_slice(rom);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    const ALL: [Register; NUM_REGISTERS] = [
        Register::V0,
        Register::V1,
        Register::V2,
        Register::V3,
        Register::V4,
        Register::V5,
        Register::V6,
        Register::V7,
        Register::V8,
        Register::V9,
        Register::VA,
        Register::VB,
        Register::VC,
        Register::VD,
        Register::VE,
        Register::VF,
    ];

    /// Register named by the low nibble of `value`.
    pub fn from_nibble(value: u8) -> Self {
        Self::ALL[usize::from(value & 0x0F)]
    }

    /// V0 up to and including `self`, in order.
    pub fn through(self) -> impl Iterator<Item = Register> {
        Self::ALL.into_iter().take(self as usize + 1)
    }
}

pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg as usize]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg as usize] = value;
    }

    /// Writes a result to `reg` and then its flag to VF. When `reg` is VF the
    /// flag wins.
    pub fn write_with_flag(&mut self, reg: Register, value: u8, flag: bool) {
        self.write(reg, value);
        self.write(Register::VF, u8::from(flag));
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
}
impl Key {
    const ALL: [Key; NUM_KEYS] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
    ];

    pub fn from_index(index: u8) -> Option<Key> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Input latch. Written by the driver on key transitions, read by the
/// key-test and key-wait instructions.
pub struct Keypad {
    pressed: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            pressed: [false; NUM_KEYS],
        }
    }

    pub fn press_key(&mut self, key: Key) {
        self.pressed[key as usize] = true;
    }

    pub fn release_key(&mut self, key: Key) {
        self.pressed[key as usize] = false;
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.pressed[key as usize]
    }

    /// Lowest-numbered key currently held down.
    pub fn first_pressed(&self) -> Option<Key> {
        Key::ALL.into_iter().find(|&key| self.is_key_pressed(key))
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Chip8State {
    mode: Mode,
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub delay_timer: Timer,
    pub sound_timer: Timer,
    pub display: Framebuffer,
    pub keypad: Keypad,
    /// Set by sprite draws; cleared by the frame tick.
    pub redraw_pending: bool,
}
impl Chip8State {
    pub fn new(mode: Mode, rom: &[u8]) -> Result<Self, Chip8Error> {
        let mut memory = Memory::new();
        memory.load_rom(rom)?;

        Ok(Chip8State {
            mode,
            memory,
            registers: RegisterBank::new(),
            pc: PC_START_ADDR,
            index: 0,
            stack: Vec::new(),
            delay_timer: 0,
            sound_timer: 0,
            display: BitArray::ZERO,
            keypad: Keypad::new(),
            redraw_pending: false,
        })
    }

    /// Quirk set chosen at construction. Fixed for the life of the state.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT && self.display[y * DISPLAY_WIDTH + x]
    }

    /// Only sprite draws hold the instruction clock for a redraw; clearing
    /// does not.
    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    /// XORs an `rows`-high sprite read from memory at I onto the framebuffer
    /// with its top-left corner at (`x`, `y`). Pixels past the right or
    /// bottom edge are dropped. Returns whether any lit pixel was turned off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: u8) -> bool {
        let mut collision = false;

        for row in 0..usize::from(rows) {
            let pixel_y = y + row;
            if pixel_y >= DISPLAY_HEIGHT {
                break;
            }
            let byte = self.memory.read(self.index.wrapping_add(row as Address));

            for bit in 0..8 {
                let pixel_x = x + bit;
                if pixel_x >= DISPLAY_WIDTH {
                    break;
                }
                if (byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }

                let index = pixel_y * DISPLAY_WIDTH + pixel_x;
                let current_pixel = self.display[index];
                collision |= current_pixel;
                self.display.set(index, !current_pixel);
            }
        }

        self.redraw_pending = true;
        collision
    }

    /// Decrements both timers by one, stopping at zero.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}
