use std::time::{Duration, Instant};

use anyhow::Context;
use chip8_vip::{Interpreter, MAX_ROM_SIZE, Mode};
use log::info;

use crate::display::Screen;
use crate::input::{self, InputEvent, KeyListener};
use crate::settings::Settings;

/// Below this the loop keeps spinning instead of sleeping.
const MIN_SLEEP: Duration = Duration::from_millis(1);

pub struct Emulator {
    interpreter: Interpreter,
    title: String,
}

impl Emulator {
    pub fn new(settings: &Settings, rom: &[u8]) -> anyhow::Result<Self> {
        anyhow::ensure!(
            rom.len() <= MAX_ROM_SIZE,
            "ROM is too large ({} bytes), max size is {MAX_ROM_SIZE} bytes",
            rom.len()
        );

        let mode = settings.mode();
        let interpreter = match settings.seed {
            Some(seed) => Interpreter::with_seed(mode, rom, seed)?,
            None => Interpreter::new(mode, rom)?,
        };
        let title = match mode {
            Mode::Modern => settings.rom_name(),
            Mode::CosmicVip => format!("{} (COSMAC VIP)", settings.rom_name()),
        };

        Ok(Emulator { interpreter, title })
    }

    fn apply(&mut self, event: InputEvent) -> bool {
        let keypad = self.interpreter.keypad_mut();
        match event {
            InputEvent::Pressed(key) => keypad.press_key(key),
            InputEvent::Released(key) => keypad.release_key(key),
            InputEvent::Quit => return false,
        }
        true
    }

    /// Runs until Esc is pressed or the interpreter halts.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut screen = Screen::new()?;
        let keys = KeyListener::spawn();
        let start = Instant::now();
        info!("running {}", self.title);

        loop {
            for event in keys.pending() {
                if !self.apply(event) {
                    return Ok(());
                }
            }

            let now = start.elapsed();
            if self.interpreter.cycle_due(now) {
                self.interpreter
                    .step()
                    .with_context(|| format!("{} stopped", self.title))?;
            }

            if self.interpreter.frame_due(now) {
                self.interpreter.tick_frame(now);
                screen.present(self.interpreter.display(), &self.title)?;
                if input::drain_terminal_events()? {
                    return Ok(());
                }
            }

            self.idle(start.elapsed());
        }
    }

    /// Sleeps while neither clock has anything due soon.
    fn idle(&self, now: Duration) {
        let next_frame = self.interpreter.next_frame();
        let wake = if self.interpreter.cycle_due(next_frame) {
            self.interpreter.next_cycle().min(next_frame)
        } else {
            next_frame
        };
        let wait = wake.saturating_sub(now);
        if wait >= MIN_SLEEP {
            std::thread::sleep(wait - MIN_SLEEP / 2);
        }
    }
}
