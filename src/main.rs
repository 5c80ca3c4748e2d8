mod display;
mod emulator;
mod input;
mod settings;

use anyhow::Context;
use clap::Parser;

use crate::emulator::Emulator;
use crate::settings::Settings;

fn main() -> anyhow::Result<()> {
    // stdout belongs to the terminal UI; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let settings = Settings::parse();
    let rom = std::fs::read(&settings.rom)
        .with_context(|| format!("failed to read ROM {}", settings.rom.display()))?;

    let mut emulator = Emulator::new(&settings, &rom)?;
    emulator.run()?;

    Ok(())
}
