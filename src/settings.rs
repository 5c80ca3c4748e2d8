use std::path::PathBuf;

use chip8_vip::Mode;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Settings {
    /// Path to a raw CHIP-8 ROM image
    pub rom: PathBuf,

    /// Use the original COSMAC VIP interpreter quirks instead of modern ones
    #[arg(long)]
    pub cosmic_vip: bool,

    /// Seed for the random number instruction, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Settings {
    pub fn mode(&self) -> Mode {
        if self.cosmic_vip {
            Mode::CosmicVip
        } else {
            Mode::Modern
        }
    }

    pub fn rom_name(&self) -> String {
        self.rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_modern_mode() {
        let settings = Settings::parse_from(["chip8-vip", "roms/pong.ch8"]);
        assert_eq!(settings.mode(), Mode::Modern);
        assert_eq!(settings.seed, None);
        assert_eq!(settings.rom_name(), "pong");
    }

    #[test]
    fn cosmic_vip_flag_selects_legacy_mode() {
        let settings =
            Settings::parse_from(["chip8-vip", "--cosmic-vip", "--seed", "7", "game.ch8"]);
        assert_eq!(settings.mode(), Mode::CosmicVip);
        assert_eq!(settings.seed, Some(7));
    }

    #[test]
    fn rom_path_is_required() {
        assert!(Settings::try_parse_from(["chip8-vip"]).is_err());
    }
}
