//! Spectrum model configuration.

use emu_core::MasterClock;

use crate::error::ConfigError;
use crate::memory::MemoryMap;

/// T-states in one 48K PAL frame: 312 lines of 224 T-states.
pub const CYCLES_PER_FRAME: u32 = 69_888;

/// How long the ULA holds INT low at the start of a frame.
pub const INT_PULSE_CYCLES: u32 = 32;

/// Supported Spectrum models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpectrumModel {
    Spectrum16K,
    #[default]
    Spectrum48K,
}

impl SpectrumModel {
    /// Size of the ROM image the model expects.
    #[must_use]
    pub const fn rom_size(self) -> usize {
        match self {
            Self::Spectrum16K | Self::Spectrum48K => 0x4000,
        }
    }

    /// The fixed memory layout of this model.
    #[must_use]
    pub fn memory_map(self) -> MemoryMap {
        match self {
            Self::Spectrum16K => MemoryMap::spectrum_16k(),
            Self::Spectrum48K => MemoryMap::spectrum_48k(),
        }
    }
}

/// Configuration for creating a Spectrum instance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumConfig {
    pub model: SpectrumModel,
    /// ROM data. Must be exactly 16,384 bytes.
    pub rom: Vec<u8>,
    /// Frame length in T-states.
    pub cycles_per_frame: u32,
    /// Withdraw an unacknowledged frame interrupt this many T-states into the
    /// next frame. `None` keeps it pending until the CPU takes it.
    pub interrupt_hold: Option<u32>,
    /// Byte placed on the data bus during interrupt acknowledge.
    pub interrupt_data: u8,
    /// PC after power-on and [`reset`](crate::Spectrum::reset).
    pub start_address: u16,
}

impl SpectrumConfig {
    /// Defaults for `model`: PAL frame length, interrupt held until taken,
    /// idle data bus, execution from 0x0000.
    #[must_use]
    pub fn new(model: SpectrumModel, rom: Vec<u8>) -> Self {
        Self {
            model,
            rom,
            cycles_per_frame: CYCLES_PER_FRAME,
            interrupt_hold: None,
            interrupt_data: 0xFF,
            start_address: 0x0000,
        }
    }

    /// Frame length from a CPU clock and refresh rate instead of the ULA's
    /// 312 lines of 224 T-states. A zero rate gives a zero-length frame,
    /// which [`validate`](Self::validate) rejects.
    #[must_use]
    pub fn with_frame_rate(mut self, clock: MasterClock, frames_per_second: u64) -> Self {
        let ticks = clock.ticks_per_frame(frames_per_second).get();
        self.cycles_per_frame = u32::try_from(ticks).unwrap_or(u32::MAX);
        self
    }

    /// Check everything that can be checked before building a machine.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroCyclesPerFrame`] or [`ConfigError::RomSize`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycles_per_frame == 0 {
            return Err(ConfigError::ZeroCyclesPerFrame);
        }
        let expected = self.model.rom_size();
        if self.rom.len() != expected {
            return Err(ConfigError::RomSize {
                expected,
                actual: self.rom.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, vec![0; 0x4000]);
        assert_eq!(config.cycles_per_frame, 69_888);
        assert_eq!(config.interrupt_hold, None);
        assert_eq!(config.interrupt_data, 0xFF);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_short_rom() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum16K, vec![0; 100]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::RomSize {
                expected: 0x4000,
                actual: 100
            })
        );
    }

    #[test]
    fn frame_length_from_clock() {
        let rom = vec![0; 0x4000];
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, rom)
            .with_frame_rate(MasterClock::new(3_500_000), 50);
        assert_eq!(config.cycles_per_frame, 70_000);

        let config = config.with_frame_rate(MasterClock::new(3_500_000), 0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCyclesPerFrame));
    }

    #[test]
    fn rejects_zero_frame_length() {
        let mut config = SpectrumConfig::new(SpectrumModel::Spectrum48K, vec![0; 0x4000]);
        config.cycles_per_frame = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroCyclesPerFrame));
    }
}
