//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. The CPU may run
/// at a divided rate, but everything derives from this frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g., `3_500_000` for a 48K Spectrum CPU).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Ticks per frame at the given frame rate (integer division).
    ///
    /// Returns zero for a zero frame rate, which frame schedulers reject.
    #[must_use]
    pub const fn ticks_per_frame(&self, frames_per_second: u64) -> Ticks {
        match self.frequency_hz.checked_div(frames_per_second) {
            Some(ticks) => Ticks::new(ticks),
            None => Ticks::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_spectrum_frame() {
        let clock = MasterClock::new(3_500_000);
        assert_eq!(clock.ticks_per_frame(50), Ticks::new(70_000));
    }

    #[test]
    fn zero_rate_gives_zero_ticks() {
        assert_eq!(MasterClock::new(3_500_000).ticks_per_frame(0), Ticks::ZERO);
    }
}
