//! ULA port $FE.
//!
//! The ULA decodes only A0, so every even port reaches it.
//!
//! Reads: bits 0-4 keyboard (active low), bit 6 EAR, bits 5 and 7 high.
//! Writes: bits 0-2 border, bit 3 MIC, bit 4 speaker.
//!
//! With no tape signal on EAR the input follows the MIC output, as on an
//! issue 3 board.

use crate::io::{PortDecode, PortHandler};
use crate::keyboard::{KeyboardMatrix, KeyboardState};

/// Where the ULA sits on the I/O bus.
pub const ULA_DECODE: PortDecode = PortDecode::new(0x0001, 0x0000);

const EAR_BIT: u8 = 0x40;
const MIC_BIT: u8 = 0x08;
const SPEAKER_BIT: u8 = 0x10;

/// The ULA's I/O side: keyboard, border latch, speaker and tape lines.
pub struct Ula<K: KeyboardMatrix = KeyboardState> {
    keyboard: K,
    border: u8,
    mic: bool,
    speaker: bool,
    /// Tape signal on EAR; `None` falls back to MIC loopback.
    ear_in: Option<bool>,
    speaker_edges: u64,
}

impl<K: KeyboardMatrix> Ula<K> {
    /// White border, speaker and MIC low.
    pub fn new(keyboard: K) -> Self {
        Self {
            keyboard,
            border: 7,
            mic: false,
            speaker: false,
            ear_in: None,
            speaker_edges: 0,
        }
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut K {
        &mut self.keyboard
    }

    /// Border colour, 0-7.
    #[must_use]
    pub fn border(&self) -> u8 {
        self.border
    }

    #[must_use]
    pub fn mic(&self) -> bool {
        self.mic
    }

    #[must_use]
    pub fn speaker(&self) -> bool {
        self.speaker
    }

    /// Number of times the speaker line has changed level.
    #[must_use]
    pub fn speaker_edges(&self) -> u64 {
        self.speaker_edges
    }

    /// Drive EAR from a tape signal, or `None` to disconnect it.
    pub fn set_ear(&mut self, level: Option<bool>) {
        self.ear_in = level;
    }

    /// Level the CPU sees on bit 6.
    #[must_use]
    pub fn ear(&self) -> bool {
        self.ear_in.unwrap_or(self.mic)
    }
}

impl Default for Ula {
    fn default() -> Self {
        Self::new(KeyboardState::new())
    }
}

impl<K: KeyboardMatrix> PortHandler for Ula<K> {
    fn read(&mut self, port: u16) -> u8 {
        let keys = self.keyboard.read_rows((port >> 8) as u8) & 0x1F;
        let ear = if self.ear() { EAR_BIT } else { 0 };
        keys | 0xA0 | ear
    }

    fn write(&mut self, _port: u16, value: u8) {
        self.border = value & 0x07;
        self.mic = value & MIC_BIT != 0;
        let speaker = value & SPEAKER_BIT != 0;
        if speaker != self.speaker {
            self.speaker_edges += 1;
        }
        self.speaker = speaker;
    }
}
