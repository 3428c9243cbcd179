//! ZX Spectrum keyboard.
//!
//! The keyboard is an 8×5 matrix of half-rows, read via port $FE. The high
//! byte of the port address selects the half-rows to scan: each cleared bit
//! (A8-A15) enables one half-row, and several can be scanned at once.
//!
//! | Addr bit | Row | Keys (bit 0-4)       |
//! |----------|-----|----------------------|
//! | A8       | 0   | Shift, Z, X, C, V    |
//! | A9       | 1   | A, S, D, F, G        |
//! | A10      | 2   | Q, W, E, R, T        |
//! | A11      | 3   | 1, 2, 3, 4, 5        |
//! | A12      | 4   | 0, 9, 8, 7, 6        |
//! | A13      | 5   | P, O, I, U, Y        |
//! | A14      | 6   | Enter, L, K, J, H    |
//! | A15      | 7   | Space, Sym, M, N, B  |

use crate::input::SpectrumKey;

/// Anything the ULA can scan as a keyboard.
pub trait KeyboardMatrix: Send + 'static {
    /// Scan the half-rows whose bit is clear in `row_select`.
    ///
    /// Returns bits 0-4 active low (0 = pressed); bits 5-7 are ignored.
    fn read_rows(&self, row_select: u8) -> u8;
}

/// Key state for the standard 40-key matrix.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    /// Bits 0-4 per half-row, 1 = pressed.
    rows: [u8; 8],
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear a key. `row` is 0-7, `bit` is 0-4; anything else is
    /// ignored.
    pub fn set_key(&mut self, row: usize, bit: u8, pressed: bool) {
        if bit >= 5 {
            return;
        }
        if let Some(half_row) = self.rows.get_mut(row) {
            if pressed {
                *half_row |= 1 << bit;
            } else {
                *half_row &= !(1 << bit);
            }
        }
    }

    pub fn press(&mut self, key: SpectrumKey) {
        let (row, bit) = key.matrix();
        self.set_key(row, bit, true);
    }

    pub fn release(&mut self, key: SpectrumKey) {
        let (row, bit) = key.matrix();
        self.set_key(row, bit, false);
    }

    #[must_use]
    pub fn is_pressed(&self, key: SpectrumKey) -> bool {
        let (row, bit) = key.matrix();
        self.rows[row] & (1 << bit) != 0
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    /// Columns pulled low by the half-rows set in `active`.
    fn columns(&self, active: u8) -> u8 {
        self.rows
            .iter()
            .enumerate()
            .filter(|(row, _)| active & (1 << row) != 0)
            .fold(0, |cols, (_, keys)| cols | keys)
    }
}

impl KeyboardMatrix for KeyboardState {
    /// The matrix is passive, so three pressed keys on the corners of a
    /// rectangle pull the fourth corner low too ("ghosting"). Rows sharing
    /// a pressed column with a selected row join the scan until nothing
    /// changes.
    fn read_rows(&self, row_select: u8) -> u8 {
        let mut active = !row_select;
        loop {
            let cols = self.columns(active);
            let reached = self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, keys)| *keys & cols != 0)
                .fold(active, |rows, (row, _)| rows | (1 << row));
            if reached == active {
                return !cols & 0x1F;
            }
            active = reached;
        }
    }
}
