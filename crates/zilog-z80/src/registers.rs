//! Z80 register set.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

/// A high/low byte pair that also reads and writes as one 16-bit value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterPair {
    pub hi: u8,
    pub lo: u8,
}

impl RegisterPair {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self {
            hi: (value >> 8) as u8,
            lo: value as u8,
        }
    }

    /// Combined 16-bit value, high byte first.
    #[must_use]
    pub const fn get(self) -> u16 {
        (self.hi as u16) << 8 | self.lo as u16
    }

    /// Split a 16-bit value into the two halves.
    pub fn set(&mut self, value: u16) {
        *self = Self::new(value);
    }
}

/// Z80 register file.
///
/// A plain value: copying it gives a snapshot. Interrupt flip-flops and the
/// interrupt mode live in [`crate::InterruptController`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    // Main registers. A is `af.hi`, F is `af.lo`.
    pub af: RegisterPair,
    pub bc: RegisterPair,
    pub de: RegisterPair,
    pub hl: RegisterPair,

    // Alternate registers, swapped in by EX AF,AF' and EXX.
    pub af_alt: RegisterPair,
    pub bc_alt: RegisterPair,
    pub de_alt: RegisterPair,
    pub hl_alt: RegisterPair,

    // Index registers. The halves are reachable through undocumented
    // IXH/IXL/IYH/IYL opcodes.
    pub ix: RegisterPair,
    pub iy: RegisterPair,

    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    /// WZ/MEMPTR - internal temporary register.
    /// Affects undocumented X/Y flags in BIT instructions.
    pub wz: u16,
}

impl Registers {
    /// Register values after power-on reset.
    #[must_use]
    pub fn power_on() -> Self {
        Self {
            af: RegisterPair::new(0xFFFF),
            sp: 0xFFFF,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn a(&self) -> u8 {
        self.af.hi
    }

    #[must_use]
    pub const fn f(&self) -> u8 {
        self.af.lo
    }

    /// Swap AF with AF'.
    pub fn exchange_af(&mut self) {
        core::mem::swap(&mut self.af, &mut self.af_alt);
    }

    /// Swap BC, DE and HL with their alternates.
    pub fn exchange_main(&mut self) {
        core::mem::swap(&mut self.bc, &mut self.bc_alt);
        core::mem::swap(&mut self.de, &mut self.de_alt);
        core::mem::swap(&mut self.hl, &mut self.hl_alt);
    }
}
