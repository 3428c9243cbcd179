//! Zilog Z80 CPU emulator.
//!
//! Each call to `step()` executes one complete instruction and returns the
//! T-states it took. Undocumented opcodes, the X/Y flag bits, MEMPTR and
//! the SCF/CCF Q latch are emulated; every opcode under every prefix has a
//! defined behaviour.

mod alu;
mod cpu;
mod flags;
mod interrupt;
mod registers;

pub use cpu::{CpuSnapshot, Z80};
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use interrupt::{Interrupt, InterruptController, InterruptMode};
pub use registers::{RegisterPair, Registers};
