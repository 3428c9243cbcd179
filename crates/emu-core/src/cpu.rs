//! CPU core trait.

use crate::Bus;

/// A CPU core.
///
/// CPUs execute whole instructions and access memory through a bus. The bus
/// is passed in, not owned, so it can be shared with other components
/// (e.g., the video chip) between steps.
///
/// CPUs expose their internal state for observation and debugging.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction, or one interrupt acknowledge sequence, and
    /// return the number of T-states it took.
    ///
    /// An instruction always completes within a single call.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Returns the current program counter.
    ///
    /// Returns `u32` to support all CPU address widths. Narrower CPUs
    /// zero-extend.
    fn pc(&self) -> u32;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is halted.
    fn is_halted(&self) -> bool;

    /// Request a maskable interrupt with the given data byte. The request
    /// stays pending until the CPU acknowledges it.
    fn interrupt(&mut self, data: u8);

    /// Request a non-maskable interrupt.
    fn nmi(&mut self);

    /// Reset the CPU to its initial state.
    fn reset(&mut self);
}
