//! Core traits and types for instruction-stepped emulation.
//!
//! A CPU executes one instruction per `step()` and reports the T-states it
//! consumed. Whoever drives the CPU owns the cycle counter.

mod bus;
mod clock;
mod cpu;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use ticks::Ticks;
