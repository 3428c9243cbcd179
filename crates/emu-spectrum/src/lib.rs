//! ZX Spectrum 16K/48K emulation core.
//!
//! A [`Spectrum`] owns a Z80, its address and port spaces, the ULA and a
//! [`FrameSink`] for video. The host calls [`Spectrum::run_frame`] fifty
//! times a second; each call executes one frame of T-states, hands video
//! memory to the sink and raises the frame interrupt. No threads, no I/O
//! and no global state: any number of machines can run side by side.

mod bus;
mod config;
mod error;
pub mod input;
mod io;
mod keyboard;
mod memory;
mod scheduler;
mod spectrum;
mod ula;
mod video;

pub use bus::SpectrumBus;
pub use config::{CYCLES_PER_FRAME, INT_PULSE_CYCLES, SpectrumConfig, SpectrumModel};
pub use error::{ConfigError, MemoryError};
pub use input::{InputEvent, InputQueue, SpectrumKey};
pub use io::{IoSpace, IoSpaceBuilder, PortDecode, PortHandler};
pub use keyboard::{KeyboardMatrix, KeyboardState};
pub use memory::{AddressSpace, MemoryMap, RegionKind};
pub use scheduler::{FrameTarget, Scheduler};
pub use spectrum::{MachineSnapshot, Spectrum, TrapHandler};
pub use ula::{ULA_DECODE, Ula};
pub use video::{FB_HEIGHT, FB_WIDTH, Frame, FrameSink, PALETTE, ScreenRenderer};
