//! Setup and image-loading errors.

use thiserror::Error;

/// A machine that cannot be built as configured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cycles per frame must be non-zero")]
    ZeroCyclesPerFrame,
    #[error("ROM image is {actual} bytes, expected {expected}")]
    RomSize { expected: usize, actual: usize },
    #[error("memory region at {start:#06X} is empty, unaligned or runs past 64K")]
    Misaligned { start: u32 },
    #[error("memory regions overlap at {at:#06X}")]
    Overlap { at: u32 },
    #[error("memory map leaves {start:#06X}..{end:#06X} uncovered")]
    Gap { start: u32, end: u32 },
    #[error("video range {start:#06X}..{end:#06X} is not inside RAM")]
    VideoOutsideRam { start: u32, end: u32 },
}

/// A raw image that does not fit the address space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("{len} bytes at {base:#06X} run past the end of the address space")]
    ImageTooLarge { base: u16, len: usize },
}
