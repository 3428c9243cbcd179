//! Spectrum address space.
//!
//! The 64K address space is split into fixed regions of ROM, RAM and
//! unmapped space at 256-byte page granularity. The layout is decided once,
//! when the machine is built; every access goes through a 256-entry page
//! table.

#![allow(clippy::cast_possible_truncation)] // Intentional: u16 addresses index into arrays.

use std::ops::Range;

use tracing::trace;

use crate::error::{ConfigError, MemoryError};

const SPACE_SIZE: u32 = 0x1_0000;
const PAGE_SIZE: u32 = 0x100;

/// Display file and attributes: $4000-$5AFF.
const VIDEO_RANGE: Range<u32> = 0x4000..0x5B00;

/// What lives at an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Read-only to the CPU; writes are discarded.
    Rom,
    Ram,
    /// Nothing attached: reads float high, writes go nowhere.
    Unmapped,
}

/// One contiguous region, `start..end` in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    start: u32,
    end: u32,
    kind: RegionKind,
}

/// Layout of the address space, checked by [`AddressSpace::new`].
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    regions: Vec<Region>,
    video: Option<Range<u32>>,
}

impl MemoryMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region covering `start..end`.
    #[must_use]
    pub fn region(mut self, start: u32, end: u32, kind: RegionKind) -> Self {
        self.regions.push(Region { start, end, kind });
        self
    }

    /// Mark `start..end` as the memory the video producer reads.
    #[must_use]
    pub fn video(mut self, start: u32, end: u32) -> Self {
        self.video = Some(start..end);
        self
    }

    /// 16K ROM, 16K RAM, nothing above $7FFF.
    #[must_use]
    pub fn spectrum_16k() -> Self {
        Self::new()
            .region(0x0000, 0x4000, RegionKind::Rom)
            .region(0x4000, 0x8000, RegionKind::Ram)
            .region(0x8000, SPACE_SIZE, RegionKind::Unmapped)
            .video(VIDEO_RANGE.start, VIDEO_RANGE.end)
    }

    /// 16K ROM, 48K RAM.
    #[must_use]
    pub fn spectrum_48k() -> Self {
        Self::new()
            .region(0x0000, 0x4000, RegionKind::Rom)
            .region(0x4000, SPACE_SIZE, RegionKind::Ram)
            .video(VIDEO_RANGE.start, VIDEO_RANGE.end)
    }

    /// Build the page table, rejecting maps that do not tile 64K exactly.
    fn pages(&self) -> Result<[RegionKind; 256], ConfigError> {
        let mut sorted = self.regions.clone();
        sorted.sort_by_key(|region| region.start);

        let mut pages = [RegionKind::Unmapped; 256];
        let mut cursor = 0;
        for region in &sorted {
            if region.start >= region.end
                || region.end > SPACE_SIZE
                || region.start % PAGE_SIZE != 0
                || region.end % PAGE_SIZE != 0
            {
                return Err(ConfigError::Misaligned {
                    start: region.start,
                });
            }
            if region.start < cursor {
                return Err(ConfigError::Overlap { at: region.start });
            }
            if region.start > cursor {
                return Err(ConfigError::Gap {
                    start: cursor,
                    end: region.start,
                });
            }
            for page in region.start / PAGE_SIZE..region.end / PAGE_SIZE {
                pages[page as usize] = region.kind;
            }
            cursor = region.end;
        }
        if cursor < SPACE_SIZE {
            return Err(ConfigError::Gap {
                start: cursor,
                end: SPACE_SIZE,
            });
        }
        Ok(pages)
    }
}

/// The CPU's 64K memory, laid out by a [`MemoryMap`].
pub struct AddressSpace {
    bytes: Box<[u8; 0x10000]>,
    pages: [RegionKind; 256],
    video: Range<usize>,
}

impl AddressSpace {
    /// Build an address space with all RAM and ROM cleared to zero.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the regions leave a gap, overlap, are not
    /// page aligned, or if the video range is not entirely RAM.
    pub fn new(map: &MemoryMap) -> Result<Self, ConfigError> {
        let pages = map.pages()?;

        let video = match &map.video {
            None => 0..0,
            Some(range) => {
                let inside_ram = range.start < range.end
                    && range.end <= SPACE_SIZE
                    && (range.start / PAGE_SIZE..=(range.end - 1) / PAGE_SIZE)
                        .all(|page| pages[page as usize] == RegionKind::Ram);
                if !inside_ram {
                    return Err(ConfigError::VideoOutsideRam {
                        start: range.start,
                        end: range.end,
                    });
                }
                range.start as usize..range.end as usize
            }
        };

        Ok(Self {
            bytes: Box::new([0; 0x10000]),
            pages,
            video,
        })
    }

    /// CPU read. Unmapped addresses read as 0xFF.
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        match self.region_kind(addr) {
            RegionKind::Unmapped => 0xFF,
            RegionKind::Rom | RegionKind::Ram => self.bytes[usize::from(addr)],
        }
    }

    /// CPU write. Only RAM takes the value.
    pub fn write(&mut self, addr: u16, value: u8) {
        match self.region_kind(addr) {
            RegionKind::Ram => self.bytes[usize::from(addr)] = value,
            kind => trace!(addr, value, ?kind, "write discarded"),
        }
    }

    /// Read without side effects, for debuggers and the video producer.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    /// Copy a raw image to `base`, ignoring ROM protection.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ImageTooLarge`] if the image would run past $FFFF.
    /// Nothing is written in that case.
    pub fn load(&mut self, base: u16, image: &[u8]) -> Result<(), MemoryError> {
        let start = usize::from(base);
        let Some(target) = self.bytes.get_mut(start..start + image.len()) else {
            return Err(MemoryError::ImageTooLarge {
                base,
                len: image.len(),
            });
        };
        target.copy_from_slice(image);
        Ok(())
    }

    /// The region the video producer reads (display file and attributes on
    /// the standard maps). Empty if the map defines no video range.
    #[must_use]
    pub fn video_ram(&self) -> &[u8] {
        &self.bytes[self.video.clone()]
    }

    #[must_use]
    pub fn region_kind(&self, addr: u16) -> RegionKind {
        self.pages[usize::from(addr >> 8)]
    }
}
