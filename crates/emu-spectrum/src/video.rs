//! Video output.
//!
//! At the end of each frame the machine hands the display file, attributes
//! and border colour to a [`FrameSink`]. [`ScreenRenderer`] turns them into
//! an ARGB32 image; hosts with other needs supply their own sink.
//!
//! # Screen memory layout
//!
//! Bitmap at $4000-$57FF (6144 bytes), attributes at $5800-$5AFF (768 bytes).
//! Bitmap address: `010Y7 Y6Y2 Y1Y0 Y5Y4Y3 X4X3X2X1X0`
//! Attribute address: `0101 10Y7 Y6Y5 Y4Y3 X4X3X2X1X0`

use tracing::trace;

/// Framebuffer dimensions: 256×192 display inside a 32/48 pixel border.
pub const FB_WIDTH: usize = 320;
pub const FB_HEIGHT: usize = 288;

const BORDER_LEFT: usize = 32;
const BORDER_TOP: usize = 48;
const SCREEN_WIDTH: usize = 256;
const SCREEN_HEIGHT: usize = 192;

const ATTRIBUTES_OFFSET: usize = 0x1800;

/// FLASH swaps ink and paper every this many frames.
const FLASH_FRAMES: u64 = 16;

/// ARGB32, indexed by `bright << 3 | colour`. Normal colours use 0xCD
/// intensity, bright ones 0xFF; black is the same in both halves.
pub const PALETTE: [u32; 16] = [
    0xFF00_0000,
    0xFF00_00CD,
    0xFFCD_0000,
    0xFFCD_00CD,
    0xFF00_CD00,
    0xFF00_CDCD,
    0xFFCD_CD00,
    0xFFCD_CDCD,
    0xFF00_0000,
    0xFF00_00FF,
    0xFFFF_0000,
    0xFFFF_00FF,
    0xFF00_FF00,
    0xFF00_FFFF,
    0xFFFF_FF00,
    0xFFFF_FFFF,
];

/// Everything the video producer needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Zero-based frame number.
    pub number: u64,
    /// Border colour, 0-7.
    pub border: u8,
    /// Display file followed by attributes, starting at $4000.
    pub video_ram: &'a [u8],
}

/// Receives each completed frame.
pub trait FrameSink: Send {
    fn finalize_frame(&mut self, frame: &Frame<'_>);
}

/// Offset of the bitmap byte for display line `y`, column `col`.
fn bitmap_offset(y: usize, col: usize) -> usize {
    ((y & 0xC0) << 5) | ((y & 0x07) << 8) | ((y & 0x38) << 2) | col
}

/// Offset of the attribute byte covering display line `y`, column `col`.
fn attribute_offset(y: usize, col: usize) -> usize {
    ATTRIBUTES_OFFSET + (y / 8) * 32 + col
}

/// Renders frames into a 320×288 ARGB32 framebuffer.
pub struct ScreenRenderer {
    framebuffer: Vec<u32>,
    frames_rendered: u64,
}

impl ScreenRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            framebuffer: vec![PALETTE[0]; FB_WIDTH * FB_HEIGHT],
            frames_rendered: 0,
        }
    }

    /// Row-major ARGB32 pixels.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x < FB_WIDTH && y < FB_HEIGHT {
            Some(self.framebuffer[y * FB_WIDTH + x])
        } else {
            None
        }
    }

    fn render_display(&mut self, video_ram: &[u8], flash_inverted: bool) {
        let byte_at = |offset: usize| video_ram.get(offset).copied().unwrap_or(0);

        for y in 0..SCREEN_HEIGHT {
            let row = (BORDER_TOP + y) * FB_WIDTH + BORDER_LEFT;
            for col in 0..SCREEN_WIDTH / 8 {
                let bitmap = byte_at(bitmap_offset(y, col));
                let attr = byte_at(attribute_offset(y, col));

                // FBPPPIII
                let bright = usize::from(attr & 0x40 != 0) << 3;
                let mut ink = PALETTE[bright | usize::from(attr & 0x07)];
                let mut paper = PALETTE[bright | usize::from((attr >> 3) & 0x07)];
                if attr & 0x80 != 0 && flash_inverted {
                    std::mem::swap(&mut ink, &mut paper);
                }

                let cell = &mut self.framebuffer[row + col * 8..row + col * 8 + 8];
                for (bit, pixel) in cell.iter_mut().enumerate() {
                    *pixel = if bitmap & (0x80 >> bit) != 0 { ink } else { paper };
                }
            }
        }
    }
}

impl Default for ScreenRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for ScreenRenderer {
    fn finalize_frame(&mut self, frame: &Frame<'_>) {
        self.framebuffer.fill(PALETTE[usize::from(frame.border & 0x07)]);
        let flash_inverted = (frame.number / FLASH_FRAMES) % 2 == 1;
        self.render_display(frame.video_ram, flash_inverted);
        self.frames_rendered += 1;
        trace!(frame = frame.number, border = frame.border, "frame rendered");
    }
}
