//! Host input.
//!
//! Keys reach the machine either immediately, through
//! [`Spectrum::press_key`](crate::Spectrum::press_key), or frame-timed
//! through an [`InputQueue`] drained at the start of each frame. Both
//! paths only touch the keyboard between instructions.

use std::collections::VecDeque;

use crate::keyboard::KeyboardState;

/// A key on the 40-key Spectrum keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpectrumKey {
    // Row 0 (addr bit A8)
    CapsShift,
    Z,
    X,
    C,
    V,
    // Row 1 (addr bit A9)
    A,
    S,
    D,
    F,
    G,
    // Row 2 (addr bit A10)
    Q,
    W,
    E,
    R,
    T,
    // Row 3 (addr bit A11)
    N1,
    N2,
    N3,
    N4,
    N5,
    // Row 4 (addr bit A12)
    N0,
    N9,
    N8,
    N7,
    N6,
    // Row 5 (addr bit A13)
    P,
    O,
    I,
    U,
    Y,
    // Row 6 (addr bit A14)
    Enter,
    L,
    K,
    J,
    H,
    // Row 7 (addr bit A15)
    Space,
    SymShift,
    M,
    N,
    B,
}

impl SpectrumKey {
    /// Half-row (0-7) and bit (0-4) of this key in the matrix.
    #[must_use]
    pub const fn matrix(self) -> (usize, u8) {
        match self {
            Self::CapsShift => (0, 0),
            Self::Z => (0, 1),
            Self::X => (0, 2),
            Self::C => (0, 3),
            Self::V => (0, 4),
            Self::A => (1, 0),
            Self::S => (1, 1),
            Self::D => (1, 2),
            Self::F => (1, 3),
            Self::G => (1, 4),
            Self::Q => (2, 0),
            Self::W => (2, 1),
            Self::E => (2, 2),
            Self::R => (2, 3),
            Self::T => (2, 4),
            Self::N1 => (3, 0),
            Self::N2 => (3, 1),
            Self::N3 => (3, 2),
            Self::N4 => (3, 3),
            Self::N5 => (3, 4),
            Self::N0 => (4, 0),
            Self::N9 => (4, 1),
            Self::N8 => (4, 2),
            Self::N7 => (4, 3),
            Self::N6 => (4, 4),
            Self::P => (5, 0),
            Self::O => (5, 1),
            Self::I => (5, 2),
            Self::U => (5, 3),
            Self::Y => (5, 4),
            Self::Enter => (6, 0),
            Self::L => (6, 1),
            Self::K => (6, 2),
            Self::J => (6, 3),
            Self::H => (6, 4),
            Self::Space => (7, 0),
            Self::SymShift => (7, 1),
            Self::M => (7, 2),
            Self::N => (7, 3),
            Self::B => (7, 4),
        }
    }
}

/// A key going down or up at the start of a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputEvent {
    pub frame: u64,
    pub key: SpectrumKey,
    pub pressed: bool,
}

/// Frames a typed character is held down for.
const TYPE_HOLD_FRAMES: u64 = 3;
/// Frames between typed characters, long enough for the ROM's key repeat
/// logic to see a release.
const TYPE_GAP_FRAMES: u64 = 3;

/// Key events ordered by frame.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event after any already queued for the same frame.
    pub fn push(&mut self, event: InputEvent) {
        let at = self.events.partition_point(|queued| queued.frame <= event.frame);
        self.events.insert(at, event);
    }

    /// Press `key` at `at_frame` and release it `hold_frames` later.
    pub fn enqueue_key(&mut self, key: SpectrumKey, at_frame: u64, hold_frames: u64) {
        self.push(InputEvent {
            frame: at_frame,
            key,
            pressed: true,
        });
        self.push(InputEvent {
            frame: at_frame + hold_frames,
            key,
            pressed: false,
        });
    }

    /// Queue the keystrokes that type `text`, starting at `start_frame`.
    /// Characters with no key are skipped.
    ///
    /// Returns the first frame after the last character.
    pub fn enqueue_text(&mut self, text: &str, start_frame: u64) -> u64 {
        let mut frame = start_frame;
        for ch in text.chars() {
            for &key in keys_for_char(ch) {
                self.enqueue_key(key, frame, TYPE_HOLD_FRAMES);
            }
            frame += TYPE_HOLD_FRAMES + TYPE_GAP_FRAMES;
        }
        frame
    }

    /// Apply every event due at or before `frame`.
    pub fn process(&mut self, frame: u64, keyboard: &mut KeyboardState) {
        let due = self.events.partition_point(|event| event.frame <= frame);
        for event in self.events.drain(..due) {
            if event.pressed {
                keyboard.press(event.key);
            } else {
                keyboard.release(event.key);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Keys held together to type `ch` in the ROM's L mode.
fn keys_for_char(ch: char) -> &'static [SpectrumKey] {
    use SpectrumKey as K;

    static LETTERS: [SpectrumKey; 26] = [
        K::A, K::B, K::C, K::D, K::E, K::F, K::G, K::H, K::I, K::J, K::K, K::L, K::M,
        K::N, K::O, K::P, K::Q, K::R, K::S, K::T, K::U, K::V, K::W, K::X, K::Y, K::Z,
    ];
    static DIGITS: [SpectrumKey; 10] = [
        K::N0, K::N1, K::N2, K::N3, K::N4, K::N5, K::N6, K::N7, K::N8, K::N9,
    ];

    match ch {
        'a'..='z' => std::slice::from_ref(&LETTERS[ch as usize - 'a' as usize]),
        'A'..='Z' => std::slice::from_ref(&LETTERS[ch as usize - 'A' as usize]),
        '0'..='9' => std::slice::from_ref(&DIGITS[ch as usize - '0' as usize]),
        ' ' => &[K::Space],
        '\n' => &[K::Enter],
        '"' => &[K::SymShift, K::P],
        ':' => &[K::SymShift, K::Z],
        ';' => &[K::SymShift, K::O],
        '-' => &[K::SymShift, K::J],
        '+' => &[K::SymShift, K::K],
        '*' => &[K::SymShift, K::B],
        '/' => &[K::SymShift, K::V],
        '=' => &[K::SymShift, K::L],
        '<' => &[K::SymShift, K::R],
        '>' => &[K::SymShift, K::T],
        ',' => &[K::SymShift, K::N],
        '.' => &[K::SymShift, K::M],
        '(' => &[K::SymShift, K::N8],
        ')' => &[K::SymShift, K::N9],
        _ => &[],
    }
}
