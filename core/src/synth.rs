//! Synthetic signal sources for tests and the host simulator.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::capture::WordSource;
use crate::joybus::ControllerSource;
use crate::pixel::{PixelWord, SyncBits};

/// Horizontal blanking before and after every row: HSYNC and CLAMP low.
const BLANK: u32 = SyncBits::VSYNC.bits() | SyncBits::CSYNC.bits();
/// Vertical sync pulse.
const VSYNC_PULSE: u32 = SyncBits::HSYNC.bits() | SyncBits::CLAMP.bits();

/// Builds the word stream of one frame: a VSYNC pulse, `rows` rows of blanking plus `active`
/// active words, trailing blanking, and the VSYNC pulse that ends the frame.
#[derive(Clone)]
pub struct FrameBuilder<F = fn(usize, usize) -> PixelWord> {
    rows: usize,
    active: usize,
    blank: usize,
    pulse: usize,
    pixel: F,
}

fn grey(_row: usize, _col: usize) -> PixelWord {
    PixelWord::compose(0x40, 0x40, 0x40, SyncBits::ACTIVE)
}

impl FrameBuilder {
    pub fn new(rows: usize, active: usize) -> Self {
        Self {
            rows,
            active,
            blank: 4,
            pulse: 8,
            pixel: grey,
        }
    }
}

impl<F: Fn(usize, usize) -> PixelWord> FrameBuilder<F> {
    /// Per-word content of the active region. The sync bits of the returned word are replaced.
    pub fn pixels<G: Fn(usize, usize) -> PixelWord>(self, pixel: G) -> FrameBuilder<G> {
        FrameBuilder {
            rows: self.rows,
            active: self.active,
            blank: self.blank,
            pulse: self.pulse,
            pixel,
        }
    }

    pub fn blanking(mut self, words: usize) -> Self {
        self.blank = words.max(2);
        self
    }

    pub fn word_count(&self) -> usize {
        2 * self.pulse + self.rows * (self.blank + self.active) + self.blank
    }

    pub fn build(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(self.word_count());
        words.extend(core::iter::repeat(VSYNC_PULSE).take(self.pulse));
        for row in 0..self.rows {
            words.extend(core::iter::repeat(BLANK).take(self.blank));
            words.extend((0..self.active).map(|col| {
                ((self.pixel)(row, col).raw() & !0xf) | SyncBits::all().bits()
            }));
        }
        words.extend(core::iter::repeat(BLANK).take(self.blank));
        words.extend(core::iter::repeat(VSYNC_PULSE).take(self.pulse));
        words
    }
}

/// SMPTE-style colour bars, eight columns wide.
pub fn color_bars(_row: usize, col: usize, active: usize) -> PixelWord {
    const BARS: [(u8, u8, u8); 8] = [
        (0x7f, 0x7f, 0x7f),
        (0x7f, 0x7f, 0x00),
        (0x00, 0x7f, 0x7f),
        (0x00, 0x7f, 0x00),
        (0x7f, 0x00, 0x7f),
        (0x7f, 0x00, 0x00),
        (0x00, 0x00, 0x7f),
        (0x00, 0x00, 0x00),
    ];
    let bar = (col * BARS.len() / active.max(1)).min(BARS.len() - 1);
    let (r, g, b) = BARS[bar];
    PixelWord::compose(r, g, b, SyncBits::ACTIVE)
}

/// Replays a fixed list of words. Only for tests and the simulator, never wired to a board.
///
/// # Panics
///
/// `next_word` panics once the list runs out. A real capture source never runs dry, and the
/// capture loop would otherwise spin forever waiting for the next VSYNC.
pub struct ScriptedWords {
    words: VecDeque<u32>,
}

impl ScriptedWords {
    pub fn new(words: impl IntoIterator<Item = u32>) -> Self {
        Self {
            words: words.into_iter().collect(),
        }
    }

    pub fn push(&mut self, words: impl IntoIterator<Item = u32>) {
        self.words.extend(words);
    }

    pub fn remaining(&self) -> usize {
        self.words.len()
    }
}

impl WordSource for ScriptedWords {
    fn next_word(&mut self) -> u32 {
        match self.words.pop_front() {
            Some(word) => word,
            None => panic!("scripted word source ran dry"),
        }
    }
}

/// Endless repetition of one precomputed frame.
pub struct LoopedFrame {
    words: Vec<u32>,
    pos: usize,
}

impl LoopedFrame {
    pub fn new(words: Vec<u32>) -> Self {
        Self { words, pos: 0 }
    }
}

impl WordSource for LoopedFrame {
    #[inline]
    fn next_word(&mut self) -> u32 {
        let Some(&word) = self.words.get(self.pos) else {
            // an empty frame is a permanent VSYNC pulse
            return VSYNC_PULSE;
        };
        self.pos += 1;
        if self.pos == self.words.len() {
            self.pos = 0;
        }
        word
    }
}

/// Controller that reports a scripted sequence of states, then keeps reporting the last one.
pub struct ScriptedController {
    states: VecDeque<u32>,
    last: u32,
}

impl ScriptedController {
    pub fn new(states: impl IntoIterator<Item = u32>) -> Self {
        Self {
            states: states.into_iter().collect(),
            last: 0,
        }
    }

    pub fn push(&mut self, state: u32) {
        self.states.push_back(state);
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl ControllerSource for ScriptedController {
    fn latest(&mut self) -> u32 {
        if let Some(state) = self.states.pop_front() {
            self.last = state;
        }
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{ACTIVE_PIXEL_MASK, VSYNC_MASK};

    #[test]
    fn frame_layout() {
        let builder = FrameBuilder::new(3, 5).blanking(2);
        let words = builder.build();
        assert_eq!(words.len(), builder.word_count());

        let active = words.iter().filter(|&&w| w & ACTIVE_PIXEL_MASK == ACTIVE_PIXEL_MASK).count();
        assert_eq!(active, 15);
        assert_eq!(words[0] & VSYNC_MASK, 0);
        assert_eq!(words[words.len() - 1] & VSYNC_MASK, 0);
    }

    #[test]
    fn looped_frame_wraps() {
        let mut src = LoopedFrame::new(alloc::vec![1, 2, 3]);
        let got: Vec<u32> = (0..7).map(|_| src.next_word()).collect();
        assert_eq!(got, [1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    #[should_panic(expected = "ran dry")]
    fn scripted_words_stop_at_the_end() {
        let mut src = ScriptedWords::new([7]);
        assert_eq!(src.next_word(), 7);
        src.next_word();
    }

    #[test]
    fn scripted_controller_holds_last_state() {
        let mut pad = ScriptedController::new([5, 6]);
        assert_eq!(pad.latest(), 5);
        assert_eq!(pad.latest(), 6);
        assert_eq!(pad.latest(), 6);
    }

    #[test]
    fn bars_cover_the_row() {
        let first = color_bars(0, 0, 80);
        let last = color_bars(0, 79, 80);
        assert_eq!((first.red(), first.green(), first.blue()), (0x7f, 0x7f, 0x7f));
        assert_eq!((last.red(), last.green(), last.blue()), (0, 0, 0));
    }
}
