//! # Pixel Words
//!
//! The video PIO program samples the console's parallel bus and pushes one
//! 32-bit word per pixel clock. Every word carries three 7-bit colour channels
//! and the four sync lines:
//!
//! ```text
//!  31      24 23      16 15       8 7   4 3 2 1 0
//!  xBBBBBBB   xGGGGGGG   xRRRRRRR  xxxx V L H C
//! ```
//!
//! | bit | line   | meaning when set                         |
//! |-----|--------|------------------------------------------|
//! | 0   | CSYNC  | not inside a composite sync pulse        |
//! | 1   | HSYNC  | not inside a horizontal sync pulse       |
//! | 2   | CLAMP  | not inside the colour clamp interval     |
//! | 3   | VSYNC  | not inside the vertical sync pulse       |
//!
//! The lines are active-low on the wire, so a word is part of the visible
//! picture only when VSYNC, HSYNC and CLAMP are all set.

use bitfield::bitfield;

bitflags::bitflags! {
    /// Sync/status bits in the low nibble of a [`PixelWord`].
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SyncBits: u32 {
        const CSYNC = 1 << 0;
        const HSYNC = 1 << 1;
        const CLAMP = 1 << 2;
        const VSYNC = 1 << 3;

        /// All three must be set for a word to carry an active pixel.
        const ACTIVE = Self::VSYNC.bits() | Self::HSYNC.bits() | Self::CLAMP.bits();
    }
}

/// Raw mask for the inner capture loop.
pub const VSYNC_MASK: u32 = SyncBits::VSYNC.bits();
/// Raw mask for the inner capture loop.
pub const ACTIVE_PIXEL_MASK: u32 = SyncBits::ACTIVE.bits();

bitfield! {
    /// One word read from the video capture FIFO.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct PixelWord(u32);
    impl Debug;
    pub u8, red, _: 14, 8;
    pub u8, green, _: 22, 16;
    pub u8, blue, _: 30, 24;
    u8, sync_nibble, _: 3, 0;
}

impl PixelWord {
    #[inline(always)]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Builds a word from 7-bit channels and sync bits. Channel values are masked to 7 bits.
    pub const fn compose(red: u8, green: u8, blue: u8, sync: SyncBits) -> Self {
        Self(
            ((blue as u32 & 0x7f) << 24)
                | ((green as u32 & 0x7f) << 16)
                | ((red as u32 & 0x7f) << 8)
                | sync.bits(),
        )
    }

    pub fn sync(&self) -> SyncBits {
        SyncBits::from_bits_truncate(self.sync_nibble() as u32)
    }

    #[inline(always)]
    pub const fn in_frame(self) -> bool {
        self.0 & VSYNC_MASK != 0
    }

    #[inline(always)]
    pub const fn is_active(self) -> bool {
        self.0 & ACTIVE_PIXEL_MASK == ACTIVE_PIXEL_MASK
    }
}

/// Packed colour format of the frame buffer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ColorDepth {
    /// 15-bit: 5 significant bits per channel, green's lowest bit always clear.
    #[default]
    Rgb555,
    /// 16-bit: 5/6/5.
    Rgb565,
}

impl ColorDepth {
    pub const fn bits(self) -> u32 {
        match self {
            ColorDepth::Rgb555 => 15,
            ColorDepth::Rgb565 => 16,
        }
    }

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            15 => Some(ColorDepth::Rgb555),
            16 => Some(ColorDepth::Rgb565),
            _ => None,
        }
    }

    /// Picks the conversion used for a whole frame.
    #[inline(always)]
    pub const fn converter(self) -> fn(u32) -> u16 {
        match self {
            ColorDepth::Rgb555 => rgb555,
            ColorDepth::Rgb565 => rgb565,
        }
    }
}

/// Keeps the top 5 bits of red and blue and the top 5 of green in a 5/6/5 layout.
#[inline(always)]
pub const fn rgb555(word: u32) -> u16 {
    (((word << 1) & 0xf800) | ((word >> 12) & 0x07c0) | ((word >> 26) & 0x001f)) as u16
}

/// Keeps the top 5 bits of red and blue and the top 6 of green.
#[inline(always)]
pub const fn rgb565(word: u32) -> u16 {
    (((word << 1) & 0xf800) | ((word >> 12) & 0x07e0) | ((word >> 26) & 0x001f)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: SyncBits = SyncBits::all();

    #[test]
    fn channel_accessors_read_back_composed_word() {
        let word = PixelWord::compose(0x11, 0x22, 0x33, SyncBits::ACTIVE);
        assert_eq!(word.red(), 0x11);
        assert_eq!(word.green(), 0x22);
        assert_eq!(word.blue(), 0x33);
        assert_eq!(word.sync(), SyncBits::ACTIVE);
        assert!(word.is_active());
        assert!(word.in_frame());
    }

    #[test]
    fn active_needs_all_three_lines() {
        let no_hsync = PixelWord::compose(0, 0, 0, SyncBits::VSYNC | SyncBits::CLAMP);
        let no_clamp = PixelWord::compose(0, 0, 0, SyncBits::VSYNC | SyncBits::HSYNC);
        let no_vsync = PixelWord::compose(0, 0, 0, SyncBits::HSYNC | SyncBits::CLAMP);
        assert!(!no_hsync.is_active());
        assert!(!no_clamp.is_active());
        assert!(!no_vsync.is_active());
        assert!(!no_vsync.in_frame());
    }

    #[test]
    fn conversion_table() {
        // (r, g, b) -> (rgb555, rgb565)
        let table: &[((u8, u8, u8), u16, u16)] = &[
            ((0x00, 0x00, 0x00), 0x0000, 0x0000),
            ((0x7f, 0x00, 0x00), 0xf800, 0xf800),
            ((0x00, 0x7f, 0x00), 0x07c0, 0x07e0),
            ((0x00, 0x00, 0x7f), 0x001f, 0x001f),
            ((0x7f, 0x7f, 0x7f), 0xffdf, 0xffff),
            // raw bits below the kept ones are dropped
            ((0x03, 0x01, 0x03), 0x0000, 0x0000),
            ((0x03, 0x03, 0x03), 0x0000, 0x0020),
            ((0x04, 0x02, 0x04), 0x0801, 0x0821),
            ((0x40, 0x40, 0x40), 0x8410, 0x8410),
        ];

        for &((r, g, b), want555, want565) in table {
            let raw = PixelWord::compose(r, g, b, STATUS).raw();
            assert_eq!(rgb555(raw), want555, "rgb555 of {r:#x},{g:#x},{b:#x}");
            assert_eq!(rgb565(raw), want565, "rgb565 of {r:#x},{g:#x},{b:#x}");
        }
    }

    #[test]
    fn padding_and_sync_bits_never_leak_into_colour() {
        // every bit that is not a colour channel
        let junk: u32 = 0x8080_80ff;
        assert_eq!(rgb555(junk), 0);
        assert_eq!(rgb565(junk), 0);
    }

    #[test]
    fn conversion_is_deterministic_over_all_channels() {
        for v in 0..=0x7fu8 {
            let raw = PixelWord::compose(v, v, v, STATUS).raw();
            let c5 = (v >> 2) as u16;
            let g6 = (v >> 1) as u16;
            assert_eq!(rgb565(raw), (c5 << 11) | (g6 << 5) | c5);
            assert_eq!(rgb555(raw), (c5 << 11) | ((g6 & !1) << 5) | c5);
        }
    }

    #[test]
    fn depth_round_trips_through_bits() {
        for depth in [ColorDepth::Rgb555, ColorDepth::Rgb565] {
            assert_eq!(ColorDepth::from_bits(depth.bits()), Some(depth));
        }
        assert_eq!(ColorDepth::from_bits(24), None);
        let raw = PixelWord::compose(0, 0x7f, 0, STATUS).raw();
        assert_eq!((ColorDepth::Rgb565.converter())(raw), 0x07e0);
        assert_eq!((ColorDepth::Rgb555.converter())(raw), 0x07c0);
    }
}
