//! Decoded controller state from the joybus receiver.
//!
//! The receiver hands over one 32-bit word per poll: buttons in the upper
//! half, the analog stick in the lower half.

use bit_field::BitField;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Buttons: u32 {
        const A = 0x8000_0000;
        const B = 0x4000_0000;
        const Z = 0x2000_0000;
        const START = 0x1000_0000;
        const UP = 0x0800_0000;
        const DOWN = 0x0400_0000;
        const LEFT = 0x0200_0000;
        const RIGHT = 0x0100_0000;
        const RESET = 0x0080_0000;
        // 0x0040_0000 is unused
        const L = 0x0020_0000;
        const R = 0x0010_0000;
        const C_UP = 0x0008_0000;
        const C_DOWN = 0x0004_0000;
        const C_LEFT = 0x0002_0000;
        const C_RIGHT = 0x0001_0000;

        /// Opens the on-screen display.
        const OSD_CHORD = Self::L.bits() | Self::R.bits() | Self::C_DOWN.bits() | Self::DOWN.bits();
    }
}

/// Source of the most recent controller word.
pub trait ControllerSource {
    /// Latest word received. Keeps returning the previous one if nothing new arrived.
    fn latest(&mut self) -> u32;
}

impl<T: ControllerSource + ?Sized> ControllerSource for &mut T {
    fn latest(&mut self) -> u32 {
        (**self).latest()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerState(pub u32);

impl ControllerState {
    #[inline(always)]
    pub fn buttons(self) -> Buttons {
        Buttons::from_bits_truncate(self.0)
    }

    #[inline(always)]
    pub fn stick_x(self) -> i8 {
        self.0.get_bits(8..16) as u8 as i8
    }

    #[inline(always)]
    pub fn stick_y(self) -> i8 {
        self.0.get_bits(0..8) as u8 as i8
    }

    #[inline]
    pub fn is_pressed(self, button: Buttons) -> bool {
        self.buttons().contains(button)
    }
}

/// `true` when every bit of `button` is set in `current` and was not all set in `previous`.
#[inline]
pub fn pressed_edge(previous: u32, current: u32, button: Buttons) -> bool {
    !ControllerState(previous).is_pressed(button) && ControllerState(current).is_pressed(button)
}

/// Current and previous controller words of one polling loop.
#[derive(Clone, Debug, Default)]
pub struct Gamepad {
    pub buttons: u32,
    pub buttons_last: u32,
}

impl Gamepad {
    pub const fn new() -> Self {
        Self {
            buttons: 0,
            buttons_last: 0,
        }
    }

    #[inline]
    pub fn update(&mut self, word: u32) {
        self.buttons_last = self.buttons;
        self.buttons = word;
    }

    /// Forgets the previous sample, so buttons still held count as already pressed.
    pub fn settle(&mut self) {
        self.buttons_last = self.buttons;
    }

    #[inline]
    pub fn state(&self) -> ControllerState {
        ControllerState(self.buttons)
    }

    #[inline]
    pub fn is_pressed(&self, button: Buttons) -> bool {
        ControllerState(self.buttons).is_pressed(button)
    }

    #[inline]
    pub fn was_pressed(&self, button: Buttons) -> bool {
        ControllerState(self.buttons_last).is_pressed(button)
    }

    /// Returns true only on the sample the button was first pressed (edge-trigger).
    #[inline]
    pub fn just_pressed(&self, button: Buttons) -> bool {
        pressed_edge(self.buttons_last, self.buttons, button)
    }

    /// Returns true only on the sample the button was released (edge-trigger).
    #[inline]
    pub fn just_released(&self, button: Buttons) -> bool {
        !self.is_pressed(button) && self.was_pressed(button)
    }
}
