//! # On-Screen Display
//!
//! A menu drawn over the captured picture, driven by the controller.
//!
//! The OSD is closed until L, R, C-down and D-pad down are held together.
//! While open it runs an immediate-mode loop on the capture context: draw the
//! current level, read the controller, react to press edges. The loop hands
//! control back to the caller whenever the menu closes, a level changes or a
//! setting changes, so the caller can apply it and capture keeps a chance to
//! run.
//!
//! | edge        | effect                                           |
//! |-------------|--------------------------------------------------|
//! | down        | focus next item, stays on the last one           |
//! | up          | focus previous item, stays on the first one      |
//! | left, right | step a read-write value through its choices      |
//! | A           | enter submenu, go back, or close on "Exit"       |

mod canvas;
pub mod menu;

pub use canvas::ScanoutCanvas;
pub use menu::{ItemKind, MenuId, MenuItem, MenuTree, Reading, Setting};

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use log::{debug, trace, warn};

use crate::joybus::{Buttons, ControllerSource, ControllerState, Gamepad};

/// Left margin in characters.
pub const OSD_X_OFFSET: i32 = 5;
/// Top margin in lines.
pub const OSD_Y_OFFSET: i32 = 3;
pub const NAV_DEPTH: usize = 8;

const CHAR_WIDTH: i32 = 6;
const LINE_HEIGHT: i32 = 10;

const FOREGROUND: Rgb565 = Rgb565::WHITE;
const BACKGROUND: Rgb565 = Rgb565::BLACK;
const FOCUS_BACKGROUND: Rgb565 = Rgb565::MAGENTA;

/// Something the OSD can draw on and show.
pub trait OsdSurface: DrawTarget<Color = Rgb565> {
    /// Makes the whole surface drawable. Called before every redraw.
    fn begin(&mut self) {}

    /// Hands the drawn picture to the output.
    fn present(&mut self);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OsdStep {
    /// The menu is closed.
    Closed,
    /// Level or value changed; the caller gets one turn before the loop resumes.
    Rerender,
    /// Still open, nothing the caller needs to act on.
    Continue,
}

#[derive(Debug)]
struct Navigation {
    current: MenuId,
    focus: Option<usize>,
    parents: heapless::Vec<MenuId, NAV_DEPTH>,
    dirty: bool,
}

impl Navigation {
    fn root() -> Self {
        Self {
            current: MenuId::ROOT,
            focus: None,
            parents: heapless::Vec::new(),
            dirty: true,
        }
    }
}

pub struct Osd<'a> {
    tree: MenuTree<'a>,
    gamepad: Gamepad,
    nav: Option<Navigation>,
}

impl<'a> Osd<'a> {
    pub fn new(tree: MenuTree<'a>) -> Self {
        Self {
            tree,
            gamepad: Gamepad::new(),
            nav: None,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.nav.is_some()
    }

    /// Focused item index of the current level. `None` right after opening or changing level.
    pub fn focused(&self) -> Option<usize> {
        self.nav.as_ref().and_then(|n| n.focus)
    }

    pub fn current_menu(&self) -> Option<MenuId> {
        self.nav.as_ref().map(|n| n.current)
    }

    pub fn tree(&self) -> &MenuTree<'a> {
        &self.tree
    }

    /// Samples the controller and (re)opens the menu at its root when the shortcut is held.
    ///
    /// Any other sample is left out of the edge history, so a press first seen here still counts
    /// as a press on the next `step`.
    pub fn poll_shortcut<C: ControllerSource + ?Sized>(&mut self, controller: &mut C) -> bool {
        let word = controller.latest();
        if ControllerState(word).is_pressed(Buttons::OSD_CHORD) {
            if self.nav.is_some() {
                trace!("osd reset to root");
            } else {
                debug!("osd opened");
            }
            self.nav = Some(Navigation::root());
            self.gamepad.update(word);
            // the shortcut's own buttons are not navigation presses
            self.gamepad.settle();
        }
        self.is_open()
    }

    /// One input iteration against a fresh controller word.
    pub fn step(&mut self, word: u32) -> OsdStep {
        let Some(nav) = self.nav.as_mut() else {
            return OsdStep::Closed;
        };
        self.gamepad.update(word);
        let pad = &self.gamepad;

        let items = self.tree.level(nav.current);
        let focus = *nav.focus.get_or_insert(0);

        if pad.just_pressed(Buttons::DOWN) {
            if focus + 1 < items.len() {
                nav.focus = Some(focus + 1);
                nav.dirty = true;
            }
        } else if pad.just_pressed(Buttons::UP) {
            if focus > 0 {
                nav.focus = Some(focus - 1);
                nav.dirty = true;
            }
        } else if pad.just_pressed(Buttons::LEFT) || pad.just_pressed(Buttons::RIGHT) {
            if let Some(ItemKind::ReadWrite(setting)) = items.get(focus).map(|i| i.kind) {
                if setting.step(pad.just_pressed(Buttons::RIGHT)) {
                    nav.dirty = true;
                    return OsdStep::Rerender;
                }
            }
        } else if pad.just_pressed(Buttons::A) {
            match items.get(focus).map(|i| i.kind) {
                Some(ItemKind::Submenu(id)) => {
                    if nav.parents.push(nav.current).is_err() {
                        warn!("osd menu nested deeper than {NAV_DEPTH}");
                        return OsdStep::Continue;
                    }
                    nav.current = id;
                    nav.focus = None;
                    nav.dirty = true;
                    return OsdStep::Rerender;
                }
                Some(ItemKind::Back) => {
                    nav.current = nav.parents.pop().unwrap_or(MenuId::ROOT);
                    nav.focus = None;
                    nav.dirty = true;
                    return OsdStep::Rerender;
                }
                Some(ItemKind::Exit) => {
                    debug!("osd closed");
                    self.nav = None;
                    return OsdStep::Closed;
                }
                _ => {}
            }
        }
        OsdStep::Continue
    }

    /// Draws the current level.
    pub fn render<D: DrawTarget<Color = Rgb565>>(&self, target: &mut D) -> Result<(), D::Error> {
        let Some(nav) = self.nav.as_ref() else {
            return Ok(());
        };
        let focus = nav.focus.unwrap_or(0);

        for (i, item) in self.tree.level(nav.current).iter().enumerate() {
            let style = MonoTextStyleBuilder::new()
                .font(&FONT_6X10)
                .text_color(FOREGROUND)
                .background_color(if i == focus { FOCUS_BACKGROUND } else { BACKGROUND })
                .build();
            let line: heapless::String<48> = item.line();
            let origin = Point::new(OSD_X_OFFSET * CHAR_WIDTH, (OSD_Y_OFFSET + i as i32) * LINE_HEIGHT);
            Text::with_baseline(&line, origin, style, Baseline::Top).draw(target)?;
        }
        Ok(())
    }

    /// Runs the menu loop until it closes or something changes.
    ///
    /// Redraws only when the picture would change. Returns immediately when closed.
    pub fn run<C, S>(&mut self, controller: &mut C, surface: &mut S) -> OsdStep
    where
        C: ControllerSource + ?Sized,
        S: OsdSurface,
    {
        loop {
            let Some(nav) = self.nav.as_mut() else {
                return OsdStep::Closed;
            };
            nav.focus.get_or_insert(0);
            if core::mem::take(&mut nav.dirty) {
                // drawing into rows that are not ours is skipped, never fatal
                surface.begin();
                let _ = self.render(surface);
                surface.present();
            }

            match self.step(controller.latest()) {
                OsdStep::Continue => continue,
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::status::{Settings, Status};
    use crate::synth::ScriptedController;
    use core::convert::Infallible;
    use core::sync::atomic::Ordering;
    use embedded_graphics::primitives::Rectangle;

    const CHORD: u32 = Buttons::OSD_CHORD.bits();
    const DOWN: u32 = Buttons::DOWN.bits();
    const UP: u32 = Buttons::UP.bits();
    const A: u32 = Buttons::A.bits();
    const RIGHT: u32 = Buttons::RIGHT.bits();

    /// Opens the menu and lets go of the shortcut.
    fn open(osd: &mut Osd) {
        assert!(osd.poll_shortcut(&mut ScriptedController::new([CHORD])));
        osd.step(0);
    }

    /// Press then release, as two controller samples.
    fn press(osd: &mut Osd, word: u32) -> OsdStep {
        let step = osd.step(word);
        osd.step(0);
        step
    }

    #[derive(Default)]
    struct Recorder {
        pixels: u32,
        begins: u32,
        presents: u32,
    }

    impl OriginDimensions for Recorder {
        fn size(&self) -> Size {
            Size::new(320, 240)
        }
    }

    impl DrawTarget for Recorder {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
        where
            I: IntoIterator<Item = Pixel<Rgb565>>,
        {
            self.pixels += pixels.into_iter().count() as u32;
            Ok(())
        }

        fn fill_solid(&mut self, area: &Rectangle, _color: Rgb565) -> Result<(), Infallible> {
            self.pixels += area.size.width * area.size.height;
            Ok(())
        }
    }

    impl OsdSurface for Recorder {
        fn begin(&mut self) {
            self.begins += 1;
        }

        fn present(&mut self) {
            self.presents += 1;
        }
    }

    #[test]
    fn closed_until_chord() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));

        let partial = CHORD & !Buttons::L.bits();
        assert!(!osd.poll_shortcut(&mut ScriptedController::new([partial])));
        assert_eq!(osd.step(DOWN), OsdStep::Closed);

        assert!(osd.poll_shortcut(&mut ScriptedController::new([CHORD])));
        assert_eq!(osd.current_menu(), Some(MenuId::ROOT));
        assert_eq!(osd.focused(), None);
        // holding the chord's D-pad down is not a press
        assert_eq!(osd.step(CHORD), OsdStep::Continue);
        assert_eq!(osd.focused(), Some(0));
    }

    #[test]
    fn press_sampled_between_frames_keeps_its_edge() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        open(&mut osd);

        // the per-frame shortcut check sees DOWN first
        assert!(osd.poll_shortcut(&mut ScriptedController::new([DOWN])));
        osd.step(DOWN);
        assert_eq!(osd.focused(), Some(1));
    }

    #[test]
    fn chord_while_open_goes_back_to_root() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        open(&mut osd);
        press(&mut osd, DOWN);
        press(&mut osd, A);
        assert_ne!(osd.current_menu(), Some(MenuId::ROOT));

        assert!(osd.poll_shortcut(&mut ScriptedController::new([CHORD])));
        assert_eq!(osd.current_menu(), Some(MenuId::ROOT));
        assert_eq!(osd.focused(), None);
        // still held, so nothing moves
        assert_eq!(osd.step(CHORD), OsdStep::Continue);
        assert_eq!(osd.focused(), Some(0));
    }

    #[test]
    fn focus_is_clamped_to_the_level() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        open(&mut osd);

        press(&mut osd, UP);
        assert_eq!(osd.focused(), Some(0));

        for _ in 0..10 {
            press(&mut osd, DOWN);
        }
        assert_eq!(osd.focused(), Some(4));
        // at the last item down does nothing
        press(&mut osd, DOWN);
        assert_eq!(osd.focused(), Some(4));

        press(&mut osd, UP);
        assert_eq!(osd.focused(), Some(3));
    }

    #[test]
    fn held_button_moves_once() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        open(&mut osd);

        for _ in 0..5 {
            osd.step(DOWN);
        }
        assert_eq!(osd.focused(), Some(1));
    }

    #[test]
    fn submenu_and_back_return_to_root_without_focus() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        open(&mut osd);

        press(&mut osd, DOWN);
        assert_eq!(press(&mut osd, A), OsdStep::Rerender);
        let video = osd.current_menu();
        assert_ne!(video, Some(MenuId::ROOT));
        // focus cleared on entry, released A picks the first item
        assert_eq!(osd.focused(), Some(0));

        for _ in 0..4 {
            press(&mut osd, DOWN);
        }
        assert_eq!(osd.step(A), OsdStep::Rerender);
        assert_eq!(osd.current_menu(), Some(MenuId::ROOT));
        assert_eq!(osd.focused(), None);
    }

    #[test]
    fn right_steps_a_setting() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        open(&mut osd);

        press(&mut osd, DOWN);
        press(&mut osd, A);
        press(&mut osd, DOWN);
        assert_eq!(press(&mut osd, RIGHT), OsdStep::Rerender);
        assert_eq!(settings.color_bits.load(Ordering::Relaxed), 16);

        // a label does not react
        press(&mut osd, UP);
        assert_eq!(press(&mut osd, RIGHT), OsdStep::Continue);
    }

    #[test]
    fn exit_closes() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        open(&mut osd);

        for _ in 0..4 {
            press(&mut osd, DOWN);
        }
        assert_eq!(osd.step(A), OsdStep::Closed);
        assert!(!osd.is_open());
    }

    #[test]
    fn nesting_is_bounded() {
        let mut tree = MenuTree::new();
        tree.set_root(alloc::vec![MenuItem::submenu("Self", MenuId::ROOT)]);
        let mut osd = Osd::new(tree);
        open(&mut osd);

        for _ in 0..NAV_DEPTH {
            assert_eq!(press(&mut osd, A), OsdStep::Rerender);
        }
        assert_eq!(press(&mut osd, A), OsdStep::Continue);
    }

    #[test]
    fn run_draws_once_per_change() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        let mut osd = Osd::new(MenuTree::standard(&settings, &status));
        let mut surface = Recorder::default();

        assert_eq!(osd.run(&mut ScriptedController::new([]), &mut surface), OsdStep::Closed);
        assert_eq!(surface.presents, 0);

        open(&mut osd);
        // idle, down, idle, enter video
        let mut pad = ScriptedController::new([0, DOWN, 0, A]);
        assert_eq!(osd.run(&mut pad, &mut surface), OsdStep::Rerender);
        assert_eq!(surface.presents, 2);
        assert_eq!(surface.begins, 2);
        assert!(surface.pixels > 0);

        // back out of video: release A, move to Back, press A
        let mut pad = ScriptedController::new([0, DOWN, 0, DOWN, 0, DOWN, 0, DOWN, 0, A]);
        assert_eq!(osd.run(&mut pad, &mut surface), OsdStep::Rerender);
        assert_eq!(osd.current_menu(), Some(MenuId::ROOT));
    }
}
