//! Menu tree data.
//!
//! Levels live in one arena and refer to each other by [`MenuId`]. The tree
//! is never written to while navigating; the way back up is kept by the
//! navigation stack in [`Osd`](super::Osd).

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Write;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::audio::STANDARD_RATES;
use crate::status::{Settings, Status, STANDARD_NTSC, STANDARD_PAL};

pub const COLOR_CHOICES: [u32; 2] = [15, 16];
pub const STANDARD_NAMES: [(u32, &str); 2] = [(STANDARD_PAL, "PAL"), (STANDARD_NTSC, "NTSC")];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MenuId(u8);

impl MenuId {
    pub const ROOT: MenuId = MenuId(0);
}

/// A value the menu may change, restricted to a list of choices.
#[derive(Copy, Clone, Debug)]
pub struct Setting<'a> {
    pub value: &'a AtomicU32,
    pub choices: &'a [u32],
    pub unit: &'a str,
}

impl Setting<'_> {
    pub fn get(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Moves to the neighbouring choice, wrapping at both ends. A value that is not one of the
    /// choices snaps to the first. Returns whether the value changed.
    pub fn step(&self, forward: bool) -> bool {
        let len = self.choices.len();
        if len == 0 {
            return false;
        }
        let current = self.get();
        let next = match self.choices.iter().position(|&c| c == current) {
            Some(i) if forward => self.choices[(i + 1) % len],
            Some(i) => self.choices[(i + len - 1) % len],
            None => self.choices[0],
        };
        self.value.store(next, Ordering::Relaxed);
        next != current
    }
}

/// A value the menu only shows, optionally through a table of names.
#[derive(Copy, Clone, Debug)]
pub struct Reading<'a> {
    pub value: &'a AtomicU32,
    pub names: &'a [(u32, &'a str)],
}

#[derive(Copy, Clone, Debug)]
pub enum ItemKind<'a> {
    Label,
    ReadWrite(Setting<'a>),
    ReadOnly(Reading<'a>),
    Submenu(MenuId),
    Back,
    Exit,
}

#[derive(Copy, Clone, Debug)]
pub struct MenuItem<'a> {
    pub text: &'a str,
    pub kind: ItemKind<'a>,
}

impl<'a> MenuItem<'a> {
    pub const fn label(text: &'a str) -> Self {
        Self { text, kind: ItemKind::Label }
    }

    pub const fn setting(text: &'a str, value: &'a AtomicU32, choices: &'a [u32], unit: &'a str) -> Self {
        Self {
            text,
            kind: ItemKind::ReadWrite(Setting { value, choices, unit }),
        }
    }

    pub const fn reading(text: &'a str, value: &'a AtomicU32) -> Self {
        Self::named(text, value, &[])
    }

    pub const fn named(text: &'a str, value: &'a AtomicU32, names: &'a [(u32, &'a str)]) -> Self {
        Self {
            text,
            kind: ItemKind::ReadOnly(Reading { value, names }),
        }
    }

    pub const fn submenu(text: &'a str, id: MenuId) -> Self {
        Self { text, kind: ItemKind::Submenu(id) }
    }

    pub const fn back(text: &'a str) -> Self {
        Self { text, kind: ItemKind::Back }
    }

    pub const fn exit(text: &'a str) -> Self {
        Self { text, kind: ItemKind::Exit }
    }

    /// One rendered menu line.
    pub fn line<const N: usize>(&self) -> heapless::String<N> {
        let mut s = heapless::String::new();
        // overlong lines are cut
        let _ = match self.kind {
            ItemKind::ReadWrite(setting) => write!(s, "{}: {}{}", self.text, setting.get(), setting.unit),
            ItemKind::ReadOnly(reading) => {
                let value = reading.value.load(Ordering::Relaxed);
                match reading.names.iter().find(|(v, _)| *v == value) {
                    Some((_, name)) => write!(s, "{}: {}", self.text, name),
                    None => write!(s, "{}: {}", self.text, value),
                }
            }
            _ => write!(s, "{}", self.text),
        };
        s
    }
}

pub struct MenuTree<'a> {
    levels: Vec<Vec<MenuItem<'a>>>,
}

impl<'a> MenuTree<'a> {
    /// Tree with an empty root level.
    pub fn new() -> Self {
        Self { levels: vec![Vec::new()] }
    }

    /// Adds a level and returns its id. At most 255 levels.
    pub fn push(&mut self, items: Vec<MenuItem<'a>>) -> MenuId {
        let id = MenuId(self.levels.len().min(u8::MAX as usize) as u8);
        self.levels.push(items);
        id
    }

    pub fn set_root(&mut self, items: Vec<MenuItem<'a>>) {
        self.levels[0] = items;
    }

    /// Items of a level. Unknown ids give an empty level.
    pub fn level(&self, id: MenuId) -> &[MenuItem<'a>] {
        self.levels.get(id.0 as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The SpyDVI menu over the live settings and status.
    pub fn standard(settings: &'a Settings, status: &'a Status) -> Self {
        let mut tree = Self::new();

        let video = tree.push(vec![
            MenuItem::label("Video"),
            MenuItem::setting("Colour depth", &settings.color_bits, &COLOR_CHOICES, " bit"),
            MenuItem::named("Format", &status.standard, &STANDARD_NAMES),
            MenuItem::reading("Rows", &status.rows),
            MenuItem::back("Back"),
        ]);
        let audio = tree.push(vec![
            MenuItem::label("Audio"),
            MenuItem::setting("Sample rate", &settings.sample_rate, &STANDARD_RATES, " Hz"),
            MenuItem::back("Back"),
        ]);
        let info = tree.push(vec![
            MenuItem::label("Status"),
            MenuItem::reading("Frames", &status.frames),
            MenuItem::reading("Dropped rows", &status.dropped_rows),
            MenuItem::back("Back"),
        ]);

        tree.set_root(vec![
            MenuItem::label("SpyDVI"),
            MenuItem::submenu("Video", video),
            MenuItem::submenu("Audio", audio),
            MenuItem::submenu("Status", info),
            MenuItem::exit("Exit OSD"),
        ]);
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn setting_cycles_through_choices() {
        let value = AtomicU32::new(15);
        let setting = Setting { value: &value, choices: &COLOR_CHOICES, unit: "" };
        assert!(setting.step(true));
        assert_eq!(setting.get(), 16);
        assert!(setting.step(true));
        assert_eq!(setting.get(), 15);
        assert!(setting.step(false));
        assert_eq!(setting.get(), 16);

        value.store(7, Ordering::Relaxed);
        setting.step(false);
        assert_eq!(setting.get(), 15);
    }

    #[test]
    fn lines_show_values() {
        let settings = Settings::new(&Config::default());
        let status = Status::default();
        status.standard.store(STANDARD_NTSC, Ordering::Relaxed);
        status.rows.store(511, Ordering::Relaxed);
        let tree = MenuTree::standard(&settings, &status);

        let root = tree.level(MenuId::ROOT);
        assert_eq!(root.len(), 5);
        let ItemKind::Submenu(video) = root[1].kind else {
            panic!("second root item is not a submenu");
        };
        let lines: Vec<heapless::String<32>> = tree.level(video).iter().map(MenuItem::line).collect();
        assert_eq!(lines[1].as_str(), "Colour depth: 15 bit");
        assert_eq!(lines[2].as_str(), "Format: NTSC");
        assert_eq!(lines[3].as_str(), "Rows: 511");
    }

    #[test]
    fn unknown_level_is_empty() {
        let tree = MenuTree::new();
        assert!(tree.level(MenuId(9)).is_empty());
    }
}
