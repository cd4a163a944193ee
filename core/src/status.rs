//! Values shared between the run loop and the OSD menu.
//!
//! Everything is a plain `AtomicU32` so menu items can point straight at it.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::capture::{FrameReport, VideoStandard};
use crate::config::Config;
use crate::pixel::ColorDepth;

/// Settings the OSD can change.
#[derive(Debug)]
pub struct Settings {
    /// Output sample rate in Hz.
    pub sample_rate: AtomicU32,
    /// 15 or 16.
    pub color_bits: AtomicU32,
}

impl Settings {
    pub fn new(config: &Config) -> Self {
        Self {
            sample_rate: AtomicU32::new(config.sample_rate),
            color_bits: AtomicU32::new(config.color_depth.bits()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn color_depth(&self) -> ColorDepth {
        ColorDepth::from_bits(self.color_bits.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Snapshot as a config record.
    pub fn config(&self) -> Config {
        Config {
            sample_rate: self.sample_rate(),
            color_depth: self.color_depth(),
        }
    }
}

pub const STANDARD_PAL: u32 = 0;
pub const STANDARD_NTSC: u32 = 1;

/// Capture statistics, written once per frame.
#[derive(Debug, Default)]
pub struct Status {
    /// Physical rows in the last frame.
    pub rows: AtomicU32,
    /// [`STANDARD_PAL`] or [`STANDARD_NTSC`], what the next frame is cropped for.
    pub standard: AtomicU32,
    pub frames: AtomicU32,
    pub dropped_rows: AtomicU32,
}

impl Status {
    pub fn record(&self, report: &FrameReport) {
        self.rows.store(report.rows, Ordering::Relaxed);
        let standard = match report.next_format.standard {
            VideoStandard::Pal => STANDARD_PAL,
            VideoStandard::Ntsc => STANDARD_NTSC,
        };
        self.standard.store(standard, Ordering::Relaxed);
        self.frames.store(self.frames().wrapping_add(1), Ordering::Relaxed);
        if report.dropped_rows != 0 {
            self.dropped_rows
                .store(self.dropped_rows.load(Ordering::Relaxed).wrapping_add(report.dropped_rows), Ordering::Relaxed);
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> u32 {
        self.rows.load(Ordering::Relaxed)
    }
}
