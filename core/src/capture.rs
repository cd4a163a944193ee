//! # Video Capture
//!
//! Turns the continuous stream of [`PixelWord`](crate::pixel::PixelWord)s
//! into cropped, decimated, colour-converted scanlines, and measures the
//! frame length to tell PAL from NTSC.
//!
//! Per frame:
//!
//! 1. discard words until VSYNC is high
//! 2. for every physical row, wait for the active region (VSYNC, HSYNC and
//!    CLAMP all high). VSYNC dropping here ends the frame.
//! 3. odd rows, rows above `crop_y` and rows past the frame buffer are
//!    drained. Kept rows drop `crop_x` words, then keep every other word.
//! 4. the row count picks the crop used for the *next* frame.
//!
//! The inner loop only ever reads words, masks and converts. Nothing here
//! allocates or logs per word.

use log::{debug, info, trace};

use crate::exchange::Scanout;
use crate::pixel::{ColorDepth, ACTIVE_PIXEL_MASK, VSYNC_MASK};

/// A blocking source of raw capture words, one per pixel clock.
pub trait WordSource {
    fn next_word(&mut self) -> u32;
}

impl<T: WordSource + ?Sized> WordSource for &mut T {
    #[inline(always)]
    fn next_word(&mut self) -> u32 {
        (**self).next_word()
    }
}

pub const ROWS_PAL: u32 = 615;
pub const ROWS_NTSC: u32 = 511;
pub const ROWS_TOLERANCE: u32 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VideoStandard {
    Pal,
    Ntsc,
}

impl VideoStandard {
    /// Matches a measured row count against both standards.
    pub const fn detect(rows: u32) -> Option<Self> {
        if rows.abs_diff(ROWS_PAL) <= ROWS_TOLERANCE {
            Some(VideoStandard::Pal)
        } else if rows.abs_diff(ROWS_NTSC) <= ROWS_TOLERANCE {
            Some(VideoStandard::Ntsc)
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            VideoStandard::Pal => "PAL",
            VideoStandard::Ntsc => "NTSC",
        }
    }
}

/// Crop window for one video standard.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CaptureFormat {
    pub standard: VideoStandard,
    /// Words dropped at the start of every kept row.
    pub crop_x: u32,
    /// Physical rows dropped at the top of the frame.
    pub crop_y: u32,
    pub expected_rows: u32,
}

impl CaptureFormat {
    pub const PAL: Self = Self {
        standard: VideoStandard::Pal,
        crop_x: 36,
        crop_y: 90,
        expected_rows: ROWS_PAL,
    };

    pub const NTSC: Self = Self {
        standard: VideoStandard::Ntsc,
        crop_x: 14,
        crop_y: 25,
        expected_rows: ROWS_NTSC,
    };

    /// Format to use after a frame of `rows` rows. Unrecognised lengths get NTSC, which crops less.
    pub const fn detect(rows: u32) -> Self {
        match VideoStandard::detect(rows) {
            Some(VideoStandard::Pal) => Self::PAL,
            _ => Self::NTSC,
        }
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self::PAL
    }
}

/// What happened during one captured frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameReport {
    /// Physical rows seen before VSYNC dropped.
    pub rows: u32,
    /// Frame buffer rows written and published.
    pub captured_rows: u32,
    /// Words consumed in the last captured row, after the left crop.
    pub columns: u32,
    /// Pixels written over the whole frame.
    pub pixels: u32,
    /// Rows that were due for capture but still held by the output side.
    pub dropped_rows: u32,
    /// Crop window this frame was captured with.
    pub format: CaptureFormat,
    /// Crop window the next frame will use.
    pub next_format: CaptureFormat,
}

#[derive(Debug)]
pub struct CaptureEngine {
    format: CaptureFormat,
}

impl CaptureEngine {
    pub fn new() -> Self {
        Self::with_format(CaptureFormat::default())
    }

    pub fn with_format(format: CaptureFormat) -> Self {
        Self { format }
    }

    #[inline(always)]
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Captures one frame into the rows `scanout` holds, publishing each row as soon as it is
    /// complete.
    ///
    /// Blocks until the source delivers a VSYNC pulse. There is no timeout.
    pub fn capture_frame<S: WordSource + ?Sized>(
        &mut self,
        source: &mut S,
        scanout: &mut Scanout,
        depth: ColorDepth,
    ) -> FrameReport {
        let convert = depth.converter();
        let format = self.format;
        let height = scanout.framebuffer().height() as u32;

        let mut report = FrameReport {
            rows: 0,
            captured_rows: 0,
            columns: 0,
            pixels: 0,
            dropped_rows: 0,
            format,
            next_format: format,
        };

        // posedge VSYNC
        while source.next_word() & VSYNC_MASK == 0 {}
        scanout.reclaim();

        let mut active_row: u32 = 0;
        let mut row: u32 = 0;
        'frame: loop {
            let skip_row = row % 2 != 0 || row < format.crop_y || active_row >= height;

            // start of the active region
            loop {
                let word = source.next_word();
                if word & VSYNC_MASK == 0 {
                    break 'frame;
                }
                if word & ACTIVE_PIXEL_MASK == ACTIVE_PIXEL_MASK {
                    break;
                }
            }

            if skip_row {
                if !drain_active(source) {
                    break 'frame;
                }
                row += 1;
                continue;
            }

            let Some(mut handle) = scanout.take(active_row as usize) else {
                // output side is late returning this row
                report.dropped_rows += 1;
                active_row += 1;
                if !drain_active(source) {
                    break 'frame;
                }
                row += 1;
                continue;
            };
            active_row += 1;

            for _ in 0..format.crop_x {
                source.next_word();
            }

            let line = scanout.framebuffer().row_mut(&mut handle);
            let mut count = 0;
            let mut word = source.next_word();
            let in_frame = loop {
                if word & ACTIVE_PIXEL_MASK != ACTIVE_PIXEL_MASK {
                    break word & VSYNC_MASK != 0;
                }
                let Some(px) = line.get_mut(count) else {
                    break drain_active(source);
                };
                *px = convert(word);
                count += 1;
                if count == line.len() {
                    // anything left in the active region is discarded
                    break drain_active(source);
                }

                // 2:1 horizontal decimation
                source.next_word();
                word = source.next_word();
            };

            report.columns = count as u32 * 2;
            report.pixels += count as u32;
            report.captured_rows += 1;

            scanout.publish(handle);
            scanout.reclaim();
            if !in_frame {
                break 'frame;
            }
            row += 1;
        }

        report.rows = row;
        let next = CaptureFormat::detect(row);
        if VideoStandard::detect(row).is_none() {
            debug!("frame of {row} rows matches no standard, using {}", next.standard.name());
        }
        if next != format {
            info!(
                "video standard {} -> {} ({row} rows)",
                format.standard.name(),
                next.standard.name()
            );
        }
        self.format = next;
        report.next_format = next;

        trace!(
            "frame: {} rows, {} captured, {} dropped",
            report.rows,
            report.captured_rows,
            report.dropped_rows
        );
        report
    }
}

/// Reads until the active region ends. Returns `false` if VSYNC dropped.
#[inline(always)]
fn drain_active<S: WordSource + ?Sized>(source: &mut S) -> bool {
    loop {
        let word = source.next_word();
        if word & ACTIVE_PIXEL_MASK != ACTIVE_PIXEL_MASK {
            return word & VSYNC_MASK != 0;
        }
    }
}
