use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use image::{ImageBuffer, Rgb};
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{debug, trace};

use spydvi_core::Display;

pub struct OutputStats {
    pub rows_shown: u64,
    pub frames_shown: u64,
    /// Last frame whose rows all went out, row-major, 5/6/5.
    pub last_frame: Vec<u16>,
}

/// Copies displayed rows into a local picture, the way the TMDS encoder would consume them.
struct Scanner {
    width: usize,
    picture: Vec<u16>,
    last_row: Option<usize>,
    rows_shown: u64,
    frames_shown: u64,
    completed: Option<Vec<u16>>,
}

impl Scanner {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            picture: vec![0; width * height],
            last_row: None,
            rows_shown: 0,
            frames_shown: 0,
            completed: None,
        }
    }

    fn show(&mut self, row: usize, pixels: &[u16]) {
        // rows only go backwards when a new frame starts
        if self.last_row.is_some_and(|last| row <= last) {
            self.frames_shown += 1;
            self.completed = Some(self.picture.clone());
        }
        let start = row * self.width;
        if let Some(dst) = self.picture.get_mut(start..start + pixels.len()) {
            dst.copy_from_slice(pixels);
        }
        self.last_row = Some(row);
        self.rows_shown += 1;
    }

    fn finish(self) -> OutputStats {
        OutputStats {
            rows_shown: self.rows_shown,
            frames_shown: self.frames_shown,
            last_frame: self.completed.unwrap_or(self.picture),
        }
    }
}

/// Starts the output context. It drains the ready queue until `stop` is set and the queue is empty.
pub fn spawn(mut display: Display, stop: Arc<AtomicBool>) -> JoinHandle<OutputStats> {
    thread::spawn(move || {
        if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
            debug!("output context keeps default priority: {e:?}");
        }

        let fb = display.framebuffer();
        let mut scanner = Scanner::new(fb.width(), fb.height());
        debug!("output context started");

        loop {
            match display.try_next() {
                Some(handle) => {
                    scanner.show(handle.row(), display.row(&handle));
                    display.release(handle);
                }
                None if stop.load(Ordering::Relaxed) => break,
                None => thread::yield_now(),
            }
        }

        trace!("output context stopped after {} rows", scanner.rows_shown);
        scanner.finish()
    })
}

pub fn rgb888(pixel: u16) -> [u8; 3] {
    let r = (pixel >> 11) as u8 & 0x1f;
    let g = (pixel >> 5) as u8 & 0x3f;
    let b = pixel as u8 & 0x1f;
    [r << 3 | r >> 2, g << 2 | g >> 4, b << 3 | b >> 2]
}

pub fn save_png(path: &Path, pixels: &[u16], width: usize, height: usize) -> Result<()> {
    let image = ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let pixel = pixels.get(y as usize * width + x as usize).copied().unwrap_or(0);
        Rgb(rgb888(pixel))
    });
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb888_expands_to_full_range() {
        assert_eq!(rgb888(0xffff), [255, 255, 255]);
        assert_eq!(rgb888(0x0000), [0, 0, 0]);
        assert_eq!(rgb888(0xf800), [255, 0, 0]);
        assert_eq!(rgb888(0x07e0), [0, 255, 0]);
    }

    #[test]
    fn scanner_keeps_the_last_complete_frame() {
        let mut scanner = Scanner::new(2, 2);
        scanner.show(0, &[1, 1]);
        scanner.show(1, &[2, 2]);
        scanner.show(0, &[3, 3]);
        let stats = scanner.finish();
        assert_eq!(stats.rows_shown, 3);
        assert_eq!(stats.frames_shown, 1);
        assert_eq!(stats.last_frame, [1, 1, 2, 2]);
    }

    #[test]
    fn output_thread_drains_then_stops() {
        let (mut scanout, display) = spydvi_core::exchange::channel(spydvi_core::FrameBuffer::new(2, 3), 3);
        scanout.prime(3);
        let stop = Arc::new(AtomicBool::new(true));
        let stats = spawn(display, stop).join().unwrap();
        assert_eq!(stats.rows_shown, 3);
        assert_eq!(stats.frames_shown, 0);
        assert_eq!(scanout.reclaim(), 3);
    }

    #[test]
    fn snapshot_round_trips_through_png() {
        let path = std::env::temp_dir().join(format!("spydvi-sim-{}.png", std::process::id()));
        save_png(&path, &[0xf800, 0x001f], 2, 1).unwrap();
        let image = image::open(&path).unwrap().to_rgb8();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 255]);
    }
}
