//! # Frame Buffer
//!
//! One fixed grid of packed 16-bit pixels shared by the capture context and
//! the output context. The buffer itself has no locking: a row may only be
//! touched through the [`ScanlineHandle`] for that row, and exactly one handle
//! exists per row. Whoever holds the handle owns the row.
//!
//! ```ignore
//! let fb = FrameBuffer::new(FRAME_WIDTH, FRAME_HEIGHT);
//! let (mut scanout, mut display) = exchange::channel(fb, FRAME_HEIGHT);
//!
//! // capture side
//! let mut h = scanout.take(0).unwrap();
//! scanout.framebuffer().row_mut(&mut h)[0] = 0xffff;
//! scanout.publish(h);
//!
//! // output side
//! let h = display.next_blocking();
//! let first = display.framebuffer().row(&h)[0];
//! display.release(h);
//! ```

use alloc::boxed::Box;
use core::cell::UnsafeCell;

pub const FRAME_WIDTH: usize = 320;
pub const FRAME_HEIGHT: usize = 240;

/// Ownership token for a single row of a [`FrameBuffer`].
///
/// Not `Clone`: moving the handle moves the right to touch the row.
#[derive(Debug, PartialEq, Eq)]
pub struct ScanlineHandle {
    row: u16,
    owner: usize,
}

impl ScanlineHandle {
    #[inline(always)]
    pub fn row(&self) -> usize {
        self.row as usize
    }
}

pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Box<[UnsafeCell<u16>]>,
}

// SAFETY: rows are only reachable through `ScanlineHandle`s, exactly one handle per row is ever
// created (`handles`), and a handle is refused by every buffer but its own (`row_ptr`), so two
// contexts can never alias the same row.
unsafe impl Sync for FrameBuffer {}

impl FrameBuffer {
    /// Allocates a black frame buffer. Heights above `u16::MAX` rows are clamped.
    pub fn new(width: usize, height: usize) -> Self {
        let height = height.min(u16::MAX as usize);
        let pixels = (0..width * height).map(|_| UnsafeCell::new(0)).collect();
        Self { width, height, pixels }
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Fills every pixel. Only possible before the buffer is shared.
    pub fn fill(&mut self, color: u16) {
        for px in self.pixels.iter_mut() {
            *px.get_mut() = color;
        }
    }

    /// Mints the one handle per row. Called once, by the exchange, after the buffer has its final
    /// address.
    pub(crate) fn handles(&self) -> impl Iterator<Item = ScanlineHandle> + '_ {
        let owner = self.owner_id();
        (0..self.height).map(move |row| ScanlineHandle { row: row as u16, owner })
    }

    #[inline(always)]
    fn owner_id(&self) -> usize {
        self as *const Self as usize
    }

    /// Whether `handle` was minted by this buffer.
    #[inline(always)]
    pub fn owns(&self, handle: &ScanlineHandle) -> bool {
        handle.owner == self.owner_id()
    }

    /// # Panics
    ///
    /// If the handle belongs to another frame buffer. Its row of this buffer has its own handle.
    #[inline(always)]
    fn row_ptr(&self, handle: &ScanlineHandle) -> *mut u16 {
        assert!(self.owns(handle), "handle belongs to another frame buffer");
        let start = handle.row() * self.width;
        UnsafeCell::raw_get(self.pixels[start..start + self.width].as_ptr())
    }

    /// Read access to the row the handle owns.
    #[inline(always)]
    pub fn row<'a>(&'a self, handle: &'a ScanlineHandle) -> &'a [u16] {
        // SAFETY: the handle is the unique owner of this row, and it is borrowed for as long as the
        // slice lives.
        unsafe { core::slice::from_raw_parts(self.row_ptr(handle), self.width) }
    }

    /// Write access to the row the handle owns.
    #[inline(always)]
    pub fn row_mut<'a>(&'a self, handle: &'a mut ScanlineHandle) -> &'a mut [u16] {
        // SAFETY: as for `row`, and the handle is borrowed mutably, so no other slice of this row can
        // exist at the same time.
        unsafe { core::slice::from_raw_parts_mut(self.row_ptr(handle), self.width) }
    }
}

impl core::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
