//! # Scanline Exchange
//!
//! Two bounded single-producer/single-consumer queues carry
//! [`ScanlineHandle`]s between the capture context and the output context:
//!
//! ```text
//!             ready (rows to display)
//!  Scanout ─────────────────────────────▶ Display
//!     ▲                                      │
//!     └──────────────────────────────────────┘
//!             free (rows displayed)
//! ```
//!
//! Every handle is always in exactly one place: held by [`Scanout`] (being
//! written), in the ready queue, held by [`Display`] (being output), or in
//! the free queue. Handles cannot be copied, so the invariant is structural.

use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{trace, warn};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::framebuffer::{FrameBuffer, ScanlineHandle};

/// Creates both ends of the exchange. The capture side starts out holding every row.
///
/// `ready_capacity` is clamped to at least 2 and at most the number of rows.
pub fn channel(framebuffer: FrameBuffer, ready_capacity: usize) -> (Scanout, Display) {
    let fb = Arc::new(framebuffer);
    let height = fb.height();
    let capacity = ready_capacity.clamp(2, height.max(2));

    let (ready_tx, ready_rx) = RingBuffer::new(capacity);
    // every handle fits, so releasing never waits
    let (free_tx, free_rx) = RingBuffer::new(height.max(1));

    let pool = fb.handles().map(Some).collect();

    let scanout = Scanout {
        fb: fb.clone(),
        ready: ready_tx,
        free: free_rx,
        pool,
        stalls: 0,
    };
    let display = Display {
        fb,
        ready: ready_rx,
        free: free_tx,
    };
    (scanout, display)
}

/// Producer end, owned by the capture context.
pub struct Scanout {
    fb: Arc<FrameBuffer>,
    ready: Producer<ScanlineHandle>,
    free: Consumer<ScanlineHandle>,
    pool: Vec<Option<ScanlineHandle>>,
    stalls: u32,
}

impl Scanout {
    #[inline(always)]
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.fb
    }

    /// Takes the handle of `row` if this side currently holds it.
    #[inline(always)]
    pub fn take(&mut self, row: usize) -> Option<ScanlineHandle> {
        self.pool.get_mut(row)?.take()
    }

    /// Puts a handle back without publishing it. A handle of another frame buffer is handed back.
    pub fn restore(&mut self, handle: ScanlineHandle) -> Result<(), ScanlineHandle> {
        if !self.fb.owns(&handle) {
            return Err(handle);
        }
        match self.pool.get_mut(handle.row()) {
            Some(slot) => {
                *slot = Some(handle);
                Ok(())
            }
            None => Err(handle),
        }
    }

    /// Writable view of a row this side holds, without giving the handle away.
    pub fn row_mut(&mut self, row: usize) -> Option<&mut [u16]> {
        let fb = &self.fb;
        self.pool.get_mut(row)?.as_mut().map(|h| fb.row_mut(h))
    }

    pub fn peek(&self, row: usize) -> Option<&[u16]> {
        self.pool.get(row)?.as_ref().map(|h| self.fb.row(h))
    }

    /// Hands a finished row to the output context.
    ///
    /// Blocks while the ready queue is full. A full queue means the output side has fallen a whole
    /// queue behind, so it is reported.
    pub fn publish(&mut self, handle: ScanlineHandle) {
        let mut handle = handle;
        let mut warned = false;
        loop {
            match self.ready.push(handle) {
                Ok(()) => return,
                Err(PushError::Full(back)) => {
                    handle = back;
                    if !warned {
                        warned = true;
                        self.stalls = self.stalls.wrapping_add(1);
                        warn!("scanline ready queue full at row {}, capture stalled", handle.row());
                    }
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Pops one returned handle, if any. Never blocks.
    #[inline(always)]
    pub fn acquire_free(&mut self) -> Option<ScanlineHandle> {
        self.free.pop().ok()
    }

    /// Moves every currently returned handle back into the pool. Returns how many came back.
    pub fn reclaim(&mut self) -> usize {
        let mut count = 0;
        while let Some(handle) = self.acquire_free() {
            match self.restore(handle) {
                Ok(()) => count += 1,
                Err(stray) => warn!("dropping returned handle for row {} of another frame buffer", stray.row()),
            }
        }
        count
    }

    /// Waits until the output side has returned every row.
    ///
    /// Only safe to call while the output context is running; otherwise this never returns.
    pub fn settle(&mut self) {
        while self.held() < self.pool.len() {
            if self.reclaim() == 0 {
                core::hint::spin_loop();
            }
        }
    }

    /// Publishes the first `rows` rows so the output side has something to show before the first
    /// captured frame.
    pub fn prime(&mut self, rows: usize) {
        for row in 0..rows {
            if let Some(handle) = self.take(row) {
                self.publish(handle);
            }
        }
        trace!("primed scanout with {rows} rows");
    }

    /// Publishes every row this side holds, top to bottom, then takes back whatever has already
    /// been displayed.
    pub fn present(&mut self) {
        for row in 0..self.pool.len() {
            if let Some(handle) = self.take(row) {
                self.publish(handle);
            }
        }
        self.reclaim();
    }

    /// Number of rows currently held by this side.
    pub fn held(&self) -> usize {
        self.pool.iter().filter(|h| h.is_some()).count()
    }

    /// Handles waiting in the ready queue.
    pub fn queued(&self) -> usize {
        self.ready.buffer().capacity() - self.ready.slots()
    }

    /// Handles returned but not reclaimed yet.
    pub fn returned(&self) -> usize {
        self.free.slots()
    }

    /// How many publishes found the ready queue full.
    pub fn stalls(&self) -> u32 {
        self.stalls
    }
}

/// Consumer end, owned by the output context.
pub struct Display {
    fb: Arc<FrameBuffer>,
    ready: Consumer<ScanlineHandle>,
    free: Producer<ScanlineHandle>,
}

impl Display {
    #[inline(always)]
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.fb
    }

    #[inline(always)]
    pub fn try_next(&mut self) -> Option<ScanlineHandle> {
        self.ready.pop().ok()
    }

    pub fn next_blocking(&mut self) -> ScanlineHandle {
        loop {
            if let Ok(handle) = self.ready.pop() {
                return handle;
            }
            core::hint::spin_loop();
        }
    }

    #[inline(always)]
    pub fn row<'a>(&'a self, handle: &'a ScanlineHandle) -> &'a [u16] {
        self.fb.row(handle)
    }

    /// Returns a displayed row to the capture side.
    pub fn release(&mut self, handle: ScanlineHandle) {
        let mut handle = handle;
        // the free queue holds every handle, so this only spins if a handle was duplicated
        while let Err(PushError::Full(back)) = self.free.push(handle) {
            handle = back;
            core::hint::spin_loop();
        }
    }

    /// Handles waiting in the ready queue.
    pub fn pending(&self) -> usize {
        self.ready.slots()
    }
}
