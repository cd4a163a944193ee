use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use super::AudioSample;

// DMA writes these words behind the CPU's back, so they are only ever loaded
// and stored whole.

/// Single word always holding the newest received sample.
#[repr(transparent)]
#[derive(Debug)]
pub struct LatchCell(AtomicU32);

impl LatchCell {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    #[inline(always)]
    pub fn load(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn store(&self, word: u32) {
        self.0.store(word, Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn sample(&self) -> AudioSample {
        AudioSample::from_word(self.load())
    }

    /// Bus address for DMA descriptors.
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u32 {
        self.0.as_ptr()
    }
}

/// Ring of samples written by the resampler chain. Lives for the rest of the program.
#[derive(Copy, Clone)]
pub struct AudioRing {
    slots: &'static [AtomicU32],
}

impl AudioRing {
    /// Allocates a zeroed ring that is never freed.
    pub fn allocate(capacity: usize) -> Self {
        let slots: Vec<AtomicU32> = (0..capacity.max(1)).map(|_| AtomicU32::new(0)).collect();
        Self { slots: slots.leak() }
    }

    pub fn from_static(slots: &'static [AtomicU32]) -> Self {
        Self { slots }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// First slot, for DMA descriptors.
    #[inline(always)]
    pub fn base_ptr(&self) -> *mut u32 {
        self.slots.as_ptr() as *mut u32
    }

    #[inline(always)]
    pub fn load(&self, index: usize) -> AudioSample {
        AudioSample::from_word(self.slots[index % self.slots.len()].load(Ordering::Relaxed))
    }

    #[inline(always)]
    pub fn store(&self, index: usize, word: u32) {
        self.slots[index % self.slots.len()].store(word, Ordering::Relaxed)
    }
}

impl core::fmt::Debug for AudioRing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioRing").field("capacity", &self.capacity()).finish()
    }
}

/// Position of the resampler chain inside the ring.
pub trait WriteCursor {
    /// Index of the slot written next.
    fn position(&self) -> usize;
}

/// The output engine's view of the ring: a fixed lag behind the write cursor.
#[derive(Copy, Clone, Debug)]
pub struct RingReader {
    ring: AudioRing,
    offset: usize,
}

impl RingReader {
    /// Reader lagging half a ring behind the writer.
    pub fn new(ring: AudioRing) -> Self {
        let offset = ring.capacity() / 2;
        Self { ring, offset }
    }

    pub fn with_offset(ring: AudioRing, offset: usize) -> Self {
        let offset = offset % ring.capacity();
        Self { ring, offset }
    }

    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    #[inline(always)]
    pub fn read_index(&self, write_cursor: usize) -> usize {
        let cap = self.ring.capacity();
        (write_cursor % cap + cap - self.offset) % cap
    }

    #[inline]
    pub fn sample(&self, write_cursor: usize) -> AudioSample {
        self.ring.load(self.read_index(write_cursor))
    }

    /// Copies `out.len()` consecutive samples starting at the read position.
    pub fn read_into(&self, write_cursor: usize, out: &mut [AudioSample]) {
        let start = self.read_index(write_cursor);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.ring.load(start + i);
        }
    }
}
