use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::{AudioDma, AudioRing, LatchCell, TimerFraction, WriteCursor};

/// Software model of the latch and resampler DMA chains.
///
/// Whoever owns it plays the hardware: [`source_push`](Self::source_push) for every sample the
/// receiver produces, [`advance`](Self::advance) for elapsed reference clock cycles.
pub struct SoftDma {
    latch: Option<&'static LatchCell>,
    resampler: Option<(&'static LatchCell, AudioRing)>,
    fraction: TimerFraction,
    phase: u64,
    cursor: Arc<AtomicUsize>,
    ticks: u64,
}

impl SoftDma {
    pub fn new() -> Self {
        Self {
            latch: None,
            resampler: None,
            fraction: TimerFraction {
                numerator: 0,
                denominator: 1,
            },
            phase: 0,
            cursor: Arc::new(AtomicUsize::new(0)),
            ticks: 0,
        }
    }

    /// The receiver produced a sample. Dropped until the latch chain is armed.
    #[inline]
    pub fn source_push(&mut self, word: u32) {
        if let Some(latch) = self.latch {
            latch.store(word);
        }
    }

    /// One pacing timer request: copy the latch into the next ring slot.
    pub fn timer_tick(&mut self) {
        let Some((latch, ring)) = self.resampler else {
            return;
        };
        let pos = self.cursor.load(Ordering::Relaxed);
        ring.store(pos, latch.load());
        // the control channel restarts the data channel at the ring base
        let next = if pos + 1 >= ring.capacity() { 0 } else { pos + 1 };
        self.cursor.store(next, Ordering::Release);
        self.ticks += 1;
    }

    /// Runs the pacing timer for `cycles` reference clock cycles. Returns the number of transfers.
    pub fn advance(&mut self, cycles: u64) -> u64 {
        let den = self.fraction.denominator.max(1) as u64;
        self.phase += cycles * self.fraction.numerator as u64;
        let ticks = self.phase / den;
        self.phase %= den;
        for _ in 0..ticks {
            self.timer_tick();
        }
        ticks
    }

    pub fn timer_fraction(&self) -> TimerFraction {
        self.fraction
    }

    /// Transfers done by the resampler chain so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl AudioDma for SoftDma {
    type Cursor = SoftCursor;

    fn arm_latch(&mut self, latch: &'static LatchCell) {
        self.latch = Some(latch);
    }

    fn arm_resampler(&mut self, latch: &'static LatchCell, ring: AudioRing) {
        self.cursor.store(0, Ordering::Relaxed);
        self.resampler = Some((latch, ring));
    }

    fn set_timer_fraction(&mut self, fraction: TimerFraction) {
        self.fraction = fraction;
    }

    fn cursor(&self) -> SoftCursor {
        SoftCursor(self.cursor.clone())
    }
}

#[derive(Clone, Debug)]
pub struct SoftCursor(Arc<AtomicUsize>);

impl WriteCursor for SoftCursor {
    #[inline]
    fn position(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{timer_fraction, AudioSample, RingReader, REFERENCE_CLOCK_HZ};
    use alloc::boxed::Box;

    fn armed(capacity: usize, rate: u32) -> (SoftDma, AudioRing) {
        let latch: &'static LatchCell = Box::leak(Box::new(LatchCell::new()));
        let ring = AudioRing::allocate(capacity);
        let mut dma = SoftDma::new();
        dma.set_timer_fraction(timer_fraction(rate));
        dma.arm_latch(latch);
        dma.arm_resampler(latch, ring);
        (dma, ring)
    }

    #[test]
    fn one_second_yields_the_target_rate() {
        for rate in [32_000, 44_100, 48_000, 96_000] {
            let (mut dma, _) = armed(64, rate);
            let ticks = dma.advance(REFERENCE_CLOCK_HZ as u64);
            assert!(ticks.abs_diff(rate as u64) <= 1, "{rate}: {ticks}");
        }
    }

    #[test]
    fn phase_carries_across_calls() {
        let (mut dma, _) = armed(64, 44_100);
        let mut total = 0;
        for _ in 0..1000 {
            total += dma.advance(REFERENCE_CLOCK_HZ as u64 / 1000);
        }
        assert!(total.abs_diff(44_100) <= 1, "{total}");
    }

    #[test]
    fn latest_sample_is_repeated_until_replaced() {
        let (mut dma, ring) = armed(8, 96_000);
        let cursor = dma.cursor();

        dma.source_push(AudioSample::new(1, 1).to_word());
        dma.source_push(AudioSample::new(2, 2).to_word());
        dma.timer_tick();
        dma.timer_tick();
        dma.source_push(AudioSample::new(3, 3).to_word());
        dma.timer_tick();

        assert_eq!(cursor.position(), 3);
        assert_eq!([0, 1, 2].map(|i| ring.load(i).left), [2, 2, 3]);
    }

    #[test]
    fn cursor_wraps_and_reader_trails() {
        let (mut dma, ring) = armed(4, 96_000);
        let cursor = dma.cursor();
        for i in 0..6 {
            dma.source_push(AudioSample::new(i, 0).to_word());
            dma.timer_tick();
        }
        assert_eq!(cursor.position(), 2);
        let reader = RingReader::new(ring);
        // slots hold [4, 5, 2, 3]; two behind the cursor is slot 0
        assert_eq!(reader.sample(cursor.position()).left, 4);
    }

    #[test]
    fn unarmed_chains_do_nothing() {
        let mut dma = SoftDma::new();
        dma.source_push(5);
        dma.timer_tick();
        assert_eq!(dma.ticks(), 0);
        assert_eq!(dma.cursor().position(), 0);
    }
}
