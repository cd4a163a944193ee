//! # Audio Resampling
//!
//! Two self-restarting DMA chains move audio from the console to the output
//! engine without any per-sample code:
//!
//! ```text
//!  audio PIO RX ──latch chain──▶ LatchCell ──resampler chain──▶ AudioRing
//!   (source clock)               (newest)     (DMA timer)       (fixed rate)
//! ```
//!
//! The latch chain copies every received sample into one cell, so the cell
//! always holds the newest sample no matter how fast the console clocks them
//! out. The resampler chain copies that cell into the next ring slot on every
//! DMA timer tick; the timer runs at `reference * numerator / denominator`.
//! The output engine reads the ring half a buffer behind the write cursor.

mod ring;
mod soft;

pub use ring::{AudioRing, LatchCell, RingReader, WriteCursor};
pub use soft::{SoftCursor, SoftDma};

use alloc::boxed::Box;
use bytemuck::{Pod, Zeroable};
use log::{debug, info, warn};

/// System clock driving the DMA pacing timer (TMDS bit clock).
pub const REFERENCE_CLOCK_HZ: u32 = 252_000_000;
/// DVI pixel clock, the base of the CTS/N audio clock regeneration.
pub const PIXEL_CLOCK_HZ: u32 = 25_200_000;

pub const AUDIO_BUFFER_SIZE_BITS: u32 = 12;
pub const AUDIO_BUFFER_SIZE: usize = 1 << AUDIO_BUFFER_SIZE_BITS;

pub const DEFAULT_SAMPLE_RATE: u32 = 96_000;

/// Rates with exact divider and CTS/N entries.
pub const STANDARD_RATES: [u32; 4] = [32_000, 44_100, 48_000, 96_000];

/// One stereo sample, laid out the way the I2S receiver pushes it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AudioSample {
    pub left: i16,
    pub right: i16,
}

impl AudioSample {
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    #[inline(always)]
    pub fn from_word(word: u32) -> Self {
        bytemuck::cast(word)
    }

    #[inline(always)]
    pub fn to_word(self) -> u32 {
        bytemuck::cast(self)
    }
}

/// DMA pacing timer setting: one transfer request every `denominator / numerator` reference
/// cycles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimerFraction {
    pub numerator: u16,
    pub denominator: u16,
}

impl TimerFraction {
    /// Rate the timer actually produces from `reference_hz`, rounded down.
    pub const fn output_rate(self, reference_hz: u32) -> u32 {
        if self.denominator == 0 {
            return 0;
        }
        (reference_hz as u64 * self.numerator as u64 / self.denominator as u64) as u32
    }
}

/// Divider for `rate` against [`REFERENCE_CLOCK_HZ`].
///
/// Standard rates are exact or within a fraction of a hertz. Anything else gets
/// `1 / (reference / rate)`, which rounds.
pub fn timer_fraction(rate: u32) -> TimerFraction {
    let (numerator, denominator) = match rate {
        96_000 => (1, 2625),
        48_000 => (1, 5250),
        44_100 => (4, 22857),
        32_000 => (1, 7875),
        0 => {
            warn!("sample rate 0, pacing timer set to {DEFAULT_SAMPLE_RATE} Hz");
            (1, 2625)
        }
        _ => {
            let den = (REFERENCE_CLOCK_HZ / rate).clamp(1, u16::MAX as u32) as u16;
            debug!("no exact divider for {rate} Hz, using 1/{den}");
            (1, den)
        }
    };
    TimerFraction {
        numerator,
        denominator,
    }
}

/// Audio clock regeneration parameters sent alongside the video.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockRegen {
    pub cts: u32,
    pub n: u32,
}

pub fn clock_regen(rate: u32) -> ClockRegen {
    match rate {
        96_000 => ClockRegen { cts: 25200, n: 6144 * 2 },
        48_000 => ClockRegen { cts: 25200, n: 6144 },
        44_100 => ClockRegen { cts: 28000, n: 6272 },
        32_000 => ClockRegen { cts: 25200, n: 4096 },
        _ => {
            // 128 * fs = f_tmds * N / CTS
            let cts = 25200u32;
            let n = 128 * rate as u64 * cts as u64 / PIXEL_CLOCK_HZ as u64;
            ClockRegen { cts, n: n as u32 }
        }
    }
}

/// Memory the DMA chains write: the latch cell and the ring.
#[derive(Copy, Clone, Debug)]
pub struct AudioBuffers {
    pub latch: &'static LatchCell,
    pub ring: AudioRing,
}

impl AudioBuffers {
    /// Allocates both for the rest of the program.
    pub fn allocate(capacity: usize) -> Self {
        Self {
            latch: Box::leak(Box::new(LatchCell::new())),
            ring: AudioRing::allocate(capacity),
        }
    }
}

/// The two DMA chains feeding the ring.
pub trait AudioDma {
    type Cursor: WriteCursor + Send + 'static;

    /// Starts copying every received sample into `latch`.
    fn arm_latch(&mut self, latch: &'static LatchCell);
    /// Starts copying `latch` into successive slots of `ring` on every pacing timer tick, wrapping
    /// at the end.
    fn arm_resampler(&mut self, latch: &'static LatchCell, ring: AudioRing);
    fn set_timer_fraction(&mut self, fraction: TimerFraction);
    /// Where the resampler chain is writing, readable from the output context.
    fn cursor(&self) -> Self::Cursor;
}

/// What the output engine needs to carry audio.
pub trait AudioOutput {
    /// Programs the audio clock before output starts.
    fn set_audio_clock(&mut self, rate: u32, regen: ClockRegen);
    /// Reprograms the audio clock while output runs.
    fn update_audio_clock(&mut self, rate: u32, regen: ClockRegen);
    fn attach_ring(&mut self, reader: RingReader, cursor: Box<dyn WriteCursor + Send>);
}

pub struct AudioPipeline<D: AudioDma> {
    dma: D,
    latch: &'static LatchCell,
    ring: AudioRing,
    sample_rate: u32,
    armed: bool,
}

impl<D: AudioDma> AudioPipeline<D> {
    pub fn new(dma: D, latch: &'static LatchCell, ring: AudioRing, sample_rate: u32) -> Self {
        Self {
            dma,
            latch,
            ring,
            sample_rate,
            armed: false,
        }
    }

    /// Starts both chains and hands the ring to the output engine. Only the first call does
    /// anything.
    pub fn arm<O: AudioOutput + ?Sized>(&mut self, output: &mut O) {
        if self.armed {
            return;
        }
        let rate = self.sample_rate;
        let fraction = timer_fraction(rate);
        let regen = clock_regen(rate);

        self.dma.arm_latch(self.latch);
        self.dma.set_timer_fraction(fraction);
        self.dma.arm_resampler(self.latch, self.ring);

        output.set_audio_clock(rate, regen);
        output.attach_ring(self.reader(), Box::new(self.dma.cursor()));
        self.armed = true;

        info!(
            "audio armed at {rate} Hz (timer {}/{}, cts {} n {})",
            fraction.numerator, fraction.denominator, regen.cts, regen.n
        );
    }

    /// Changes the output rate live: new pacing divider, new CTS/N.
    pub fn set_sample_rate<O: AudioOutput + ?Sized>(&mut self, output: &mut O, rate: u32) {
        if rate == self.sample_rate {
            return;
        }
        self.sample_rate = rate;
        if !self.armed {
            return;
        }
        self.dma.set_timer_fraction(timer_fraction(rate));
        output.update_audio_clock(rate, clock_regen(rate));
        info!("audio sample rate now {rate} Hz");
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Reader with the standard half-buffer lag.
    pub fn reader(&self) -> RingReader {
        RingReader::new(self.ring)
    }

    pub fn dma(&self) -> &D {
        &self.dma
    }

    pub fn dma_mut(&mut self) -> &mut D {
        &mut self.dma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn standard_dividers_hit_their_rate() {
        for rate in STANDARD_RATES {
            let got = timer_fraction(rate).output_rate(REFERENCE_CLOCK_HZ);
            assert!(got.abs_diff(rate) <= 1, "{rate} Hz -> {got} Hz");
        }
        assert_eq!(timer_fraction(44_100), TimerFraction { numerator: 4, denominator: 22857 });
        assert_eq!(timer_fraction(96_000), TimerFraction { numerator: 1, denominator: 2625 });
    }

    #[test]
    fn unlisted_rate_falls_back_to_integer_divider() {
        let f = timer_fraction(22_050);
        assert_eq!(f, TimerFraction { numerator: 1, denominator: 11428 });
        assert!(f.output_rate(REFERENCE_CLOCK_HZ).abs_diff(22_050) < 5);
    }

    #[test]
    fn degenerate_rates_stay_in_range() {
        assert_eq!(timer_fraction(0).denominator, 2625);
        assert_eq!(timer_fraction(1).denominator, u16::MAX);
        assert_eq!(timer_fraction(u32::MAX).denominator, 1);
    }

    #[test]
    fn clock_regen_table() {
        assert_eq!(clock_regen(96_000), ClockRegen { cts: 25200, n: 12288 });
        assert_eq!(clock_regen(48_000), ClockRegen { cts: 25200, n: 6144 });
        assert_eq!(clock_regen(44_100), ClockRegen { cts: 28000, n: 6272 });
        assert_eq!(clock_regen(32_000), ClockRegen { cts: 25200, n: 4096 });
        // the formula agrees with the table where both apply
        assert_eq!(clock_regen(22_050).n, 128 * 22_050 / 1000);
        // no overflow above 32-bit intermediate range
        assert_eq!(clock_regen(192_000), ClockRegen { cts: 25200, n: 24576 });
    }

    #[test]
    fn sample_word_layout() {
        let s = AudioSample::new(-1, 2);
        assert_eq!(s.to_word(), 0x0002_ffff);
        assert_eq!(AudioSample::from_word(0x0002_ffff), s);
    }

    #[derive(Default)]
    struct RecordingOutput {
        clocks: Vec<(bool, u32, ClockRegen)>,
        offset: Option<usize>,
    }

    impl AudioOutput for RecordingOutput {
        fn set_audio_clock(&mut self, rate: u32, regen: ClockRegen) {
            self.clocks.push((true, rate, regen));
        }
        fn update_audio_clock(&mut self, rate: u32, regen: ClockRegen) {
            self.clocks.push((false, rate, regen));
        }
        fn attach_ring(&mut self, reader: RingReader, _cursor: Box<dyn WriteCursor + Send>) {
            self.offset = Some(reader.offset());
        }
    }

    fn pipeline(rate: u32) -> AudioPipeline<SoftDma> {
        let latch: &'static LatchCell = Box::leak(Box::new(LatchCell::new()));
        AudioPipeline::new(SoftDma::new(), latch, AudioRing::allocate(AUDIO_BUFFER_SIZE), rate)
    }

    #[test]
    fn arm_programs_output_once() {
        let mut out = RecordingOutput::default();
        let mut audio = pipeline(48_000);
        audio.arm(&mut out);
        audio.arm(&mut out);
        assert_eq!(out.clocks, [(true, 48_000, clock_regen(48_000))]);
        assert_eq!(out.offset, Some(AUDIO_BUFFER_SIZE / 2));
        assert_eq!(audio.dma().timer_fraction(), timer_fraction(48_000));
    }

    #[test]
    fn live_rate_change_reprograms_timer_and_clock() {
        let mut out = RecordingOutput::default();
        let mut audio = pipeline(96_000);
        audio.arm(&mut out);
        audio.set_sample_rate(&mut out, 96_000);
        audio.set_sample_rate(&mut out, 44_100);
        assert_eq!(out.clocks.len(), 2);
        assert_eq!(out.clocks[1], (false, 44_100, clock_regen(44_100)));
        assert_eq!(audio.dma().timer_fraction(), timer_fraction(44_100));
        assert_eq!(audio.sample_rate(), 44_100);
    }
}
