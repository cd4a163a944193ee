//! # DMA
//!
//! Channel registers, the pacing timers, and the two self-restarting chains
//! that carry audio.
//!
//! Each chain is a data channel plus a control channel. The data channel
//! does the copy, then chains to the control channel, which writes one word
//! (a start address) into an alias trigger register of the data channel:
//!
//! ```text
//!  latch:     data  RXF[sm] ──1 word──▶ latch        (DREQ: audio RX)
//!             ctrl  restart word ──▶ data.AL3_READ_ADDR_TRIG
//!
//!  resampler: data  latch ──capacity words──▶ ring   (DREQ: timer)
//!             ctrl  restart word ──▶ data.AL2_WRITE_ADDR_TRIG
//! ```

use bit_field::BitField;
use core::sync::atomic::{AtomicU32, Ordering};
use log::{debug, info};
use volatile_register::RW;

use spydvi_core::audio::{AudioDma, AudioRing, LatchCell, TimerFraction, WriteCursor};

use crate::pio::RxFifo;

pub const DMA_BASE: usize = 0x5000_0000;
pub const DMA_TIMER_BASE: usize = DMA_BASE + 0x420;
pub const CHANNEL_COUNT: usize = 12;

/// DREQ of pacing timer 0; timers 1 to 3 follow.
pub const DREQ_TIMER0: u8 = 0x3b;
/// Unpaced.
pub const DREQ_PERMANENT: u8 = 0x3f;

/// One channel, with all four alias layouts.
#[repr(C)]
pub struct DmaChannel {
    pub read_addr: RW<u32>,
    pub write_addr: RW<u32>,
    pub trans_count: RW<u32>,
    pub ctrl_trig: RW<u32>,
    pub al1_ctrl: RW<u32>,
    pub al1_read_addr: RW<u32>,
    pub al1_write_addr: RW<u32>,
    pub al1_trans_count_trig: RW<u32>,
    pub al2_ctrl: RW<u32>,
    pub al2_trans_count: RW<u32>,
    pub al2_read_addr: RW<u32>,
    pub al2_write_addr_trig: RW<u32>,
    pub al3_ctrl: RW<u32>,
    pub al3_write_addr: RW<u32>,
    pub al3_trans_count: RW<u32>,
    pub al3_read_addr_trig: RW<u32>,
}

impl DmaChannel {
    /// # Safety
    /// `index` must be below [`CHANNEL_COUNT`] and the channel must not be used by anything else.
    pub unsafe fn new(index: u8) -> &'static DmaChannel {
        let address = DMA_BASE + index as usize * core::mem::size_of::<DmaChannel>();
        unsafe { &*(address as *const DmaChannel) }
    }

    /// Programs every register, triggering through `CTRL_TRIG` only when `start` is set.
    pub fn configure(&self, config: ChannelConfig, write: u32, read: u32, count: u32, start: bool) {
        unsafe {
            self.read_addr.write(read);
            self.write_addr.write(write);
            self.trans_count.write(count);
            if start {
                self.ctrl_trig.write(config.bits());
            } else {
                self.al1_ctrl.write(config.bits());
            }
        }
    }
}

/// Fractional pacing timers: rate is `clk_sys * X / Y`.
#[repr(C)]
pub struct DmaTimers {
    pub timer: [RW<u32>; 4],
}

impl DmaTimers {
    pub unsafe fn new() -> &'static DmaTimers {
        unsafe { &*(DMA_TIMER_BASE as *const DmaTimers) }
    }

    pub fn set(&self, timer: u8, fraction: TimerFraction) {
        unsafe { self.timer[timer as usize & 3].write(timer_word(fraction)) }
    }
}

/// X in the upper half, Y in the lower.
pub const fn timer_word(fraction: TimerFraction) -> u32 {
    (fraction.numerator as u32) << 16 | fraction.denominator as u32
}

bitflags::bitflags! {
    /// Single-bit fields of `CTRL_TRIG`.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CtrlFlags: u32 {
        const EN            = 1 << 0;
        const HIGH_PRIORITY = 1 << 1;
        const INCR_READ     = 1 << 4;
        const INCR_WRITE    = 1 << 5;
        /// Wrap the write address instead of the read address.
        const RING_SEL      = 1 << 10;
        const IRQ_QUIET     = 1 << 21;
        const BSWAP         = 1 << 22;
        const SNIFF_EN      = 1 << 23;
        const BUSY          = 1 << 24;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DataSize {
    Byte = 0,
    Half = 1,
    Word = 2,
}

/// Contents of a channel's control register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub flags: CtrlFlags,
    pub size: DataSize,
    /// Chaining to itself means no chaining.
    pub chain_to: u8,
    pub treq: u8,
}

impl ChannelConfig {
    /// Enabled, word sized, incrementing reads, unpaced, unchained.
    pub const fn new(channel: u8) -> Self {
        Self {
            flags: CtrlFlags::EN.union(CtrlFlags::INCR_READ),
            size: DataSize::Word,
            chain_to: channel,
            treq: DREQ_PERMANENT,
        }
    }

    pub const fn read_increment(mut self, on: bool) -> Self {
        self.flags = if on {
            self.flags.union(CtrlFlags::INCR_READ)
        } else {
            self.flags.difference(CtrlFlags::INCR_READ)
        };
        self
    }

    pub const fn write_increment(mut self, on: bool) -> Self {
        self.flags = if on {
            self.flags.union(CtrlFlags::INCR_WRITE)
        } else {
            self.flags.difference(CtrlFlags::INCR_WRITE)
        };
        self
    }

    pub const fn chain_to(mut self, channel: u8) -> Self {
        self.chain_to = channel;
        self
    }

    pub const fn dreq(mut self, treq: u8) -> Self {
        self.treq = treq;
        self
    }

    pub const fn quiet(mut self) -> Self {
        self.flags = self.flags.union(CtrlFlags::IRQ_QUIET);
        self
    }

    pub fn bits(self) -> u32 {
        let mut word = self.flags.difference(CtrlFlags::BUSY).bits();
        word.set_bits(2..4, self.size as u32);
        word.set_bits(11..15, self.chain_to as u32 & 0xf);
        word.set_bits(15..21, self.treq as u32 & 0x3f);
        word
    }
}

/// The four channels the audio chains occupy.
#[derive(Copy, Clone, Debug)]
pub struct AudioChannels {
    pub latch_data: u8,
    pub latch_ctrl: u8,
    pub ring_data: u8,
    pub ring_ctrl: u8,
}

/// Start addresses the control channels reload from. They must outlive the chains.
#[derive(Debug)]
pub struct RestartWords {
    latch_source: AtomicU32,
    ring_start: AtomicU32,
}

impl RestartWords {
    pub const fn new() -> Self {
        Self {
            latch_source: AtomicU32::new(0),
            ring_start: AtomicU32::new(0),
        }
    }
}

fn address_of<T>(r: &T) -> u32 {
    r as *const T as usize as u32
}

/// Hardware latch and resampler chains.
pub struct AudioDmaChains {
    channels: AudioChannels,
    audio_rx: RxFifo,
    timer: u8,
    timers: &'static DmaTimers,
    restart: &'static RestartWords,
    ring: Option<AudioRing>,
}

impl AudioDmaChains {
    /// # Safety
    /// The channels and the timer must be unclaimed by anything else.
    pub unsafe fn new(channels: AudioChannels, audio_rx: RxFifo, timer: u8, restart: &'static RestartWords) -> Self {
        Self {
            channels,
            audio_rx,
            timer: timer & 3,
            timers: unsafe { DmaTimers::new() },
            restart,
            ring: None,
        }
    }

    fn channel(&self, index: u8) -> &'static DmaChannel {
        unsafe { DmaChannel::new(index) }
    }
}

impl AudioDma for AudioDmaChains {
    type Cursor = DmaWriteCursor;

    fn arm_latch(&mut self, latch: &'static LatchCell) {
        let AudioChannels { latch_data, latch_ctrl, .. } = self.channels;
        let data = self.channel(latch_data);
        let ctrl = self.channel(latch_ctrl);
        self.restart.latch_source.store(self.audio_rx.address(), Ordering::Relaxed);

        let data_config = ChannelConfig::new(latch_data)
            .read_increment(false)
            .dreq(self.audio_rx.dreq())
            .chain_to(latch_ctrl)
            .quiet();
        data.configure(data_config, latch.as_ptr() as usize as u32, self.audio_rx.address(), 1, false);

        let ctrl_config = ChannelConfig::new(latch_ctrl).read_increment(false).quiet();
        ctrl.configure(
            ctrl_config,
            address_of(&data.al3_read_addr_trig),
            address_of(&self.restart.latch_source),
            1,
            true,
        );
        debug!("latch chain on channels {latch_data}/{latch_ctrl}");
    }

    fn arm_resampler(&mut self, latch: &'static LatchCell, ring: AudioRing) {
        let AudioChannels { ring_data, ring_ctrl, .. } = self.channels;
        let data = self.channel(ring_data);
        let ctrl = self.channel(ring_ctrl);
        let start = ring.base_ptr() as usize as u32;
        self.restart.ring_start.store(start, Ordering::Relaxed);

        let data_config = ChannelConfig::new(ring_data)
            .read_increment(false)
            .write_increment(true)
            .dreq(DREQ_TIMER0 + self.timer)
            .chain_to(ring_ctrl)
            .quiet();
        data.configure(data_config, start, latch.as_ptr() as usize as u32, ring.capacity() as u32, false);

        let ctrl_config = ChannelConfig::new(ring_ctrl)
            .read_increment(false)
            .write_increment(false)
            .quiet();
        ctrl.configure(
            ctrl_config,
            address_of(&data.al2_write_addr_trig),
            address_of(&self.restart.ring_start),
            1,
            true,
        );
        self.ring = Some(ring);
        info!("resampler chain on channels {ring_data}/{ring_ctrl}, {} slots", ring.capacity());
    }

    fn set_timer_fraction(&mut self, fraction: TimerFraction) {
        self.timers.set(self.timer, fraction);
    }

    fn cursor(&self) -> DmaWriteCursor {
        let (base, capacity) = match self.ring {
            Some(ring) => (ring.base_ptr() as usize as u32, ring.capacity()),
            None => (0, 1),
        };
        DmaWriteCursor {
            write_addr: address_of(&self.channel(self.channels.ring_data).write_addr) as usize,
            base,
            capacity,
        }
    }
}

/// Ring position derived from the resampler data channel's `WRITE_ADDR`.
pub struct DmaWriteCursor {
    write_addr: usize,
    base: u32,
    capacity: usize,
}

// Only ever reads one word-sized register.
unsafe impl Send for DmaWriteCursor {}

impl DmaWriteCursor {
    /// Converts a write address into a slot index.
    pub fn slot(&self, address: u32) -> usize {
        (address.wrapping_sub(self.base) / 4) as usize % self.capacity.max(1)
    }
}

impl WriteCursor for DmaWriteCursor {
    fn position(&self) -> usize {
        let address = unsafe { core::ptr::read_volatile(self.write_addr as *const u32) };
        self.slot(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_layout() {
        assert_eq!(core::mem::size_of::<DmaChannel>(), 0x40);
        assert_eq!(core::mem::offset_of!(DmaChannel, al2_write_addr_trig), 0x2c);
        assert_eq!(core::mem::offset_of!(DmaChannel, al3_read_addr_trig), 0x3c);
    }

    #[test]
    fn ctrl_word_fields() {
        let config = ChannelConfig::new(2)
            .read_increment(false)
            .write_increment(true)
            .dreq(DREQ_TIMER0)
            .chain_to(3)
            .quiet();
        let word = config.bits();
        assert!(word.get_bit(0));
        assert!(!word.get_bit(4));
        assert!(word.get_bit(5));
        assert_eq!(word.get_bits(2..4), 2);
        assert_eq!(word.get_bits(11..15), 3);
        assert_eq!(word.get_bits(15..21), 0x3b);
        assert!(word.get_bit(21));
    }

    #[test]
    fn unchained_config_points_at_itself() {
        assert_eq!(ChannelConfig::new(7).bits().get_bits(11..15), 7);
    }

    #[test]
    fn timer_word_packs_numerator_high() {
        let fraction = TimerFraction { numerator: 4, denominator: 22857 };
        assert_eq!(timer_word(fraction), 0x0004_5949);
    }

    #[test]
    fn cursor_slot_wraps() {
        let cursor = DmaWriteCursor { write_addr: 0, base: 0x2000_0000, capacity: 4 };
        assert_eq!(cursor.slot(0x2000_0000), 0);
        assert_eq!(cursor.slot(0x2000_000c), 3);
        assert_eq!(cursor.slot(0x2000_0010), 0);
    }
}
