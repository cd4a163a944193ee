use bit_field::BitField;
use log::trace;
use volatile_register::{RO, RW, WO};

use spydvi_core::{ControllerSource, WordSource};

pub const PIO0_BASE: usize = 0x5020_0000;
pub const PIO1_BASE: usize = 0x5030_0000;

/// FSTAT.RXEMPTY, one bit per state machine.
const FSTAT_RXEMPTY: usize = 8;

/// Start of one PIO block. Only the FIFO part is described.
#[repr(C)]
pub struct PioBlock {
    pub ctrl: RW<u32>,
    pub fstat: RO<u32>,
    pub fdebug: RW<u32>,
    pub flevel: RO<u32>,
    pub txf: [WO<u32>; 4],
    pub rxf: [RO<u32>; 4],
}

/// One of the two PIO blocks.
#[derive(Copy, Clone)]
pub struct Pio {
    block: &'static PioBlock,
    index: u8,
}

impl Pio {
    pub unsafe fn pio0() -> Self {
        Self {
            block: unsafe { &*(PIO0_BASE as *const PioBlock) },
            index: 0,
        }
    }

    pub unsafe fn pio1() -> Self {
        Self {
            block: unsafe { &*(PIO1_BASE as *const PioBlock) },
            index: 1,
        }
    }

    #[inline(always)]
    pub fn index(&self) -> u8 {
        self.index
    }
}

/// RX FIFO of one state machine.
pub struct RxFifo {
    pio: Pio,
    sm: u8,
}

impl RxFifo {
    pub fn new(pio: Pio, sm: u8) -> Self {
        Self { pio, sm: sm & 3 }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.pio.block.fstat.read().get_bit(FSTAT_RXEMPTY + self.sm as usize)
    }

    #[inline(always)]
    pub fn try_read(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(self.pio.block.rxf[self.sm as usize].read())
        }
    }

    /// Spins until a word arrives.
    #[inline(always)]
    pub fn read_blocking(&self) -> u32 {
        while self.is_empty() {
            core::hint::spin_loop();
        }
        self.pio.block.rxf[self.sm as usize].read()
    }

    /// DREQ number pacing a DMA channel on this FIFO.
    pub fn dreq(&self) -> u8 {
        rx_dreq(self.pio.index, self.sm)
    }

    /// Bus address of the FIFO register, for DMA descriptors.
    pub fn address(&self) -> u32 {
        &self.pio.block.rxf[self.sm as usize] as *const RO<u32> as usize as u32
    }
}

/// RX requests sit after the four TX requests of each block.
pub const fn rx_dreq(pio: u8, sm: u8) -> u8 {
    pio * 8 + 4 + (sm & 3)
}

impl WordSource for RxFifo {
    #[inline(always)]
    fn next_word(&mut self) -> u32 {
        self.read_blocking()
    }
}

/// Joybus receiver: the state machine pushes one word per decoded controller poll.
pub struct JoybusRx {
    fifo: RxFifo,
    last: u32,
}

impl JoybusRx {
    pub fn new(fifo: RxFifo) -> Self {
        Self { fifo, last: 0 }
    }
}

impl ControllerSource for JoybusRx {
    /// Drains the FIFO. Keeps the previous word if nothing new arrived.
    fn latest(&mut self) -> u32 {
        while let Some(word) = self.fifo.try_read() {
            self.last = word;
        }
        trace!("joybus {:08x}", self.last);
        self.last
    }
}
