//! # SpyDVI Hardware Layer
//!
//! Register blocks for the RP2040 peripherals the capture context talks to,
//! and the hardware implementations of the core's peripheral traits:
//!
//! | Core trait                         | Implementation          |
//! |------------------------------------|-------------------------|
//! | `WordSource` (video, audio words)  | [`pio::RxFifo`]         |
//! | `ControllerSource` (joybus)        | [`pio::JoybusRx`]       |
//! | `AudioDma` (latch + resampler)     | [`dma::AudioDmaChains`] |
//! | `WriteCursor`                      | [`dma::DmaWriteCursor`] |
//!
//! Every constructor that hands out a register block is `unsafe`: the caller
//! promises the peripheral exists at that address and nothing else drives it.

#![no_std]

pub mod dma;
pub mod pio;

pub use dma::{AudioChannels, AudioDmaChains, DmaWriteCursor, RestartWords};
pub use pio::{JoybusRx, Pio, RxFifo};
