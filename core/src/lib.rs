#![no_std]
#![allow(clippy::new_without_default)]
extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod audio;
pub mod capture;
pub mod config;
pub mod context;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod exchange;
pub mod framebuffer;
pub mod joybus;
pub mod osd;
pub mod pixel;
pub mod status;
pub mod synth;

pub use capture::{CaptureEngine, CaptureFormat, FrameReport, VideoStandard, WordSource};
pub use config::{Config, ConfigError, ConfigRecord, ConfigStore, NullStore};
pub use context::{Board, CaptureContext};
pub use exchange::{Display, Scanout};
pub use framebuffer::{FrameBuffer, ScanlineHandle, FRAME_HEIGHT, FRAME_WIDTH};
pub use joybus::{Buttons, ControllerSource, ControllerState, Gamepad};
pub use pixel::{ColorDepth, PixelWord, SyncBits};
pub use status::{Settings, Status};
