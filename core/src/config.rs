//! Persisted settings.
//!
//! The record is four little-endian words guarded by two magics. Anything
//! that fails to decode is replaced by the defaults.

use bytemuck::{Pod, Zeroable};
use log::{info, warn};
use thiserror::Error;

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::pixel::ColorDepth;

pub const CONFIG_MAGIC1: u32 = 0x1234_5678;
pub const CONFIG_MAGIC2: u32 = 0xdead_f00d;

pub const COLOR_MODE_RGB555: u32 = 0;
pub const COLOR_MODE_RGB565: u32 = 1;
/// Known to the record format, not produced by capture.
pub const COLOR_MODE_RGB888: u32 = 2;

pub const RECORD_SIZE: usize = core::mem::size_of::<ConfigRecord>();

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ConfigRecord {
    pub magic1: u32,
    pub sample_rate: u32,
    pub color_mode: u32,
    pub magic2: u32,
}

impl ConfigRecord {
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        bytemuck::cast(*self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config record is {0} bytes, expected 16")]
    Length(usize),
    #[error("config magic mismatch ({magic1:#010x}, {magic2:#010x})")]
    Magic { magic1: u32, magic2: u32 },
    #[error("unsupported colour mode {0}")]
    ColorMode(u32),
    #[error("invalid sample rate {0}")]
    SampleRate(u32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub sample_rate: u32,
    pub color_depth: ColorDepth,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            color_depth: ColorDepth::Rgb555,
        }
    }
}

impl Config {
    pub fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        let bytes: [u8; RECORD_SIZE] = bytes.try_into().map_err(|_| ConfigError::Length(bytes.len()))?;
        let record: ConfigRecord = bytemuck::cast(bytes);

        if record.magic1 != CONFIG_MAGIC1 || record.magic2 != CONFIG_MAGIC2 {
            return Err(ConfigError::Magic {
                magic1: record.magic1,
                magic2: record.magic2,
            });
        }

        let color_depth = match record.color_mode {
            COLOR_MODE_RGB555 => ColorDepth::Rgb555,
            COLOR_MODE_RGB565 => ColorDepth::Rgb565,
            other => return Err(ConfigError::ColorMode(other)),
        };

        if record.sample_rate == 0 {
            return Err(ConfigError::SampleRate(record.sample_rate));
        }

        Ok(Self {
            sample_rate: record.sample_rate,
            color_depth,
        })
    }

    pub fn encode(&self) -> ConfigRecord {
        ConfigRecord {
            magic1: CONFIG_MAGIC1,
            sample_rate: self.sample_rate,
            color_mode: match self.color_depth {
                ColorDepth::Rgb555 => COLOR_MODE_RGB555,
                ColorDepth::Rgb565 => COLOR_MODE_RGB565,
            },
            magic2: CONFIG_MAGIC2,
        }
    }

    /// Reads the stored record, falling back to defaults on any problem.
    pub fn load<S: ConfigStore + ?Sized>(store: &mut S) -> Self {
        let Some(bytes) = store.load() else {
            info!("no stored config, using defaults");
            return Self::default();
        };
        match Self::decode(&bytes) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e}, using defaults");
                Self::default()
            }
        }
    }
}

/// Non-volatile storage for the config record.
pub trait ConfigStore {
    fn load(&mut self) -> Option<[u8; RECORD_SIZE]>;
    fn save(&mut self, record: &ConfigRecord);
}

/// Store with nothing behind it.
#[derive(Debug, Default)]
pub struct NullStore;

impl ConfigStore for NullStore {
    fn load(&mut self) -> Option<[u8; RECORD_SIZE]> {
        None
    }

    fn save(&mut self, _record: &ConfigRecord) {}
}

/// Store backed by one record in RAM.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub record: Option<[u8; RECORD_SIZE]>,
    pub saves: u32,
}

impl ConfigStore for MemoryStore {
    fn load(&mut self) -> Option<[u8; RECORD_SIZE]> {
        self.record
    }

    fn save(&mut self, record: &ConfigRecord) {
        self.record = Some(record.to_bytes());
        self.saves += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.sample_rate, 96_000);
        assert_eq!(config.color_depth, ColorDepth::Rgb555);
    }

    #[test]
    fn record_round_trip() {
        let config = Config {
            sample_rate: 44_100,
            color_depth: ColorDepth::Rgb565,
        };
        let bytes = config.encode().to_bytes();
        assert_eq!(&bytes[..4], &CONFIG_MAGIC1.to_le_bytes());
        assert_eq!(Config::decode(&bytes), Ok(config));
    }

    #[test]
    fn rejects_bad_records() {
        let good = Config::default().encode();

        assert_eq!(Config::decode(&[0u8; 3]), Err(ConfigError::Length(3)));

        let bad_magic = ConfigRecord { magic2: 0, ..good };
        assert!(matches!(Config::decode(&bad_magic.to_bytes()), Err(ConfigError::Magic { magic2: 0, .. })));

        let rgb888 = ConfigRecord { color_mode: COLOR_MODE_RGB888, ..good };
        assert_eq!(Config::decode(&rgb888.to_bytes()), Err(ConfigError::ColorMode(2)));

        let no_rate = ConfigRecord { sample_rate: 0, ..good };
        assert_eq!(Config::decode(&no_rate.to_bytes()), Err(ConfigError::SampleRate(0)));
    }

    #[test]
    fn load_falls_back_to_defaults() {
        assert_eq!(Config::load(&mut NullStore), Config::default());

        let mut store = MemoryStore {
            record: Some([0xff; RECORD_SIZE]),
            saves: 0,
        };
        assert_eq!(Config::load(&mut store), Config::default());

        let wanted = Config {
            sample_rate: 32_000,
            color_depth: ColorDepth::Rgb565,
        };
        store.save(&wanted.encode());
        assert_eq!(Config::load(&mut store), wanted);
        assert_eq!(store.saves, 1);
    }
}
