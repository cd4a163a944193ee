//! The output engine's audio side, and a stand-in for the console feeding the latch chain.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender};
use tracing::{info, warn};

use spydvi_core::audio::{AudioOutput, AudioSample, ClockRegen, RingReader, SoftDma, WriteCursor, REFERENCE_CLOCK_HZ};

/// Rate the simulated console clocks samples out at.
pub const SOURCE_RATE: u32 = 44_100;
/// Nominal frame rate, for pacing the simulated sources.
pub const FRAME_RATE: u32 = 60;

pub enum AudioEvent {
    ClockSet { rate: u32, regen: ClockRegen },
    ClockUpdated { rate: u32, regen: ClockRegen },
    RingAttached { reader: RingReader, cursor: Box<dyn WriteCursor + Send> },
}

/// Forwards everything the pipeline programs to whoever owns the receiver.
pub struct SimAudioOut {
    events: Sender<AudioEvent>,
}

impl SimAudioOut {
    pub fn new() -> (Self, Receiver<AudioEvent>) {
        let (events, rx) = crossbeam_channel::unbounded();
        (Self { events }, rx)
    }

    fn send(&self, event: AudioEvent) {
        if self.events.send(event).is_err() {
            warn!("audio event dropped, nobody is listening");
        }
    }
}

impl AudioOutput for SimAudioOut {
    fn set_audio_clock(&mut self, rate: u32, regen: ClockRegen) {
        self.send(AudioEvent::ClockSet { rate, regen });
    }

    fn update_audio_clock(&mut self, rate: u32, regen: ClockRegen) {
        self.send(AudioEvent::ClockUpdated { rate, regen });
    }

    fn attach_ring(&mut self, reader: RingReader, cursor: Box<dyn WriteCursor + Send>) {
        self.send(AudioEvent::RingAttached { reader, cursor });
    }
}

/// The ring as the output engine sees it.
pub struct RingMonitor {
    reader: RingReader,
    cursor: Box<dyn WriteCursor + Send>,
}

impl RingMonitor {
    /// Waits for the pipeline to hand over its ring. Clock events before it are logged.
    pub fn attach(events: &Receiver<AudioEvent>) -> Result<Self> {
        for event in events.try_iter() {
            match event {
                AudioEvent::RingAttached { reader, cursor } => return Ok(Self { reader, cursor }),
                other => log_event(other),
            }
        }
        Err(anyhow!("audio pipeline never attached its ring"))
    }

    pub fn sample(&self) -> AudioSample {
        self.reader.sample(self.cursor.position())
    }

    pub fn log(&self) {
        let position = self.cursor.position();
        let sample = self.sample();
        info!(
            "audio ring: writing slot {position}, reading slot {} ({}, {})",
            self.reader.read_index(position),
            sample.left,
            sample.right
        );
    }
}

fn log_event(event: AudioEvent) {
    match event {
        AudioEvent::ClockSet { rate, regen } => info!("audio clock {rate} Hz, cts {} n {}", regen.cts, regen.n),
        AudioEvent::ClockUpdated { rate, regen } => {
            info!("audio clock changed to {rate} Hz, cts {} n {}", regen.cts, regen.n)
        }
        AudioEvent::RingAttached { reader, .. } => warn!("ring attached again ({} slots)", reader.capacity()),
    }
}

pub fn log_events(events: &Receiver<AudioEvent>) {
    for event in events.try_iter() {
        log_event(event);
    }
}

/// Two sines a fifth apart, one per channel.
pub struct Tone {
    phase: f32,
    step: f32,
}

impl Tone {
    pub fn new(sample_rate: u32, frequency: f32) -> Self {
        Self {
            phase: 0.0,
            step: frequency / sample_rate as f32,
        }
    }

    pub fn next_sample(&mut self) -> AudioSample {
        let tau = std::f32::consts::TAU;
        let left = (self.phase * tau).sin();
        let right = (self.phase * 1.5 * tau).sin();
        // wrap where both sines are back at zero
        self.phase = (self.phase + self.step) % 2.0;
        AudioSample::new((left * 16384.0) as i16, (right * 16384.0) as i16)
    }
}

/// One frame's worth of console audio, interleaved with the pacing timer.
pub fn drive_frame(dma: &mut SoftDma, tone: &mut Tone) {
    let cycles_per_sample = (REFERENCE_CLOCK_HZ / SOURCE_RATE) as u64;
    for _ in 0..SOURCE_RATE / FRAME_RATE {
        dma.source_push(tone.next_sample().to_word());
        dma.advance(cycles_per_sample);
    }
}
