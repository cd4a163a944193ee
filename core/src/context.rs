//! # Capture Context
//!
//! Everything the capture side owns, created once at startup and driven
//! forever:
//!
//! ```text
//!  loop {
//!      OSD: check the shortcut, run the menu while it is open
//!      apply settings changed by the menu, save them once it closes
//!      capture one frame
//!      (diagnostics every 50 frames)
//!  }
//! ```

use log::{debug, info};

use crate::audio::{AudioBuffers, AudioDma, AudioOutput, AudioPipeline};
use crate::capture::{CaptureEngine, FrameReport, WordSource};
use crate::config::{Config, ConfigStore};
use crate::exchange::Scanout;
use crate::joybus::ControllerSource;
use crate::osd::{MenuTree, Osd, OsdStep, ScanoutCanvas};
use crate::status::{Settings, Status};

#[cfg(feature = "diagnostics")]
use crate::diagnostics::Diagnostics;

/// Rows published before the first frame, so the output starts with data.
pub const PRIMED_ROWS: usize = 2;

/// The peripherals the capture context drives.
pub struct Board<V, C, D, O, S> {
    /// Video capture words.
    pub video: V,
    /// Decoded joybus words.
    pub controller: C,
    /// Latch and resampler DMA chains.
    pub audio_dma: D,
    /// Output engine's audio side.
    pub audio_out: O,
    /// Settings storage.
    pub store: S,
}

pub struct CaptureContext<'a, V, C, D, O, S>
where
    D: AudioDma,
{
    video: V,
    controller: C,
    audio_out: O,
    store: S,
    audio: AudioPipeline<D>,
    engine: CaptureEngine,
    scanout: Scanout,
    osd: Osd<'a>,
    settings: &'a Settings,
    status: &'a Status,
    saved: Config,
    #[cfg(feature = "diagnostics")]
    diagnostics: Diagnostics,
}

impl<'a, V, C, D, O, S> CaptureContext<'a, V, C, D, O, S>
where
    V: WordSource,
    C: ControllerSource,
    D: AudioDma,
    O: AudioOutput,
    S: ConfigStore,
{
    /// Arms audio and primes the output.
    ///
    /// `saved` is what the store held at boot; `settings` normally starts out equal to it.
    pub fn new(
        board: Board<V, C, D, O, S>,
        buffers: AudioBuffers,
        mut scanout: Scanout,
        settings: &'a Settings,
        status: &'a Status,
        saved: Config,
    ) -> Self {
        let Board {
            video,
            controller,
            audio_dma,
            mut audio_out,
            store,
        } = board;

        let mut audio = AudioPipeline::new(audio_dma, buffers.latch, buffers.ring, settings.sample_rate());
        audio.arm(&mut audio_out);

        scanout.prime(PRIMED_ROWS);

        info!(
            "capture context ready: {} Hz, {} bit colour",
            settings.sample_rate(),
            settings.color_depth().bits()
        );

        Self {
            video,
            controller,
            audio_out,
            store,
            audio,
            engine: CaptureEngine::new(),
            scanout,
            osd: Osd::new(MenuTree::standard(settings, status)),
            settings,
            status,
            saved,
            #[cfg(feature = "diagnostics")]
            diagnostics: Diagnostics::new(true),
        }
    }

    /// One OSD turn followed by one frame.
    pub fn run_frame(&mut self) -> FrameReport {
        if self.osd.poll_shortcut(&mut self.controller) {
            let mut canvas = ScanoutCanvas::new(&mut self.scanout);
            let step = self.osd.run(&mut self.controller, &mut canvas);
            self.apply_settings();
            if step == OsdStep::Closed {
                self.persist_settings();
            }
        }

        let depth = self.settings.color_depth();
        let report = self.engine.capture_frame(&mut self.video, &mut self.scanout, depth);
        self.status.record(&report);

        #[cfg(feature = "diagnostics")]
        self.show_diagnostics(&report);

        report
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.run_frame();
        }
    }

    fn apply_settings(&mut self) {
        self.audio.set_sample_rate(&mut self.audio_out, self.settings.sample_rate());
    }

    /// Writes the settings back if the menu changed them.
    fn persist_settings(&mut self) {
        let current = self.settings.config();
        if current == self.saved {
            return;
        }
        debug!("saving settings {current:?}");
        self.store.save(&current.encode());
        self.saved = current;
    }

    #[cfg(feature = "diagnostics")]
    fn show_diagnostics(&mut self, report: &FrameReport) {
        let frame = self.status.frames();
        if !Diagnostics::due(frame) {
            return;
        }
        let pad = self
            .diagnostics
            .joybus
            .then(|| crate::joybus::ControllerState(self.controller.latest()));
        let mut canvas = ScanoutCanvas::new(&mut self.scanout);
        crate::osd::OsdSurface::begin(&mut canvas);
        let _ = self.diagnostics.draw(&mut canvas, report, frame, pad);
        crate::osd::OsdSurface::present(&mut canvas);
    }

    pub fn board_parts(&mut self) -> (&mut V, &mut C, &mut O, &mut S) {
        (&mut self.video, &mut self.controller, &mut self.audio_out, &mut self.store)
    }

    pub fn audio(&self) -> &AudioPipeline<D> {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioPipeline<D> {
        &mut self.audio
    }

    pub fn osd(&self) -> &Osd<'a> {
        &self.osd
    }

    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    pub fn scanout(&self) -> &Scanout {
        &self.scanout
    }

    pub fn saved_config(&self) -> Config {
        self.saved
    }
}
