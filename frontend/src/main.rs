mod audio;
mod output;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::util::SubscriberInitExt;

use spydvi_core::audio::{AudioBuffers, SoftDma, AUDIO_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};
use spydvi_core::config::MemoryStore;
use spydvi_core::exchange::channel;
use spydvi_core::synth::{color_bars, FrameBuilder, LoopedFrame, ScriptedController};
use spydvi_core::{
    Board, Buttons, CaptureContext, ColorDepth, Config, FrameBuffer, Settings, Status, FRAME_HEIGHT, FRAME_WIDTH,
};

use crate::audio::{RingMonitor, SimAudioOut, Tone};

/// Active words per synthetic row: two per output pixel plus room for the widest left crop.
const ACTIVE_WORDS: usize = 2 * FRAME_WIDTH + 48;

const STATS_EVERY: u32 = 60;

#[derive(Parser)]
#[command(name = "spydvi-sim")]
#[command(version, about = "Runs the SpyDVI capture pipeline against synthetic video", long_about = None)]
struct Cli {
    /// Frames to capture
    #[arg(short, long, default_value_t = 120)]
    frames: u32,

    /// Physical rows per synthetic frame (about 511 for NTSC, 615 for PAL)
    #[arg(short, long, default_value_t = 511)]
    rows: usize,

    /// Frame buffer colour depth in bits
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(15..=16))]
    color_depth: u32,

    /// Audio output sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Press the OSD shortcut, change the colour depth and leave the menu
    #[arg(long)]
    open_osd: bool,

    /// Write the last fully displayed frame to this PNG
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).compact().finish().init();
}

/// Chord, into Video, flip the colour depth, back out, down to Exit.
fn osd_script() -> Vec<u32> {
    let [chord, down, right, a] = [Buttons::OSD_CHORD, Buttons::DOWN, Buttons::RIGHT, Buttons::A].map(|b| b.bits());
    let mut script = vec![chord, 0, down, 0, a, 0, down, 0, right, 0];
    script.extend([down, 0].repeat(3));
    script.extend([a, 0]);
    script.extend([down, 0].repeat(4));
    script.extend([a, 0]);
    script
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let requested = Config {
        sample_rate: cli.sample_rate,
        color_depth: ColorDepth::from_bits(cli.color_depth).unwrap_or_default(),
    };
    // same checks a stored record goes through
    Config::decode(&requested.encode().to_bytes()).context("invalid settings")?;

    let mut store = MemoryStore {
        record: Some(requested.encode().to_bytes()),
        saves: 0,
    };
    let saved = Config::load(&mut store);
    let settings = Settings::new(&saved);
    let status = Status::default();

    let (scanout, display) = channel(FrameBuffer::new(FRAME_WIDTH, FRAME_HEIGHT), FRAME_HEIGHT);
    let stop = Arc::new(AtomicBool::new(false));
    let output = output::spawn(display, stop.clone());

    let (audio_out, events) = SimAudioOut::new();
    let frame = FrameBuilder::new(cli.rows, ACTIVE_WORDS)
        .pixels(|row, col| color_bars(row, col, ACTIVE_WORDS))
        .build();
    let script = if cli.open_osd { osd_script() } else { Vec::new() };

    let board = Board {
        video: LoopedFrame::new(frame),
        controller: ScriptedController::new(script),
        audio_dma: SoftDma::new(),
        audio_out,
        store,
    };
    let mut ctx = CaptureContext::new(
        board,
        AudioBuffers::allocate(AUDIO_BUFFER_SIZE),
        scanout,
        &settings,
        &status,
        saved,
    );

    let monitor = RingMonitor::attach(&events)?;
    let mut tone = Tone::new(audio::SOURCE_RATE, 440.0);

    for n in 1..=cli.frames {
        let report = ctx.run_frame();
        debug!(?report, "frame {n}");

        audio::drive_frame(ctx.audio_mut().dma_mut(), &mut tone);
        audio::log_events(&events);

        if n % STATS_EVERY == 0 {
            info!(
                "frame {n}: {} rows, {} format, {} dropped",
                report.rows,
                report.next_format.standard.name(),
                report.dropped_rows
            );
            monitor.log();
        }
    }

    stop.store(true, Ordering::Relaxed);
    let stats = output.join().map_err(|_| anyhow!("output thread panicked"))?;

    let stalls = ctx.scanout().stalls();
    if stalls > 0 {
        warn!("capture stalled on a full ready queue {stalls} times");
    }
    let (_, _, _, store) = ctx.board_parts();
    info!(
        "{} frames captured, {} rows shown, {} complete frames, {} config saves",
        status.frames(),
        stats.rows_shown,
        stats.frames_shown,
        store.saves
    );

    if let Some(path) = cli.snapshot {
        output::save_png(&path, &stats.last_frame, FRAME_WIDTH, FRAME_HEIGHT)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("snapshot written to {}", path.display());
    }
    Ok(())
}
