//! Capture statistics drawn over the picture every [`DIAGNOSTICS_INTERVAL`] frames.

use core::fmt::Write;

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

use crate::capture::FrameReport;
use crate::joybus::{Buttons, ControllerState};

pub const DIAGNOSTICS_INTERVAL: u32 = 50;

const LINE_HEIGHT: i32 = 10;

type Line = heapless::String<40>;

#[derive(Debug, Clone, Copy)]
pub struct Diagnostics {
    /// Also dump the decoded controller state.
    pub joybus: bool,
}

impl Diagnostics {
    pub const fn new(joybus: bool) -> Self {
        Self { joybus }
    }

    #[inline]
    pub fn due(frame: u32) -> bool {
        frame != 0 && frame % DIAGNOSTICS_INTERVAL == 0
    }

    /// Text lines for one report, top to bottom.
    pub fn lines(&self, report: &FrameReport, frame: u32, pad: Option<ControllerState>) -> heapless::Vec<Line, 10> {
        let mut lines = heapless::Vec::new();
        let mut push = |args: core::fmt::Arguments| {
            let mut line = Line::new();
            // overlong lines are cut, not fatal
            let _ = line.write_fmt(args);
            let _ = lines.push(line);
        };

        push(format_args!("row {}", report.rows));
        push(format_args!("column {}", report.columns));
        push(format_args!("count {}", report.pixels));
        push(format_args!("frame {frame}"));
        if report.dropped_rows > 0 {
            push(format_args!("dropped {}", report.dropped_rows));
        }

        if let Some(pad) = pad.filter(|_| self.joybus) {
            let b = |button| pad.is_pressed(button) as u8;
            push(format_args!(
                "A={} B={} Z={} Start={}",
                b(Buttons::A),
                b(Buttons::B),
                b(Buttons::Z),
                b(Buttons::START)
            ));
            push(format_args!(
                "DU={} DD={} DL={} DR={}",
                b(Buttons::UP),
                b(Buttons::DOWN),
                b(Buttons::LEFT),
                b(Buttons::RIGHT)
            ));
            push(format_args!("Reset={} TL={} TR={}", b(Buttons::RESET), b(Buttons::L), b(Buttons::R)));
            push(format_args!(
                "CU={} CD={} CL={} CR={}",
                b(Buttons::C_UP),
                b(Buttons::C_DOWN),
                b(Buttons::C_LEFT),
                b(Buttons::C_RIGHT)
            ));
            push(format_args!("X={:04} Y={:04}", pad.stick_x(), pad.stick_y()));
        }
        lines
    }

    pub fn draw<D: DrawTarget<Color = Rgb565>>(
        &self,
        target: &mut D,
        report: &FrameReport,
        frame: u32,
        pad: Option<ControllerState>,
    ) -> Result<(), D::Error> {
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(Rgb565::WHITE)
            .background_color(Rgb565::BLACK)
            .build();
        for (i, line) in self.lines(report, frame, pad).iter().enumerate() {
            let origin = Point::new(0, (i as i32 + 1) * LINE_HEIGHT);
            Text::with_baseline(line, origin, style, Baseline::Top).draw(target)?;
        }
        Ok(())
    }
}
