use core::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use super::OsdSurface;
use crate::exchange::Scanout;

/// Draws straight into the frame buffer rows the capture side holds.
///
/// `begin` waits until the output side has returned every row, so the whole picture is drawable.
/// Pixels outside the frame, or on rows still out for display, are dropped.
pub struct ScanoutCanvas<'s> {
    scanout: &'s mut Scanout,
}

impl<'s> ScanoutCanvas<'s> {
    pub fn new(scanout: &'s mut Scanout) -> Self {
        Self { scanout }
    }
}

impl OriginDimensions for ScanoutCanvas<'_> {
    fn size(&self) -> Size {
        let fb = self.scanout.framebuffer();
        Size::new(fb.width() as u32, fb.height() as u32)
    }
}

impl DrawTarget for ScanoutCanvas<'_> {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let width = self.scanout.framebuffer().width();
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) else {
                continue;
            };
            if x >= width {
                continue;
            }
            if let Some(row) = self.scanout.row_mut(y) {
                row[x] = color.into_storage();
            }
        }
        Ok(())
    }
}

impl OsdSurface for ScanoutCanvas<'_> {
    fn begin(&mut self) {
        self.scanout.settle();
    }

    fn present(&mut self) {
        self.scanout.present();
    }
}
