//! Software canvas
//!
//! All compositing happens on an RGBA [`Surface`]. Scaling is nearest-neighbour
//! and every draw is clipped to the surface bounds.

use crate::media::frame::{Frame, Rect, BYTES_PER_PIXEL};
use std::sync::Arc;

/// Fill colour used by [`Surface::clear`]
pub const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];

pub struct Surface {
    pixels: Frame,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: Frame::filled(width, height, CLEAR_COLOR),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Resize the surface. Content is discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = Frame::filled(width, height, CLEAR_COLOR);
    }

    /// Erase the whole surface
    pub fn clear(&mut self) {
        self.fill(CLEAR_COLOR);
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.data_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.pixels
    }

    /// Copy of the current content
    pub fn snapshot(&self) -> Arc<Frame> {
        Arc::new(self.pixels.clone())
    }

    /// Draw the `src` region of `frame` into the `dst` region of the surface
    pub fn draw_frame(&mut self, frame: &Frame, src: Rect, dst: Rect) {
        if src.width <= 0.0 || src.height <= 0.0 || dst.width <= 0.0 || dst.height <= 0.0 {
            return;
        }

        let (surface_width, surface_height) = self.dimensions();
        let x0 = dst.x.round().max(0.0) as i64;
        let y0 = dst.y.round().max(0.0) as i64;
        let x1 = ((dst.x + dst.width).round() as i64).min(surface_width as i64);
        let y1 = ((dst.y + dst.height).round() as i64).min(surface_height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let scale_x = src.width / dst.width;
        let scale_y = src.height / dst.height;
        let frame_width = frame.width() as i64;
        let frame_height = frame.height() as i64;
        let source = frame.data();
        let target = self.pixels.data_mut();

        for y in y0..y1 {
            let sy = (src.y + (y as f64 + 0.5 - dst.y) * scale_y).floor() as i64;
            if sy < 0 || sy >= frame_height {
                continue;
            }

            for x in x0..x1 {
                let sx = (src.x + (x as f64 + 0.5 - dst.x) * scale_x).floor() as i64;
                if sx < 0 || sx >= frame_width {
                    continue;
                }

                let src_idx = (sy * frame_width + sx) as usize * BYTES_PER_PIXEL;
                let dst_idx = (y * surface_width as i64 + x) as usize * BYTES_PER_PIXEL;
                blend_pixel(
                    &mut target[dst_idx..dst_idx + BYTES_PER_PIXEL],
                    &source[src_idx..src_idx + BYTES_PER_PIXEL],
                );
            }
        }
    }

    /// Draw the whole frame stretched over the whole surface
    pub fn draw_scaled(&mut self, frame: &Frame) {
        let src = Rect::new(0.0, 0.0, frame.width() as f64, frame.height() as f64);
        let dst = Rect::new(0.0, 0.0, self.width() as f64, self.height() as f64);
        self.draw_frame(frame, src, dst);
    }
}

/// Source-over blend of one RGBA pixel
fn blend_pixel(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        255 => dst.copy_from_slice(src),
        0 => {}
        alpha => {
            let a = alpha as f32 / 255.0;
            for c in 0..3 {
                let out = src[c] as f32 * a + dst[c] as f32 * (1.0 - a);
                dst[c] = out.clamp(0.0, 255.0) as u8;
            }
            dst[3] = dst[3].max(alpha);
        }
    }
}
