//! Quadrant placement
//!
//! Treating the canvas centre as the origin, every placed stream has an angle.
//! A new stream goes to the first corner slot that is at least 90 degrees away
//! from every occupied angle. When no corner is free the stream is scaled to
//! fit the canvas and centred.

use crate::media::frame::Rect;
use serde::{Deserialize, Serialize};

/// Corner slots in the order they are tried (degrees, y axis pointing down)
pub const QUADRANT_SLOTS: [f64; 4] = [45.0, 135.0, 315.0, 225.0];

/// Minimum angular distance between a free slot and an occupied angle
pub const MIN_SLOT_DISTANCE: f64 = 90.0;

/// How a stream's rectangle was chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Placement {
    /// Default size, centred. Used for the first stream.
    Centered,
    /// Default size, pinned to the corner of the given slot angle
    Quadrant { angle: f64 },
    /// Scaled to fit the whole canvas, centred
    Fitted,
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutEngine {
    width: f64,
    height: f64,
    center_threshold: f64,
}

impl LayoutEngine {
    pub fn new(width: u32, height: u32, center_threshold: f64) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            center_threshold,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    /// One third of the canvas height, width following the source aspect ratio
    pub fn default_size(&self, source_width: u32, source_height: u32) -> (f64, f64) {
        let height = self.height / 3.0;
        let width = source_width as f64 / source_height as f64 * height;
        (width, height)
    }

    /// Angle in degrees `[0, 360)` from the canvas centre to the rectangle centre
    pub fn angle_of(&self, rect: &Rect) -> f64 {
        let (cx, cy) = rect.center();
        let dx = cx - self.width / 2.0;
        let dy = cy - self.height / 2.0;
        dy.atan2(dx).to_degrees().rem_euclid(360.0)
    }

    /// Distance from the canvas centre to the rectangle centre
    pub fn distance_from_center(&self, rect: &Rect) -> f64 {
        let (cx, cy) = rect.center();
        (cx - self.width / 2.0).hypot(cy - self.height / 2.0)
    }

    /// Angles of all rectangles that are not sitting on the canvas centre
    pub fn occupied_angles<'a>(&self, rects: impl IntoIterator<Item = &'a Rect>) -> Vec<f64> {
        rects
            .into_iter()
            .filter(|rect| self.distance_from_center(rect) > self.center_threshold)
            .map(|rect| self.angle_of(rect))
            .collect()
    }

    /// First slot far enough from every occupied angle
    pub fn free_slot(&self, occupied: &[f64]) -> Option<f64> {
        QUADRANT_SLOTS.iter().copied().find(|slot| {
            occupied
                .iter()
                .all(|angle| (angle - slot).abs() >= MIN_SLOT_DISTANCE)
        })
    }

    /// Choose a placement for a new source given the rectangles already placed
    pub fn place(&self, existing: &[Rect], source_width: u32, source_height: u32) -> (Placement, Rect) {
        let placement = if existing.is_empty() {
            Placement::Centered
        } else {
            match self.free_slot(&self.occupied_angles(existing)) {
                Some(angle) => Placement::Quadrant { angle },
                None => Placement::Fitted,
            }
        };
        (placement, self.apply(placement, source_width, source_height))
    }

    /// Rectangle for a placement and source resolution
    pub fn apply(&self, placement: Placement, source_width: u32, source_height: u32) -> Rect {
        match placement {
            Placement::Centered => {
                let (width, height) = self.default_size(source_width, source_height);
                Rect::new(
                    (self.width - width) / 2.0,
                    (self.height - height) / 2.0,
                    width,
                    height,
                )
            }
            Placement::Quadrant { angle } => {
                let (width, height) = self.default_size(source_width, source_height);
                self.corner_rect(angle, width, height)
            }
            Placement::Fitted => self.fit_centered(source_width, source_height),
        }
    }

    /// Pin a rectangle to the corner a slot angle points at
    pub fn corner_rect(&self, angle: f64, width: f64, height: f64) -> Rect {
        let radians = angle.to_radians();
        let x = if radians.cos() >= 0.0 { self.width - width } else { 0.0 };
        let y = if radians.sin() >= 0.0 { self.height - height } else { 0.0 };
        Rect::new(x, y, width, height)
    }

    /// Scale the source down (never up) to fit the canvas, then centre it
    pub fn fit_centered(&self, source_width: u32, source_height: u32) -> Rect {
        let source_width = source_width as f64;
        let source_height = source_height as f64;
        let ratio = (source_width / self.width)
            .max(source_height / self.height)
            .max(1.0);
        let scaled_width = source_width / ratio;
        let scaled_height = source_height / ratio;
        // offsets are floored before halving, so odd gaps leave a half pixel
        Rect::new(
            ((self.width - scaled_width).floor() / 2.0).abs(),
            ((self.height - scaled_height).floor() / 2.0).abs(),
            scaled_width.floor(),
            scaled_height.floor(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LayoutEngine {
        LayoutEngine::new(1280, 720, 10.0)
    }

    #[test]
    fn test_first_stream_default_size_centered() {
        let (placement, rect) = engine().place(&[], 640, 480);
        assert_eq!(placement, Placement::Centered);
        assert_eq!(rect, Rect::new(480.0, 240.0, 320.0, 240.0));
    }

    #[test]
    fn test_angles_follow_canvas_axes() {
        let engine = engine();
        let bottom_right = Rect::new(960.0, 480.0, 320.0, 240.0);
        let bottom_left = Rect::new(0.0, 480.0, 320.0, 240.0);
        let top_left = Rect::new(0.0, 0.0, 320.0, 240.0);
        let top_right = Rect::new(960.0, 0.0, 320.0, 240.0);

        assert!(engine.angle_of(&bottom_right) > 0.0 && engine.angle_of(&bottom_right) < 90.0);
        assert!(engine.angle_of(&bottom_left) > 90.0 && engine.angle_of(&bottom_left) < 180.0);
        assert!(engine.angle_of(&top_left) > 180.0 && engine.angle_of(&top_left) < 270.0);
        assert!(engine.angle_of(&top_right) > 270.0 && engine.angle_of(&top_right) < 360.0);
    }

    #[test]
    fn test_centered_streams_do_not_occupy_slots() {
        let engine = engine();
        let centered = Rect::new(480.0, 240.0, 320.0, 240.0);
        assert!(engine.occupied_angles(&[centered]).is_empty());
    }

    #[test]
    fn test_corner_sequence() {
        let engine = engine();
        let mut rects = Vec::new();
        let mut slots = Vec::new();

        for _ in 0..4 {
            let (placement, rect) = engine.place(&rects, 640, 480);
            if let Placement::Quadrant { angle } = placement {
                slots.push(angle);
            }
            rects.push(rect);
        }

        assert_eq!(slots, vec![45.0, 135.0, 315.0]);
        assert_eq!(rects[1], Rect::new(960.0, 480.0, 320.0, 240.0));
        assert_eq!(rects[2], Rect::new(0.0, 480.0, 320.0, 240.0));
        assert_eq!(rects[3], Rect::new(960.0, 0.0, 320.0, 240.0));
    }

    #[test]
    fn test_chosen_slots_keep_distance() {
        let engine = engine();
        let resolutions = [(640, 480), (1920, 1080), (480, 640), (1280, 720)];

        for start in 0..resolutions.len() {
            let mut rects = Vec::new();
            let mut slots: Vec<f64> = Vec::new();
            for i in 0..4 {
                let (w, h) = resolutions[(start + i) % resolutions.len()];
                let (placement, rect) = engine.place(&rects, w, h);
                if let Placement::Quadrant { angle } = placement {
                    for other in &slots {
                        assert!((angle - other).abs() >= MIN_SLOT_DISTANCE);
                    }
                    slots.push(angle);
                }
                assert!(rect.fits_within(1280.0, 720.0));
                rects.push(rect);
            }
        }
    }

    #[test]
    fn test_fallback_fits_when_no_slot_free() {
        let engine = engine();
        let existing: Vec<Rect> = QUADRANT_SLOTS
            .iter()
            .map(|&angle| engine.corner_rect(angle, 320.0, 240.0))
            .collect();

        let (placement, rect) = engine.place(&existing, 1920, 1080);
        assert_eq!(placement, Placement::Fitted);
        assert_eq!(rect, Rect::new(0.0, 0.0, 1280.0, 720.0));
    }

    #[test]
    fn test_fit_centered_never_upscales() {
        let rect = engine().fit_centered(640, 480);
        assert_eq!(rect, Rect::new(320.0, 120.0, 640.0, 480.0));

        let rect = engine().fit_centered(640, 1440);
        assert_eq!(rect, Rect::new(480.0, 0.0, 320.0, 720.0));
    }

    #[test]
    fn test_fit_centered_odd_gap_keeps_half_pixel() {
        let rect = engine().fit_centered(101, 51);
        assert_eq!(rect, Rect::new(589.5, 334.5, 101.0, 51.0));
    }
}
