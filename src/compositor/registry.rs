//! Stream registry
//!
//! Owns every composited stream together with its geometry, plus the layer
//! order used when drawing. Layer entries are indices into the stream list;
//! the last layer is drawn on top.

use super::layout::{LayoutEngine, Placement};
use crate::media::element::VideoElement;
use crate::media::frame::Rect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered stream and where it is drawn
pub struct StreamEntry {
    element: VideoElement,
    pub placement: Placement,
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub crop_width: f64,
    pub crop_height: f64,
    pub crop_offset_x: f64,
    pub crop_offset_y: f64,
    pub attached: bool,
}

impl StreamEntry {
    /// Create an entry drawing the full source frame into `rect`
    pub fn new(element: VideoElement, placement: Placement, rect: Rect, source: (u32, u32)) -> Self {
        Self {
            element,
            placement,
            width: rect.width,
            height: rect.height,
            offset_x: rect.x,
            offset_y: rect.y,
            crop_width: source.0 as f64,
            crop_height: source.1 as f64,
            crop_offset_x: 0.0,
            crop_offset_y: 0.0,
            attached: true,
        }
    }

    pub fn source_id(&self) -> &str {
        self.element.id()
    }

    pub fn element(&self) -> &VideoElement {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut VideoElement {
        &mut self.element
    }

    /// Destination rectangle on the composite surface
    pub fn rect(&self) -> Rect {
        Rect::new(self.offset_x, self.offset_y, self.width, self.height)
    }

    /// Region of the source frame that is drawn
    pub fn crop_rect(&self) -> Rect {
        Rect::new(
            self.crop_offset_x,
            self.crop_offset_y,
            self.crop_width,
            self.crop_height,
        )
    }

    /// Re-apply the stored placement for a new source resolution. The crop is reset.
    pub fn apply_resize(&mut self, layout: &LayoutEngine, width: u32, height: u32) {
        let rect = layout.apply(self.placement, width, height);
        self.crop_width = width as f64;
        self.crop_height = height as f64;
        self.crop_offset_x = 0.0;
        self.crop_offset_y = 0.0;
        self.width = rect.width;
        self.height = rect.height;
        self.offset_x = rect.x;
        self.offset_y = rect.y;
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            source_id: self.source_id().to_string(),
            placement: self.placement,
            width: self.width,
            height: self.height,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            crop_width: self.crop_width,
            crop_height: self.crop_height,
            crop_offset_x: self.crop_offset_x,
            crop_offset_y: self.crop_offset_y,
            attached: self.attached,
        }
    }
}

/// Geometry snapshot of a registered stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub source_id: String,
    pub placement: Placement,
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub crop_width: f64,
    pub crop_height: f64,
    pub crop_offset_x: f64,
    pub crop_offset_y: f64,
    pub attached: bool,
}

impl StreamInfo {
    pub fn rect(&self) -> Rect {
        Rect::new(self.offset_x, self.offset_y, self.width, self.height)
    }
}

/// Requested geometry change. Missing fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDimensions {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub offset_x: Option<f64>,
    pub offset_y: Option<f64>,
}

/// Two corner points of a crop region, in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion(pub [f64; 2], pub [f64; 2]);

impl CropRegion {
    pub fn width(&self) -> f64 {
        (self.1[0] - self.0[0]).abs()
    }

    pub fn height(&self) -> f64 {
        (self.1[1] - self.0[1]).abs()
    }
}

/// Canvas corner a stream can be docked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Offset request that the clamp pins to this corner
    pub fn dimensions(&self, canvas_width: f64, canvas_height: f64) -> StreamDimensions {
        let (right, bottom) = match self {
            Corner::TopLeft => (false, false),
            Corner::TopRight => (true, false),
            Corner::BottomLeft => (false, true),
            Corner::BottomRight => (true, true),
        };
        StreamDimensions {
            offset_x: Some(if right { canvas_width } else { 0.0 }),
            offset_y: Some(if bottom { canvas_height } else { 0.0 }),
            ..Default::default()
        }
    }
}

fn clamp_offset(offset: f64, size: f64, canvas: f64) -> f64 {
    offset.min(canvas - size).max(0.0)
}

#[derive(Default)]
pub struct StreamRegistry {
    streams: Vec<StreamEntry>,
    layers: Vec<usize>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.source_id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&StreamEntry> {
        self.streams.iter().find(|s| s.source_id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut StreamEntry> {
        self.streams.iter_mut().find(|s| s.source_id() == id)
    }

    pub fn entries(&self) -> &[StreamEntry] {
        &self.streams
    }

    pub fn entries_mut(&mut self) -> &mut [StreamEntry] {
        &mut self.streams
    }

    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Destination rectangles of attached streams
    pub fn active_rects(&self) -> Vec<Rect> {
        self.streams
            .iter()
            .filter(|s| s.attached)
            .map(|s| s.rect())
            .collect()
    }

    /// Attached streams in draw order, bottom first
    pub fn layered(&self) -> impl Iterator<Item = &StreamEntry> {
        self.layers
            .iter()
            .filter_map(|&index| self.streams.get(index))
            .filter(|s| s.attached)
    }

    /// Append a stream on top of all layers. Returns its index.
    pub fn push(&mut self, entry: StreamEntry) -> usize {
        self.streams.push(entry);
        let index = self.streams.len() - 1;
        self.layers.push(index);
        index
    }

    /// Mark a known stream attached again. Returns false for unknown ids.
    pub fn attach(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(entry) => {
                entry.attached = true;
                true
            }
            None => false,
        }
    }

    /// Detach a stream. A hard remove also drops it and its layer.
    pub fn remove(&mut self, id: &str, hard: bool) -> Option<usize> {
        let index = self.position(id)?;
        self.streams[index].attached = false;

        if hard {
            self.layers.retain(|&layer| layer != index);
            for layer in self.layers.iter_mut() {
                if *layer > index {
                    *layer -= 1;
                }
            }
            self.streams.remove(index);
        }
        Some(index)
    }

    /// Apply a geometry change, keeping the rectangle inside the canvas
    pub fn set_dimensions(&mut self, id: &str, dims: StreamDimensions, canvas: (f64, f64)) -> bool {
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        let (canvas_width, canvas_height) = canvas;

        if let Some(width) = dims.width.filter(|w| *w > 0.0) {
            entry.width = width;
        }
        if let Some(height) = dims.height.filter(|h| *h > 0.0) {
            entry.height = height;
        }
        // the canvas may have shrunk since the size was set
        entry.width = entry.width.min(canvas_width);
        entry.height = entry.height.min(canvas_height);

        let offset_x = dims.offset_x.unwrap_or(entry.offset_x);
        let offset_y = dims.offset_y.unwrap_or(entry.offset_y);
        entry.offset_x = clamp_offset(offset_x, entry.width, canvas_width);
        entry.offset_y = clamp_offset(offset_y, entry.height, canvas_height);

        tracing::debug!(
            "Stream {} now {}x{} at ({}, {})",
            id,
            entry.width,
            entry.height,
            entry.offset_x,
            entry.offset_y
        );
        true
    }

    /// Crop one stream to a source region, keeping its width and aspect ratio
    pub fn crop(&mut self, id: &str, region: CropRegion, canvas: (f64, f64)) -> bool {
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        let (canvas_width, canvas_height) = canvas;

        let crop_width = region.width();
        let crop_height = region.height();
        if crop_width <= 0.0 || crop_height <= 0.0 {
            tracing::warn!("Ignoring empty crop region for stream {}: {:?}", id, region);
            return false;
        }

        entry.crop_offset_x = region.0[0].min(region.1[0]);
        entry.crop_offset_y = region.0[1].min(region.1[1]);
        entry.crop_width = crop_width;
        entry.crop_height = crop_height;
        entry.height = entry.width * crop_height / crop_width;
        if entry.height > canvas_height {
            entry.height = canvas_height;
            entry.width = canvas_height * crop_width / crop_height;
        }

        entry.offset_x = clamp_offset(entry.offset_x, entry.width, canvas_width);
        entry.offset_y = clamp_offset(entry.offset_y, entry.height, canvas_height);
        true
    }

    /// Crop several streams at once. Returns how many were changed.
    pub fn crop_many(&mut self, crops: &HashMap<String, CropRegion>, canvas: (f64, f64)) -> usize {
        crops
            .iter()
            .filter(|(id, region)| self.crop(id.as_str(), **region, canvas))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sources::FrameSlot;
    use crate::media::track::MediaStream;
    use std::sync::Arc;

    const CANVAS: (f64, f64) = (1280.0, 720.0);

    fn entry(id: &str, rect: Rect) -> StreamEntry {
        let slot = Arc::new(FrameSlot::new());
        slot.set_resolution(640, 480);
        let element = VideoElement::new(MediaStream::new(id).with_video(slot));
        StreamEntry::new(element, Placement::Centered, rect, (640, 480))
    }

    fn registry_with(ids: &[&str]) -> StreamRegistry {
        let mut registry = StreamRegistry::new();
        for id in ids {
            registry.push(entry(id, Rect::new(0.0, 0.0, 320.0, 240.0)));
        }
        registry
    }

    #[test]
    fn test_push_appends_layer() {
        let registry = registry_with(&["a", "b", "c"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.layers(), &[0, 1, 2]);
    }

    #[test]
    fn test_soft_remove_keeps_entry() {
        let mut registry = registry_with(&["a", "b"]);
        assert_eq!(registry.remove("a", false), Some(0));
        assert_eq!(registry.len(), 2);
        assert!(!registry.get("a").unwrap().attached);
        assert_eq!(registry.layered().count(), 1);

        assert!(registry.attach("a"));
        assert_eq!(registry.layered().count(), 2);
    }

    #[test]
    fn test_hard_remove_reindexes_layers() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.remove("a", true);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.layers(), &[0, 1]);
        assert!(registry.layers().iter().all(|&i| i < registry.len()));
        let order: Vec<&str> = registry.layered().map(|s| s.source_id()).collect();
        assert_eq!(order, vec!["b", "c"]);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = registry_with(&["a"]);
        assert_eq!(registry.remove("zzz", true), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_dimensions_clamps_offsets() {
        let mut registry = registry_with(&["a"]);
        let dims = StreamDimensions {
            offset_x: Some(5000.0),
            offset_y: Some(-30.0),
            ..Default::default()
        };
        assert!(registry.set_dimensions("a", dims, CANVAS));

        let rect = registry.get("a").unwrap().rect();
        assert_eq!(rect.x, 960.0);
        assert_eq!(rect.y, 0.0);
        assert!(rect.fits_within(CANVAS.0, CANVAS.1));
    }

    #[test]
    fn test_growing_stream_is_pulled_back_inside() {
        let mut registry = registry_with(&["a"]);
        registry.set_dimensions(
            "a",
            StreamDimensions {
                offset_x: Some(1000.0),
                offset_y: Some(500.0),
                ..Default::default()
            },
            CANVAS,
        );
        registry.set_dimensions(
            "a",
            StreamDimensions {
                width: Some(2000.0),
                height: Some(600.0),
                ..Default::default()
            },
            CANVAS,
        );

        let rect = registry.get("a").unwrap().rect();
        assert_eq!(rect.width, 1280.0);
        assert_eq!(rect.height, 600.0);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 120.0);
    }

    #[test]
    fn test_shrunk_canvas_clamps_current_size() {
        let mut registry = registry_with(&["a"]);
        registry.set_dimensions(
            "a",
            StreamDimensions {
                width: Some(1200.0),
                height: Some(700.0),
                ..Default::default()
            },
            CANVAS,
        );

        registry.set_dimensions("a", StreamDimensions::default(), (640.0, 360.0));

        let rect = registry.get("a").unwrap().rect();
        assert_eq!(rect, Rect::new(0.0, 0.0, 640.0, 360.0));
        assert!(rect.fits_within(640.0, 360.0));
    }

    #[test]
    fn test_corner_docking() {
        let mut registry = registry_with(&["cam"]);
        registry.set_dimensions("cam", Corner::BottomRight.dimensions(CANVAS.0, CANVAS.1), CANVAS);
        assert_eq!(registry.get("cam").unwrap().rect(), Rect::new(960.0, 480.0, 320.0, 240.0));

        registry.set_dimensions("cam", Corner::TopLeft.dimensions(CANVAS.0, CANVAS.1), CANVAS);
        assert_eq!(registry.get("cam").unwrap().rect(), Rect::new(0.0, 0.0, 320.0, 240.0));
    }

    #[test]
    fn test_crop_preserves_width() {
        let mut registry = registry_with(&["a"]);
        let region = CropRegion([320.0, 240.0], [0.0, 0.0]);
        assert!(registry.crop("a", region, CANVAS));

        let entry = registry.get("a").unwrap();
        assert_eq!(entry.crop_rect(), Rect::new(0.0, 0.0, 320.0, 240.0));
        assert_eq!(entry.width, 320.0);
        assert_eq!(entry.height, 240.0);
    }

    #[test]
    fn test_crop_tall_region_clamped() {
        let mut registry = registry_with(&["a"]);
        registry.set_dimensions(
            "a",
            StreamDimensions {
                offset_x: Some(900.0),
                offset_y: Some(400.0),
                ..Default::default()
            },
            CANVAS,
        );

        assert!(registry.crop("a", CropRegion([0.0, 0.0], [100.0, 400.0]), CANVAS));
        let rect = registry.get("a").unwrap().rect();
        assert_eq!(rect.height, 720.0);
        assert_eq!(rect.width, 180.0);
        assert!(rect.fits_within(CANVAS.0, CANVAS.1));
    }

    #[test]
    fn test_crop_many_skips_unknown_and_empty() {
        let mut registry = registry_with(&["a", "b"]);
        let mut crops = HashMap::new();
        crops.insert("a".to_string(), CropRegion([0.0, 0.0], [160.0, 120.0]));
        crops.insert("b".to_string(), CropRegion([10.0, 10.0], [10.0, 50.0]));
        crops.insert("missing".to_string(), CropRegion([0.0, 0.0], [1.0, 1.0]));

        assert_eq!(registry.crop_many(&crops, CANVAS), 1);
        assert_eq!(registry.get("b").unwrap().crop_width, 640.0);
    }
}
