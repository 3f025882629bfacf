//! Push-fed sources
//!
//! Capture code (camera, screen, decoded files) hands frames and samples to
//! these adapters; the compositor pulls from them once per frame.

use super::frame::Frame;
use super::track::{AudioSource, VideoSource};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Video source holding the most recently pushed frame
#[derive(Default)]
pub struct FrameSlot {
    resolution: RwLock<Option<(u32, u32)>>,
    frame: RwLock<Option<Arc<Frame>>>,
}

impl FrameSlot {
    /// A slot whose resolution is not known yet
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that starts out holding `frame`
    pub fn with_frame(frame: Frame) -> Self {
        let slot = Self::new();
        slot.push(frame);
        slot
    }

    /// Publish a new frame. The resolution follows the frame.
    pub fn push(&self, frame: Frame) {
        *self.resolution.write() = Some(frame.dimensions());
        *self.frame.write() = Some(Arc::new(frame));
    }

    /// Announce a resolution before the first frame arrives
    pub fn set_resolution(&self, width: u32, height: u32) {
        *self.resolution.write() = Some((width, height));
    }
}

impl VideoSource for FrameSlot {
    fn resolution(&self) -> Option<(u32, u32)> {
        *self.resolution.read()
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.frame.read().clone()
    }
}

/// Audio source backed by a FIFO of interleaved samples
pub struct SampleQueue {
    sample_rate: u32,
    channels: u16,
    samples: Mutex<Vec<i16>>,
}

impl SampleQueue {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, samples: &[i16]) {
        self.samples.lock().extend_from_slice(samples);
    }

    pub fn pending(&self) -> usize {
        self.samples.lock().len()
    }
}

impl AudioSource for SampleQueue {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn drain(&self) -> Vec<i16> {
        std::mem::take(&mut *self.samples.lock())
    }
}
