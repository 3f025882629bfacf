//! Player bound to one stream
//!
//! Turns the pull-based [`VideoSource`] into the two events the compositor
//! reacts to: metadata becoming available and the resolution changing.

use super::frame::Frame;
use super::track::MediaStream;
use std::sync::Arc;

/// Change observed on a [`VideoElement`] since the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementEvent {
    /// The resolution became known for the first time
    LoadedMetadata { width: u32, height: u32 },
    /// The resolution changed after metadata was loaded
    Resize { width: u32, height: u32 },
}

pub struct VideoElement {
    stream: MediaStream,
    seen: Option<(u32, u32)>,
}

impl VideoElement {
    pub fn new(stream: MediaStream) -> Self {
        Self { stream, seen: None }
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn id(&self) -> &str {
        self.stream.id()
    }

    /// Current intrinsic resolution of the video source
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.stream.video().and_then(|v| v.resolution())
    }

    pub fn has_metadata(&self) -> bool {
        self.seen.is_some()
    }

    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.stream.video().and_then(|v| v.current_frame())
    }

    /// Compare the source resolution with the last one seen
    pub fn poll(&mut self) -> Option<ElementEvent> {
        let (width, height) = self.resolution().filter(|&(w, h)| w > 0 && h > 0)?;
        match self.seen {
            None => {
                self.seen = Some((width, height));
                Some(ElementEvent::LoadedMetadata { width, height })
            }
            Some(previous) if previous != (width, height) => {
                self.seen = Some((width, height));
                Some(ElementEvent::Resize { width, height })
            }
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sources::FrameSlot;

    #[test]
    fn test_metadata_then_resize() {
        let slot = Arc::new(FrameSlot::new());
        let mut element = VideoElement::new(MediaStream::new("cam").with_video(slot.clone()));

        assert_eq!(element.poll(), None);
        assert!(!element.has_metadata());

        slot.set_resolution(640, 480);
        assert_eq!(
            element.poll(),
            Some(ElementEvent::LoadedMetadata { width: 640, height: 480 })
        );
        assert_eq!(element.poll(), None);

        slot.set_resolution(1280, 720);
        assert_eq!(
            element.poll(),
            Some(ElementEvent::Resize { width: 1280, height: 720 })
        );
    }

    #[test]
    fn test_zero_resolution_ignored() {
        let slot = Arc::new(FrameSlot::new());
        slot.set_resolution(0, 0);
        let mut element = VideoElement::new(MediaStream::new("empty").with_video(slot));
        assert_eq!(element.poll(), None);
    }
}
