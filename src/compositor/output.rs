//! Composite output stream

use super::surface::Surface;
use crate::media::frame::Frame;
use crate::media::track::{AudioTrack, MediaStream, VideoSource};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// Video source reading the composite surface
pub struct SurfaceCapture {
    surface: Arc<Mutex<Surface>>,
}

impl SurfaceCapture {
    pub fn new(surface: Arc<Mutex<Surface>>) -> Self {
        Self { surface }
    }
}

impl VideoSource for SurfaceCapture {
    fn resolution(&self) -> Option<(u32, u32)> {
        Some(self.surface.lock().dimensions())
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        Some(self.surface.lock().snapshot())
    }
}

struct OutputInner {
    id: String,
    fps: u32,
    video: Arc<dyn VideoSource>,
    audio: RwLock<Option<AudioTrack>>,
}

/// The stream a recorder or a display reads: one video source and at most one audio track
#[derive(Clone)]
pub struct OutputStream {
    inner: Arc<OutputInner>,
}

impl OutputStream {
    pub fn new(id: impl Into<String>, fps: u32, video: Arc<dyn VideoSource>) -> Self {
        Self {
            inner: Arc::new(OutputInner {
                id: id.into(),
                fps,
                video,
                audio: RwLock::new(None),
            }),
        }
    }

    /// Capture a surface at a fixed frame rate
    pub fn capture(surface: Arc<Mutex<Surface>>, fps: u32) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            fps,
            Arc::new(SurfaceCapture::new(surface)),
        )
    }

    /// Wrap a caller-provided stream. Returns `None` when it has no video.
    pub fn from_media_stream(stream: &MediaStream, fps: u32) -> Option<Self> {
        let video = Arc::clone(stream.video()?);
        let output = Self::new(stream.id(), fps, video);
        if let Some(track) = stream.audio_tracks().first() {
            output.replace_audio_track(track.clone());
        }
        Some(output)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn fps(&self) -> u32 {
        self.inner.fps
    }

    pub fn video(&self) -> &Arc<dyn VideoSource> {
        &self.inner.video
    }

    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.inner.video.current_frame()
    }

    pub fn audio_track(&self) -> Option<AudioTrack> {
        self.inner.audio.read().clone()
    }

    /// Install `track` as the only audio track. Returns the one it replaced.
    pub fn replace_audio_track(&self, track: AudioTrack) -> Option<AudioTrack> {
        self.inner.audio.write().replace(track)
    }

    pub fn remove_audio_track(&self) -> Option<AudioTrack> {
        self.inner.audio.write().take()
    }

    /// Same underlying stream
    pub fn ptr_eq(&self, other: &OutputStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("id", &self.inner.id)
            .field("fps", &self.inner.fps)
            .field("audio", &*self.inner.audio.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sources::SampleQueue;

    fn track(id: &str) -> AudioTrack {
        AudioTrack::new(id, Arc::new(SampleQueue::new(48_000, 1)))
    }

    #[test]
    fn test_single_audio_track() {
        let surface = Arc::new(Mutex::new(Surface::new(4, 4)));
        let output = OutputStream::capture(surface, 30);

        assert!(output.replace_audio_track(track("mic")).is_none());
        let previous = output.replace_audio_track(track("system")).unwrap();
        assert_eq!(previous.id(), "mic");
        assert_eq!(output.audio_track().unwrap().id(), "system");
    }

    #[test]
    fn test_capture_reads_surface() {
        let surface = Arc::new(Mutex::new(Surface::new(4, 2)));
        surface.lock().fill([9, 9, 9, 255]);
        let output = OutputStream::capture(Arc::clone(&surface), 30);

        assert_eq!(output.video().resolution(), Some((4, 2)));
        assert_eq!(output.current_frame().unwrap().pixel(0, 0), Some([9, 9, 9, 255]));
    }

    #[test]
    fn test_media_stream_without_video_rejected() {
        let stream = MediaStream::new("audio-only").with_audio(track("mic"));
        assert!(OutputStream::from_media_stream(&stream, 30).is_none());
    }
}
