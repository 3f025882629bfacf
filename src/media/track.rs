//! Media source traits and stream containers
//!
//! A [`MediaStream`] bundles at most one video source with any number of
//! audio tracks. Sources are shared (`Arc`) so the same capture can feed the
//! compositor and a preview at the same time.

use super::frame::Frame;
use std::fmt;
use std::sync::Arc;

/// A live source of video frames
pub trait VideoSource: Send + Sync {
    /// Intrinsic resolution, `None` until the source knows it
    fn resolution(&self) -> Option<(u32, u32)>;

    /// Latest frame, if any has been produced yet
    fn current_frame(&self) -> Option<Arc<Frame>>;
}

/// A live source of PCM audio
pub trait AudioSource: Send + Sync {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Take the interleaved samples produced since the previous call
    fn drain(&self) -> Vec<i16>;
}

/// A single audio track
#[derive(Clone)]
pub struct AudioTrack {
    id: String,
    source: Arc<dyn AudioSource>,
}

impl AudioTrack {
    pub fn new(id: impl Into<String>, source: Arc<dyn AudioSource>) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Arc<dyn AudioSource> {
        &self.source
    }
}

impl fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioTrack")
            .field("id", &self.id)
            .field("sample_rate", &self.source.sample_rate())
            .field("channels", &self.source.channels())
            .finish()
    }
}

/// A capture source made of an optional video source and audio tracks
#[derive(Clone)]
pub struct MediaStream {
    id: String,
    video: Option<Arc<dyn VideoSource>>,
    audio: Vec<AudioTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            video: None,
            audio: Vec::new(),
        }
    }

    /// Create a stream with a random id
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_video(mut self, source: Arc<dyn VideoSource>) -> Self {
        self.video = Some(source);
        self
    }

    pub fn with_audio(mut self, track: AudioTrack) -> Self {
        self.audio.push(track);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn video(&self) -> Option<&Arc<dyn VideoSource>> {
        self.video.as_ref()
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.audio
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("video", &self.video.as_ref().map(|v| v.resolution()))
            .field("audio", &self.audio)
            .finish()
    }
}
