//! Recording state management
//!
//! Defines the recording state machine, session tracking and the data a
//! finished recording hands back.

use super::encoder::decode_pcm;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// State of a single [`MediaRecorder`](super::MediaRecorder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    #[default]
    Inactive,
    Recording,
    Paused,
}

/// State of the compositor's recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Nothing recorded yet
    #[default]
    Idle,
    Recording,
    Paused,
    /// Last recording finished, a new one may start
    Stopped,
}

impl RecordingState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

/// One uninterrupted stretch of recording
///
/// A new session is created each time recording is resumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Session index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this session in milliseconds
    pub duration_ms: f64,

    /// Process time when session started
    pub process_time_start_ms: f64,

    /// Process time when session ended
    pub process_time_end_ms: f64,

    /// Unix timestamp when session started
    pub unix_start_ms: u64,

    /// Unix timestamp when session ended
    pub unix_end_ms: u64,
}

impl RecordingSession {
    /// Create a new session starting now
    pub fn new(index: usize, process_time_ms: f64) -> Self {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        Self {
            index,
            duration_ms: 0.0,
            process_time_start_ms: process_time_ms,
            process_time_end_ms: process_time_ms,
            unix_start_ms: now,
            unix_end_ms: now,
        }
    }

    /// End the session
    pub fn end(&mut self, process_time_ms: f64) {
        self.process_time_end_ms = process_time_ms;
        self.duration_ms = (self.process_time_end_ms - self.process_time_start_ms).max(0.0);
        self.unix_end_ms = Utc::now().timestamp_millis().max(0) as u64;
    }
}

/// A blob of encoded media emitted by a recorder
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Emission order within one recorder
    pub sequence: u64,
    /// Frame timestamp at which the chunk was cut
    pub timecode_ms: f64,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Concatenate chunk payloads in order
pub fn concat_chunks(chunks: &[Chunk]) -> Vec<u8> {
    let mut data = Vec::with_capacity(chunks.iter().map(Chunk::len).sum());
    for chunk in chunks {
        data.extend_from_slice(&chunk.data);
    }
    data
}

/// PCM captured from one audio track
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRecording {
    pub track_id: String,
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunks: Vec<Chunk>,
}

impl AudioRecording {
    pub fn data(&self) -> Vec<u8> {
        concat_chunks(&self.chunks)
    }

    /// Interleaved samples
    pub fn samples(&self) -> Vec<i16> {
        decode_pcm(&self.data())
    }

    pub fn duration_ms(&self) -> f64 {
        let frames = self.samples().len() as f64 / self.channels.max(1) as f64;
        frames * 1000.0 / self.sample_rate.max(1) as f64
    }
}

/// Everything a finished recording produced
#[derive(Debug, Clone)]
pub struct Recording {
    pub mime_type: String,
    /// Composite video chunks
    pub chunks: Vec<Chunk>,
    /// Audio captured next to the video, one entry per track
    pub audio: Vec<AudioRecording>,
    pub sessions: Vec<RecordingSession>,
    pub total_duration_ms: f64,
}

impl Recording {
    /// The video as one blob
    pub fn data(&self) -> Vec<u8> {
        concat_chunks(&self.chunks)
    }

    pub fn size(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}
