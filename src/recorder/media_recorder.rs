//! Chunked media recorder
//!
//! A [`MediaRecorder`] pulls from its input once per captured frame and cuts
//! the encoded bytes into [`Chunk`]s every `timeslice`. Video frames are handed
//! to an [`EncoderWorker`] so capturing never waits on the encoder. Audio of a
//! composite input is captured as PCM, one [`AudioRecording`] per track that
//! fed it. `stop` flushes the final chunk before it returns, so no data is lost
//! to a late flush.

use super::codec::Codec;
use super::encoder::{create_encoder, FrameEncoder, PcmEncoder};
use super::error::{RecorderError, RecorderResult};
use super::state::{AudioRecording, Chunk, RecorderState};
use super::worker::{EncoderWorker, DEFAULT_QUEUED_FRAMES};
use crate::compositor::output::OutputStream;
use crate::media::track::AudioTrack;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// What a recorder reads from
#[derive(Debug, Clone)]
pub enum RecorderInput {
    /// Video of a composite stream plus its audio track
    Stream(OutputStream),
    /// A lone audio track
    Audio(AudioTrack),
}

pub struct MediaRecorder {
    input: RecorderInput,
    codec: Option<Codec>,
    fps: u32,
    queue_frames: usize,
    state: RecorderState,
    timeslice_ms: Option<f64>,
    worker: Option<EncoderWorker>,
    pcm: Option<PcmEncoder>,
    audio_track_id: Option<String>,
    audio_pending: Vec<u8>,
    slice_start_ms: Option<f64>,
    last_timestamp_ms: f64,
    audio_sequence: u64,
    dropped_frames: u64,
    chunks: Arc<Mutex<Vec<Chunk>>>,
    audio_chunks: Vec<Chunk>,
    finished_audio: Vec<AudioRecording>,
}

impl MediaRecorder {
    /// Record the video (and audio) of a composite stream
    pub fn new(stream: OutputStream, codec: Codec, fps: u32) -> Self {
        Self::with_input(RecorderInput::Stream(stream), Some(codec), fps)
    }

    /// Record a single audio track
    pub fn audio_only(track: AudioTrack) -> Self {
        Self::with_input(RecorderInput::Audio(track), None, 0)
    }

    fn with_input(input: RecorderInput, codec: Option<Codec>, fps: u32) -> Self {
        Self {
            input,
            codec,
            fps,
            queue_frames: DEFAULT_QUEUED_FRAMES,
            state: RecorderState::Inactive,
            timeslice_ms: None,
            worker: None,
            pcm: None,
            audio_track_id: None,
            audio_pending: Vec::new(),
            slice_start_ms: None,
            last_timestamp_ms: 0.0,
            audio_sequence: 0,
            dropped_frames: 0,
            chunks: Arc::new(Mutex::new(Vec::new())),
            audio_chunks: Vec::new(),
            finished_audio: Vec::new(),
        }
    }

    /// Frames that may wait for the encoder before capture starts dropping them
    pub fn with_queue_frames(mut self, frames: usize) -> Self {
        self.queue_frames = frames.max(1);
        self
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn input(&self) -> &RecorderInput {
        &self.input
    }

    /// Frames skipped because the encoder fell behind
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// MIME type of the primary chunks
    pub fn mime_type(&self) -> String {
        match (&self.codec, &self.pcm) {
            (Some(codec), _) => codec.mime_type().to_string(),
            (None, Some(pcm)) => pcm.mime_type().to_string(),
            (None, None) => match &self.input {
                RecorderInput::Audio(track) => {
                    PcmEncoder::for_source(track.source().as_ref()).mime_type().to_string()
                }
                RecorderInput::Stream(_) => String::new(),
            },
        }
    }

    /// Begin recording, cutting a chunk every `timeslice` when given
    pub fn start(&mut self, timeslice: Option<Duration>) -> RecorderResult<()> {
        if self.state != RecorderState::Inactive {
            return Err(RecorderError::AlreadyRecording);
        }

        let encoder = match (&self.input, &self.codec) {
            (RecorderInput::Stream(stream), Some(codec)) => {
                let (width, height) = stream
                    .video()
                    .resolution()
                    .ok_or(RecorderError::NoResolution)?;
                Some(create_encoder(codec, width, height, self.fps)?)
            }
            _ => None,
        };
        self.start_with(encoder, timeslice)
    }

    /// Begin recording with a caller-provided video encoder
    pub fn start_with(
        &mut self,
        encoder: Option<Box<dyn FrameEncoder>>,
        timeslice: Option<Duration>,
    ) -> RecorderResult<()> {
        if self.state != RecorderState::Inactive {
            return Err(RecorderError::AlreadyRecording);
        }

        // a fresh list, so a detached worker from an earlier run cannot append to it
        self.chunks = Arc::new(Mutex::new(Vec::new()));
        self.worker = match encoder {
            Some(encoder) => Some(EncoderWorker::spawn(
                encoder,
                Arc::clone(&self.chunks),
                self.queue_frames,
            )?),
            None => None,
        };
        self.audio_track_id = None;
        self.pcm = match &self.input {
            RecorderInput::Audio(track) => {
                self.audio_track_id = Some(track.id().to_string());
                Some(PcmEncoder::for_source(track.source().as_ref()))
            }
            RecorderInput::Stream(_) => None,
        };

        self.timeslice_ms = timeslice.map(|t| t.as_secs_f64() * 1000.0);
        self.audio_pending.clear();
        self.audio_chunks.clear();
        self.finished_audio.clear();
        self.slice_start_ms = None;
        self.audio_sequence = 0;
        self.dropped_frames = 0;
        self.state = RecorderState::Recording;

        tracing::debug!("Recorder started ({})", self.mime_type());
        Ok(())
    }

    /// Pull one frame and any pending audio from the input
    pub fn capture(&mut self, timestamp_ms: f64) -> RecorderResult<()> {
        match self.state {
            RecorderState::Inactive => return Ok(()),
            RecorderState::Paused => {
                // audio produced while paused is dropped
                if let Some(track) = self.audio_track() {
                    track.source().drain();
                }
                return Ok(());
            }
            RecorderState::Recording => {}
        }

        let slice_start = *self.slice_start_ms.get_or_insert(timestamp_ms);

        if let (Some(worker), RecorderInput::Stream(stream)) = (self.worker.as_ref(), &self.input) {
            if let Some(frame) = stream.current_frame() {
                if !worker.submit(frame) {
                    self.dropped_frames += 1;
                    tracing::warn!("Encoder is behind, dropped frame at {:.0}ms", timestamp_ms);
                }
            }
        }

        if let Some(track) = self.audio_track() {
            let samples = track.source().drain();
            if !samples.is_empty() {
                if self.audio_track_id.as_deref() != Some(track.id()) {
                    self.switch_audio_track(&track, timestamp_ms);
                }
                if let Some(pcm) = self.pcm.as_ref() {
                    self.audio_pending.extend(pcm.encode(&samples));
                }
            }
        }

        self.last_timestamp_ms = timestamp_ms;

        if let Some(slice) = self.timeslice_ms {
            if timestamp_ms - slice_start >= slice {
                self.flush(timestamp_ms);
                self.slice_start_ms = Some(timestamp_ms);
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) -> RecorderResult<()> {
        if self.state != RecorderState::Recording {
            return Err(RecorderError::NotRecording);
        }
        self.state = RecorderState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> RecorderResult<()> {
        if self.state != RecorderState::Paused {
            return Err(RecorderError::NotPaused);
        }
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Cut a chunk from whatever is pending right now
    pub fn request_data(&mut self) {
        if self.state != RecorderState::Inactive {
            self.flush(self.last_timestamp_ms);
        }
    }

    /// Finish encoding and flush the final chunk
    ///
    /// Blocks until the encoder thread has drained every queued frame.
    pub fn stop(&mut self) -> RecorderResult<()> {
        if self.state == RecorderState::Inactive {
            return Err(RecorderError::NotRecording);
        }
        self.state = RecorderState::Inactive;

        self.flush_audio(self.last_timestamp_ms);
        let finished = match self.worker.take() {
            Some(worker) => worker.finish(self.last_timestamp_ms),
            None => Ok(()),
        };

        tracing::debug!(
            "Recorder stopped with {} video and {} audio chunks ({} frames dropped)",
            self.chunks.lock().len(),
            self.audio_chunks.len(),
            self.dropped_frames
        );
        finished
    }

    /// Primary chunks: video for a stream input, PCM for an audio input
    ///
    /// While recording, video chunks show up once the encoder thread has cut them.
    pub fn chunks(&self) -> Vec<Chunk> {
        match self.input {
            RecorderInput::Stream(_) => self.chunks.lock().clone(),
            RecorderInput::Audio(_) => self.audio_chunks.clone(),
        }
    }

    /// Move the captured audio out, one recording per track, leaving the
    /// recorder reusable
    pub fn take_audio_recordings(&mut self) -> Vec<AudioRecording> {
        let mut recordings = std::mem::take(&mut self.finished_audio);
        recordings.extend(self.close_audio_recording());
        recordings
    }

    fn audio_track(&self) -> Option<AudioTrack> {
        match &self.input {
            RecorderInput::Stream(stream) => stream.audio_track(),
            RecorderInput::Audio(track) => Some(track.clone()),
        }
    }

    /// Close the recording of the previous track and encode for `track` from now on
    fn switch_audio_track(&mut self, track: &AudioTrack, timestamp_ms: f64) {
        self.flush_audio(timestamp_ms);
        if let Some(previous) = self.close_audio_recording() {
            tracing::debug!(
                "Audio track {} replaced by {} after {} chunks",
                previous.track_id,
                track.id(),
                previous.chunks.len()
            );
            self.finished_audio.push(previous);
        }
        self.audio_track_id = Some(track.id().to_string());
        self.pcm = Some(PcmEncoder::for_source(track.source().as_ref()));
    }

    fn close_audio_recording(&mut self) -> Option<AudioRecording> {
        if self.audio_chunks.is_empty() {
            return None;
        }
        let pcm = self.pcm.as_ref()?;
        Some(AudioRecording {
            track_id: self.audio_track_id.clone().unwrap_or_default(),
            mime_type: pcm.mime_type().to_string(),
            sample_rate: pcm.sample_rate(),
            channels: pcm.channels(),
            chunks: std::mem::take(&mut self.audio_chunks),
        })
    }

    fn flush(&mut self, timecode_ms: f64) {
        if let Some(worker) = self.worker.as_ref() {
            worker.cut(timecode_ms);
        }
        self.flush_audio(timecode_ms);
    }

    fn flush_audio(&mut self, timecode_ms: f64) {
        if self.audio_pending.is_empty() {
            return;
        }
        if let Some(mime_type) = self.pcm.as_ref().map(|p| p.mime_type().to_string()) {
            self.audio_chunks.push(Chunk {
                sequence: self.audio_sequence,
                timecode_ms,
                mime_type,
                data: std::mem::take(&mut self.audio_pending),
            });
            self.audio_sequence += 1;
        }
    }
}
