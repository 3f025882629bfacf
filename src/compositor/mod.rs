//! Stream compositor
//!
//! Up to `max_streams` live video streams are drawn onto one surface every
//! frame. The surface is captured as a composite [`OutputStream`] that can be
//! previewed on display surfaces and recorded into timesliced chunks.
//!
//! [`Compositor`] is a cheap handle: clones share the same state. Frame
//! callbacks registered with the scheduler only hold a weak reference, so
//! dropping the last handle stops the loop.

pub mod events;
pub mod layout;
pub mod output;
pub mod registry;
pub mod scheduler;
pub mod surface;

pub use events::{CompositorEvent, EventEmitter};
pub use layout::{LayoutEngine, Placement};
pub use output::OutputStream;
pub use registry::{Corner, CropRegion, StreamDimensions, StreamInfo, StreamRegistry};
pub use scheduler::{FrameScheduler, FrameToken, IntervalScheduler, ManualScheduler};
pub use surface::Surface;

use crate::config::CompositorConfig;
use crate::media::element::{ElementEvent, VideoElement};
use crate::media::track::{AudioTrack, MediaStream};
use crate::recorder::audio::{strategy_for, AudioTrackStrategy};
use crate::recorder::codec::{supported_codecs, Codec, CodecProbe, FfmpegProbe};
use crate::recorder::media_recorder::MediaRecorder;
use crate::recorder::state::{Chunk, Recording, RecordingSession, RecordingState};
use crate::recorder::RecorderError;
use crate::utils::error::{CompositorError, CompositorResult};
use parking_lot::Mutex;
use registry::StreamEntry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[derive(Default)]
struct FrameTokens {
    draw: Option<FrameToken>,
    display: Option<FrameToken>,
}

struct CompositorState {
    layout: LayoutEngine,
    registry: StreamRegistry,
    /// Streams waiting for their first resolution
    pending: Vec<VideoElement>,
    output: Option<OutputStream>,
    display: Option<Arc<Mutex<Surface>>>,
    play_result: bool,
    tokens: FrameTokens,
    audio_cache: Vec<AudioTrack>,
    audio_strategy: Box<dyn AudioTrackStrategy>,
    codecs: Vec<Codec>,
    recorder: Option<MediaRecorder>,
    recording_state: RecordingState,
    sessions: Vec<RecordingSession>,
    recorded: Vec<Chunk>,
}

impl CompositorState {
    fn canvas(&self) -> (f64, f64) {
        let (width, height) = self.layout.dimensions();
        (width as f64, height as f64)
    }

    /// Lay out a stream whose resolution is known and put it on top
    fn place(&mut self, element: VideoElement, width: u32, height: u32) {
        let existing = self.registry.active_rects();
        let (placement, rect) = self.layout.place(&existing, width, height);
        tracing::info!(
            "Stream {} ({}x{}) placed {:?} at {}x{}+{}+{}",
            element.id(),
            width,
            height,
            placement,
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );
        self.registry
            .push(StreamEntry::new(element, placement, rect, (width, height)));
    }

    fn stream_count(&self) -> usize {
        self.registry.len() + self.pending.len()
    }

    fn end_session(&mut self, process_time_ms: f64) {
        if let Some(session) = self.sessions.last_mut() {
            session.end(process_time_ms);
        }
    }
}

struct Inner {
    config: CompositorConfig,
    scheduler: Arc<dyn FrameScheduler>,
    surface: Arc<Mutex<Surface>>,
    state: Mutex<CompositorState>,
    events: EventEmitter,
    epoch: Instant,
}

impl Inner {
    fn process_time_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let tokens = std::mem::take(&mut self.state.get_mut().tokens);
        for token in [tokens.draw, tokens.display].into_iter().flatten() {
            self.scheduler.unsubscribe(token);
        }
    }
}

#[derive(Clone)]
pub struct Compositor {
    inner: Arc<Inner>,
}

impl Compositor {
    /// Create a compositor, probing FFmpeg for recording codecs
    pub fn new(config: CompositorConfig, scheduler: Arc<dyn FrameScheduler>) -> CompositorResult<Self> {
        let probe = FfmpegProbe::detect();
        Self::with_probe(config, scheduler, &probe)
    }

    /// Create a compositor with an explicit codec probe
    pub fn with_probe(
        config: CompositorConfig,
        scheduler: Arc<dyn FrameScheduler>,
        probe: &dyn CodecProbe,
    ) -> CompositorResult<Self> {
        config.validate()?;

        let codecs = supported_codecs(&config.codecs, probe);
        match codecs.first() {
            Some(codec) => tracing::info!(
                "Recording codec {} ({} supported)",
                codec.mime_type(),
                codecs.len()
            ),
            None => tracing::warn!("No supported recording codec, recording is unavailable"),
        }

        let audio_strategy = strategy_for(config.audio_mode);
        tracing::debug!("Audio track strategy: {}", audio_strategy.name());

        let state = CompositorState {
            layout: LayoutEngine::new(config.width, config.height, config.center_threshold),
            registry: StreamRegistry::new(),
            pending: Vec::new(),
            output: None,
            display: None,
            play_result: false,
            tokens: FrameTokens::default(),
            audio_cache: Vec::new(),
            audio_strategy,
            codecs,
            recorder: None,
            recording_state: RecordingState::Idle,
            sessions: Vec::new(),
            recorded: Vec::new(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                surface: Arc::new(Mutex::new(Surface::new(config.width, config.height))),
                config,
                scheduler,
                state: Mutex::new(state),
                events: EventEmitter::new(),
                epoch: Instant::now(),
            }),
        })
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.inner.config
    }

    /// Composite surface, shared with the output stream
    pub fn surface(&self) -> Arc<Mutex<Surface>> {
        Arc::clone(&self.inner.surface)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompositorEvent> {
        self.inner.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------

    /// Add a stream to the canvas
    ///
    /// Re-adding a known id re-attaches it without changing its geometry.
    /// Streams whose resolution is not known yet are placed by the draw loop
    /// once it is.
    pub fn add_stream(&self, stream: MediaStream) -> CompositorResult<()> {
        let id = stream.id().to_string();
        let mut placed = false;
        {
            let mut state = self.inner.state.lock();

            if state.registry.attach(&id) {
                tracing::debug!("Stream {} re-attached", id);
                return Ok(());
            }
            if state.pending.iter().any(|e| e.id() == id) {
                return Ok(());
            }
            if stream.video().is_none() {
                return Err(CompositorError::NoVideoTrack(id));
            }
            let limit = self.inner.config.max_streams;
            if state.stream_count() >= limit {
                tracing::warn!("Rejecting stream {}: {} streams already composited", id, limit);
                return Err(CompositorError::MaxStreams { limit });
            }

            let mut element = VideoElement::new(stream.clone());
            match element.poll() {
                Some(ElementEvent::LoadedMetadata { width, height }) => {
                    state.place(element, width, height);
                    placed = true;
                }
                _ => {
                    tracing::debug!("Stream {} waiting for metadata", id);
                    state.pending.push(element);
                }
            }
        }

        if placed {
            self.inner.events.emit(CompositorEvent::StreamAdded { source_id: id });
        }
        self.start_draw();

        if let Some(track) = stream.audio_tracks().first() {
            self.cache_track(track.clone());
        }
        Ok(())
    }

    /// Detach a stream. A hard remove forgets it and re-indexes the layers.
    pub fn remove_stream(&self, id: &str, hard: bool) {
        let removed = {
            let mut state = self.inner.state.lock();
            match state.pending.iter().position(|e| e.id() == id) {
                Some(index) => {
                    state.pending.remove(index);
                    true
                }
                None => state.registry.remove(id, hard).is_some(),
            }
        };

        if !removed {
            tracing::debug!("remove_stream: unknown stream {}", id);
            return;
        }
        tracing::info!("Stream {} removed (hard: {})", id, hard);
        self.inner.events.emit(CompositorEvent::StreamRemoved {
            source_id: id.to_string(),
            hard,
        });
        self.clear_canvas();
    }

    /// Move or resize a stream. The result is clamped inside the canvas.
    pub fn set_stream_dimensions(&self, id: &str, dims: StreamDimensions) -> CompositorResult<()> {
        let changed = {
            let mut state = self.inner.state.lock();
            let canvas = state.canvas();
            state.registry.set_dimensions(id, dims, canvas)
        };
        if !changed {
            return Err(CompositorError::StreamNotFound(id.to_string()));
        }
        self.clear_canvas();
        Ok(())
    }

    /// Dock a stream to a canvas corner, keeping its size
    pub fn set_stream_corner(&self, id: &str, corner: Corner) -> CompositorResult<()> {
        let (width, height) = self.dimensions();
        self.set_stream_dimensions(id, corner.dimensions(width as f64, height as f64))
    }

    /// Crop several streams at once. Returns how many were changed.
    pub fn crop_streams(&self, crops: &HashMap<String, CropRegion>) -> usize {
        let changed = {
            let mut state = self.inner.state.lock();
            let canvas = state.canvas();
            state.registry.crop_many(crops, canvas)
        };
        if changed > 0 {
            self.clear_canvas();
        }
        changed
    }

    pub fn stream_by_id(&self, id: &str) -> Option<StreamInfo> {
        self.inner.state.lock().registry.get(id).map(StreamEntry::info)
    }

    /// Placed streams in insertion order
    pub fn streams(&self) -> Vec<StreamInfo> {
        let state = self.inner.state.lock();
        state.registry.entries().iter().map(StreamEntry::info).collect()
    }

    /// Draw order as indices into [`streams`](Self::streams), bottom first
    pub fn layers(&self) -> Vec<usize> {
        self.inner.state.lock().registry.layers().to_vec()
    }

    /// Placed plus pending streams
    pub fn stream_count(&self) -> usize {
        self.inner.state.lock().stream_count()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.state.lock().layout.dimensions()
    }

    /// Resize the canvas. Missing values keep their current size.
    pub fn set_dimensions(&self, width: Option<u32>, height: Option<u32>) -> CompositorResult<()> {
        let mut state = self.inner.state.lock();
        if state.recording_state.is_active() {
            return Err(CompositorError::InvalidConfig(
                "canvas cannot be resized while recording".to_string(),
            ));
        }

        let (current_width, current_height) = state.layout.dimensions();
        let width = width.unwrap_or(current_width);
        let height = height.unwrap_or(current_height);
        if width == 0 || height == 0 {
            return Err(CompositorError::InvalidConfig(format!(
                "canvas size must be non-zero, got {}x{}",
                width, height
            )));
        }

        state.layout = LayoutEngine::new(width, height, self.inner.config.center_threshold);
        self.inner.surface.lock().resize(width, height);

        // keep every stream inside the new bounds
        let canvas = state.canvas();
        let ids: Vec<String> = state
            .registry
            .entries()
            .iter()
            .map(|e| e.source_id().to_string())
            .collect();
        for id in ids {
            state.registry.set_dimensions(&id, StreamDimensions::default(), canvas);
        }

        tracing::info!("Canvas resized to {}x{}", width, height);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Draw loop
    // ------------------------------------------------------------------

    /// Start the per-frame draw and publish the composite stream. Idempotent.
    pub fn start_draw(&self) {
        let (output, added) = {
            let mut state = self.inner.state.lock();
            if state.tokens.draw.is_some() {
                return;
            }

            let weak = Arc::downgrade(&self.inner);
            let token = self
                .inner
                .scheduler
                .subscribe(Box::new(move |ts| with_compositor(&weak, |c| c.draw(ts))));
            state.tokens.draw = Some(token);

            let output = OutputStream::capture(Arc::clone(&self.inner.surface), self.inner.config.fps);
            state.output = Some(output.clone());

            let cached = std::mem::take(&mut state.audio_cache);
            for track in &cached {
                state.audio_strategy.add_track(&output, track.clone());
            }

            if state.display.is_some() {
                self.subscribe_display(&mut state);
            }
            (output, cached)
        };

        tracing::info!("Draw loop started, composite stream {}", output.id());
        self.inner.events.publish_stream(output);
        for track in &added {
            self.inner.events.audio_track_added(track);
        }
    }

    /// Stop drawing and displaying. The composite stream stays published.
    pub fn stop_draw(&self) {
        let tokens = {
            let mut state = self.inner.state.lock();
            state.play_result = false;
            std::mem::take(&mut state.tokens)
        };
        for token in [tokens.draw, tokens.display].into_iter().flatten() {
            self.inner.scheduler.unsubscribe(token);
        }
        tracing::debug!("Draw loop stopped");
    }

    pub fn is_drawing(&self) -> bool {
        self.inner.state.lock().tokens.draw.is_some()
    }

    /// Render one frame
    ///
    /// Pending streams whose metadata arrived are placed, resized sources
    /// get their placement re-applied, then every attached stream is drawn
    /// in layer order and the recorders pull the result.
    pub fn draw(&self, timestamp_ms: f64) {
        let mut added = Vec::new();
        {
            let mut state = self.inner.state.lock();
            let state = &mut *state;

            let mut index = 0;
            while index < state.pending.len() {
                match state.pending[index].poll() {
                    Some(ElementEvent::LoadedMetadata { width, height }) => {
                        let element = state.pending.remove(index);
                        added.push(element.id().to_string());
                        state.place(element, width, height);
                    }
                    _ => index += 1,
                }
            }

            let layout = state.layout;
            for entry in state.registry.entries_mut() {
                if let Some(ElementEvent::Resize { width, height }) = entry.element_mut().poll() {
                    entry.apply_resize(&layout, width, height);
                    tracing::debug!(
                        "Stream {} resized to {}x{}, re-applied {:?}",
                        entry.source_id(),
                        width,
                        height,
                        entry.placement
                    );
                }
            }

            {
                let mut surface = self.inner.surface.lock();
                for entry in state.registry.layered() {
                    if let Some(frame) = entry.element().current_frame() {
                        surface.draw_frame(&frame, entry.crop_rect(), entry.rect());
                    }
                }
            }

            // the surface lock is released, the recorder snapshots it for its encoder thread
            if let Some(recorder) = state.recorder.as_mut() {
                if let Err(e) = recorder.capture(timestamp_ms) {
                    tracing::error!("Recorder capture failed: {}", e);
                }
            }
            if state.recording_state.is_active() {
                if let Err(e) = state.audio_strategy.capture(timestamp_ms) {
                    tracing::error!("Audio capture failed: {}", e);
                }
            }
        }

        for source_id in added {
            self.inner.events.emit(CompositorEvent::StreamAdded { source_id });
        }
    }

    /// Copy the latest composite frame onto the attached display surface
    pub fn display(&self, _timestamp_ms: f64) {
        let (display, output) = {
            let state = self.inner.state.lock();
            (state.display.clone(), state.output.clone())
        };
        let (Some(display), Some(output)) = (display, output) else {
            return;
        };
        if let Some(frame) = output.current_frame() {
            display.lock().draw_scaled(&frame);
        }
    }

    /// Show the composite stream on `display`. Attaching the same surface twice is a no-op.
    pub fn attach_to(&self, display: Arc<Mutex<Surface>>) {
        let mut state = self.inner.state.lock();
        if let Some(current) = &state.display {
            if Arc::ptr_eq(current, &display) {
                return;
            }
        }
        state.display = Some(display);
        if state.output.is_some() {
            self.subscribe_display(&mut state);
        }
    }

    fn subscribe_display(&self, state: &mut CompositorState) {
        state.play_result = true;
        if state.tokens.display.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let token = self
            .inner
            .scheduler
            .subscribe(Box::new(move |ts| with_compositor(&weak, |c| c.display(ts))));
        state.tokens.display = Some(token);
    }

    /// Whether the composite stream is being shown on a display surface
    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().play_result
    }

    /// Clear the surface after `clear_delay_ms`, or right away outside a tokio runtime
    pub fn clear_canvas(&self) {
        let surface = Arc::clone(&self.inner.surface);
        let delay = self.inner.config.clear_delay_ms;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) if delay > 0 => {
                handle.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    surface.lock().clear();
                });
            }
            _ => surface.lock().clear(),
        }
    }

    // ------------------------------------------------------------------
    // Output stream and audio
    // ------------------------------------------------------------------

    /// The composite stream, once the draw loop has started
    pub fn stream(&self) -> Option<OutputStream> {
        self.inner.state.lock().output.clone()
    }

    /// Replace the composite stream with a caller-provided one
    ///
    /// Streams without video are rejected with a warning.
    pub fn set_stream(&self, stream: MediaStream) {
        let Some(output) = OutputStream::from_media_stream(&stream, self.inner.config.fps) else {
            tracing::warn!("Incompatible stream {} for compositor: no video track", stream.id());
            return;
        };

        self.inner.state.lock().output = Some(output.clone());
        let track = output.audio_track();
        self.inner.events.publish_stream(output);
        if let Some(track) = track {
            self.inner.events.audio_track_added(&track);
        }
    }

    /// Wait until a composite stream exists
    pub async fn wait_for_stream(&self) -> Option<OutputStream> {
        let mut rx = self.inner.events.watch_stream();
        loop {
            if let Some(stream) = rx.borrow_and_update().clone() {
                return Some(stream);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Run `handler` with the composite stream, now or once it exists
    pub fn on_stream_created(&self, handler: impl FnOnce(OutputStream) + Send + 'static) {
        self.inner.events.on_stream_created(handler);
    }

    /// Run `handler` for every audio track routed to the recording
    pub fn on_audio_track(&self, handler: impl Fn(&AudioTrack) + Send + 'static) {
        self.inner.events.on_audio_track(handler);
    }

    /// Route an audio track to the recording, or keep it until the composite stream exists
    pub fn cache_track(&self, track: AudioTrack) {
        {
            let mut state = self.inner.state.lock();
            let state = &mut *state;
            match &state.output {
                Some(output) => state.audio_strategy.add_track(output, track.clone()),
                None => {
                    tracing::debug!("Caching audio track {} until the stream exists", track.id());
                    state.audio_cache.push(track);
                    return;
                }
            }
        }
        self.inner.events.audio_track_added(&track);
    }

    /// Audio tracks waiting for the composite stream
    pub fn cached_tracks(&self) -> Vec<AudioTrack> {
        self.inner.state.lock().audio_cache.clone()
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Codecs this compositor can record with, best first
    pub fn codecs(&self) -> Vec<Codec> {
        self.inner.state.lock().codecs.clone()
    }

    /// Prepare a recorder for the composite stream
    ///
    /// Without a composite stream this only logs a warning. An already
    /// attached recorder is kept.
    pub fn attach_recorder(&self) -> CompositorResult<()> {
        let mut state = self.inner.state.lock();
        let Some(output) = state.output.clone() else {
            tracing::warn!("No composite stream yet, add a stream before recording");
            return Ok(());
        };
        if state.recorder.is_some() {
            return Ok(());
        }

        let codec = state
            .codecs
            .first()
            .cloned()
            .ok_or(RecorderError::NoSupportedCodec)?;
        tracing::debug!("Recorder attached with {}", codec.mime_type());
        state.recorder = Some(
            MediaRecorder::new(output, codec, self.inner.config.fps)
                .with_queue_frames(self.inner.config.encoder_queue_frames),
        );
        Ok(())
    }

    pub fn has_recorder(&self) -> bool {
        self.inner.state.lock().recorder.is_some()
    }

    /// Start a fresh recording of the composite stream
    pub fn start_recording(&self) -> CompositorResult<()> {
        {
            let mut state = self.inner.state.lock();
            if state.recording_state.is_active() {
                return Err(RecorderError::AlreadyRecording.into());
            }
            let output = state.output.clone().ok_or(CompositorError::NoOutputStream)?;
            let codec = state
                .codecs
                .first()
                .cloned()
                .ok_or(RecorderError::NoSupportedCodec)?;

            let timeslice = Some(Duration::from_millis(self.inner.config.timeslice_ms));
            let mut recorder = MediaRecorder::new(output, codec, self.inner.config.fps)
                .with_queue_frames(self.inner.config.encoder_queue_frames);
            recorder.start(timeslice)?;
            state.audio_strategy.start(timeslice)?;

            state.recorder = Some(recorder);
            state.recording_state = RecordingState::Recording;
            state.recorded.clear();
            state.sessions = vec![RecordingSession::new(0, self.inner.process_time_ms())];
        }

        tracing::info!("Recording started");
        self.inner.events.emit(CompositorEvent::RecordingStarted);
        Ok(())
    }

    pub fn pause_recording(&self) -> CompositorResult<()> {
        {
            let mut state = self.inner.state.lock();
            let state = &mut *state;
            if state.recording_state != RecordingState::Recording {
                return Err(RecorderError::NotRecording.into());
            }
            if let Some(recorder) = state.recorder.as_mut() {
                recorder.pause()?;
            }
            state.audio_strategy.pause()?;
            state.end_session(self.inner.process_time_ms());
            state.recording_state = RecordingState::Paused;
        }

        tracing::info!("Recording paused");
        self.inner.events.emit(CompositorEvent::RecordingPaused);
        Ok(())
    }

    pub fn resume_recording(&self) -> CompositorResult<()> {
        {
            let mut state = self.inner.state.lock();
            let state = &mut *state;
            if state.recording_state != RecordingState::Paused {
                return Err(RecorderError::NotPaused.into());
            }
            if let Some(recorder) = state.recorder.as_mut() {
                recorder.resume()?;
            }
            state.audio_strategy.resume()?;
            let index = state.sessions.len();
            state
                .sessions
                .push(RecordingSession::new(index, self.inner.process_time_ms()));
            state.recording_state = RecordingState::Recording;
        }

        tracing::info!("Recording resumed");
        self.inner.events.emit(CompositorEvent::RecordingResumed);
        Ok(())
    }

    /// Stop recording and return everything that was captured
    ///
    /// The final chunk is flushed before this resolves. Encoder shutdown runs
    /// on the blocking pool.
    pub async fn stop_recording(&self) -> CompositorResult<Recording> {
        let (recorder, mut audio, sessions) = {
            let mut state = self.inner.state.lock();
            if !state.recording_state.is_active() {
                return Err(RecorderError::NotRecording.into());
            }
            if state.recording_state == RecordingState::Recording {
                state.end_session(self.inner.process_time_ms());
            }
            let recorder = state.recorder.take().ok_or(RecorderError::NotRecording)?;
            state.recording_state = RecordingState::Stopped;
            let audio = state.audio_strategy.stop()?;
            (recorder, audio, state.sessions.clone())
        };

        let mut recorder = tokio::task::spawn_blocking(move || {
            let mut recorder = recorder;
            recorder.stop().map(|_| recorder)
        })
        .await
        .map_err(|e| RecorderError::Encoding(format!("Recorder task failed: {}", e)))??;

        let mut mixed = recorder.take_audio_recordings();
        mixed.append(&mut audio);
        let audio = mixed;

        let recording = Recording {
            mime_type: recorder.mime_type(),
            chunks: recorder.chunks(),
            audio,
            total_duration_ms: sessions.iter().map(|s| s.duration_ms).sum(),
            sessions,
        };

        self.inner.state.lock().recorded = recording.chunks.clone();

        tracing::info!(
            "Recording stopped: {} chunks, {} bytes, {:.0}ms",
            recording.chunks.len(),
            recording.size(),
            recording.total_duration_ms
        );
        self.inner.events.emit(CompositorEvent::RecordingStopped {
            chunk_count: recording.chunks.len(),
        });
        Ok(recording)
    }

    /// Chunks of the running recording, or of the last finished one
    pub fn recorded_data(&self) -> Vec<Chunk> {
        let state = self.inner.state.lock();
        match &state.recorder {
            Some(recorder) if state.recording_state.is_active() => recorder.chunks(),
            _ => state.recorded.clone(),
        }
    }

    pub fn recording_state(&self) -> RecordingState {
        self.inner.state.lock().recording_state
    }

    /// Recorded time so far, pauses excluded
    pub fn duration_ms(&self) -> f64 {
        let state = self.inner.state.lock();
        let now = self.inner.process_time_ms();
        state
            .sessions
            .iter()
            .enumerate()
            .map(|(i, session)| {
                let open = i + 1 == state.sessions.len()
                    && state.recording_state == RecordingState::Recording;
                if open {
                    now - session.process_time_start_ms
                } else {
                    session.duration_ms
                }
            })
            .sum()
    }
}

/// Run `f` if the compositor is still alive
fn with_compositor(weak: &Weak<Inner>, f: impl FnOnce(&Compositor)) {
    if let Some(inner) = weak.upgrade() {
        f(&Compositor { inner });
    }
}
