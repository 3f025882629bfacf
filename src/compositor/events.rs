//! Compositor events
//!
//! Lifecycle notifications go out on a broadcast channel. The composite
//! stream is additionally kept in a watch channel so late subscribers can see
//! a stream that was created before they subscribed.

use super::output::OutputStream;
use crate::media::track::AudioTrack;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

/// Events emitted by the compositor
#[derive(Debug, Clone)]
pub enum CompositorEvent {
    /// The composite stream was created or replaced
    StreamCreated { stream_id: String },
    /// A source stream was placed on the canvas
    StreamAdded { source_id: String },
    /// A source stream was detached (or dropped when `hard`)
    StreamRemoved { source_id: String, hard: bool },
    /// An audio track now feeds the recording
    AudioTrackAdded { track_id: String },
    RecordingStarted,
    RecordingPaused,
    RecordingResumed,
    RecordingStopped { chunk_count: usize },
}

type StreamHandler = Box<dyn FnOnce(OutputStream) + Send>;
type AudioHandler = Box<dyn Fn(&AudioTrack) + Send>;

pub struct EventEmitter {
    event_tx: broadcast::Sender<CompositorEvent>,
    stream_tx: watch::Sender<Option<OutputStream>>,
    stream_handlers: Mutex<Vec<StreamHandler>>,
    audio_handlers: Mutex<Vec<AudioHandler>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (stream_tx, _) = watch::channel(None);
        Self {
            event_tx,
            stream_tx,
            stream_handlers: Mutex::new(Vec::new()),
            audio_handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompositorEvent> {
        self.event_tx.subscribe()
    }

    pub fn emit(&self, event: CompositorEvent) {
        // no receivers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn stream(&self) -> Option<OutputStream> {
        self.stream_tx.borrow().clone()
    }

    pub fn watch_stream(&self) -> watch::Receiver<Option<OutputStream>> {
        self.stream_tx.subscribe()
    }

    /// Publish a new composite stream and run pending stream handlers
    pub fn publish_stream(&self, stream: OutputStream) {
        let stream_id = stream.id().to_string();
        // registration checks the stream under this lock, so no handler can slip in between
        let handlers = {
            let mut pending = self.stream_handlers.lock();
            self.stream_tx.send_replace(Some(stream.clone()));
            std::mem::take(&mut *pending)
        };

        for handler in handlers {
            handler(stream.clone());
        }
        self.emit(CompositorEvent::StreamCreated { stream_id });
    }

    /// Run `handler` with the composite stream, now if it exists, otherwise once it is published
    pub fn on_stream_created(&self, handler: impl FnOnce(OutputStream) + Send + 'static) {
        let stream = {
            let mut pending = self.stream_handlers.lock();
            match self.stream() {
                Some(stream) => stream,
                None => {
                    pending.push(Box::new(handler));
                    return;
                }
            }
        };
        handler(stream);
    }

    pub fn on_audio_track(&self, handler: impl Fn(&AudioTrack) + Send + 'static) {
        self.audio_handlers.lock().push(Box::new(handler));
    }

    pub fn audio_track_added(&self, track: &AudioTrack) {
        for handler in self.audio_handlers.lock().iter() {
            handler(track);
        }
        self.emit(CompositorEvent::AudioTrackAdded {
            track_id: track.id().to_string(),
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sources::FrameSlot;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn output() -> OutputStream {
        OutputStream::new("composite", 30, Arc::new(FrameSlot::new()))
    }

    #[test]
    fn test_handler_waits_for_stream() {
        let emitter = EventEmitter::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        emitter.on_stream_created(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        emitter.publish_stream(output());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // late handler runs immediately
        let counter = Arc::clone(&calls);
        emitter.on_stream_created(move |stream| {
            assert_eq!(stream.id(), "composite");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handlers_registered_during_publish_all_run() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 500;

        let emitter = EventEmitter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Barrier::new(THREADS + 1);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..PER_THREAD {
                        let counter = Arc::clone(&calls);
                        emitter.on_stream_created(move |_| {
                            counter.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                });
            }
            barrier.wait();
            emitter.publish_stream(output());
        });

        assert_eq!(calls.load(Ordering::SeqCst), THREADS * PER_THREAD);
    }

    #[tokio::test]
    async fn test_broadcast_and_watch() {
        let emitter = EventEmitter::new();
        let mut events = emitter.subscribe();
        let mut watcher = emitter.watch_stream();

        emitter.publish_stream(output());

        match events.recv().await.unwrap() {
            CompositorEvent::StreamCreated { stream_id } => assert_eq!(stream_id, "composite"),
            other => panic!("unexpected event {:?}", other),
        }
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().is_some());
    }
}
