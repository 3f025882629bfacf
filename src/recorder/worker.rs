//! Background frame encoding
//!
//! The draw loop only hands frames over. Encoding, piping into FFmpeg and
//! chunk cutting all happen on a dedicated thread, in submission order.

use super::encoder::FrameEncoder;
use super::error::{RecorderError, RecorderResult};
use super::state::Chunk;
use crate::media::Frame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Frames allowed in flight before new ones are dropped, unless configured
pub const DEFAULT_QUEUED_FRAMES: usize = 8;

enum EncodeJob {
    Frame(Arc<Frame>),
    Cut { timecode_ms: f64 },
    Finish { timecode_ms: f64 },
}

/// Handle to the encoder thread of one recording
pub struct EncoderWorker {
    jobs: mpsc::UnboundedSender<EncodeJob>,
    queued: Arc<AtomicUsize>,
    capacity: usize,
    failure: Arc<Mutex<Option<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl EncoderWorker {
    /// Move `encoder` onto its own thread. Cut chunks land in `chunks`.
    pub fn spawn(
        mut encoder: Box<dyn FrameEncoder>,
        chunks: Arc<Mutex<Vec<Chunk>>>,
        capacity: usize,
    ) -> RecorderResult<Self> {
        let (jobs, mut rx) = mpsc::unbounded_channel::<EncodeJob>();
        let queued = Arc::new(AtomicUsize::new(0));
        let failure = Arc::new(Mutex::new(None));

        let worker_queued = Arc::clone(&queued);
        let worker_failure = Arc::clone(&failure);
        let handle = std::thread::Builder::new()
            .name("recorder-encoder".to_string())
            .spawn(move || {
                let mime_type = encoder.mime_type().to_string();
                let mut pending = Vec::new();
                let mut sequence = 0u64;

                let mut cut = |pending: &mut Vec<u8>, timecode_ms: f64| {
                    if pending.is_empty() {
                        return;
                    }
                    chunks.lock().push(Chunk {
                        sequence,
                        timecode_ms,
                        mime_type: mime_type.clone(),
                        data: std::mem::take(pending),
                    });
                    sequence += 1;
                };
                let fail = |e: RecorderError| {
                    tracing::error!("Frame encoding failed: {}", e);
                    worker_failure.lock().get_or_insert_with(|| e.to_string());
                };

                while let Some(job) = rx.blocking_recv() {
                    match job {
                        EncodeJob::Frame(frame) => {
                            if worker_failure.lock().is_none() {
                                match encoder.encode(&frame) {
                                    Ok(bytes) => pending.extend_from_slice(&bytes),
                                    Err(e) => fail(e),
                                }
                            }
                            worker_queued.fetch_sub(1, Ordering::AcqRel);
                        }
                        EncodeJob::Cut { timecode_ms } => cut(&mut pending, timecode_ms),
                        EncodeJob::Finish { timecode_ms } => {
                            match encoder.finish() {
                                Ok(tail) => pending.extend_from_slice(&tail),
                                Err(e) => fail(e),
                            }
                            cut(&mut pending, timecode_ms);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            jobs,
            queued,
            capacity: capacity.max(1),
            failure,
            handle: Some(handle),
        })
    }

    /// Queue a frame without waiting. Returns false when the frame was dropped.
    pub fn submit(&self, frame: Arc<Frame>) -> bool {
        if self.queued.fetch_add(1, Ordering::AcqRel) >= self.capacity {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        if self.jobs.send(EncodeJob::Frame(frame)).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Cut a chunk once every frame submitted so far is encoded
    pub fn cut(&self, timecode_ms: f64) {
        let _ = self.jobs.send(EncodeJob::Cut { timecode_ms });
    }

    /// Flush the encoder, cut the final chunk and wait for the thread
    pub fn finish(mut self, timecode_ms: f64) -> RecorderResult<()> {
        let _ = self.jobs.send(EncodeJob::Finish { timecode_ms });
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| RecorderError::Encoding("Encoder thread panicked".to_string()))?;
        }
        match self.failure.lock().take() {
            Some(message) => Err(RecorderError::Encoding(message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Encoder that blocks until `gate` opens, then emits one byte per frame
    struct GatedEncoder {
        gate: Arc<AtomicBool>,
        encoded: Arc<AtomicUsize>,
    }

    impl FrameEncoder for GatedEncoder {
        fn mime_type(&self) -> &str {
            "application/x-test"
        }

        fn encode(&mut self, _frame: &Frame) -> RecorderResult<Vec<u8>> {
            while !self.gate.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            self.encoded.fetch_add(1, Ordering::AcqRel);
            Ok(vec![1])
        }

        fn finish(&mut self) -> RecorderResult<Vec<u8>> {
            Ok(vec![0])
        }
    }

    struct FailingEncoder;

    impl FrameEncoder for FailingEncoder {
        fn mime_type(&self) -> &str {
            "application/x-test"
        }

        fn encode(&mut self, _frame: &Frame) -> RecorderResult<Vec<u8>> {
            Err(RecorderError::Ffmpeg("broken pipe".to_string()))
        }

        fn finish(&mut self) -> RecorderResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn frame() -> Arc<Frame> {
        Arc::new(Frame::filled(2, 2, [0, 0, 0, 255]))
    }

    #[test]
    fn test_submit_does_not_wait_for_encoder() {
        let gate = Arc::new(AtomicBool::new(false));
        let encoded = Arc::new(AtomicUsize::new(0));
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let worker = EncoderWorker::spawn(
            Box::new(GatedEncoder {
                gate: gate.clone(),
                encoded: encoded.clone(),
            }),
            chunks.clone(),
            DEFAULT_QUEUED_FRAMES,
        )
        .unwrap();

        // the encoder is stuck, yet every submit returns at once
        let accepted = (0..DEFAULT_QUEUED_FRAMES + 5).filter(|_| worker.submit(frame())).count();
        assert_eq!(accepted, DEFAULT_QUEUED_FRAMES);
        assert_eq!(encoded.load(Ordering::Acquire), 0);

        gate.store(true, Ordering::Release);
        worker.finish(500.0).unwrap();

        assert_eq!(encoded.load(Ordering::Acquire), DEFAULT_QUEUED_FRAMES);
        let chunks = chunks.lock();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].timecode_ms, 500.0);
        assert_eq!(chunks[0].data.len(), DEFAULT_QUEUED_FRAMES + 1);
    }

    #[test]
    fn test_cuts_follow_submission_order() {
        let gate = Arc::new(AtomicBool::new(true));
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let worker = EncoderWorker::spawn(
            Box::new(GatedEncoder {
                gate,
                encoded: Arc::new(AtomicUsize::new(0)),
            }),
            chunks.clone(),
            DEFAULT_QUEUED_FRAMES,
        )
        .unwrap();

        worker.submit(frame());
        worker.submit(frame());
        worker.cut(100.0);
        worker.cut(150.0);
        worker.submit(frame());
        worker.finish(200.0).unwrap();

        let chunks = chunks.lock();
        let cuts: Vec<(u64, f64, usize)> = chunks
            .iter()
            .map(|c| (c.sequence, c.timecode_ms, c.data.len()))
            .collect();
        assert_eq!(cuts, vec![(0, 100.0, 2), (1, 200.0, 2)]);
    }

    #[test]
    fn test_encode_failure_surfaces_on_finish() {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let worker = EncoderWorker::spawn(Box::new(FailingEncoder), chunks.clone(), 1).unwrap();
        assert!(worker.submit(frame()));

        let result = worker.finish(0.0);
        assert!(matches!(result, Err(RecorderError::Encoding(message)) if message.contains("broken pipe")));
        assert!(chunks.lock().is_empty());
    }
}
