//! Recording pipeline
//!
//! Codec selection, encoders, the chunked [`MediaRecorder`], audio track
//! strategies and the on-disk bundle format for finished recordings.

pub mod audio;
pub mod bundle;
pub mod codec;
pub mod encoder;
mod error;
pub mod media_recorder;
pub mod state;
mod worker;

pub use audio::{strategy_for, AudioTrackStrategy, IsolatedTrackStrategy, MixedTrackStrategy};
pub use bundle::{read_bundle_meta, write_bundle, BundleError, BundleMeta};
pub use codec::{supported_codecs, Codec, CodecProbe, FfmpegProbe, StaticProbe, PREFERRED_CODECS};
pub use encoder::{FrameEncoder, PcmEncoder};
pub use error::{RecorderError, RecorderResult};
pub use media_recorder::{MediaRecorder, RecorderInput};
pub use state::{AudioRecording, Chunk, Recording, RecorderState, RecordingSession, RecordingState};
