//! Stream Compositor - several live video sources, one canvas, one recording.
//!
//! This is the main library crate. It lays out up to four streams on a
//! software canvas, redraws them every frame, exposes the result as a
//! composite stream and records that stream into timesliced chunks.

pub mod compositor;
pub mod config;
pub mod media;
pub mod recorder;
pub mod utils;
pub mod waveform;

pub use compositor::{
    Compositor, CompositorEvent, Corner, CropRegion, FrameScheduler, IntervalScheduler,
    ManualScheduler, OutputStream, Placement, StreamDimensions, StreamInfo, Surface,
};
pub use config::{AudioMode, CompositorConfig};
pub use media::{AudioSource, AudioTrack, Frame, FrameSlot, MediaStream, Rect, SampleQueue, VideoSource};
pub use recorder::{Chunk, Codec, Recording, RecordingState};
pub use utils::{CompositorError, CompositorResult, ErrorResponse};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// `RUST_LOG` overrides the default filter. Calling this more than once, or
/// after the host installed its own subscriber, is harmless.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_compositor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Stream Compositor v{}", env!("CARGO_PKG_VERSION"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
