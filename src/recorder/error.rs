//! Recording errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No supported codec available")]
    NoSupportedCodec,

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Recording is not paused")]
    NotPaused,

    #[error("Source has no resolution yet")]
    NoResolution,

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),
}

pub type RecorderResult<T> = Result<T, RecorderError>;
