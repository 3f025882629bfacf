//! Error types and handling
//!
//! Common error types used across the compositor.

use crate::recorder::RecorderError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compositor-wide error type
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream limit reached: at most {limit} streams can be composited")]
    MaxStreams { limit: usize },

    #[error("Stream has no video track: {0}")]
    NoVideoTrack(String),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("No composite stream available")]
    NoOutputStream,

    #[error("Recording error: {0}")]
    Recording(#[from] RecorderError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Error response for hosts that forward errors to a UI
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<CompositorError> for ErrorResponse {
    fn from(error: CompositorError) -> Self {
        let code = match &error {
            CompositorError::Io(_) => "IO_ERROR",
            CompositorError::Serialization(_) => "SERIALIZATION_ERROR",
            CompositorError::MaxStreams { .. } => "MAX_STREAMS",
            CompositorError::NoVideoTrack(_) => "NO_VIDEO_TRACK",
            CompositorError::StreamNotFound(_) => "STREAM_NOT_FOUND",
            CompositorError::NoOutputStream => "NO_OUTPUT_STREAM",
            CompositorError::Recording(_) => "RECORDING_ERROR",
            CompositorError::InvalidConfig(_) => "INVALID_CONFIG",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CompositorError
pub type CompositorResult<T> = Result<T, CompositorError>;
