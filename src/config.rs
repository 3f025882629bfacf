//! Compositor configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::recorder::codec::PREFERRED_CODECS;
use crate::utils::error::{CompositorError, CompositorResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How external audio tracks reach the recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    /// Pick the strategy for the current runtime
    #[default]
    Auto,
    /// Replace the single audio track of the composite stream
    Mixed,
    /// Record every audio track with its own recorder
    Isolated,
}

/// Configuration for a [`Compositor`](crate::compositor::Compositor)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositorConfig {
    /// Composite surface width in pixels
    pub width: u32,

    /// Composite surface height in pixels
    pub height: u32,

    /// Frame rate of the captured composite stream
    pub fps: u32,

    /// Maximum number of streams composited at once
    pub max_streams: usize,

    /// Recorder timeslice in milliseconds
    pub timeslice_ms: u64,

    /// Delay before the surface is cleared after a geometry change
    pub clear_delay_ms: u64,

    /// Streams centred closer than this to the canvas centre do not occupy a quadrant
    pub center_threshold: f64,

    /// Codec candidates in order of preference
    pub codecs: Vec<String>,

    /// Audio track handling
    pub audio_mode: AudioMode,

    /// Frames waiting for the encoder before new frames are dropped
    pub encoder_queue_frames: usize,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            max_streams: 4,
            timeslice_ms: 1000,
            clear_delay_ms: 50,
            center_threshold: 10.0,
            codecs: PREFERRED_CODECS.iter().map(|c| c.to_string()).collect(),
            audio_mode: AudioMode::Auto,
            encoder_queue_frames: 8,
        }
    }
}

impl CompositorConfig {
    /// Load a config from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read compositor config {:?}", path))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid compositor config {:?}", path))?;

        tracing::debug!("Loaded compositor config from {:?}", path);
        Ok(config)
    }

    /// Parse and validate a config from a JSON string
    pub fn from_json(json: &str) -> CompositorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CompositorResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CompositorError::InvalidConfig(format!(
                "canvas size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(CompositorError::InvalidConfig("fps must be non-zero".to_string()));
        }
        if self.max_streams == 0 {
            return Err(CompositorError::InvalidConfig(
                "maxStreams must be at least 1".to_string(),
            ));
        }
        if self.encoder_queue_frames == 0 {
            return Err(CompositorError::InvalidConfig(
                "encoderQueueFrames must be at least 1".to_string(),
            ));
        }
        if self.timeslice_ms == 0 {
            return Err(CompositorError::InvalidConfig(
                "timesliceMs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = CompositorConfig::from_json("{}").unwrap();
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.fps, 30);
        assert_eq!(config.max_streams, 4);
        assert_eq!(config.timeslice_ms, 1000);
        assert_eq!(config.audio_mode, AudioMode::Auto);
        assert_eq!(config.codecs.len(), PREFERRED_CODECS.len());
        assert_eq!(config.encoder_queue_frames, 8);
    }

    #[test]
    fn test_camel_case_fields() {
        let config =
            CompositorConfig::from_json(r#"{"maxStreams": 2, "audioMode": "isolated", "clearDelayMs": 0}"#)
                .unwrap();
        assert_eq!(config.max_streams, 2);
        assert_eq!(config.audio_mode, AudioMode::Isolated);
        assert_eq!(config.clear_delay_ms, 0);
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = CompositorConfig::from_json(r#"{"width": 0}"#).unwrap_err();
        assert!(matches!(err, CompositorError::InvalidConfig(_)));

        let err = CompositorConfig::from_json(r#"{"encoderQueueFrames": 0}"#).unwrap_err();
        assert!(matches!(err, CompositorError::InvalidConfig(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("compositor.json");
        std::fs::write(&path, r#"{"width": 640, "height": 360}"#).unwrap();

        let config = CompositorConfig::load(&path).unwrap();
        assert_eq!((config.width, config.height), (640, 360));

        assert!(CompositorConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
