//! Recording bundle read/write operations
//!
//! A bundle is a directory containing:
//! - meta.json: Version, codec and session metadata
//! - recording-0.<ext>: The composite video chunks, concatenated
//! - audio-<n>.pcm: Raw L16 audio, one file per recorded track

use super::codec::Codec;
use super::state::{Recording, RecordingSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Bundle-related errors
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Missing required file: {0}")]
    MissingFile(String),
}

pub const BUNDLE_FORMAT: &str = "compositor-v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFileMeta {
    pub track_id: String,
    pub file: String,
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMeta {
    pub version: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub mime_type: String,
    pub video_file: String,
    pub size_bytes: usize,
    pub chunk_count: usize,
    pub total_duration_ms: f64,
    pub sessions: Vec<RecordingSession>,
    pub audio: Vec<AudioFileMeta>,
}

/// Write a finished recording to a bundle directory
pub fn write_bundle(recording: &Recording, bundle_path: &Path) -> Result<BundleMeta, BundleError> {
    if !bundle_path.exists() {
        fs::create_dir_all(bundle_path)?;
    }

    let extension = Codec::parse(&recording.mime_type).map_or("bin", |codec| codec.extension());
    let video_file = format!("recording-0.{}", extension);
    fs::write(bundle_path.join(&video_file), recording.data())?;

    let mut audio = Vec::with_capacity(recording.audio.len());
    for (index, track) in recording.audio.iter().enumerate() {
        let file = format!("audio-{}.pcm", index);
        fs::write(bundle_path.join(&file), track.data())?;
        audio.push(AudioFileMeta {
            track_id: track.track_id.clone(),
            file,
            mime_type: track.mime_type.clone(),
            sample_rate: track.sample_rate,
            channels: track.channels,
            duration_ms: track.duration_ms(),
        });
    }

    let meta = BundleMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        format: BUNDLE_FORMAT.to_string(),
        created_at: Utc::now(),
        mime_type: recording.mime_type.clone(),
        video_file,
        size_bytes: recording.size(),
        chunk_count: recording.chunks.len(),
        total_duration_ms: recording.total_duration_ms,
        sessions: recording.sessions.clone(),
        audio,
    };
    fs::write(bundle_path.join("meta.json"), serde_json::to_string_pretty(&meta)?)?;

    tracing::debug!(
        "Saved recording ({} bytes, {} audio tracks) to {:?}",
        meta.size_bytes,
        meta.audio.len(),
        bundle_path
    );

    Ok(meta)
}

/// Read recording metadata from a bundle
pub fn read_bundle_meta(bundle_path: &Path) -> Result<BundleMeta, BundleError> {
    if !bundle_path.is_dir() {
        return Err(BundleError::InvalidBundle(
            "Path is not a directory".to_string(),
        ));
    }

    let meta_path = bundle_path.join("meta.json");
    if !meta_path.exists() {
        return Err(BundleError::MissingFile("meta.json".to_string()));
    }

    let meta: BundleMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
    if meta.format != BUNDLE_FORMAT {
        return Err(BundleError::InvalidBundle(format!(
            "Unknown format {}",
            meta.format
        )));
    }
    Ok(meta)
}

/// Check if a path is a recording bundle
pub fn is_valid_bundle(path: &Path) -> bool {
    path.is_dir() && path.join("meta.json").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::state::{AudioRecording, Chunk};
    use tempfile::tempdir;

    fn chunk(sequence: u64, mime_type: &str, data: &[u8]) -> Chunk {
        Chunk {
            sequence,
            timecode_ms: 0.0,
            mime_type: mime_type.to_string(),
            data: data.to_vec(),
        }
    }

    fn recording() -> Recording {
        let pcm = "audio/L16;rate=8000;channels=1";
        Recording {
            mime_type: r#"video/webm;codecs="vp8,opus""#.to_string(),
            chunks: vec![chunk(0, "video/webm", &[1, 2]), chunk(1, "video/webm", &[3])],
            audio: vec![AudioRecording {
                track_id: "mic".to_string(),
                mime_type: pcm.to_string(),
                sample_rate: 8000,
                channels: 1,
                chunks: vec![chunk(0, pcm, &[0, 1, 0, 2])],
            }],
            sessions: vec![RecordingSession::new(0, 0.0)],
            total_duration_ms: 1000.0,
        }
    }

    #[test]
    fn test_write_and_read_bundle() {
        let dir = tempdir().unwrap();
        let bundle_path = dir.path().join("take-1");

        let written = write_bundle(&recording(), &bundle_path).unwrap();
        assert_eq!(written.video_file, "recording-0.webm");

        let meta = read_bundle_meta(&bundle_path).unwrap();
        assert_eq!(meta.size_bytes, 3);
        assert_eq!(meta.chunk_count, 2);
        assert_eq!(meta.sessions.len(), 1);
        assert_eq!(meta.audio[0].track_id, "mic");

        assert_eq!(fs::read(bundle_path.join("recording-0.webm")).unwrap(), vec![1, 2, 3]);
        assert_eq!(fs::read(bundle_path.join("audio-0.pcm")).unwrap(), vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_video_file_extension_follows_codec() {
        let dir = tempdir().unwrap();
        let cases = [
            (r#"video/x-matroska;codecs="avc1""#, "recording-0.mkv"),
            ("image/png", "recording-0.png"),
            ("not a mime type", "recording-0.bin"),
        ];

        for (index, (mime_type, video_file)) in cases.into_iter().enumerate() {
            let mut recording = recording();
            recording.mime_type = mime_type.to_string();
            let written = write_bundle(&recording, &dir.path().join(index.to_string())).unwrap();
            assert_eq!(written.video_file, video_file);
        }
    }

    #[test]
    fn test_is_valid_bundle() {
        let dir = tempdir().unwrap();

        let empty_path = dir.path().join("empty");
        fs::create_dir_all(&empty_path).unwrap();
        assert!(!is_valid_bundle(&empty_path));
        assert!(matches!(
            read_bundle_meta(&empty_path),
            Err(BundleError::MissingFile(_))
        ));

        let valid_path = dir.path().join("valid");
        write_bundle(&recording(), &valid_path).unwrap();
        assert!(is_valid_bundle(&valid_path));
    }
}
