//! Codec selection
//!
//! Candidates are MIME types in order of preference. A [`CodecProbe`] decides
//! which of them this machine can actually produce; the first survivor is
//! used for recording.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::process::Command;

/// MIME type of the in-process PNG frame sequence
pub const PNG_SEQUENCE: &str = "image/png";

/// Default candidates, best first
pub const PREFERRED_CODECS: [&str; 6] = [
    r#"video/webm;codecs="vp9,opus""#,
    r#"video/webm;codecs="vp9.0,opus""#,
    r#"video/webm;codecs="avc1""#,
    r#"video/x-matroska;codecs="avc1""#,
    r#"video/webm;codecs="vp8,opus""#,
    PNG_SEQUENCE,
];

/// A parsed recording MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Codec {
    mime_type: String,
    essence: String,
    codecs: Vec<String>,
}

impl Codec {
    /// Parse `type/subtype;codecs="a,b"`. Returns `None` for malformed input.
    pub fn parse(mime_type: &str) -> Option<Self> {
        let mut parts = mime_type.split(';');
        let essence = parts.next()?.trim().to_ascii_lowercase();
        if !essence.contains('/') || essence.starts_with('/') || essence.ends_with('/') {
            return None;
        }

        let codecs = parts
            .filter_map(|param| {
                let (key, value) = param.split_once('=')?;
                (key.trim().eq_ignore_ascii_case("codecs")).then(|| value.trim().trim_matches('"'))
            })
            .flat_map(|value| value.split(','))
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Some(Self {
            mime_type: mime_type.trim().to_string(),
            essence,
            codecs,
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// MIME type without parameters
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn codecs(&self) -> &[String] {
        &self.codecs
    }

    pub fn is_png_sequence(&self) -> bool {
        self.essence == PNG_SEQUENCE
    }

    /// FFmpeg muxer for the container
    pub fn ffmpeg_muxer(&self) -> Option<&'static str> {
        match self.essence.as_str() {
            "video/webm" => Some("webm"),
            "video/x-matroska" => Some("matroska"),
            _ => None,
        }
    }

    /// FFmpeg encoder for the video codec
    pub fn ffmpeg_video_encoder(&self) -> Option<&'static str> {
        let video = self.codecs.iter().find_map(|c| match c.as_str() {
            "vp9" | "vp9.0" => Some("libvpx-vp9"),
            "vp8" => Some("libvpx"),
            "av1" => Some("libaom-av1"),
            c if c.starts_with("av01") => Some("libaom-av1"),
            c if c.starts_with("avc1") => Some("libx264"),
            _ => None,
        });
        video.or(match self.essence.as_str() {
            "video/webm" => Some("libvpx"),
            "video/x-matroska" => Some("libx264"),
            _ => None,
        })
    }

    /// Whether the container can hold what `encoder` produces
    ///
    /// WebM only carries VP8, VP9 and AV1. Matroska takes anything.
    pub fn muxer_accepts(&self, encoder: &str) -> bool {
        match self.ffmpeg_muxer() {
            Some("webm") => matches!(encoder, "libvpx" | "libvpx-vp9" | "libaom-av1"),
            Some(_) => true,
            None => false,
        }
    }

    /// File extension for the concatenated chunks
    pub fn extension(&self) -> &'static str {
        match self.essence.as_str() {
            "video/webm" => "webm",
            "video/x-matroska" => "mkv",
            PNG_SEQUENCE => "png",
            _ => "bin",
        }
    }
}

/// Runtime capability check for a codec
pub trait CodecProbe {
    fn is_supported(&self, codec: &Codec) -> bool;
}

/// Probe answering from a fixed list of MIME types
pub struct StaticProbe {
    supported: HashSet<String>,
}

impl StaticProbe {
    pub fn new<I, S>(mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: mime_types.into_iter().map(Into::into).collect(),
        }
    }
}

impl CodecProbe for StaticProbe {
    fn is_supported(&self, codec: &Codec) -> bool {
        self.supported.contains(codec.mime_type())
    }
}

/// Probe backed by the encoders of the local `ffmpeg` binary
pub struct FfmpegProbe {
    encoders: HashSet<String>,
}

impl FfmpegProbe {
    /// Ask `ffmpeg -encoders`. Without FFmpeg only the PNG sequence is supported.
    pub fn detect() -> Self {
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let listing = String::from_utf8_lossy(&output.stdout);
                let probe = Self::from_listing(&listing);
                tracing::info!("FFmpeg reports {} encoders", probe.encoders.len());
                probe
            }
            Ok(output) => {
                tracing::warn!("ffmpeg -encoders failed with {}", output.status);
                Self::from_listing("")
            }
            Err(e) => {
                tracing::warn!("FFmpeg not available: {}", e);
                Self::from_listing("")
            }
        }
    }

    /// Parse an `ffmpeg -encoders` listing
    pub fn from_listing(listing: &str) -> Self {
        let encoders = listing
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let flags = fields.next()?;
                let name = fields.next()?;
                // capability flags look like "V....D"; the legend uses "V..... ="
                let is_entry = flags.len() == 6 && flags.chars().all(|c| c.is_ascii_alphabetic() || c == '.');
                (is_entry && name != "=").then(|| name.to_string())
            })
            .collect();
        Self { encoders }
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }
}

impl CodecProbe for FfmpegProbe {
    fn is_supported(&self, codec: &Codec) -> bool {
        if codec.is_png_sequence() {
            return true;
        }
        match codec.ffmpeg_video_encoder() {
            Some(encoder) => codec.muxer_accepts(encoder) && self.has_encoder(encoder),
            None => false,
        }
    }
}

/// Filter candidates through a probe, keeping their order
pub fn supported_codecs(candidates: &[String], probe: &dyn CodecProbe) -> Vec<Codec> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let codec = Codec::parse(candidate);
            if codec.is_none() {
                tracing::warn!("Skipping malformed codec candidate {:?}", candidate);
            }
            codec
        })
        .filter(|codec| probe.is_supported(codec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libvpx               libvpx VP8 (codec vp8)
 A....D libopus              libopus Opus (codec opus)
";

    #[test]
    fn test_parse_codec_parameters() {
        let codec = Codec::parse(r#"video/webm;codecs="vp9,opus""#).unwrap();
        assert_eq!(codec.essence(), "video/webm");
        assert_eq!(codec.codecs(), &["vp9".to_string(), "opus".to_string()]);
        assert_eq!(codec.ffmpeg_video_encoder(), Some("libvpx-vp9"));
        assert_eq!(codec.extension(), "webm");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Codec::parse("webm").is_none());
        assert!(Codec::parse("video/").is_none());
        assert!(Codec::parse(PNG_SEQUENCE).unwrap().is_png_sequence());
    }

    #[test]
    fn test_ffmpeg_listing() {
        let probe = FfmpegProbe::from_listing(LISTING);
        assert!(probe.has_encoder("libx264"));
        assert!(probe.has_encoder("libopus"));
        assert!(!probe.has_encoder("="));
        assert!(!probe.has_encoder("libvpx-vp9"));
    }

    #[test]
    fn test_supported_codecs_keep_priority() {
        let probe = FfmpegProbe::from_listing(LISTING);
        let candidates: Vec<String> = PREFERRED_CODECS.iter().map(|c| c.to_string()).collect();
        let codecs = supported_codecs(&candidates, &probe);

        let mimes: Vec<&str> = codecs.iter().map(|c| c.mime_type()).collect();
        assert_eq!(
            mimes,
            vec![
                r#"video/x-matroska;codecs="avc1""#,
                r#"video/webm;codecs="vp8,opus""#,
                PNG_SEQUENCE,
            ]
        );
    }

    #[test]
    fn test_webm_rejects_h264() {
        let probe = FfmpegProbe::from_listing(LISTING);
        let webm_h264 = Codec::parse(r#"video/webm;codecs="avc1""#).unwrap();
        let mkv_h264 = Codec::parse(r#"video/x-matroska;codecs="avc1.42E01E""#).unwrap();
        let webm_av1 = Codec::parse(r#"video/webm;codecs="av01.0.04M.08""#).unwrap();

        assert_eq!(webm_h264.ffmpeg_video_encoder(), Some("libx264"));
        assert!(!webm_h264.muxer_accepts("libx264"));
        assert!(!probe.is_supported(&webm_h264));
        assert!(probe.is_supported(&mkv_h264));

        assert_eq!(webm_av1.ffmpeg_video_encoder(), Some("libaom-av1"));
        assert!(webm_av1.muxer_accepts("libaom-av1"));
        // listed muxer pairing, but no libaom in this build
        assert!(!probe.is_supported(&webm_av1));
    }

    #[test]
    fn test_without_ffmpeg_only_png_survives() {
        let probe = FfmpegProbe::from_listing("");
        let candidates: Vec<String> = PREFERRED_CODECS.iter().map(|c| c.to_string()).collect();
        let codecs = supported_codecs(&candidates, &probe);
        assert_eq!(codecs.len(), 1);
        assert!(codecs[0].is_png_sequence());
    }

    #[test]
    fn test_static_probe_can_reject_everything() {
        let probe = StaticProbe::new(Vec::<String>::new());
        let candidates = vec![PNG_SEQUENCE.to_string()];
        assert!(supported_codecs(&candidates, &probe).is_empty());
    }
}
