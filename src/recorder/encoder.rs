//! Frame and sample encoders
//!
//! Video encoders turn composite frames into container bytes. The bytes each
//! call returns are appended to the current chunk; `finish` drains whatever
//! the encoder still holds.

use super::codec::Codec;
use super::error::{RecorderError, RecorderResult};
use crate::media::frame::{Frame, BYTES_PER_PIXEL};
use crate::media::track::AudioSource;
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

pub trait FrameEncoder: Send {
    fn mime_type(&self) -> &str;

    /// Encode one frame and return the bytes produced so far
    fn encode(&mut self, frame: &Frame) -> RecorderResult<Vec<u8>>;

    /// Flush the encoder. No frames may follow.
    fn finish(&mut self) -> RecorderResult<Vec<u8>>;
}

/// Encoder for `codec` at a fixed resolution
pub fn create_encoder(
    codec: &Codec,
    width: u32,
    height: u32,
    fps: u32,
) -> RecorderResult<Box<dyn FrameEncoder>> {
    if codec.is_png_sequence() {
        return Ok(Box::new(PngSequenceEncoder::new(codec.mime_type())));
    }
    Ok(Box::new(FfmpegEncoder::new(codec, width, height, fps)?))
}

/// Each frame becomes a standalone PNG image
pub struct PngSequenceEncoder {
    mime_type: String,
}

impl PngSequenceEncoder {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }
}

impl FrameEncoder for PngSequenceEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn encode(&mut self, frame: &Frame) -> RecorderResult<Vec<u8>> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, frame.width(), frame.height());
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| RecorderError::Encoding(format!("PNG header: {}", e)))?;
            writer
                .write_image_data(frame.data())
                .map_err(|e| RecorderError::Encoding(format!("PNG data: {}", e)))?;
        }
        Ok(bytes)
    }

    fn finish(&mut self) -> RecorderResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Streams raw RGBA frames through an FFmpeg process
///
/// The muxed output is read on a background thread so FFmpeg never blocks on
/// a full stdout pipe.
pub struct FfmpegEncoder {
    mime_type: String,
    process: Child,
    stdin: Option<ChildStdin>,
    output: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    frame_size: usize,
    frame_count: u64,
}

impl FfmpegEncoder {
    pub fn new(codec: &Codec, width: u32, height: u32, fps: u32) -> RecorderResult<Self> {
        let muxer = codec
            .ffmpeg_muxer()
            .ok_or_else(|| RecorderError::UnsupportedCodec(codec.mime_type().to_string()))?;
        let video_encoder = codec
            .ffmpeg_video_encoder()
            .ok_or_else(|| RecorderError::UnsupportedCodec(codec.mime_type().to_string()))?;

        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            video_encoder.to_string(),
        ];

        match video_encoder {
            "libx264" => args.extend([
                "-preset".to_string(),
                "veryfast".to_string(),
                "-tune".to_string(),
                "zerolatency".to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
            ]),
            "libaom-av1" => args.extend([
                "-usage".to_string(),
                "realtime".to_string(),
                "-cpu-used".to_string(),
                "8".to_string(),
                "-crf".to_string(),
                "32".to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ]),
            _ => args.extend([
                "-deadline".to_string(),
                "realtime".to_string(),
                "-crf".to_string(),
                "32".to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ]),
        }

        args.extend(["-f".to_string(), muxer.to_string(), "-".to_string()]);

        tracing::info!("Starting FFmpeg recorder: {:?}", args);

        let mut process = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RecorderError::Ffmpeg(format!("Failed to start FFmpeg: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| RecorderError::Ffmpeg("Failed to capture FFmpeg stdin".to_string()))?;
        let mut stdout = process
            .stdout
            .take()
            .ok_or_else(|| RecorderError::Ffmpeg("Failed to capture FFmpeg stdout".to_string()))?;

        let output = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&output);
        let reader = std::thread::spawn(move || {
            let mut buffer = [0u8; 64 * 1024];
            loop {
                match stdout.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => sink.lock().extend_from_slice(&buffer[..n]),
                    Err(e) => {
                        tracing::error!("Reading FFmpeg output failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            mime_type: codec.mime_type().to_string(),
            process,
            stdin: Some(stdin),
            output,
            reader: Some(reader),
            frame_size: width as usize * height as usize * BYTES_PER_PIXEL,
            frame_count: 0,
        })
    }

    fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output.lock())
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn encode(&mut self, frame: &Frame) -> RecorderResult<Vec<u8>> {
        if frame.data().len() != self.frame_size {
            return Err(RecorderError::Encoding(format!(
                "Frame is {}x{}, encoder expects {} bytes",
                frame.width(),
                frame.height(),
                self.frame_size
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RecorderError::Encoding("Encoder already finished".to_string()))?;
        stdin
            .write_all(frame.data())
            .map_err(|e| RecorderError::Ffmpeg(format!("Failed to write frame: {}", e)))?;
        self.frame_count += 1;

        Ok(self.take_output())
    }

    fn finish(&mut self) -> RecorderResult<Vec<u8>> {
        // closing stdin signals end of input
        drop(self.stdin.take());

        let status = self.process.wait()?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        if !status.success() {
            return Err(RecorderError::Ffmpeg(format!(
                "FFmpeg exited with {} after {} frames",
                status, self.frame_count
            )));
        }

        tracing::info!("FFmpeg recorder finished after {} frames", self.frame_count);
        Ok(self.take_output())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            let _ = self.process.kill();
        }
    }
}

/// 16-bit little-endian PCM (`audio/L16`)
#[derive(Debug, Clone)]
pub struct PcmEncoder {
    sample_rate: u32,
    channels: u16,
    mime_type: String,
}

impl PcmEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            mime_type: format!("audio/L16;rate={};channels={}", sample_rate, channels),
        }
    }

    pub fn for_source(source: &dyn AudioSource) -> Self {
        Self::new(source.sample_rate(), source.channels())
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn encode(&self, samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Inverse of [`PcmEncoder::encode`]. A trailing odd byte is ignored.
pub fn decode_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
