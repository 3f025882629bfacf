//! Peak extraction from recorded PCM
//!
//! Peaks are the maximum absolute amplitude in each time bucket, taken over
//! all channels.

use crate::recorder::state::AudioRecording;
use serde::{Deserialize, Serialize};

/// Waveform data for a recorded audio track
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformData {
    pub track_id: String,
    /// Peaks normalized to 0.0-1.0 range
    pub peaks: Vec<f32>,
    /// Duration of the source audio in milliseconds
    pub duration_ms: u64,
    pub samples_per_second: u32,
}

/// Waveform of an [`AudioRecording`]
pub fn waveform_for(recording: &AudioRecording, samples_per_second: u32) -> WaveformData {
    let samples_per_second = samples_per_second.max(1);
    let samples = recording.samples();
    let channels = recording.channels.max(1) as usize;
    let sample_rate = recording.sample_rate.max(1);

    let frames = samples.len() / channels;
    let duration_secs = frames as f64 / sample_rate as f64;
    let total_peaks = (duration_secs * samples_per_second as f64).ceil() as usize;

    WaveformData {
        track_id: recording.track_id.clone(),
        peaks: compute_peaks(&samples, channels, sample_rate, samples_per_second, total_peaks),
        duration_ms: (duration_secs * 1000.0) as u64,
        samples_per_second,
    }
}

/// Bucket interleaved samples into `total_peaks` normalized peaks
pub fn compute_peaks(
    samples: &[i16],
    channels: usize,
    sample_rate: u32,
    samples_per_second: u32,
    total_peaks: usize,
) -> Vec<f32> {
    if samples.is_empty() {
        return vec![0.0; total_peaks];
    }

    let channels = channels.max(1);
    let frames_per_peak = (sample_rate / samples_per_second.max(1)).max(1) as usize;

    let mut peaks: Vec<f32> = samples
        .chunks(frames_per_peak * channels)
        .map(|bucket| {
            let max_amplitude = bucket
                .iter()
                .map(|&s| s.unsigned_abs())
                .max()
                .unwrap_or(0);
            (max_amplitude as f32 / i16::MAX as f32).min(1.0)
        })
        .collect();

    // Pad or trim to exact size
    peaks.resize(total_peaks, 0.0);
    peaks
}
