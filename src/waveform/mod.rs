//! Waveform extraction module
//!
//! Computes peaks from recorded audio for visualization.

mod extractor;

pub use extractor::{compute_peaks, waveform_for, WaveformData};

use crate::recorder::state::Recording;

/// Default peak density, smooth enough for a timeline
pub const DEFAULT_SAMPLES_PER_SECOND: u32 = 50;

/// Waveforms for every audio track of a recording
pub fn waveforms(recording: &Recording, samples_per_second: Option<u32>) -> Vec<WaveformData> {
    let sps = samples_per_second.unwrap_or(DEFAULT_SAMPLES_PER_SECOND);
    recording.audio.iter().map(|track| waveform_for(track, sps)).collect()
}
