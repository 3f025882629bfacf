//! Audio track routing
//!
//! A composite stream carries a single audio track. When several tracks show
//! up, a strategy decides what happens: the mixed strategy lets the newest
//! track replace the old one on the composite stream, the isolated strategy
//! records every track on its own audio-only recorder.

use super::error::RecorderResult;
use super::media_recorder::MediaRecorder;
use super::state::{AudioRecording, RecorderState};
use crate::compositor::output::OutputStream;
use crate::config::AudioMode;
use crate::media::track::AudioTrack;
use std::time::Duration;

pub trait AudioTrackStrategy: Send {
    fn name(&self) -> &'static str;

    /// Route a newly added track
    fn add_track(&mut self, output: &OutputStream, track: AudioTrack);

    fn start(&mut self, timeslice: Option<Duration>) -> RecorderResult<()>;

    fn capture(&mut self, timestamp_ms: f64) -> RecorderResult<()>;

    fn pause(&mut self) -> RecorderResult<()>;

    fn resume(&mut self) -> RecorderResult<()>;

    /// Stop and hand back what was recorded outside the main recorder
    fn stop(&mut self) -> RecorderResult<Vec<AudioRecording>>;
}

/// Pick the strategy for a configured mode
pub fn strategy_for(mode: AudioMode) -> Box<dyn AudioTrackStrategy> {
    match mode {
        // composite streams always accept a track, so mixing is always available
        AudioMode::Auto | AudioMode::Mixed => Box::new(MixedTrackStrategy),
        AudioMode::Isolated => Box::new(IsolatedTrackStrategy::default()),
    }
}

/// The composite stream's single audio track is replaced by each new track
#[derive(Debug, Default)]
pub struct MixedTrackStrategy;

impl AudioTrackStrategy for MixedTrackStrategy {
    fn name(&self) -> &'static str {
        "mixed"
    }

    fn add_track(&mut self, output: &OutputStream, track: AudioTrack) {
        let track_id = track.id().to_string();
        if let Some(previous) = output.replace_audio_track(track) {
            tracing::info!("Audio track {} replaces {}", track_id, previous.id());
        } else {
            tracing::info!("Audio track {} added to composite stream", track_id);
        }
    }

    fn start(&mut self, _timeslice: Option<Duration>) -> RecorderResult<()> {
        Ok(())
    }

    fn capture(&mut self, _timestamp_ms: f64) -> RecorderResult<()> {
        Ok(())
    }

    fn pause(&mut self) -> RecorderResult<()> {
        Ok(())
    }

    fn resume(&mut self) -> RecorderResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> RecorderResult<Vec<AudioRecording>> {
        Ok(Vec::new())
    }
}

/// One audio-only recorder per track, driven alongside the main recorder
#[derive(Default)]
pub struct IsolatedTrackStrategy {
    recorders: Vec<MediaRecorder>,
    timeslice: Option<Duration>,
    recording: bool,
}

impl IsolatedTrackStrategy {
    pub fn track_count(&self) -> usize {
        self.recorders.len()
    }
}

impl AudioTrackStrategy for IsolatedTrackStrategy {
    fn name(&self) -> &'static str {
        "isolated"
    }

    fn add_track(&mut self, _output: &OutputStream, track: AudioTrack) {
        tracing::info!("Recording audio track {} separately", track.id());
        let mut recorder = MediaRecorder::audio_only(track);
        if self.recording {
            if let Err(e) = recorder.start(self.timeslice) {
                tracing::error!("Failed to start audio recorder: {}", e);
            }
        }
        self.recorders.push(recorder);
    }

    fn start(&mut self, timeslice: Option<Duration>) -> RecorderResult<()> {
        self.timeslice = timeslice;
        for recorder in &mut self.recorders {
            recorder.start(timeslice)?;
        }
        self.recording = true;
        Ok(())
    }

    fn capture(&mut self, timestamp_ms: f64) -> RecorderResult<()> {
        for recorder in &mut self.recorders {
            recorder.capture(timestamp_ms)?;
        }
        Ok(())
    }

    fn pause(&mut self) -> RecorderResult<()> {
        for recorder in &mut self.recorders {
            if recorder.state() == RecorderState::Recording {
                recorder.pause()?;
            }
        }
        Ok(())
    }

    fn resume(&mut self) -> RecorderResult<()> {
        for recorder in &mut self.recorders {
            if recorder.state() == RecorderState::Paused {
                recorder.resume()?;
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> RecorderResult<Vec<AudioRecording>> {
        self.recording = false;
        let mut recordings = Vec::new();
        for recorder in &mut self.recorders {
            if recorder.state() != RecorderState::Inactive {
                recorder.stop()?;
            }
            recordings.extend(recorder.take_audio_recordings());
        }
        Ok(recordings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sources::{FrameSlot, SampleQueue};
    use std::sync::Arc;

    fn output() -> OutputStream {
        OutputStream::new("composite", 30, Arc::new(FrameSlot::new()))
    }

    #[test]
    fn test_mixed_replaces_track() {
        let output = output();
        let mut strategy = strategy_for(AudioMode::Auto);
        assert_eq!(strategy.name(), "mixed");

        strategy.add_track(&output, AudioTrack::new("mic", Arc::new(SampleQueue::new(48_000, 1))));
        strategy.add_track(&output, AudioTrack::new("system", Arc::new(SampleQueue::new(48_000, 2))));
        assert_eq!(output.audio_track().unwrap().id(), "system");
        assert!(strategy.stop().unwrap().is_empty());
    }

    #[test]
    fn test_isolated_records_each_track() {
        let output = output();
        let mic = Arc::new(SampleQueue::new(8_000, 1));
        let system = Arc::new(SampleQueue::new(8_000, 1));

        let mut strategy = IsolatedTrackStrategy::default();
        strategy.add_track(&output, AudioTrack::new("mic", mic.clone()));
        strategy.start(None).unwrap();
        // arrives mid-recording and starts immediately
        strategy.add_track(&output, AudioTrack::new("system", system.clone()));
        assert_eq!(strategy.track_count(), 2);
        assert!(output.audio_track().is_none());

        mic.push(&[1, 1]);
        system.push(&[2]);
        strategy.capture(0.0).unwrap();
        strategy.pause().unwrap();
        strategy.resume().unwrap();

        let recordings = strategy.stop().unwrap();
        let ids: Vec<&str> = recordings.iter().map(|r| r.track_id.as_str()).collect();
        assert_eq!(ids, vec!["mic", "system"]);
        assert_eq!(recordings[1].samples(), vec![2]);
    }
}
