//! Media primitives
//!
//! Frames, sources and streams that feed the compositor.

pub mod element;
pub mod frame;
pub mod sources;
pub mod track;

pub use element::{ElementEvent, VideoElement};
pub use frame::{Frame, Rect};
pub use sources::{FrameSlot, SampleQueue};
pub use track::{AudioSource, AudioTrack, MediaStream, VideoSource};
