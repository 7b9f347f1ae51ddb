//! Audio capture and clip recording.

pub mod capture;
pub mod clip;
pub mod recorder;

pub use capture::{suppress_audio_warnings, CpalAudioSource};
pub use clip::{ClipWriter, MicClipWriter};
pub use recorder::{AudioSource, MockAudioSource};
