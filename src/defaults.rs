//! Default configuration constants for voxrelay.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default channel count.
///
/// whisper.cpp expects mono input; the capture layer mixes multi-channel
/// devices down when the hardware cannot record mono natively.
pub const CHANNELS: u16 = 1;

/// Default clip duration in seconds.
///
/// Each recorded clip covers this many seconds of audio before it is
/// handed to the transcription loop.
pub const CLIP_SECS: u64 = 3;

/// Default path to the whisper.cpp CLI binary.
pub const RECOGNIZER_BIN: &str = "./whisper.cpp/build/bin/whisper-cli";

/// Default path to the Whisper model file.
pub const MODEL_PATH: &str = "./whisper.cpp/models/ggml-base.bin";

/// Default language code for transcription.
///
/// Set to a specific code (e.g., "en", "de") to force a language.
pub const LANGUAGE: &str = "ko";

/// Port the result receiver listens on.
pub const API_PORT: u16 = 3000;

/// Route results are POSTed to on the receiver.
pub const API_ROUTE: &str = "/speech-result";

/// Per-request timeout for result delivery in seconds.
pub const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Filename prefix for recorded clips.
pub const CLIP_PREFIX: &str = "audio_";

/// Filename extension for recorded clips.
pub const CLIP_EXT: &str = "wav";
