//! Error types for voxrelay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxrelayError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Missing required configuration value: {key}")]
    ConfigMissingValue { key: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Recognition errors
    #[error("Speech recognizer not found at {path}")]
    RecognizerNotFound { path: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Result delivery errors
    #[error("Result delivery failed: {message}")]
    Delivery { message: String },

    // Pipeline lifecycle errors
    #[error("Pipeline is already running")]
    AlreadyRunning,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxrelayError>;
