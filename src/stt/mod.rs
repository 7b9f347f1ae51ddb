//! Speech-to-text subsystem: subprocess plumbing and the transcription engine.

pub mod command;
pub mod engine;

#[cfg(test)]
pub use command::MockCommandExecutor;
pub use command::{CommandExecutor, CommandOutput, SystemCommandExecutor};
pub use engine::{EngineConfig, MockTranscriptionEngine, RecognizerEngine, TranscriptionEngine};
