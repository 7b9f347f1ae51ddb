//! Transcription of recorded clips through the whisper.cpp CLI.

use crate::defaults;
use crate::error::{Result, VoxrelayError};
use crate::stt::command::{CommandExecutor, SystemCommandExecutor};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Trait for turning a recorded clip into text.
///
/// This trait allows swapping implementations (real recognizer subprocess
/// vs mock).
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribe the clip at `clip` and return the recognized text.
    ///
    /// An empty string is a valid result: it means the recognizer ran
    /// successfully but heard nothing worth reporting.
    fn transcribe(&self, clip: &Path) -> Result<String>;
}

/// Configuration for recognizer invocation
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub executable: PathBuf,
    pub model: PathBuf,
    pub language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(defaults::RECOGNIZER_BIN),
            model: PathBuf::from(defaults::MODEL_PATH),
            language: defaults::LANGUAGE.to_string(),
        }
    }
}

/// Transcription engine that shells out to the whisper.cpp CLI.
///
/// Each call runs `<executable> -m <model> -f <clip> -l <language> -nt` and
/// waits for it to finish. Exit status 0 yields the trimmed stdout; any other
/// status becomes a [`VoxrelayError::Recognition`] carrying the stderr text.
/// The engine never retries and never touches the clip file itself.
pub struct RecognizerEngine<E: CommandExecutor> {
    executable: PathBuf,
    model: PathBuf,
    language: String,
    executor: E,
}

impl<E: CommandExecutor> RecognizerEngine<E> {
    /// Create an engine that invokes the recognizer through the given executor.
    pub fn new(config: EngineConfig, executor: E) -> Self {
        Self {
            executable: config.executable,
            model: config.model,
            language: config.language,
            executor,
        }
    }
}

impl RecognizerEngine<SystemCommandExecutor> {
    /// Create an engine that spawns the real recognizer binary.
    pub fn system(config: EngineConfig) -> Self {
        Self::new(config, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> TranscriptionEngine for RecognizerEngine<E> {
    fn transcribe(&self, clip: &Path) -> Result<String> {
        let executable = self.executable.to_string_lossy();
        let model = self.model.to_string_lossy();
        let clip_arg = clip.to_string_lossy();

        let args = [
            "-m",
            model.as_ref(),
            "-f",
            clip_arg.as_ref(),
            "-l",
            self.language.as_str(),
            "-nt",
        ];

        let output = self.executor.execute(executable.as_ref(), &args)?;

        if output.success() {
            Ok(output.stdout.trim().to_string())
        } else {
            let status = match output.status {
                Some(code) => format!("status {}", code),
                None => "a signal".to_string(),
            };
            Err(VoxrelayError::Recognition {
                message: format!(
                    "recognizer exited with {}: {}",
                    status,
                    output.stderr.trim()
                ),
            })
        }
    }
}

/// Mock transcription engine for testing.
///
/// Records the path of every clip handed to it, so tests can assert both the
/// number and the order of transcriptions.
#[derive(Debug)]
pub struct MockTranscriptionEngine {
    response: String,
    should_fail: bool,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockTranscriptionEngine {
    pub fn new() -> Self {
        Self {
            response: "mock transcription".to_string(),
            should_fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Paths of every clip transcribed so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of transcription calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockTranscriptionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptionEngine for MockTranscriptionEngine {
    fn transcribe(&self, clip: &Path) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(clip.to_path_buf());

        if self.should_fail {
            Err(VoxrelayError::Recognition {
                message: "mock recognition failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }
}
