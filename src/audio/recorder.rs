use crate::error::{Result, VoxrelayError};

/// Trait for audio capture devices.
///
/// This trait allows swapping implementations (real microphone vs mock).
/// Samples are 16-bit PCM, interleaved when more than one channel is
/// captured.
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Drain the samples captured since the last read.
    ///
    /// Returns an empty vector when no new audio has arrived yet.
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    chunk: Vec<i16>,
    empty_reads: usize,
    should_fail_start: bool,
    should_fail_stop: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    pub fn new() -> Self {
        Self {
            is_started: false,
            chunk: vec![0i16; 160],
            empty_reads: 0,
            should_fail_start: false,
            should_fail_stop: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the chunk of samples returned by each read.
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.chunk = samples;
        self
    }

    /// Configure the mock to return empty reads before audio starts flowing.
    pub fn with_empty_reads(mut self, count: usize) -> Self {
        self.empty_reads = count;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on stop
    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(VoxrelayError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.should_fail_stop {
            Err(VoxrelayError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = false;
            Ok(())
        }
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(VoxrelayError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        if self.empty_reads > 0 {
            self.empty_reads -= 1;
            return Ok(Vec::new());
        }
        Ok(self.chunk.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_samples() {
        let chunk = vec![100i16, 200, 300, 400, 500];
        let mut source = MockAudioSource::new().with_samples(chunk.clone());

        assert_eq!(source.read_samples().unwrap(), chunk);
    }

    #[test]
    fn mock_returns_default_silence() {
        let mut source = MockAudioSource::new();

        let samples = source.read_samples().unwrap();
        assert_eq!(samples.len(), 160);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn mock_drains_empty_reads_before_audio() {
        let mut source = MockAudioSource::new()
            .with_samples(vec![7i16, 7, 7])
            .with_empty_reads(2);

        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.read_samples().unwrap().is_empty());
        assert_eq!(source.read_samples().unwrap(), vec![7i16, 7, 7]);
        // Audio keeps flowing once the warm-up reads are exhausted
        assert_eq!(source.read_samples().unwrap(), vec![7i16, 7, 7]);
    }

    #[test]
    fn mock_read_failure_reports_capture_error() {
        let mut source = MockAudioSource::new()
            .with_read_failure()
            .with_error_message("buffer overflow");

        match source.read_samples() {
            Err(VoxrelayError::AudioCapture { message }) => {
                assert_eq!(message, "buffer overflow");
            }
            other => panic!("Expected AudioCapture error, got {:?}", other),
        }
    }

    #[test]
    fn mock_tracks_started_state() {
        let mut source = MockAudioSource::new();

        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn mock_start_failure_leaves_source_stopped() {
        let mut source = MockAudioSource::new().with_start_failure();

        assert!(source.start().is_err());
        assert!(!source.is_started());
    }

    #[test]
    fn mock_stop_failure_leaves_source_started() {
        let mut source = MockAudioSource::new().with_stop_failure();

        source.start().unwrap();
        assert!(source.stop().is_err());
        assert!(source.is_started());
    }

    #[test]
    fn mock_restarts_cleanly() {
        let mut source = MockAudioSource::new();

        for _ in 0..3 {
            assert!(source.start().is_ok());
            assert!(source.stop().is_ok());
        }
        assert!(!source.is_started());
    }

    #[test]
    fn audio_source_trait_is_object_safe() {
        let mut source: Box<dyn AudioSource> =
            Box::new(MockAudioSource::new().with_samples(vec![1i16, 2, 3, 4, 5]));

        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap(), vec![1i16, 2, 3, 4, 5]);
        source.stop().unwrap();
    }

    #[test]
    fn mock_empty_chunk_is_allowed() {
        let mut source = MockAudioSource::new().with_samples(vec![]);

        assert_eq!(source.read_samples().unwrap(), Vec::<i16>::new());
    }
}
