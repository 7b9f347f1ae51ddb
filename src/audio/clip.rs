//! Fixed-duration clip recording and clip-file management.
//!
//! Each clip is a standalone WAV file named `audio_<index>.wav`, written to
//! the pipeline's working directory. The index counts up from zero for the
//! lifetime of the writer and never resets, so filenames are unique per run.

use crate::audio::recorder::AudioSource;
use crate::defaults;
use crate::error::{Result, VoxrelayError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Trait for components that produce one clip file per call.
///
/// This trait allows swapping implementations (real microphone vs scripted
/// test writers).
pub trait ClipWriter: Send {
    /// Record the next clip and write it to disk.
    ///
    /// Blocks for roughly the clip duration and returns the path of the
    /// file written.
    fn record_one(&mut self) -> Result<PathBuf>;
}

/// Records fixed-duration WAV clips from an [`AudioSource`].
pub struct MicClipWriter<S: AudioSource> {
    source: S,
    dir: PathBuf,
    sample_rate: u32,
    channels: u16,
    clip_secs: u64,
    next_index: u64,
}

impl<S: AudioSource> MicClipWriter<S> {
    /// Create a writer recording into `dir` with default audio settings.
    pub fn new(source: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dir: dir.into(),
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            clip_secs: defaults::CLIP_SECS,
            next_index: 0,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_clip_secs(mut self, clip_secs: u64) -> Self {
        self.clip_secs = clip_secs;
        self
    }

    /// Number of interleaved samples a full clip holds.
    fn samples_per_clip(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * self.clip_secs as usize
    }

    /// Accumulate samples until a full clip is buffered.
    ///
    /// Empty reads mean the device has not delivered new audio yet, so back
    /// off briefly instead of spinning.
    fn collect_samples(&mut self, target: usize) -> Result<Vec<i16>> {
        let poll_interval = Duration::from_millis(10);
        let mut samples = Vec::with_capacity(target);

        while samples.len() < target {
            let chunk = self.source.read_samples()?;
            if chunk.is_empty() {
                std::thread::sleep(poll_interval);
                continue;
            }
            samples.extend_from_slice(&chunk);
        }

        samples.truncate(target);
        Ok(samples)
    }
}

impl<S: AudioSource> ClipWriter for MicClipWriter<S> {
    fn record_one(&mut self) -> Result<PathBuf> {
        let target = self.samples_per_clip();

        self.source.start()?;
        let collected = self.collect_samples(target);
        let stop_result = self.source.stop();
        let samples = collected?;
        stop_result?;

        let path = self.dir.join(clip_filename(self.next_index));
        write_wav(&path, &samples, self.sample_rate, self.channels)?;
        self.next_index += 1;

        debug!("Recorded clip {}", path.display());
        Ok(path)
    }
}

/// Write 16-bit PCM samples to a WAV file.
fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| VoxrelayError::AudioCapture {
            message: format!("Failed to create WAV file {}: {}", path.display(), e),
        })?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| VoxrelayError::AudioCapture {
                message: format!("Failed to write WAV file {}: {}", path.display(), e),
            })?;
    }
    writer.finalize().map_err(|e| VoxrelayError::AudioCapture {
        message: format!("Failed to finalize WAV file {}: {}", path.display(), e),
    })?;

    Ok(())
}

/// Build the filename for the clip at `index`.
pub fn clip_filename(index: u64) -> String {
    format!("{}{}.{}", defaults::CLIP_PREFIX, index, defaults::CLIP_EXT)
}

/// Parse the index out of a clip filename.
///
/// Returns `None` when the name does not follow the `audio_<index>.wav`
/// pattern with a purely numeric index.
pub fn clip_index(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(defaults::CLIP_PREFIX)?
        .strip_suffix(defaults::CLIP_EXT)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Check whether a filename matches the clip naming pattern.
pub fn is_clip_file(name: &str) -> bool {
    clip_index(name).is_some()
}

/// Delete a single clip file.
pub fn remove_clip(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}

/// Remove every clip file in `dir`, returning how many were deleted.
///
/// Failures are logged and skipped so a single stubborn file cannot stall
/// shutdown.
pub fn sweep_clips(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to scan {} for leftover clips: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_clip_file(name) {
            continue;
        }

        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed leftover clip {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove clip {}: {}", path.display(), e),
        }
    }
    removed
}
