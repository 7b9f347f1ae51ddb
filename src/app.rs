//! Speech relay application entry point.
//!
//! Orchestrates the complete relay flow:
//! record → transcribe → deliver

use crate::audio::capture::{CpalAudioSource, suppress_audio_warnings};
use crate::audio::clip::{MicClipWriter, sweep_clips};
use crate::config::Config;
use crate::defaults;
use crate::pipeline::Pipeline;
use crate::sink::HttpResultSink;
use crate::stt::engine::{EngineConfig, RecognizerEngine};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Run the relay pipeline until interrupted.
///
/// Captures clips from the default microphone, transcribes them through the
/// configured recognizer, and POSTs the text to the delivery host. Blocks
/// until Ctrl+C arrives and every queued clip has been drained, then sweeps
/// leftover clip files from `work_dir`.
pub async fn run_pipeline(config: Config, work_dir: &Path) -> anyhow::Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    config.validate()?;
    let host = config.require_host()?;

    let source = CpalAudioSource::new(config.audio.sample_rate, config.audio.channels)?;
    let writer = MicClipWriter::new(source, work_dir)
        .with_sample_rate(config.audio.sample_rate)
        .with_channels(config.audio.channels)
        .with_clip_secs(config.audio.clip_secs);

    let engine = RecognizerEngine::system(EngineConfig {
        executable: config.recognizer.executable.clone(),
        model: config.recognizer.model.clone(),
        language: config.recognizer.language.clone(),
    });

    let sink = HttpResultSink::new(host)?;

    let pipeline = Arc::new(
        Pipeline::new(Box::new(writer), Arc::new(engine), Arc::new(sink))
            .with_work_dir(work_dir),
    );

    info!(
        "Relaying speech to http://{}:{}{} ({}s clips, language {})",
        host,
        defaults::API_PORT,
        defaults::API_ROUTE,
        config.audio.clip_secs,
        config.recognizer.language
    );

    // Stop on Ctrl+C; the run itself happens on a blocking thread. The
    // listener loops so a signal landing before the pipeline is running,
    // or a repeat press during a long drain, still requests a stop.
    let interrupted = pipeline.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            info!("Interrupt received; shutting down");
            interrupted.stop();
        }
    });

    let runner = pipeline.clone();
    let run_result = tokio::task::spawn_blocking(move || runner.start()).await;

    let removed = pipeline.exit();
    if removed > 0 {
        info!("Removed {} leftover clip file(s)", removed);
    }

    let start_result = run_result.context("pipeline thread panicked")?;
    start_result?;
    Ok(())
}

/// Delete leftover clip files from `dir`.
pub fn run_clean(dir: &Path) -> anyhow::Result<()> {
    let removed = sweep_clips(dir);
    println!("Removed {} clip file(s) from {}", removed, dir.display());
    Ok(())
}

/// Print the effective configuration as TOML.
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
