//! Relay pipeline implementation.
//!
//! Orchestrates the complete speech relay flow:
//! record → transcribe → deliver

use crate::audio::clip::{ClipWriter, remove_clip, sweep_clips};
use crate::error::{Result, VoxrelayError};
use crate::sink::ResultSink;
use crate::stt::TranscriptionEngine;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not capturing; safe to start.
    Idle,
    /// Capture loop and worker are active.
    Running,
    /// Stop requested; worker is draining queued clips.
    Stopping,
}

/// Unit of work handed from the capture loop to the transcription worker.
#[derive(Debug)]
enum WorkItem {
    Clip(PathBuf),
    EndOfStream,
}

/// Continuous capture-transcribe-deliver pipeline.
///
/// [`start`](Pipeline::start) blocks the calling thread with the capture
/// loop while a background worker drains recorded clips in FIFO order.
/// [`stop`](Pipeline::stop) may be called from any thread; queued clips are
/// still transcribed and delivered before the run ends. A clip that finishes
/// recording while a stop is pending is left on disk for
/// [`exit`](Pipeline::exit) to sweep.
pub struct Pipeline {
    writer: Mutex<Box<dyn ClipWriter>>,
    engine: Arc<dyn TranscriptionEngine>,
    sink: Arc<dyn ResultSink>,
    work_dir: PathBuf,
    running: Arc<AtomicBool>,
    state: Mutex<PipelineState>,
    work_tx: Sender<WorkItem>,
    work_rx: Receiver<WorkItem>,
}

impl Pipeline {
    pub fn new(
        writer: Box<dyn ClipWriter>,
        engine: Arc<dyn TranscriptionEngine>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let (work_tx, work_rx) = unbounded();
        Self {
            writer: Mutex::new(writer),
            engine,
            sink,
            work_dir: PathBuf::from("."),
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(PipelineState::Idle),
            work_tx,
            work_rx,
        }
    }

    /// Set the directory swept for leftover clips on [`exit`](Pipeline::exit).
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Run the pipeline until [`stop`](Pipeline::stop) is called.
    ///
    /// Returns once the worker has drained every clip queued before the
    /// end-of-stream marker. Only capture failure aborts the run early;
    /// recognition and delivery failures are logged and the pipeline moves
    /// on to the next clip.
    ///
    /// # Errors
    ///
    /// Returns [`VoxrelayError::AlreadyRunning`] if the pipeline is not
    /// idle, or the capture error that ended the run.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            if *state != PipelineState::Idle {
                return Err(VoxrelayError::AlreadyRunning);
            }
            *state = PipelineState::Running;
            // The flag publishes with the state; stop() can then never
            // observe one without the other.
            self.running.store(true, Ordering::SeqCst);
        }

        let worker = {
            let rx = self.work_rx.clone();
            let engine = Arc::clone(&self.engine);
            let sink = Arc::clone(&self.sink);
            thread::spawn(move || transcription_loop(&rx, engine.as_ref(), sink.as_ref()))
        };

        info!("Pipeline started");

        let capture_result = self.capture_loop();

        if let Err(e) = &capture_result {
            // Capture died on its own; the worker still needs its marker.
            error!("Capture loop aborted: {}", e);
            self.stop();
        }

        if let Err(panic_info) = worker.join() {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            error!("Transcription worker panicked: {}", msg);
        }

        *self.lock_state() = PipelineState::Idle;
        info!("Pipeline stopped");

        capture_result
    }

    /// Ask a running pipeline to finish.
    ///
    /// Capture ends at the next clip boundary and the worker drains what is
    /// already queued. Calling this on a pipeline that is not running is a
    /// no-op.
    pub fn stop(&self) {
        {
            let mut state = self.lock_state();
            if *state != PipelineState::Running {
                debug!("Stop requested but pipeline is not running");
                return;
            }
            *state = PipelineState::Stopping;
            self.running.store(false, Ordering::SeqCst);
            // Unbounded channel, so the send cannot block while the lock
            // is held.
            if self.work_tx.send(WorkItem::EndOfStream).is_err() {
                warn!("Transcription worker is gone; nothing to drain");
            }
        }
        info!("Stop requested; draining queued clips");
    }

    /// Stop the pipeline and delete every clip left in the working directory.
    ///
    /// Returns the number of files removed.
    pub fn exit(&self) -> usize {
        self.stop();
        // stop() is a no-op when idle; the flag must still end up cleared.
        self.running.store(false, Ordering::SeqCst);
        sweep_clips(&self.work_dir)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        *self.lock_state()
    }

    /// True while the capture loop is accepting new clips.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn capture_loop(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        while self.running.load(Ordering::SeqCst) {
            let clip = writer.record_one()?;
            info!("Recorded {}", clip.display());
            if self.work_tx.send(WorkItem::Clip(clip)).is_err() {
                break;
            }
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drain the work queue until the end-of-stream marker.
///
/// Clips queued before the marker are always processed, even when a stop is
/// pending. Clips queued after it stay in the channel untouched.
fn transcription_loop(
    rx: &Receiver<WorkItem>,
    engine: &dyn TranscriptionEngine,
    sink: &dyn ResultSink,
) {
    for item in rx.iter() {
        match item {
            WorkItem::Clip(clip) => process_clip(&clip, engine, sink),
            WorkItem::EndOfStream => break,
        }
    }
    debug!("Transcription worker finished");
}

/// Transcribe one clip, deliver the text, and delete the file.
///
/// The clip file is removed no matter how recognition or delivery went.
fn process_clip(clip: &Path, engine: &dyn TranscriptionEngine, sink: &dyn ResultSink) {
    match engine.transcribe(clip) {
        Ok(text) => {
            info!("Transcribed {}: {}", clip.display(), text);
            sink.deliver(&text);
        }
        Err(e) => {
            error!("Failed to transcribe {}: {}", clip.display(), e);
        }
    }

    if let Err(e) = remove_clip(clip) {
        warn!("Failed to remove {}: {}", clip.display(), e);
    }
}
