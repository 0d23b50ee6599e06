//! Capture scheduler
//!
//! Background loop that drains the frame queue and runs each frame through
//! analysis, fusion and change detection.

use image::DynamicImage;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::analyzer::FrameAnalyzer;
use super::calibrate::{CalibrationStrategy, Calibrator};
use super::capture::{frames_differ, Frame, FrameBuffer, FrameQueue};
use super::extract::FieldExtractor;
use super::ocr::OcrEngine;
use super::preprocess::Preprocessor;
use crate::config::PipelineConfig;
use crate::core::{
    AnalysisSnapshot, CaptureRecord, RecordSink, RegionSet, SchedulerState, SchedulerStats,
    SnapshotCallback,
};
use crate::fusion::{ChangeDetector, FusionThresholds, TemporalFuser};
use crate::logging::{Logger, debug, error, info, warn};
use crate::{Error, Result};

/// Poll step while `stop` waits for the worker
const STOP_POLL: Duration = Duration::from_millis(5);

/// Drives the capture pipeline on a dedicated worker thread
pub struct CaptureScheduler {
    config: PipelineConfig,
    engine: Arc<dyn OcrEngine>,
    log: Logger,
    /// Current state
    state: Arc<Mutex<SchedulerState>>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Worker thread handle
    worker: Option<JoinHandle<()>>,
    /// Installed layout, read-only while running
    regions: Option<Arc<RegionSet>>,
    queue: FrameQueue,
    last_result: Arc<Mutex<Option<AnalysisSnapshot>>>,
    stats: Arc<Mutex<SchedulerStats>>,
    sink: Option<RecordSink>,
}

impl CaptureScheduler {
    pub fn new(config: PipelineConfig, engine: Arc<dyn OcrEngine>, log: Logger) -> Self {
        let queue = FrameQueue::new(config.queue_capacity);
        Self {
            config,
            engine,
            log: log.scoped("scheduler"),
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            regions: None,
            queue,
            last_result: Arc::new(Mutex::new(None)),
            stats: Arc::new(Mutex::new(SchedulerStats::default())),
            sink: None,
        }
    }

    /// Consume frames from an existing queue instead of a private one
    pub fn with_queue(mut self, queue: FrameQueue) -> Self {
        self.queue = queue;
        self
    }

    /// Hand a [`CaptureRecord`] to `sink` for every frame with a detected change
    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&CaptureRecord) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Derive and install a region set from `template`.
    ///
    /// Not allowed while running. On failure the previous region set stays.
    pub fn calibrate(&mut self, template: &DynamicImage, strategy: CalibrationStrategy<'_>) -> Result<()> {
        self.ensure_idle("calibrate")?;
        let regions = self.calibrator().calibrate(template, strategy)?;
        self.regions = Some(Arc::new(regions));
        Ok(())
    }

    /// [`calibrate`](Self::calibrate) from an encoded image
    pub fn calibrate_bytes(&mut self, bytes: &[u8], strategy: CalibrationStrategy<'_>) -> Result<()> {
        self.ensure_idle("calibrate")?;
        let regions = self.calibrator().calibrate_bytes(bytes, strategy)?;
        self.regions = Some(Arc::new(regions));
        Ok(())
    }

    /// Install a region set built elsewhere; it replaces the current one whole
    pub fn install_regions(&mut self, regions: RegionSet) -> Result<()> {
        self.ensure_idle("install regions")?;
        info!(self.log, "Installed {} regions", regions.len());
        self.regions = Some(Arc::new(regions));
        Ok(())
    }

    /// Start the worker.
    ///
    /// Fails without a calibrated region set, and when already running (the
    /// running worker is left alone). Fusion history starts empty.
    pub fn start(&mut self, callback: Option<SnapshotCallback>) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            warn!(self.log, "Start requested while already running");
            return Err(Error::AlreadyRunning);
        }
        let regions = self.regions.clone().ok_or(Error::NotCalibrated)?;

        // A worker that outlived its stop timeout may still be winding down
        if let Some(handle) = self.worker.take() {
            if !handle.is_finished() {
                self.worker = Some(handle);
                return Err(Error::Busy("previous worker has not exited yet".to_string()));
            }
            let _ = handle.join();
        }

        let worker = Worker {
            running: self.running.clone(),
            queue: self.queue.clone(),
            regions,
            analyzer: self.analyzer(),
            fuser: TemporalFuser::new(
                FusionThresholds {
                    scalar: self.config.confidence_threshold_scalar,
                    cards: self.config.confidence_threshold_cards,
                },
                self.config.history_size,
            ),
            detector: ChangeDetector::new(self.config.pot_change_delta, self.config.stack_change_delta),
            buffer: FrameBuffer::new(self.config.frame_buffer_size),
            last_result: self.last_result.clone(),
            stats: self.stats.clone(),
            callback,
            sink: self.sink.clone(),
            poll_interval: self.config.poll_interval(),
            skip_unchanged: self.config.skip_unchanged_frames,
            frame_similarity: self.config.frame_similarity,
            log: self.log.clone(),
        };

        self.running.store(true, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("capture-scheduler".to_string())
            .spawn(move || worker.run());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(Error::Io(e));
            }
        };

        self.worker = Some(handle);
        *self.state.lock() = SchedulerState::Running;
        info!(self.log, "Capture scheduler started");
        Ok(())
    }

    /// Stop the worker, waiting up to the configured timeout.
    ///
    /// Safe to call when not running. The in-flight frame is finished first.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            handle.thread().unpark();
            let deadline = Instant::now() + self.config.stop_timeout();
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(STOP_POLL);
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!(self.log, "Capture worker panicked");
                }
            } else {
                warn!(
                    self.log,
                    "Capture worker still busy after {}ms, leaving it to finish",
                    self.config.stop_timeout_ms
                );
                self.worker = Some(handle);
            }
        }

        *self.state.lock() = SchedulerState::Idle;
        if was_running {
            info!(self.log, "Capture scheduler stopped");
        }
    }

    /// Queue a frame for analysis. `false` if an older frame was evicted.
    pub fn enqueue(&self, frame: Frame) -> bool {
        let clean = self.queue.push(frame);
        if !clean {
            warn!(self.log, "Frame queue full, dropped oldest frame");
        }
        clean
    }

    /// Producer handle to the inbound queue
    pub fn queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    /// Copy of the latest fused snapshot
    pub fn last_result(&self) -> Option<AnalysisSnapshot> {
        self.last_result.lock().clone()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.lock().clone();
        stats.frames_dropped = self.queue.dropped();
        stats
    }

    pub fn regions(&self) -> Option<&RegionSet> {
        self.regions.as_deref()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn ensure_idle(&self, what: &str) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(Error::Busy(format!("cannot {} while running", what)));
        }
        Ok(())
    }

    fn calibrator(&self) -> Calibrator {
        Calibrator::new(self.config.min_template_dimension, self.log.scoped("calibrate"))
            .with_match_threshold(self.config.template_match_threshold as f32)
    }

    fn analyzer(&self) -> FrameAnalyzer {
        let extractor = FieldExtractor::new(
            self.engine.clone(),
            self.config.extract.clone(),
            self.log.scoped("extract"),
        );
        FrameAnalyzer::new(
            Preprocessor::new(self.config.preprocess.clone()),
            extractor,
            self.log.scoped("analyzer"),
        )
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread owns
struct Worker {
    running: Arc<AtomicBool>,
    queue: FrameQueue,
    regions: Arc<RegionSet>,
    analyzer: FrameAnalyzer,
    fuser: TemporalFuser,
    detector: ChangeDetector,
    buffer: FrameBuffer,
    last_result: Arc<Mutex<Option<AnalysisSnapshot>>>,
    stats: Arc<Mutex<SchedulerStats>>,
    callback: Option<SnapshotCallback>,
    sink: Option<RecordSink>,
    poll_interval: Duration,
    skip_unchanged: bool,
    frame_similarity: f64,
    log: Logger,
}

impl Worker {
    /// Main capture loop
    fn run(mut self) {
        debug!(self.log, "Worker running with {} regions", self.regions.len());

        while self.running.load(Ordering::SeqCst) {
            let frames = self.queue.drain();
            if frames.is_empty() {
                self.stats.lock().idle_polls += 1;
                thread::park_timeout(self.poll_interval);
                continue;
            }

            let mut pending = frames.into_iter();
            while let Some(frame) = pending.next() {
                self.process(frame);
                if !self.running.load(Ordering::SeqCst) {
                    self.queue.requeue_front(pending.by_ref().collect());
                    break;
                }
            }
        }

        debug!(self.log, "Worker exiting");
    }

    fn process(&mut self, frame: Frame) {
        let started = Instant::now();

        if self.skip_unchanged {
            let unchanged = self
                .buffer
                .latest()
                .map(|last| !frames_differ(last.image(), frame.image(), self.frame_similarity))
                .unwrap_or(false);
            if unchanged {
                self.stats.lock().frames_skipped += 1;
                self.buffer.push(frame);
                return;
            }
        }
        self.buffer.push(frame.clone());

        let analysis = self.analyzer.analyze_frame(&frame, &self.regions);
        let fused = self.fuser.fuse(analysis.snapshot);
        let changes = self.detector.detect_latest(self.fuser.history());
        *self.last_result.lock() = Some(fused.clone());

        {
            let mut stats = self.stats.lock();
            stats.frames_processed += 1;
            stats.region_failures += analysis.region_failures as u64;
            stats.last_processing_ms = started.elapsed().as_millis() as u64;
            stats.action_timing = self.fuser.history().action_timing();
        }

        if !changes.is_empty() {
            debug!(
                self.log,
                "Frame {}: changes {:?}",
                fused.timestamp_ms,
                changes.detected_kinds()
            );
        }

        if let Some(callback) = &self.callback {
            if catch_unwind(AssertUnwindSafe(|| callback(&fused, &changes))).is_err() {
                error!(self.log, "Snapshot callback panicked");
            }
        }

        if changes.any_detected() {
            if let Some(sink) = &self.sink {
                let record = CaptureRecord::from(&fused);
                if catch_unwind(AssertUnwindSafe(|| sink(&record))).is_err() {
                    error!(self.log, "Record sink panicked");
                }
            }
        }
    }
}
