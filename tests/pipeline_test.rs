//! End-to-end tests of the capture pipeline with a scripted OCR engine

use image::{DynamicImage, GrayImage, RgbImage};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tablesight::core::region::names;
use tablesight::vision::{OcrOutput, PageSegMode};
use tablesight::{
    AnalysisSnapshot, CalibrationStrategy, CaptureRecord, CaptureScheduler, ChangeDetector,
    ChangeKind, ChangeSet, Error, FieldReading, Frame, FusionThresholds, Logger, OcrEngine,
    PipelineConfig, Region, RegionKind, RegionSet, SchedulerState, TemporalFuser,
};

/// Hands out scripted outputs per (image width, mode), oldest first
#[derive(Default)]
struct ScriptedEngine {
    script: Mutex<HashMap<(u32, PageSegMode), VecDeque<OcrOutput>>>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    fn script(self, width: u32, mode: PageSegMode, outputs: Vec<OcrOutput>) -> Self {
        self.script.lock().insert((width, mode), outputs.into());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for ScriptedEngine {
    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> tablesight::Result<OcrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        Ok(script
            .get_mut(&(image.width(), mode))
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }
}

const HOLE_WIDTH: u32 = 20;
const POT_WIDTH: u32 = 30;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        poll_interval_ms: 10,
        ..Default::default()
    }
}

fn table_regions() -> RegionSet {
    RegionSet::from_regions(vec![
        Region::new(names::HOLE_CARDS, 0, 0, HOLE_WIDTH, 20, RegionKind::Cards),
        Region::new(names::POT, 30, 0, POT_WIDTH, 20, RegionKind::Numeric),
    ])
    .unwrap()
}

fn blank_frame(ts: u64) -> Frame {
    Frame::with_timestamp(DynamicImage::ImageRgb8(RgbImage::new(100, 60)), ts)
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

type Seen = Arc<Mutex<Vec<(AnalysisSnapshot, ChangeSet)>>>;

fn collecting_callback() -> (Seen, tablesight::SnapshotCallback) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: tablesight::SnapshotCallback = Arc::new(move |snapshot: &AnalysisSnapshot, changes: &ChangeSet| {
        sink.lock().push((snapshot.clone(), changes.clone()));
    });
    (seen, callback)
}

#[test]
fn test_proportional_calibration_scenario() {
    init_logger();
    let mut scheduler = CaptureScheduler::new(test_config(), Arc::new(ScriptedEngine::default()), Logger::default());
    let template = DynamicImage::ImageRgb8(RgbImage::new(900, 600));
    scheduler.calibrate(&template, CalibrationStrategy::Proportional).unwrap();

    let hole = scheduler.regions().unwrap().get(names::HOLE_CARDS).unwrap();
    assert_eq!((hole.top, hole.left, hole.width, hole.height), (0, 0, 300, 300));
}

#[test]
fn test_fusion_and_change_scenario() {
    init_logger();
    let engine = ScriptedEngine::default()
        .script(
            POT_WIDTH,
            PageSegMode::Block,
            vec![OcrOutput::word("50", 80.0), OcrOutput::word("10", 20.0)],
        )
        .script(
            POT_WIDTH,
            PageSegMode::SingleLine,
            vec![OcrOutput::word("52", 60.0), OcrOutput::default()],
        )
        .script(
            HOLE_WIDTH,
            PageSegMode::SingleWord,
            vec![OcrOutput::default(), OcrOutput::word("Ah Kd", 90.0)],
        );

    let records: Arc<Mutex<Vec<CaptureRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let record_sink = records.clone();
    let mut scheduler = CaptureScheduler::new(test_config(), Arc::new(engine), Logger::default())
        .with_sink(move |record| record_sink.lock().push(record.clone()));
    scheduler.install_regions(table_regions()).unwrap();

    scheduler.enqueue(blank_frame(1_000));
    scheduler.enqueue(blank_frame(1_250));

    let (seen, callback) = collecting_callback();
    scheduler.start(Some(callback)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || seen.lock().len() == 2));
    scheduler.stop();

    let seen = seen.lock();
    let (first, first_changes) = &seen[0];
    assert!((first.pot.value - 50.857).abs() < 0.001);
    assert!((first.pot.confidence - 0.7).abs() < 1e-9);
    assert!(first.hole_cards.value.is_empty());
    assert!(first_changes.is_empty());

    let (second, second_changes) = &seen[1];
    assert!((second.pot.value - 50.857).abs() < 0.001);
    assert_eq!(second.hole_cards.value.len(), 2);
    assert!(second_changes.detected(ChangeKind::NewCards));
    assert!(!second_changes.detected(ChangeKind::PotChanged));

    let last = scheduler.last_result().unwrap();
    assert_eq!(last.timestamp_ms, 1_250);

    let records = records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hole_cards.len(), 2);
    assert!(records[0].to_json().unwrap().contains("\"pot_size\""));

    let stats = scheduler.stats();
    assert_eq!(stats.frames_processed, 2);
    assert_eq!(stats.action_timing.unwrap().average_ms, 250.0);
}

#[test]
fn test_delta_exactly_threshold_does_not_fire() {
    let mut prev = AnalysisSnapshot::empty(1);
    let mut curr = AnalysisSnapshot::empty(2);
    prev.pot = FieldReading::new(20.0, 0.9);
    curr.pot = FieldReading::new(20.1, 0.9);

    let changes = ChangeDetector::default().detect_changes(&prev, &curr);
    assert!(!changes.detected(ChangeKind::PotChanged));
}

#[test]
fn test_history_stays_bounded() {
    let mut fuser = TemporalFuser::new(FusionThresholds::default(), 10);
    for ts in 0..15 {
        fuser.fuse(AnalysisSnapshot::empty(ts));
        assert!(fuser.history().len() <= 10);
    }
    assert_eq!(fuser.history().len(), 10);
}

#[test]
fn test_idle_worker_does_not_spin() {
    init_logger();
    let engine = Arc::new(ScriptedEngine::default());
    let config = PipelineConfig {
        poll_interval_ms: 20,
        ..Default::default()
    };
    let mut scheduler = CaptureScheduler::new(config, engine.clone(), Logger::default());
    scheduler.install_regions(table_regions()).unwrap();

    scheduler.start(None).unwrap();
    thread::sleep(Duration::from_millis(200));
    scheduler.stop();

    let stats = scheduler.stats();
    assert_eq!(engine.calls(), 0);
    assert_eq!(stats.frames_processed, 0);
    assert!(stats.idle_polls >= 1);
    // 200ms / 20ms plus slack for scheduling jitter
    assert!(stats.idle_polls <= 15, "idle polls: {}", stats.idle_polls);
}

#[test]
fn test_scheduler_misuse() {
    init_logger();
    let mut scheduler = CaptureScheduler::new(test_config(), Arc::new(ScriptedEngine::default()), Logger::default());

    scheduler.stop();
    assert!(matches!(scheduler.start(None), Err(Error::NotCalibrated)));

    scheduler.install_regions(table_regions()).unwrap();
    scheduler.start(None).unwrap();
    assert!(matches!(scheduler.start(None), Err(Error::AlreadyRunning)));
    assert!(scheduler.is_running());
    assert_eq!(scheduler.state(), SchedulerState::Running);

    let template = DynamicImage::ImageRgb8(RgbImage::new(900, 600));
    assert!(matches!(
        scheduler.calibrate(&template, CalibrationStrategy::Proportional),
        Err(Error::Busy(_))
    ));

    scheduler.stop();
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    // Restart after stop
    scheduler.start(None).unwrap();
    scheduler.stop();
}

#[test]
fn test_panicking_callback_does_not_stop_worker() {
    init_logger();
    let mut scheduler = CaptureScheduler::new(test_config(), Arc::new(ScriptedEngine::default()), Logger::default());
    scheduler.install_regions(table_regions()).unwrap();

    let callback: tablesight::SnapshotCallback = Arc::new(|snapshot: &AnalysisSnapshot, _: &ChangeSet| {
        if snapshot.timestamp_ms == 1 {
            panic!("consumer bug");
        }
    });
    scheduler.enqueue(blank_frame(1));
    scheduler.enqueue(blank_frame(2));
    scheduler.start(Some(callback)).unwrap();

    assert!(wait_until(Duration::from_secs(5), || scheduler.stats().frames_processed == 2));
    assert!(scheduler.is_running());
    scheduler.stop();
    assert_eq!(scheduler.last_result().unwrap().timestamp_ms, 2);
}

#[test]
fn test_unchanged_frames_skipped() {
    init_logger();
    let config = PipelineConfig {
        skip_unchanged_frames: true,
        ..test_config()
    };
    let mut scheduler = CaptureScheduler::new(config, Arc::new(ScriptedEngine::default()), Logger::default());
    scheduler.install_regions(table_regions()).unwrap();

    for ts in 0..3 {
        scheduler.enqueue(blank_frame(ts));
    }
    scheduler.start(None).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        let stats = scheduler.stats();
        stats.frames_processed + stats.frames_skipped == 3
    }));
    scheduler.stop();

    let stats = scheduler.stats();
    assert_eq!(stats.frames_processed, 1);
    assert_eq!(stats.frames_skipped, 2);
}

#[test]
fn test_full_queue_drops_oldest() {
    init_logger();
    let config = PipelineConfig {
        queue_capacity: 2,
        ..test_config()
    };
    let (seen, callback) = collecting_callback();
    let mut scheduler = CaptureScheduler::new(config, Arc::new(ScriptedEngine::default()), Logger::default());
    scheduler.install_regions(table_regions()).unwrap();

    assert!(scheduler.enqueue(blank_frame(1)));
    assert!(scheduler.enqueue(blank_frame(2)));
    assert!(!scheduler.enqueue(blank_frame(3)));

    scheduler.start(Some(callback)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || seen.lock().len() == 2));
    scheduler.stop();

    let order: Vec<u64> = seen.lock().iter().map(|(s, _)| s.timestamp_ms).collect();
    assert_eq!(order, vec![2, 3]);
    assert_eq!(scheduler.stats().frames_dropped, 1);
}

/// Takes `delay` for every recognition, counting calls as they start
struct SlowEngine {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowEngine {
    fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for SlowEngine {
    fn recognize(&self, _image: &GrayImage, _mode: PageSegMode) -> tablesight::Result<OcrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        Ok(OcrOutput::default())
    }
}

/// One position region, read in a single OCR call per frame
fn position_only() -> RegionSet {
    RegionSet::from_regions(vec![Region::new(names::POSITION, 0, 0, 40, 20, RegionKind::Position)]).unwrap()
}

#[test]
fn test_stop_mid_drain_requeues_remaining_frames() {
    init_logger();
    let engine = SlowEngine::new(100);
    let config = PipelineConfig {
        stop_timeout_ms: 2_000,
        ..test_config()
    };
    let mut scheduler = CaptureScheduler::new(config, engine.clone(), Logger::default());
    scheduler.install_regions(position_only()).unwrap();
    for ts in 1..=5 {
        scheduler.enqueue(blank_frame(ts));
    }

    scheduler.start(None).unwrap();
    assert!(wait_until(Duration::from_secs(5), || engine.calls() >= 1));
    scheduler.stop();

    assert_eq!(scheduler.state(), SchedulerState::Idle);
    // The in-flight frame completes, nothing after it is started
    assert_eq!(scheduler.stats().frames_processed, 1);
    assert_eq!(scheduler.last_result().unwrap().timestamp_ms, 1);

    let requeued: Vec<u64> = scheduler.queue().drain().iter().map(Frame::timestamp_ms).collect();
    assert_eq!(requeued, vec![2, 3, 4, 5]);
}

#[test]
fn test_restart_busy_until_slow_worker_exits() {
    init_logger();
    let engine = SlowEngine::new(400);
    let config = PipelineConfig {
        stop_timeout_ms: 50,
        ..test_config()
    };
    let mut scheduler = CaptureScheduler::new(config, engine.clone(), Logger::default());
    scheduler.install_regions(position_only()).unwrap();
    scheduler.enqueue(blank_frame(1));

    scheduler.start(None).unwrap();
    assert!(wait_until(Duration::from_secs(5), || engine.calls() >= 1));
    scheduler.stop();
    assert!(!scheduler.is_running());

    assert!(matches!(scheduler.start(None), Err(Error::Busy(_))));
    assert!(wait_until(Duration::from_secs(5), || scheduler.start(None).is_ok()));
    assert!(scheduler.is_running());
    scheduler.stop();
    assert_eq!(scheduler.stats().frames_processed, 1);
}
