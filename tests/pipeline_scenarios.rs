use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;

use blindgate::{
    build_pipeline, AlertPipeline, AlertPolicy, BoundingBox, ColorFrame, DepthFrame, DepthMode,
    Detection, DetectionPipeline, DetectorBackend, HapticOutput, PipelineRunner,
    PresentationSink, RawDetection, ScriptStep, ScriptedBackend, SpeechOutput, SpeechState,
    SpeechStatus, SynchronizedFrame, Utterance, UtteranceId, CLOSE_OBJECT_WARNING,
};

// ----------------------------------------------------------------------------
// Recording collaborators
// ----------------------------------------------------------------------------

#[derive(Default)]
struct Recorder {
    spoken: Mutex<Vec<Utterance>>,
    pulses: Mutex<Vec<f32>>,
    summaries: Mutex<Vec<String>>,
    /// When set, every utterance immediately reports `started` and never finishes.
    status: Mutex<Option<SpeechStatus>>,
}

impl Recorder {
    fn reporting(policy: &Arc<AlertPolicy>) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        *recorder.status.lock() = Some(SpeechStatus::new(policy.clone()));
        recorder
    }

    fn texts(&self) -> Vec<String> {
        self.spoken.lock().iter().map(|u| u.text.clone()).collect()
    }

    fn warnings(&self) -> usize {
        self.spoken
            .lock()
            .iter()
            .filter(|u| u.text == CLOSE_OBJECT_WARNING)
            .count()
    }
}

impl SpeechOutput for Recorder {
    fn speak(&self, utterance: Utterance) {
        let id = utterance.id;
        self.spoken.lock().push(utterance);
        if let Some(status) = self.status.lock().as_ref() {
            status.started(id);
        }
    }
}

impl HapticOutput for Recorder {
    fn pulse(&self, intensity: f32) {
        self.pulses.lock().push(intensity);
    }
}

impl PresentationSink for Recorder {
    fn present(&self, summary: &str, _detections: &[Detection]) {
        self.summaries.lock().push(summary.to_string());
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn color(sequence: u64, t: Duration) -> ColorFrame {
    ColorFrame::new(vec![0; 12], 2, 2, t, sequence)
}

fn frame(sequence: u64, t: Duration, depth_m: Option<f32>) -> SynchronizedFrame {
    SynchronizedFrame {
        color: color(sequence, t),
        depth: depth_m.map(|m| Arc::new(DepthFrame::filled(16, 12, m, t).expect("depth frame"))),
    }
}

fn chair() -> RawDetection {
    RawDetection::new("chair", 0.9, BoundingBox::new(0.4, 0.4, 0.2, 0.2))
}

fn pipeline_with(
    script: Vec<ScriptStep>,
    policy: &Arc<AlertPolicy>,
    recorder: &Arc<Recorder>,
) -> AlertPipeline {
    build_pipeline(
        DetectionPipeline::new(Box::new(ScriptedBackend::new(script))),
        policy.clone(),
        recorder.clone(),
        recorder.clone(),
        recorder.clone(),
        Default::default(),
    )
}

// ----------------------------------------------------------------------------
// Per-frame behavior
// ----------------------------------------------------------------------------

#[test]
fn label_is_announced_again_only_after_debounce() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let script = vec![ScriptStep::Detections(vec![chair()]); 3];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    let announced: Vec<Vec<String>> = [0.0, 1.0, 3.1]
        .iter()
        .enumerate()
        .map(|(i, &t)| pipeline.process(frame(i as u64, secs(t), None)).announced)
        .collect();

    assert_eq!(announced[0], vec!["Chair".to_string()]);
    assert!(announced[1].is_empty());
    assert_eq!(announced[2], vec!["Chair".to_string()]);
    assert_eq!(recorder.texts(), vec!["Chair", "Chair"]);
    assert_eq!(policy.last_announced("Chair"), Some(secs(3.1)));
}

#[test]
fn warning_is_suppressed_while_speaking_but_haptic_still_fires() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Recorder::reporting(&policy);
    let script = vec![ScriptStep::Detections(vec![chair()]); 3];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    // Idle: warning spoken, then the label is announced.
    let first = pipeline.process(frame(0, secs(0.0), Some(0.5)));
    assert!(first.haptic);
    assert!(first.warning_spoken);
    assert_eq!(first.near, 1);
    assert_eq!(recorder.texts(), vec![CLOSE_OBJECT_WARNING, "Chair"]);
    assert_eq!(policy.speech_state(), SpeechState::Speaking(UtteranceId(2)));

    // Still speaking: haptic only, no new speech.
    let second = pipeline.process(frame(1, secs(0.5), Some(0.5)));
    assert!(second.haptic);
    assert!(!second.warning_spoken);
    assert_eq!(recorder.warnings(), 1);
    assert_eq!(recorder.pulses.lock().len(), 2);

    // A completion for an older utterance does not free the channel.
    policy.on_utterance_event(blindgate::UtteranceEvent::Finished(UtteranceId(1)));
    assert!(policy.is_speaking());

    SpeechStatus::new(policy.clone()).finished(UtteranceId(2));
    let third = pipeline.process(frame(2, secs(1.0), Some(0.5)));
    assert!(third.warning_spoken);
    assert_eq!(recorder.warnings(), 2);
}

#[test]
fn far_object_triggers_nothing() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let script = vec![ScriptStep::Detections(vec![chair()])];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    let report = pipeline.process(frame(0, secs(0.0), Some(1.0)));
    assert_eq!(report.near, 0);
    assert!(!report.haptic);
    assert!(recorder.pulses.lock().is_empty());
    assert_eq!(recorder.warnings(), 0);
}

#[test]
fn center_outside_depth_grid_is_unavailable() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let outside = RawDetection::new("bench", 0.95, BoundingBox::new(5000.0, 5000.0, 0.0, 0.0));
    let script = vec![ScriptStep::Detections(vec![outside])];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    let report = pipeline.process(frame(0, secs(0.0), Some(0.2)));
    assert_eq!(report.unavailable, 1);
    assert_eq!(report.near, 0);
    assert!(!report.haptic);
    // Still announced; proximity is independent of speech debounce.
    assert_eq!(report.announced, vec!["Bench".to_string()]);
}

#[test]
fn frames_without_depth_skip_proximity() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let script = vec![ScriptStep::Detections(vec![chair()])];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    let report = pipeline.process(frame(0, secs(0.0), None));
    assert_eq!((report.near, report.unavailable), (0, 0));
    assert!(!report.haptic);
    assert_eq!(report.announced, vec!["Chair".to_string()]);
}

#[test]
fn inference_failure_yields_empty_frame_and_processing_continues() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let script = vec![
        ScriptStep::Failure("model timeout".into()),
        ScriptStep::Detections(vec![chair()]),
    ];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    let failed = pipeline.process(frame(0, secs(0.0), None));
    assert!(failed.detections.is_empty());
    assert!(failed.announced.is_empty());

    let next = pipeline.process(frame(1, secs(0.1), None));
    assert_eq!(next.announced, vec!["Chair".to_string()]);

    let stats = pipeline.detection_stats();
    assert_eq!(stats.frames_processed, 2);
    assert_eq!(stats.inference_failures, 1);
    // Presentation sees every processed frame, including the empty one.
    assert_eq!(
        *recorder.summaries.lock(),
        vec!["".to_string(), "Chair (90%)".to_string()]
    );
}

#[test]
fn detections_are_filtered_ranked_and_capped() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let bbox = BoundingBox::new(0.1, 0.1, 0.1, 0.1);
    let raw = vec![
        RawDetection::new("cup", 0.6, bbox),
        RawDetection::new("dog", 0.7, bbox),
        RawDetection::new("traffic light", 0.95, bbox),
        RawDetection::new("person", 0.8, bbox),
        RawDetection::new("bicycle", 0.65, bbox),
    ];
    let mut pipeline = pipeline_with(vec![ScriptStep::Detections(raw)], &policy, &recorder);

    let report = pipeline.process(frame(0, secs(0.0), None));
    let labels: Vec<&str> = report.detections.labels().collect();
    assert_eq!(labels, vec!["Traffic Light", "Person", "Dog"]);
    assert_eq!(report.announced, vec!["Traffic Light", "Person", "Dog"]);
    assert_eq!(
        *recorder.summaries.lock(),
        vec!["Traffic Light (95%), Person (80%), Dog (70%)".to_string()]
    );
}

#[test]
fn disabled_detector_produces_empty_frames() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = build_pipeline(
        DetectionPipeline::disabled("no model"),
        policy.clone(),
        recorder.clone(),
        recorder.clone(),
        recorder.clone(),
        Default::default(),
    );

    let report = pipeline.process(frame(0, secs(0.0), Some(0.2)));
    assert!(report.detections.is_empty());
    assert!(!report.haptic);
    assert!(recorder.spoken.lock().is_empty());
    assert_eq!(pipeline.detection_stats().frames_processed, 0);
}

#[test]
fn out_of_grid_detection_leaves_other_detections_alone() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let outside = RawDetection::new("bench", 0.95, BoundingBox::new(5000.0, 5000.0, 0.0, 0.0));
    let script = vec![ScriptStep::Detections(vec![outside, chair()])];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    let report = pipeline.process(frame(0, secs(0.0), Some(0.5)));
    assert_eq!(report.unavailable, 1);
    assert_eq!(report.near, 1);
    assert!(report.haptic);
    assert!(report.warning_spoken);
    assert_eq!(*recorder.pulses.lock(), vec![1.0]);
    assert_eq!(report.announced, vec!["Bench", "Chair"]);
}

#[test]
fn unconfirmed_speech_does_not_block_later_warnings() {
    let policy = Arc::new(AlertPolicy::new());
    // Never reports `started`: the audio collaborator stays silent.
    let recorder = Arc::new(Recorder::default());
    let script = vec![ScriptStep::Detections(vec![chair()]); 2];
    let mut pipeline = pipeline_with(script, &policy, &recorder);

    let first = pipeline.process(frame(0, secs(0.0), Some(0.5)));
    assert!(first.warning_spoken);
    assert_eq!(policy.speech_state(), SpeechState::Idle);

    let second = pipeline.process(frame(1, secs(0.5), Some(0.5)));
    assert!(second.haptic);
    assert!(second.warning_spoken);
    assert_eq!(recorder.warnings(), 2);
}

// ----------------------------------------------------------------------------
// Runner
// ----------------------------------------------------------------------------

/// Backend that blocks each inference until released.
struct GatedBackend {
    release: Receiver<()>,
}

impl DetectorBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn detect(&mut self, _frame: &ColorFrame) -> Result<Vec<RawDetection>> {
        let _ = self.release.recv();
        Ok(vec![chair()])
    }
}

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn runner_drops_frames_while_worker_is_busy() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let (release_tx, release_rx) = bounded(4);
    let pipeline = build_pipeline(
        DetectionPipeline::new(Box::new(GatedBackend { release: release_rx })),
        policy.clone(),
        recorder.clone(),
        recorder.clone(),
        recorder.clone(),
        Default::default(),
    );
    let (report_tx, report_rx) = bounded(8);
    let runner = PipelineRunner::spawn_with_reports(pipeline, DepthMode::Disabled, report_tx)
        .expect("spawn");
    let capture = runner.capture_handle();

    capture.on_color_frame(color(0, secs(0.0)));
    capture.on_color_frame(color(1, secs(0.03)));
    capture.on_color_frame(color(2, secs(0.06)));
    assert_eq!(runner.stats().dropped_busy, 2);

    release_tx.send(()).expect("release");
    let report = report_rx.recv_timeout(REPORT_TIMEOUT).expect("first report");
    assert_eq!(report.sequence, 0);

    // Worker is free again once the report is out.
    capture.on_color_frame(color(3, secs(0.1)));
    release_tx.send(()).expect("release");
    let report = report_rx.recv_timeout(REPORT_TIMEOUT).expect("second report");
    assert_eq!(report.sequence, 3);

    let stats = runner.stop().expect("stop");
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.dropped_busy, 2);
    assert_eq!(stats.sync.color_received, 4);
    assert_eq!(stats.detection.map(|d| d.frames_processed), Some(2));
}

#[test]
fn runner_waits_for_first_depth_frame() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let script = vec![ScriptStep::Detections(vec![chair()])];
    let pipeline = pipeline_with(script, &policy, &recorder);
    let (report_tx, report_rx) = bounded(8);
    let runner = PipelineRunner::spawn_with_reports(pipeline, DepthMode::Enabled, report_tx)
        .expect("spawn");
    let capture = runner.capture_handle();

    capture.on_color_frame(color(0, secs(0.0)));
    assert_eq!(runner.stats().sync.dropped_before_depth, 1);

    capture.on_depth_frame(DepthFrame::filled(16, 12, 0.4, secs(0.01)).expect("depth"));
    capture.on_color_frame(color(1, secs(0.03)));
    let report = report_rx.recv_timeout(REPORT_TIMEOUT).expect("report");
    assert_eq!(report.sequence, 1);
    assert_eq!(report.near, 1);
    assert!(report.haptic);

    let stats = runner.stop().expect("stop");
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.sync.emitted, 1);
    assert_eq!(recorder.pulses.lock().len(), 1);
}

fn wait_for_processed(runner: &PipelineRunner, count: u64) {
    let deadline = std::time::Instant::now() + REPORT_TIMEOUT;
    while runner.stats().processed < count {
        assert!(std::time::Instant::now() < deadline, "worker stalled");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn undrained_report_observer_does_not_stall_worker() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let script = vec![ScriptStep::Detections(vec![chair()])];
    let pipeline = pipeline_with(script, &policy, &recorder);
    // Capacity 1 and never read: only the first report fits.
    let (report_tx, _report_rx) = bounded(1);
    let runner = PipelineRunner::spawn_with_reports(pipeline, DepthMode::Disabled, report_tx)
        .expect("spawn");
    let capture = runner.capture_handle();

    for seq in 0..5u64 {
        capture.on_color_frame(color(seq, secs(seq as f64 * 0.05)));
        wait_for_processed(&runner, seq + 1);
    }

    let stats = runner.stop().expect("stop");
    assert_eq!(stats.processed, 5);
    assert_eq!(stats.dropped_busy, 0);
    assert_eq!(stats.reports_dropped, 4);
}

#[test]
fn closed_report_observer_is_counted() {
    let policy = Arc::new(AlertPolicy::new());
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline_with(Vec::new(), &policy, &recorder);
    let (report_tx, report_rx) = bounded(1);
    drop(report_rx);
    let runner = PipelineRunner::spawn_with_reports(pipeline, DepthMode::Disabled, report_tx)
        .expect("spawn");

    runner.capture_handle().on_color_frame(color(0, secs(0.0)));
    wait_for_processed(&runner, 1);

    let stats = runner.stop().expect("stop");
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.reports_dropped, 1);
}
