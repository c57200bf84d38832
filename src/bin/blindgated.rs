//! blindgated - navigation alert daemon
//!
//! This daemon:
//! 1. Loads configuration (file via BLINDGATE_CONFIG, env overrides, CLI flags)
//! 2. Builds the detection backend and the alert pipeline
//! 3. Streams color (and depth) frames from the synthetic camera
//! 4. Speaks, pulses, and presents through log-backed collaborators
//! 5. Stops on Ctrl-C or after --seconds, then logs final counters

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use blindgate::dispatch::{ConsoleHaptic, ConsolePresentation, ConsoleSpeech};
use blindgate::{
    build_detector, build_pipeline, AlertPolicy, BackendRegistry, BoundingBox, DepthMode,
    PipelineConfig, PipelineRunner, RawDetection, ScriptStep, ScriptedBackend, SessionClock,
    SpeechStatus, SyntheticCamera,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON). Overrides BLINDGATE_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run for this many seconds (0 = until Ctrl-C).
    #[arg(long, default_value_t = 30)]
    seconds: u64,
    /// Color frames per second (overrides config).
    #[arg(long)]
    fps: Option<u32>,
    /// Force the depth stream on.
    #[arg(long, conflicts_with = "no_depth")]
    depth: bool,
    /// Force the depth stream off.
    #[arg(long)]
    no_depth: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load_from(Some(path.as_path()))?,
        None => PipelineConfig::load()?,
    };
    if let Some(fps) = args.fps {
        if fps == 0 {
            anyhow::bail!("fps must be >= 1");
        }
        cfg.camera.fps = fps;
    }
    if args.depth {
        cfg.camera.depth = DepthMode::Enabled;
    }
    if args.no_depth {
        cfg.camera.depth = DepthMode::Disabled;
    }

    let mut registry = BackendRegistry::new();
    registry.register(demo_script());
    let detector = build_detector(&cfg.detector, &cfg.camera, registry);
    let backend_name = detector.backend_name().unwrap_or("disabled");

    let policy = Arc::new(AlertPolicy::new());
    let speech = Arc::new(ConsoleSpeech::spawn(SpeechStatus::new(policy.clone()))?);
    let haptic = Arc::new(ConsoleHaptic::new());
    let pipeline = build_pipeline(
        detector,
        policy.clone(),
        speech,
        haptic.clone(),
        Arc::new(ConsolePresentation::new()),
        cfg.output.clone(),
    );

    let runner = PipelineRunner::spawn(pipeline, cfg.camera.depth)?;
    let clock = SessionClock::start();
    let camera = SyntheticCamera::start(cfg.synthetic_camera(), runner.capture_handle(), clock)?;

    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;

    log::info!(
        "blindgated running (backend={}, depth={:?}, {}s)",
        backend_name,
        cfg.camera.depth,
        args.seconds
    );

    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    loop {
        match rx.recv_timeout(HEALTH_LOG_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        let stats = runner.stats();
        log::info!(
            "health: color={} depth={} processed={} dropped_busy={} dropped_pre_depth={} speaking={} tracked_labels={}",
            stats.sync.color_received,
            stats.sync.depth_received,
            stats.processed,
            stats.dropped_busy,
            stats.sync.dropped_before_depth,
            policy.is_speaking(),
            policy.tracked_labels()
        );
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    let (color_frames, depth_frames) = camera.stop();
    let stats = runner.stop()?;
    log::info!(
        "stopped: camera produced {} color / {} depth frames; processed {}, dropped {} busy + {} before depth; haptic pulses {}",
        color_frames,
        depth_frames,
        stats.processed,
        stats.dropped_busy,
        stats.sync.dropped_before_depth,
        haptic.pulses()
    );
    if let Some(detection) = stats.detection {
        log::info!(
            "detection: {} frames, {} inference failures",
            detection.frames_processed,
            detection.inference_failures
        );
    }
    Ok(())
}

/// Scripted scene matching the synthetic depth stream: a chair straight
/// ahead (where the approaching object is), a person off to the left, and a
/// low-confidence cup that never survives filtering.
fn demo_script() -> ScriptedBackend {
    let chair = RawDetection::new("chair", 0.9, BoundingBox::new(0.4, 0.4, 0.2, 0.2));
    let person = RawDetection::new("person", 0.78, BoundingBox::new(0.05, 0.3, 0.2, 0.5));
    let cup = RawDetection::new("cup", 0.55, BoundingBox::new(0.7, 0.7, 0.05, 0.05));

    let mut script = Vec::new();
    for i in 0..120 {
        let step = match i {
            0..=59 => ScriptStep::Detections(vec![chair.clone(), person.clone(), cup.clone()]),
            60 => ScriptStep::Failure("simulated inference timeout".into()),
            61..=99 => ScriptStep::Detections(vec![chair.clone()]),
            _ => ScriptStep::Detections(Vec::new()),
        };
        script.push(step);
    }
    ScriptedBackend::new(script).cycling(true)
}
