//! Threaded runtime: capture callbacks in, one detection worker out.
//!
//! Capture callbacks run on the camera's threads and only touch the
//! synchronizer and a single-slot hand-off. The worker processes at most one
//! frame at a time; a frame that arrives while one is in flight is dropped,
//! never queued.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::detect::DetectionStats;
use crate::frame::{ColorFrame, DepthFrame, DepthMode, SynchronizedFrame};
use crate::pipeline::{AlertPipeline, FrameReport};
use crate::sync::{FrameSynchronizer, SyncStats};

struct Gate {
    sync: FrameSynchronizer,
    busy: AtomicBool,
    tx: Mutex<Option<Sender<SynchronizedFrame>>>,
    processed: AtomicU64,
    dropped_busy: AtomicU64,
    reports_dropped: AtomicU64,
}

impl Gate {
    fn submit(&self, frame: SynchronizedFrame) {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.dropped_busy.fetch_add(1, Ordering::Relaxed);
            log::debug!("frame #{} dropped: worker busy", frame.color.sequence);
            return;
        }

        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            self.busy.store(false, Ordering::Release);
            return;
        };
        match tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                // Unreachable while `busy` guards the slot; count it as a busy drop.
                self.busy.store(false, Ordering::Release);
                self.dropped_busy.fetch_add(1, Ordering::Relaxed);
                log::warn!("frame #{} dropped: hand-off slot full", frame.color.sequence);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.busy.store(false, Ordering::Release);
                log::debug!("frame dropped: worker stopped");
            }
        }
    }
}

/// Entry points for the camera collaborator. Cheap to clone; safe to call
/// concurrently from the color and depth callback threads.
#[derive(Clone)]
pub struct CaptureHandle {
    gate: Arc<Gate>,
}

impl CaptureHandle {
    pub fn on_color_frame(&self, frame: ColorFrame) {
        if let Some(synced) = self.gate.sync.on_color_frame(frame) {
            self.gate.submit(synced);
        }
    }

    pub fn on_depth_frame(&self, frame: DepthFrame) {
        self.gate.sync.on_depth_frame(frame);
    }
}

/// Runtime counters.
#[derive(Clone, Debug, Default)]
pub struct RunnerStats {
    pub sync: SyncStats,
    pub processed: u64,
    pub dropped_busy: u64,
    /// Reports discarded because the observer's channel was full or closed.
    pub reports_dropped: u64,
    /// Populated by `stop()`; the worker owns the detector until then.
    pub detection: Option<DetectionStats>,
}

/// Owns the detection worker thread.
pub struct PipelineRunner {
    gate: Arc<Gate>,
    worker: Option<JoinHandle<AlertPipeline>>,
}

impl PipelineRunner {
    pub fn spawn(pipeline: AlertPipeline, mode: DepthMode) -> Result<Self> {
        Self::spawn_inner(pipeline, mode, None)
    }

    /// Like `spawn`, also offering each frame's report to `reports`.
    ///
    /// The worker never waits on the observer: a report that does not fit
    /// in the channel is discarded and counted in `reports_dropped`.
    pub fn spawn_with_reports(
        pipeline: AlertPipeline,
        mode: DepthMode,
        reports: Sender<FrameReport>,
    ) -> Result<Self> {
        Self::spawn_inner(pipeline, mode, Some(reports))
    }

    fn spawn_inner(
        pipeline: AlertPipeline,
        mode: DepthMode,
        reports: Option<Sender<FrameReport>>,
    ) -> Result<Self> {
        let (tx, rx) = bounded::<SynchronizedFrame>(1);
        let gate = Arc::new(Gate {
            sync: FrameSynchronizer::new(mode),
            busy: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
            processed: AtomicU64::new(0),
            dropped_busy: AtomicU64::new(0),
            reports_dropped: AtomicU64::new(0),
        });

        let worker_gate = gate.clone();
        let worker = std::thread::Builder::new()
            .name("blindgate-detect".into())
            .spawn(move || run_worker(pipeline, rx, worker_gate, reports))?;

        log::info!("pipeline runner started (depth={:?})", gate.sync.mode());
        Ok(Self {
            gate,
            worker: Some(worker),
        })
    }

    pub fn capture_handle(&self) -> CaptureHandle {
        CaptureHandle {
            gate: self.gate.clone(),
        }
    }

    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            sync: self.gate.sync.stats(),
            processed: self.gate.processed.load(Ordering::Acquire),
            dropped_busy: self.gate.dropped_busy.load(Ordering::Relaxed),
            reports_dropped: self.gate.reports_dropped.load(Ordering::Relaxed),
            detection: None,
        }
    }

    /// Close the hand-off, wait for the in-flight frame, and join the worker.
    pub fn stop(mut self) -> Result<RunnerStats> {
        let pipeline = self.shutdown()?;
        let mut stats = self.stats();
        stats.detection = pipeline.map(|p| p.detection_stats());
        Ok(stats)
    }

    fn shutdown(&mut self) -> Result<Option<AlertPipeline>> {
        self.gate.tx.lock().take();
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map(Some)
                .map_err(|_| anyhow!("detection worker panicked")),
            None => Ok(None),
        }
    }
}

impl Drop for PipelineRunner {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("pipeline runner shutdown: {}", e);
        }
    }
}

fn run_worker(
    mut pipeline: AlertPipeline,
    rx: Receiver<SynchronizedFrame>,
    gate: Arc<Gate>,
    reports: Option<Sender<FrameReport>>,
) -> AlertPipeline {
    for frame in rx {
        let report = pipeline.process(frame);
        gate.busy.store(false, Ordering::Release);
        // Release: a reader that sees the new count also sees the slot free.
        gate.processed.fetch_add(1, Ordering::Release);

        if let Some(tx) = &reports {
            if let Err(e) = tx.try_send(report) {
                gate.reports_dropped.fetch_add(1, Ordering::Relaxed);
                let reason = match e {
                    TrySendError::Full(_) => "observer behind",
                    TrySendError::Disconnected(_) => "observer gone",
                };
                log::debug!("report #{} dropped: {}", e.into_inner().sequence, reason);
            }
        }
    }
    log::info!("detection worker stopped");
    pipeline
}
