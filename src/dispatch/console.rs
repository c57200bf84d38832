//! Log-backed collaborators for headless runs.

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;

use super::{HapticOutput, PresentationSink, SpeechOutput, Utterance};
use crate::alert::SpeechStatus;
use crate::detect::Detection;

/// Approximate speaking time per word at rate 1.0.
const WORD_DURATION: Duration = Duration::from_millis(180);

/// Speech collaborator that "speaks" into the log.
///
/// Utterances are serialized on a dedicated thread. Each one reports
/// started, then finished after a duration proportional to its word count
/// and inversely proportional to its rate.
pub struct ConsoleSpeech {
    tx: Option<Sender<Utterance>>,
    worker: Option<JoinHandle<()>>,
}

impl ConsoleSpeech {
    pub fn spawn(status: SpeechStatus) -> Result<Self> {
        let (tx, rx) = unbounded::<Utterance>();
        let worker = std::thread::Builder::new()
            .name("blindgate-speech".into())
            .spawn(move || {
                for utterance in rx {
                    status.started(utterance.id);
                    log::info!(
                        "speak: \"{}\" (rate={:.1}, volume={:.1})",
                        utterance.text,
                        utterance.rate,
                        utterance.volume
                    );
                    std::thread::sleep(speaking_time(&utterance));
                    status.finished(utterance.id);
                }
            })?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

fn speaking_time(utterance: &Utterance) -> Duration {
    let words = utterance.text.split_whitespace().count().max(1) as f32;
    let rate = utterance.rate.clamp(0.1, 1.0);
    let millis = WORD_DURATION.as_millis() as f32 * words / rate;
    Duration::from_millis(millis as u64)
}

impl SpeechOutput for ConsoleSpeech {
    fn speak(&self, utterance: Utterance) {
        if let Some(tx) = &self.tx {
            if tx.send(utterance).is_err() {
                log::warn!("speech worker stopped; utterance dropped");
            }
        }
    }
}

impl Drop for ConsoleSpeech {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("speech worker panicked");
            }
        }
    }
}

/// Haptic collaborator that logs pulses.
#[derive(Default)]
pub struct ConsoleHaptic {
    pulses: AtomicU64,
}

impl ConsoleHaptic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }
}

impl HapticOutput for ConsoleHaptic {
    fn pulse(&self, intensity: f32) {
        let n = self.pulses.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("haptic pulse #{} (intensity={:.2})", n, intensity);
    }
}

/// Presentation collaborator that logs the summary when it changes.
#[derive(Default)]
pub struct ConsolePresentation {
    last_summary: Mutex<String>,
}

impl ConsolePresentation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresentationSink for ConsolePresentation {
    fn present(&self, summary: &str, detections: &[Detection]) {
        let mut last = self.last_summary.lock();
        if *last == summary {
            return;
        }
        *last = summary.to_string();
        if summary.is_empty() {
            log::info!("overlay: (nothing detected)");
            return;
        }
        log::info!("overlay: {}", summary);
        for d in detections {
            let b = d.bbox();
            log::debug!(
                "  box {} x={:.2} y={:.2} w={:.2} h={:.2}",
                d.label(),
                b.x,
                b.y,
                b.w,
                b.h
            );
        }
    }
}
