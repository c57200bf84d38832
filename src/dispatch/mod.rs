//! Output dispatch to audio, haptic, and presentation collaborators.
//!
//! Dispatch is fire-and-forget. The audio collaborator reports utterance
//! lifecycle back through a `SpeechStatus` handle on its own schedule.

pub mod console;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::alert::{ProximityDecision, UtteranceId};
use crate::detect::{Detection, DetectionSet};

pub use console::{ConsoleHaptic, ConsolePresentation, ConsoleSpeech};

/// Spoken when a near object is detected and nothing else is being spoken.
pub const CLOSE_OBJECT_WARNING: &str = "Close object ahead";

/// A single request to the speech collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub rate: f32,
    pub volume: f32,
}

/// Audio-output collaborator. Must not block the caller until speech completes.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, utterance: Utterance);
}

/// Haptic collaborator. `intensity` is in [0, 1].
pub trait HapticOutput: Send + Sync {
    fn pulse(&self, intensity: f32);
}

/// Display-layer collaborator. Receives every processed frame's summary and boxes.
pub trait PresentationSink: Send + Sync {
    fn present(&self, summary: &str, detections: &[Detection]);
}

/// Speech and haptic parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputSettings {
    /// Speech rate for label announcements.
    pub label_rate: f32,
    /// Speech rate for the close-object warning.
    pub warning_rate: f32,
    pub volume: f32,
    pub haptic_intensity: f32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            label_rate: 0.6,
            warning_rate: 0.7,
            volume: 1.0,
            haptic_intensity: 1.0,
        }
    }
}

/// Forwards policy decisions and detection summaries to the collaborators.
pub struct OutputDispatcher {
    speech: Arc<dyn SpeechOutput>,
    haptic: Arc<dyn HapticOutput>,
    presentation: Arc<dyn PresentationSink>,
    settings: OutputSettings,
    next_utterance: AtomicU64,
}

impl OutputDispatcher {
    pub fn new(
        speech: Arc<dyn SpeechOutput>,
        haptic: Arc<dyn HapticOutput>,
        presentation: Arc<dyn PresentationSink>,
        settings: OutputSettings,
    ) -> Self {
        Self {
            speech,
            haptic,
            presentation,
            settings,
            next_utterance: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> UtteranceId {
        UtteranceId(self.next_utterance.fetch_add(1, Ordering::Relaxed))
    }

    /// Send the frame's summary text and boxes to the display layer.
    pub fn present(&self, detections: &DetectionSet) {
        let summary = summary_text(detections);
        self.presentation.present(&summary, detections.as_slice());
    }

    /// Speak each approved label. Returns the utterance ids in dispatch order.
    pub fn announce(&self, labels: &[String]) -> Vec<UtteranceId> {
        labels
            .iter()
            .map(|label| {
                let id = self.next_id();
                self.speech.speak(Utterance {
                    id,
                    text: label.clone(),
                    rate: self.settings.label_rate,
                    volume: self.settings.volume,
                });
                id
            })
            .collect()
    }

    /// Act on a proximity decision. Returns the warning's utterance id if one was spoken.
    pub fn proximity_alert(&self, decision: ProximityDecision) -> Option<UtteranceId> {
        if decision.haptic {
            self.haptic.pulse(self.settings.haptic_intensity);
        }
        if !decision.speak {
            return None;
        }
        let id = self.next_id();
        self.speech.speak(Utterance {
            id,
            text: CLOSE_OBJECT_WARNING.to_string(),
            rate: self.settings.warning_rate,
            volume: self.settings.volume,
        });
        Some(id)
    }
}

/// `"Chair (90%), Person (75%)"`. Percentages are truncated, not rounded.
pub fn summary_text(detections: &DetectionSet) -> String {
    detections
        .iter()
        .map(|d| format!("{} ({}%)", d.label(), (d.confidence() * 100.0) as u32))
        .collect::<Vec<_>>()
        .join(", ")
}
