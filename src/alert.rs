//! Alert policy: per-label speech debounce and the proximity gate.
//!
//! All mutable alert state lives in one `AlertState` behind one lock. The
//! detection worker and the audio collaborator's completion callbacks both
//! go through `AlertPolicy`; nothing else touches the state.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Minimum time between two announcements of the same label.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(3);
/// Announcement records at least this old are purged.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(6);

/// Identifier assigned to each utterance handed to the audio collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

/// Lifecycle notifications reported by the audio collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UtteranceEvent {
    Started(UtteranceId),
    Finished(UtteranceId),
    Cancelled(UtteranceId),
}

/// Speech lifecycle as seen by the policy.
///
/// Only a `Started` event moves to `Speaking`; an utterance that is never
/// confirmed leaves the state `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpeechState {
    #[default]
    Idle,
    Speaking(UtteranceId),
}

/// What to do about a near object in the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProximityDecision {
    pub haptic: bool,
    pub speak: bool,
}

#[derive(Debug, Default)]
struct AlertState {
    last_announced: HashMap<String, Duration>,
    speech: SpeechState,
}

impl AlertState {
    fn approve(&mut self, label: &str, now: Duration) -> bool {
        let due = match self.last_announced.get(label) {
            Some(&last) => now.saturating_sub(last) >= DEBOUNCE_INTERVAL,
            None => true,
        };
        if due {
            // Optimistic: recorded before the utterance is spoken, never rolled back.
            self.last_announced.insert(label.to_string(), now);
        }
        due
    }

    fn purge(&mut self, now: Duration) -> usize {
        let before = self.last_announced.len();
        self.last_announced
            .retain(|_, &mut last| now.saturating_sub(last) < CLEANUP_INTERVAL);
        before - self.last_announced.len()
    }
}

/// Owner of debounce and speech state.
#[derive(Debug, Default)]
pub struct AlertPolicy {
    state: Mutex<AlertState>,
}

impl AlertPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `label` may be announced at `now`, recording the announcement if so.
    pub fn should_announce(&self, label: &str, now: Duration) -> bool {
        self.state.lock().approve(label, now)
    }

    /// Evaluate one frame's labels: return those approved for speech, in input
    /// order with duplicates removed, then purge stale records.
    pub fn evaluate<'a, I>(&self, labels: I, now: Duration) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.state.lock();
        let mut seen = HashSet::new();
        let approved: Vec<String> = labels
            .into_iter()
            .filter(|label| seen.insert(*label))
            .filter(|label| state.approve(label, now))
            .map(str::to_string)
            .collect();
        let purged = state.purge(now);
        if purged > 0 {
            log::debug!("purged {} stale announcement record(s)", purged);
        }
        approved
    }

    /// Drop announcement records older than `CLEANUP_INTERVAL`. Returns how many were removed.
    pub fn purge(&self, now: Duration) -> usize {
        self.state.lock().purge(now)
    }

    /// Decide the response to a near-object event: haptic always, speech only
    /// when nothing is being spoken. A skipped warning is not retried.
    pub fn should_alert_proximity(&self, now: Duration) -> ProximityDecision {
        let speech = self.speech_state();
        let speak = speech == SpeechState::Idle;
        if !speak {
            log::debug!("close-object warning at {:?} skipped: {:?}", now, speech);
        }
        ProximityDecision {
            haptic: true,
            speak,
        }
    }

    /// Apply an utterance lifecycle event from the audio collaborator.
    pub fn on_utterance_event(&self, event: UtteranceEvent) {
        let mut state = self.state.lock();
        match event {
            UtteranceEvent::Started(id) => state.speech = SpeechState::Speaking(id),
            UtteranceEvent::Finished(id) | UtteranceEvent::Cancelled(id) => {
                if state.speech == SpeechState::Speaking(id) {
                    state.speech = SpeechState::Idle;
                } else {
                    log::debug!("ignoring stale completion for utterance {:?}", id);
                }
            }
        }
    }

    pub fn speech_state(&self) -> SpeechState {
        self.state.lock().speech
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.speech_state(), SpeechState::Speaking(_))
    }

    /// Last announcement time recorded for `label`, if still tracked.
    pub fn last_announced(&self, label: &str) -> Option<Duration> {
        self.state.lock().last_announced.get(label).copied()
    }

    pub fn tracked_labels(&self) -> usize {
        self.state.lock().last_announced.len()
    }
}

/// Handle given to the audio collaborator for reporting utterance lifecycle.
#[derive(Clone, Debug)]
pub struct SpeechStatus {
    policy: Arc<AlertPolicy>,
}

impl SpeechStatus {
    pub fn new(policy: Arc<AlertPolicy>) -> Self {
        Self { policy }
    }

    pub fn started(&self, id: UtteranceId) {
        self.policy.on_utterance_event(UtteranceEvent::Started(id));
    }

    pub fn finished(&self, id: UtteranceId) {
        self.policy.on_utterance_event(UtteranceEvent::Finished(id));
    }

    pub fn cancelled(&self, id: UtteranceId) {
        self.policy.on_utterance_event(UtteranceEvent::Cancelled(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn debounce_blocks_within_interval() {
        let policy = AlertPolicy::new();
        assert!(policy.should_announce("Chair", secs(0.0)));
        assert!(!policy.should_announce("Chair", secs(1.0)));
        assert!(!policy.should_announce("Chair", secs(2.999)));
        assert!(policy.should_announce("Chair", secs(3.0)));
    }

    #[test]
    fn labels_are_debounced_independently() {
        let policy = AlertPolicy::new();
        assert!(policy.should_announce("Chair", secs(0.0)));
        assert!(policy.should_announce("Person", secs(0.5)));
        assert!(!policy.should_announce("Chair", secs(0.5)));
    }

    #[test]
    fn clock_running_backwards_does_not_announce() {
        let policy = AlertPolicy::new();
        assert!(policy.should_announce("Chair", secs(10.0)));
        assert!(!policy.should_announce("Chair", secs(2.0)));
    }

    #[test]
    fn evaluate_dedupes_batch_and_purges() {
        let policy = AlertPolicy::new();
        let approved = policy.evaluate(["Chair", "Chair", "Person"], secs(0.0));
        assert_eq!(approved, vec!["Chair".to_string(), "Person".to_string()]);

        assert!(policy.evaluate(["Person"], secs(4.0)).contains(&"Person".to_string()));
        // Chair last announced at 0.0; purged once 6.0s old.
        assert!(policy.evaluate(std::iter::empty::<&str>(), secs(6.0)).is_empty());
        assert_eq!(policy.last_announced("Chair"), None);
        assert_eq!(policy.last_announced("Person"), Some(secs(4.0)));
        assert_eq!(policy.tracked_labels(), 1);
    }

    #[test]
    fn purge_keeps_fresh_entries() {
        let policy = AlertPolicy::new();
        policy.should_announce("Chair", secs(0.0));
        policy.should_announce("Cup", secs(1.0));
        assert_eq!(policy.purge(secs(6.5)), 1);
        assert_eq!(policy.last_announced("Cup"), Some(secs(1.0)));
    }

    #[test]
    fn proximity_speech_gated_on_speaking() {
        let policy = AlertPolicy::new();
        let d = policy.should_alert_proximity(secs(0.0));
        assert!(d.haptic && d.speak);

        policy.on_utterance_event(UtteranceEvent::Started(UtteranceId(1)));
        let d = policy.should_alert_proximity(secs(0.1));
        assert!(d.haptic);
        assert!(!d.speak);

        policy.on_utterance_event(UtteranceEvent::Finished(UtteranceId(1)));
        assert!(policy.should_alert_proximity(secs(0.2)).speak);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let policy = AlertPolicy::new();
        policy.on_utterance_event(UtteranceEvent::Started(UtteranceId(1)));
        policy.on_utterance_event(UtteranceEvent::Finished(UtteranceId(1)));
        policy.on_utterance_event(UtteranceEvent::Started(UtteranceId(2)));
        policy.on_utterance_event(UtteranceEvent::Cancelled(UtteranceId(1)));
        assert_eq!(policy.speech_state(), SpeechState::Speaking(UtteranceId(2)));
        policy.on_utterance_event(UtteranceEvent::Cancelled(UtteranceId(2)));
        assert!(!policy.is_speaking());
    }

    #[test]
    fn speech_status_reports_from_another_thread() {
        let policy = Arc::new(AlertPolicy::new());
        let status = SpeechStatus::new(policy.clone());
        std::thread::spawn(move || status.started(UtteranceId(7)))
            .join()
            .expect("reporter thread");
        assert!(policy.is_speaking());
    }
}
