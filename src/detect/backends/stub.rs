use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::ColorFrame;

/// One scripted inference outcome.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Detections(Vec<RawDetection>),
    Failure(String),
}

/// Deterministic backend that replays a script of per-frame outcomes.
///
/// With `cycle` enabled the script repeats; otherwise frames past the end
/// produce no detections.
pub struct ScriptedBackend {
    script: VecDeque<ScriptStep>,
    cycle: bool,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script: script.into(),
            cycle: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn cycling(mut self, enabled: bool) -> Self {
        self.cycle = enabled;
        self
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::empty()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &ColorFrame) -> Result<Vec<RawDetection>> {
        let Some(step) = self.script.pop_front() else {
            return Ok(Vec::new());
        };
        if self.cycle {
            self.script.push_back(step.clone());
        }
        match step {
            ScriptStep::Detections(detections) => Ok(detections),
            ScriptStep::Failure(reason) => Err(anyhow!("scripted inference failure: {}", reason)),
        }
    }
}
