use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::dispatch::OutputSettings;
use crate::frame::DepthMode;
use crate::ingest::SyntheticConfig;

const DEFAULT_BACKEND: &str = "scripted";
const DEFAULT_FPS: u32 = 30;
const DEFAULT_DEPTH_FPS: u32 = 15;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_DEPTH_WIDTH: usize = 160;
const DEFAULT_DEPTH_HEIGHT: usize = 120;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    speech: Option<SpeechConfigFile>,
    haptic: Option<HapticConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    depth: Option<bool>,
    fps: Option<u32>,
    depth_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    depth_width: Option<usize>,
    depth_height: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    label_rate: Option<f32>,
    warning_rate: Option<f32>,
    volume: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct HapticConfigFile {
    intensity: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub depth: DepthMode,
    pub fps: u32,
    pub depth_fps: u32,
    pub width: u32,
    pub height: u32,
    pub depth_width: usize,
    pub depth_height: usize,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load from `BLINDGATE_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BLINDGATE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), apply env overrides, validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => PipelineConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let speech = file.speech.unwrap_or_default();
        let defaults = OutputSettings::default();

        Self {
            camera: CameraSettings {
                depth: DepthMode::from_enabled(camera.depth.unwrap_or(true)),
                fps: camera.fps.unwrap_or(DEFAULT_FPS),
                depth_fps: camera.depth_fps.unwrap_or(DEFAULT_DEPTH_FPS),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
                depth_width: camera.depth_width.unwrap_or(DEFAULT_DEPTH_WIDTH),
                depth_height: camera.depth_height.unwrap_or(DEFAULT_DEPTH_HEIGHT),
            },
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detector.model_path,
                labels_path: detector.labels_path,
            },
            output: OutputSettings {
                label_rate: speech.label_rate.unwrap_or(defaults.label_rate),
                warning_rate: speech.warning_rate.unwrap_or(defaults.warning_rate),
                volume: speech.volume.unwrap_or(defaults.volume),
                haptic_intensity: file
                    .haptic
                    .and_then(|haptic| haptic.intensity)
                    .unwrap_or(defaults.haptic_intensity),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(depth) = std::env::var("BLINDGATE_DEPTH") {
            let enabled = parse_bool(&depth)
                .ok_or_else(|| anyhow!("BLINDGATE_DEPTH must be true/false, got {:?}", depth))?;
            self.camera.depth = DepthMode::from_enabled(enabled);
        }
        if let Ok(backend) = std::env::var("BLINDGATE_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("BLINDGATE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(intensity) = std::env::var("BLINDGATE_HAPTIC_INTENSITY") {
            self.output.haptic_intensity = intensity.parse().map_err(|_| {
                anyhow!("BLINDGATE_HAPTIC_INTENSITY must be a number between 0 and 1")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.fps == 0 || self.camera.depth_fps == 0 {
            return Err(anyhow!("camera fps must be >= 1"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        if self.camera.depth_width == 0 || self.camera.depth_height == 0 {
            return Err(anyhow!("depth grid dimensions must be non-zero"));
        }
        if self.detector.backend.is_empty() {
            return Err(anyhow!("detector backend must be named"));
        }
        for (name, value) in [
            ("speech.label_rate", self.output.label_rate),
            ("speech.warning_rate", self.output.warning_rate),
            ("speech.volume", self.output.volume),
            ("haptic.intensity", self.output.haptic_intensity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }

    /// Synthetic camera settings derived from the camera section.
    pub fn synthetic_camera(&self) -> SyntheticConfig {
        SyntheticConfig {
            fps: self.camera.fps,
            depth_fps: self.camera.depth_fps,
            width: self.camera.width,
            height: self.camera.height,
            depth_width: self.camera.depth_width,
            depth_height: self.camera.depth_height,
            depth: self.camera.depth,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_file(PipelineConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
