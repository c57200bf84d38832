//! Synthetic capture source.
//!
//! Produces color frames and (optionally) depth frames on two independent
//! threads, the way a camera delivers them through separate callbacks. The
//! depth scene has a static background plus an object in the middle of the
//! view that approaches and recedes on a fixed period.
//!
//! Used by the daemon when no real camera is attached and by tests.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::frame::{ColorFrame, DepthFrame, DepthMode, SessionClock};
use crate::runtime::CaptureHandle;

const BACKGROUND_DEPTH_M: f32 = 4.0;
const APPROACH_PERIOD_S: f32 = 12.0;
const APPROACH_FAR_M: f32 = 3.0;
const APPROACH_NEAR_M: f32 = 0.4;

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub fps: u32,
    pub depth_fps: u32,
    pub width: u32,
    pub height: u32,
    pub depth_width: usize,
    pub depth_height: usize,
    pub depth: DepthMode,
}

impl SyntheticConfig {
    /// RGB byte count of one color frame.
    pub fn color_frame_len(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("color frame {}x{} overflows", self.width, self.height))
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            depth_fps: 15,
            width: 640,
            height: 480,
            depth_width: 160,
            depth_height: 120,
            depth: DepthMode::Enabled,
        }
    }
}

/// Frame generator for the synthetic scene.
pub struct SyntheticScene {
    config: SyntheticConfig,
    color_count: u64,
    depth_count: u64,
}

impl SyntheticScene {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            color_count: 0,
            depth_count: 0,
        }
    }

    /// Distance of the approaching object at session time `t`.
    pub fn object_distance(t: Duration) -> f32 {
        let phase = (t.as_secs_f32() % APPROACH_PERIOD_S) / APPROACH_PERIOD_S;
        // Triangle wave: far -> near -> far.
        let closeness = 1.0 - (2.0 * phase - 1.0).abs();
        APPROACH_FAR_M - closeness * (APPROACH_FAR_M - APPROACH_NEAR_M)
    }

    pub fn next_color_frame(&mut self, timestamp: Duration) -> Result<ColorFrame> {
        let pixels = self.generate_pixels()?;
        let sequence = self.color_count;
        self.color_count += 1;
        let (width, height) = (self.config.width, self.config.height);
        Ok(ColorFrame::new(pixels, width, height, timestamp, sequence))
    }

    pub fn next_depth_frame(&mut self, timestamp: Duration) -> Result<DepthFrame> {
        self.depth_count += 1;
        let (w, h) = (self.config.depth_width, self.config.depth_height);
        let object = Self::object_distance(timestamp);
        let len = w
            .checked_mul(h)
            .ok_or_else(|| anyhow!("depth grid {}x{} overflows", w, h))?;
        let mut data = vec![BACKGROUND_DEPTH_M; len];
        // Object occupies the central third of the grid.
        for y in h / 3..(2 * h) / 3 {
            for x in w / 3..(2 * w) / 3 {
                data[y * w + x] = object;
            }
        }
        DepthFrame::new(data, w, h, timestamp)
    }

    /// Low-entropy RGB pattern with a little noise.
    fn generate_pixels(&mut self) -> Result<Vec<u8>> {
        let mut pixels = vec![0u8; self.config.color_frame_len()?];
        let jitter = rand::random::<u8>() % 8;
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.color_count) % 256) as u8 ^ jitter;
        }
        Ok(pixels)
    }

    pub fn frames_generated(&self) -> (u64, u64) {
        (self.color_count, self.depth_count)
    }
}

/// Running synthetic camera: one color thread, one optional depth thread.
pub struct SyntheticCamera {
    stop: Arc<AtomicBool>,
    color: Option<JoinHandle<u64>>,
    depth: Option<JoinHandle<u64>>,
}

impl SyntheticCamera {
    /// Start streaming into `handle`. Frame timestamps come from `clock`.
    pub fn start(
        config: SyntheticConfig,
        handle: CaptureHandle,
        clock: SessionClock,
    ) -> Result<Self> {
        if config.fps == 0 || config.depth_fps == 0 {
            anyhow::bail!("synthetic camera fps must be >= 1");
        }
        config.color_frame_len()?;
        let stop = Arc::new(AtomicBool::new(false));

        let color_stop = stop.clone();
        let color_handle = handle.clone();
        let mut color_scene = SyntheticScene::new(config.clone());
        let color_interval = Duration::from_secs(1) / config.fps;
        let color = std::thread::Builder::new()
            .name("synthetic-color".into())
            .spawn(move || {
                while !color_stop.load(Ordering::Relaxed) {
                    match color_scene.next_color_frame(clock.now()) {
                        Ok(frame) => color_handle.on_color_frame(frame),
                        Err(e) => log::warn!("synthetic color frame: {}", e),
                    }
                    std::thread::sleep(color_interval);
                }
                color_scene.frames_generated().0
            })?;

        let depth = if config.depth.is_enabled() {
            let depth_stop = stop.clone();
            let mut depth_scene = SyntheticScene::new(config.clone());
            let depth_interval = Duration::from_secs(1) / config.depth_fps;
            Some(
                std::thread::Builder::new()
                    .name("synthetic-depth".into())
                    .spawn(move || {
                        while !depth_stop.load(Ordering::Relaxed) {
                            match depth_scene.next_depth_frame(clock.now()) {
                                Ok(frame) => handle.on_depth_frame(frame),
                                Err(e) => log::warn!("synthetic depth frame: {}", e),
                            }
                            std::thread::sleep(depth_interval);
                        }
                        depth_scene.frames_generated().1
                    })?,
            )
        } else {
            None
        };

        log::info!(
            "synthetic camera started: {}x{} @ {} fps, depth={:?}",
            config.width,
            config.height,
            config.fps,
            config.depth
        );
        Ok(Self {
            stop,
            color: Some(color),
            depth,
        })
    }

    /// Stop both streams. Returns (color frames, depth frames) produced.
    pub fn stop(mut self) -> (u64, u64) {
        self.halt()
    }

    fn halt(&mut self) -> (u64, u64) {
        self.stop.store(true, Ordering::Relaxed);
        let color = self.color.take().and_then(|h| h.join().ok()).unwrap_or(0);
        let depth = self.depth.take().and_then(|h| h.join().ok()).unwrap_or(0);
        (color, depth)
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.halt();
    }
}
