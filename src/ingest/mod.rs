//! Frame capture sources.
//!
//! Sources deliver color and depth frames through a `CaptureHandle`, each
//! stream on its own thread, with no ordering guarantee between streams.
//! Real camera integration lives outside this crate; the synthetic source
//! stands in for it in headless runs and tests.

pub mod synthetic;

pub use synthetic::{SyntheticCamera, SyntheticConfig, SyntheticScene};
