//! Live landmark viewer.
//!
//! `posecam` reads frames from a webcam, runs a holistic landmark pipeline (body pose, both hands
//! and the face) on them, draws the landmarks on top of the frame, labels a few simple poses, and
//! lets the user save snapshots or record the annotated stream.
//!
//! # Coordinates
//!
//! All landmark positions are in pixels of the frame they were computed from, with X pointing
//! right and Y pointing *down*. Z comes straight from the networks and has no fixed unit.
//! [`holistic::HolisticResult::pose_normalized`] maps pose landmarks to the `0.0..=1.0` range used
//! by the pose classifier in [`action`].
//!
//! # Environment Variables
//!
//! * `POSECAM_JPEG_BACKEND`: Selects the MJPEG decoder used for webcam frames. Allowed values are
//!   `mozjpeg` (the default) and `jpeg-decoder`.
//! * `POSECAM_WEBCAM_NAME`: Forces the webcam device to use if `--camera` is not passed. If unset,
//!   the first device that supports a compatible image format will be used.
//! * `POSECAM_MODEL_DIR`: Directory containing the ONNX networks (see [`config`]).
//! * `POSECAM_FFMPEG`: Path to the `ffmpeg` binary used for recording.

use log::LevelFilter;

pub mod action;
pub mod app;
pub mod body;
pub mod config;
pub mod detection;
pub mod face;
pub mod filter;
pub mod gui;
pub mod hand;
pub mod holistic;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod overlay;
pub mod record;
pub mod timer;
pub mod ui;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and `posecam` will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `wgpu` will always log at *warn* level. `RUST_LOG` is applied on top of these defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
