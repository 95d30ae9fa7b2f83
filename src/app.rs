//! The application state machine.
//!
//! [`App`] owns everything between the frame source and the window: it runs the landmark pipeline
//! on each frame, draws the overlay, labels the pose, and reacts to the user's [`Command`]s.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::action::{classify, Action};
use crate::holistic::{HolisticResult, Process};
use crate::image::{Color, Image};
use crate::overlay;
use crate::record::{save_snapshot, Recorder, SinkFactory};

/// How long a status set by a user action stays visible before per-frame updates resume.
pub const DEFAULT_STATUS_HOLD: Duration = Duration::from_secs(2);

/// Frame rate of recordings when the source cannot report one.
pub const FALLBACK_FPS: u32 = 30;

/// User requests, from buttons or keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Capture,
    ToggleRecording,
    Quit,
}

/// Color class of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Success,
    Warning,
    Error,
    Recording,
}

impl Tone {
    pub fn color(self) -> Color {
        match self {
            Tone::Neutral => Color::GRAY,
            Tone::Success => Color::GREEN,
            Tone::Warning => Color::ORANGE,
            Tone::Error | Tone::Recording => Color::RED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub tone: Tone,
}

impl Status {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// Everything the window needs to draw one frame of the UI.
pub struct AppView<'a> {
    pub frame: Option<&'a Image>,
    pub status: &'a Status,
    pub action: Action,
    pub recording: bool,
}

impl AppView<'_> {
    pub fn record_button_label(&self) -> &'static str {
        if self.recording {
            "Stop Recording"
        } else {
            "Start Recording"
        }
    }

    pub fn action_label(&self) -> String {
        format!("Action: {}", self.action)
    }
}

/// Output settings of an [`App`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub jpeg_quality: u8,
    /// Frame rate reported by the source (0 if unknown).
    pub source_fps: u32,
}

pub struct App<P, F> {
    processor: P,
    factory: F,
    config: AppConfig,
    last_frame: Option<Image>,
    last_result: Option<HolisticResult>,
    action: Action,
    status: Status,
    held_until: Option<Instant>,
    status_hold: Duration,
    recorder: Option<Recorder>,
}

impl<P: Process, F: SinkFactory> App<P, F> {
    pub fn new(processor: P, factory: F, config: AppConfig) -> Self {
        Self {
            processor,
            factory,
            config,
            last_frame: None,
            last_result: None,
            action: Action::None,
            status: Status::new("Ready", Tone::Neutral),
            held_until: None,
            status_hold: DEFAULT_STATUS_HOLD,
            recorder: None,
        }
    }

    /// Sets how long statuses set by user actions are kept.
    pub fn set_status_hold(&mut self, hold: Duration) {
        self.status_hold = hold;
    }

    pub fn view(&self) -> AppView<'_> {
        AppView {
            frame: self.last_frame.as_ref(),
            status: &self.status,
            action: self.action,
            recording: self.is_recording(),
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn last_result(&self) -> Option<&HolisticResult> {
        self.last_result.as_ref()
    }

    /// Frame rate new recordings are written at.
    pub fn recording_fps(&self) -> u32 {
        match self.config.source_fps {
            0 => FALLBACK_FPS,
            fps => fps,
        }
    }

    /// Sets a status that per-frame updates will not overwrite for a while.
    fn hold_status(&mut self, status: Status) {
        self.status = status;
        self.held_until = Some(Instant::now() + self.status_hold);
    }

    fn is_status_held(&mut self) -> bool {
        match self.held_until {
            Some(until) if Instant::now() < until => true,
            _ => {
                self.held_until = None;
                false
            }
        }
    }

    /// Runs the pipeline on `frame` and updates all state derived from it.
    pub fn update(&mut self, mut frame: Image) {
        let result = match self.processor.process(&frame) {
            Ok(result) => {
                overlay::draw_result(&mut frame, &result);
                Some(result)
            }
            Err(e) => {
                log::error!("Error processing frame: {e:#}");
                self.hold_status(Status::new(format!("Error: {e}"), Tone::Error));
                None
            }
        };

        let write_error = self.recorder.as_mut().and_then(|recorder| {
            recorder.write(&frame);
            recorder.take_error()
        });
        if let Some(e) = write_error {
            self.abort_recording(e);
        }

        self.action = classify(result.as_ref());

        if self.recorder.is_none() && !self.is_status_held() {
            self.status = if result.as_ref().map_or(false, HolisticResult::has_pose) {
                Status::new("Pose detected", Tone::Success)
            } else {
                Status::new("No pose detected", Tone::Neutral)
            };
        }

        self.last_frame = Some(frame);
        self.last_result = result;
    }

    /// Saves the last annotated frame, if a pose was found in it.
    pub fn capture_image(&mut self) {
        let has_pose = self
            .last_result
            .as_ref()
            .map_or(false, HolisticResult::has_pose);
        let Some(frame) = self.last_frame.as_ref().filter(|_| has_pose) else {
            log::warn!("No pose landmarks detected to capture!");
            self.hold_status(Status::new("No pose detected!", Tone::Warning));
            return;
        };

        let status = match save_snapshot(frame, &self.config.output_dir, self.config.jpeg_quality)
        {
            Ok(path) => {
                let name = file_name(&path);
                log::info!("Image saved as {name}");
                Status::new(format!("Saved: {name}"), Tone::Success)
            }
            Err(e) => {
                log::error!("failed to save snapshot: {e:#}");
                Status::new(format!("Error: {e}"), Tone::Error)
            }
        };
        self.hold_status(status);
    }

    /// Starts a new recording, or finalizes the running one.
    pub fn toggle_recording(&mut self) {
        match self.recorder.take() {
            None => self.start_recording(),
            Some(recorder) => {
                let status = match recorder.stop() {
                    Ok(frames) => {
                        log::info!("Stopped recording ({frames} frames)");
                        Status::new("Recording stopped", Tone::Success)
                    }
                    Err(e) => {
                        log::error!("failed to finalize recording: {e:#}");
                        Status::new(format!("Error: {e}"), Tone::Error)
                    }
                };
                self.hold_status(status);
            }
        }
    }

    fn start_recording(&mut self) {
        let Some(resolution) = self.last_frame.as_ref().map(Image::resolution) else {
            log::warn!("cannot record before the first frame arrives");
            self.hold_status(Status::new("Error: no video frame yet", Tone::Error));
            return;
        };

        let fps = self.recording_fps();
        match Recorder::start(&self.factory, &self.config.output_dir, resolution, fps) {
            Ok(recorder) => {
                let name = file_name(recorder.path());
                log::info!("Started recording: {name} ({resolution} @ {fps} fps)");
                self.status = Status::new(format!("Recording: {name}"), Tone::Recording);
                self.held_until = None;
                self.recorder = Some(recorder);
            }
            Err(e) => {
                log::error!("failed to start recording: {e:#}");
                self.hold_status(Status::new(format!("Error: {e}"), Tone::Error));
            }
        }
    }

    fn abort_recording(&mut self, error: anyhow::Error) {
        if let Some(recorder) = self.recorder.take() {
            log::error!("recording {} aborted: {error:#}", recorder.path().display());
            // The sink is already gone; stopping only joins the worker.
            recorder.stop().ok();
        }
        self.hold_status(Status::new(
            format!("Error: recording failed: {error}"),
            Tone::Error,
        ));
    }

    /// Handles a user command. Returns `false` once the application should exit.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Capture => self.capture_image(),
            Command::ToggleRecording => self.toggle_recording(),
            Command::Quit => return false,
        }
        true
    }

    /// Finalizes any running recording.
    pub fn shutdown(&mut self) {
        log::info!("Shutting down landmark detection system");
        if let Some(recorder) = self.recorder.take() {
            match recorder.stop() {
                Ok(frames) => log::info!("Stopped recording ({frames} frames)"),
                Err(e) => log::error!("failed to finalize recording: {e:#}"),
            }
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
