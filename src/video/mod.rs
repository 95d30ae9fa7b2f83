//! Frame sources.

pub mod webcam;

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SourceSettings;
use crate::image::{Image, Resolution};
use crate::timer::Timer;

use self::webcam::{Webcam, WebcamOptions};

/// Where frames come from: a webcam, or a still image repeated at a fixed rate.
pub enum Source {
    Webcam(Webcam),
    Still(Still),
}

impl Source {
    /// Opens the source described by `settings`, requesting `fps` frames per second.
    pub fn open(settings: &SourceSettings, fps: u32) -> anyhow::Result<Self> {
        match settings {
            SourceSettings::Webcam { name } => {
                let mut options = WebcamOptions::default().fps(fps);
                if let Some(name) = name {
                    options = options.name(name.clone());
                }
                Ok(Source::Webcam(Webcam::open(options)?))
            }
            SourceSettings::Image(path) => Ok(Source::Still(Still::load(path, fps)?)),
        }
    }

    /// Returns the next frame, blocking until it is due.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        match self {
            Source::Webcam(webcam) => webcam.read(),
            Source::Still(still) => Ok(still.read()),
        }
    }

    /// Nominal frame rate, or 0 if unknown.
    pub fn fps(&self) -> u32 {
        match self {
            Source::Webcam(webcam) => webcam.fps(),
            Source::Still(still) => still.fps,
        }
    }

    pub fn resolution(&self) -> Resolution {
        match self {
            Source::Webcam(webcam) => webcam.resolution(),
            Source::Still(still) => still.image.resolution(),
        }
    }

    pub fn timers(&self) -> Vec<&Timer> {
        match self {
            Source::Webcam(webcam) => webcam.timers().collect(),
            Source::Still(_) => Vec::new(),
        }
    }
}

/// A still image served as a video stream.
pub struct Still {
    image: Image,
    fps: u32,
    next: Option<Instant>,
}

impl Still {
    pub fn new(image: Image, fps: u32) -> Self {
        Self {
            image,
            fps,
            next: None,
        }
    }

    pub fn load(path: &Path, fps: u32) -> anyhow::Result<Self> {
        let image = Image::load(path)?;
        log::info!("using {} ({}) as video source", path.display(), image.resolution());
        Ok(Self::new(image, fps))
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    pub fn read(&mut self) -> Image {
        let now = Instant::now();
        if let Some(next) = self.next {
            if next > now {
                thread::sleep(next - now);
            }
        }
        self.next = Some(self.next.unwrap_or(now).max(now) + self.interval());
        self.image.clone()
    }
}
