//! Common functionality for object detection.
//!
//! The pose detector seeds the landmark tracker in [`crate::body`]; everything in here is
//! independent of the object being detected.

pub mod nms;
pub mod ssd;

use crate::image::{AspectRatio, Image, Rect, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// Trait implemented by neural networks that detect objects in an input image.
pub trait Network: Send + 'static {
    /// Returns the [`Cnn`] to use for detection.
    fn cnn(&self) -> &Cnn;

    /// Extracts all detections with confidence of at least `threshold` from the network's output.
    ///
    /// Keypoint and detection positions are expected to be in the coordinate system of the
    /// network's input.
    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Vec<Detection>);
}

/// A generic single-class object detector.
pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            t_infer: Timer::new("detect"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Sets the minimum confidence a detection needs to be reported.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Runs detection on the whole `image`.
    ///
    /// The returned detections are in `image` coordinates and sorted by descending confidence.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();

        // If the input image's aspect ratio doesn't match the CNN's input, sample an oversized
        // area that does (the excess is read as black bars).
        let rect = image
            .rect()
            .grow_to_fit_aspect(input_res.aspect_ratio().unwrap_or(AspectRatio::SQUARE));
        let outputs = self.t_infer.time(|| cnn.estimate(image, rect))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.thresh, &mut self.detections)
        });

        self.t_nms.time(|| self.nms.process(&mut self.detections));

        let scale = rect.width() / input_res.width() as f32;
        for det in &mut self.detections {
            det.map_to(scale, rect.x(), rect.y());
        }

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value
/// between 0.0 and 1.0, and a possibly empty set of keypoints.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Scales all coordinates by `scale`, then moves them by `(dx, dy)`.
    fn map_to(&mut self, scale: f32, dx: f32, dy: f32) {
        let [xc, yc] = self.rect.center();
        self.rect = Rect::from_center(
            xc * scale + dx,
            yc * scale + dy,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            kp.x = kp.x * scale + dx;
            kp.y = kp.y * scale + dy;
        }
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the detector and on its index in the keypoint list. The
/// pose detector uses them to derive the region of interest for the landmark network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
