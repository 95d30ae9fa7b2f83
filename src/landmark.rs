//! Common code for visual landmark estimation.

use crate::filter::{Ema, EmaState, Filter};
use crate::image::{AspectRatio, Image, Rect, Resolution};
use crate::iter::zip_exact;
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

type Position = [f32; 3];

/// A fixed-size list of [`Landmark`]s, as produced by a landmark network.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    landmarks: Box<[Landmark]>,
}

impl Landmarks {
    /// Creates a new [`Landmarks`] collection containing `len` landmarks at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            landmarks: vec![Landmark::new([0.0; 3]); len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Returns the landmark at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[track_caller]
    pub fn get(&self, index: usize) -> Landmark {
        self.landmarks[index]
    }

    #[track_caller]
    pub fn set(&mut self, index: usize, landmark: Landmark) {
        self.landmarks[index] = landmark;
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Landmark> + Clone + '_ {
        self.landmarks.iter().copied()
    }

    /// Applies `f` to the position of every landmark.
    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for lm in self.landmarks.iter_mut() {
            lm.pos = f(lm.pos);
        }
    }

    /// Computes the axis-aligned bounding rectangle of all landmarks (ignoring Z).
    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::bounding(self.iter().map(|lm| [lm.x(), lm.y()]))
    }
}

impl FromIterator<Landmark> for Landmarks {
    fn from_iter<T: IntoIterator<Item = Landmark>>(iter: T) -> Self {
        Self {
            landmarks: iter.into_iter().collect(),
        }
    }
}

/// A landmark in 3D space.
///
/// `visibility` and `presence` are only reported by the pose network; both are probabilities in
/// range `0.0..=1.0`.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark {
    pos: Position,
    visibility: Option<f32>,
    presence: Option<f32>,
}

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self {
            pos: position,
            visibility: None,
            presence: None,
        }
    }

    pub fn with_visibility(self, visibility: f32) -> Self {
        Self {
            visibility: Some(visibility),
            ..self
        }
    }

    pub fn with_presence(self, presence: f32) -> Self {
        Self {
            presence: Some(presence),
            ..self
        }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }

    #[inline]
    pub fn visibility(&self) -> Option<f32> {
        self.visibility
    }

    #[inline]
    pub fn presence(&self) -> Option<f32> {
        self.presence
    }

    /// Divides X and Y by the width and height of `res`, mapping on-screen positions to
    /// `0.0..=1.0`. Z is left as-is.
    pub fn normalized(&self, res: Resolution) -> Self {
        let [x, y, z] = self.pos;
        Self {
            pos: [x / res.width() as f32, y / res.height() as f32, z],
            ..*self
        }
    }
}

/// Batch-filter for landmarks.
///
/// This is applied to the landmarks in the network's input coordinates, which keeps the filter
/// parameters independent of the image size.
#[derive(Default)]
pub struct LandmarkFilter {
    ema: Option<Ema>,
    states: Vec<[EmaState; 3]>,
}

impl LandmarkFilter {
    /// Creates a filter smoothing every coordinate with an exponential moving average.
    pub fn ema(alpha: f32) -> Self {
        Self {
            ema: Some(Ema::new(alpha)),
            states: Vec::new(),
        }
    }

    /// Filters a list of landmarks in-place.
    ///
    /// The number of landmarks must stay the same between calls, unless [`LandmarkFilter::reset`]
    /// is called in between.
    pub fn filter(&mut self, landmarks: &mut Landmarks) {
        let Some(ema) = &self.ema else { return };
        if self.states.is_empty() {
            self.states = vec![Default::default(); landmarks.len()];
        }

        for (lm, states) in zip_exact(landmarks.landmarks.iter_mut(), &mut self.states) {
            for (coord, state) in zip_exact(&mut lm.pos, states) {
                *coord = ema.filter(state, *coord);
            }
        }
    }

    /// Forgets all previous values, so that the next call to [`LandmarkFilter::filter`] starts
    /// from scratch.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

/// Trait for landmark estimation results returned by [`Estimator::estimate`].
pub trait Estimate: Send + 'static {
    fn landmarks(&self) -> &Landmarks;

    fn landmarks_mut(&mut self) -> &mut Landmarks;
}

/// Trait for network inference results that contain a confidence value.
///
/// The confidence value is used by [`LandmarkTracker`] to detect that the tracked object left the
/// camera's field of view, and by the holistic pipeline to discard unreliable hands and faces.
pub trait Confidence {
    /// Confidence value indicating whether the object is in view, in range 0.0 to 1.0.
    fn confidence(&self) -> f32;
}

/// Trait implemented by wrapper types around neural networks that estimate landmarks.
pub trait Network: Send + 'static {
    /// Type representing the predicted landmarks.
    type Output: Estimate;

    /// Returns the [`Cnn`] to use for landmark estimation.
    fn cnn(&self) -> &Cnn;

    /// Extracts the network outputs and writes them to `estimate`.
    ///
    /// The landmark positions are expected to be in the coordinate system of the network's input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output);
}

/// Neural-network based landmark estimator.
///
/// This estimator processes a region of an input image and yields an [`Estimate`] of type `E`,
/// containing the derived [`Landmarks`] and other data (depending on the network).
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
    filter: LandmarkFilter,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            filter: LandmarkFilter::default(),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    /// Returns the expected input resolution of the internal neural network.
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Returns profiling timers for this landmark estimator.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Sets the [`LandmarkFilter`] to apply to all landmark positions.
    ///
    /// This should only be used if the estimator is fed subsequent frames of a video feed.
    pub fn set_filter(&mut self, filter: LandmarkFilter) {
        self.filter = filter;
    }

    /// Resets the state of the [`LandmarkFilter`], if any.
    pub fn reset_filter(&mut self) {
        self.filter.reset();
    }

    /// Performs landmark estimation on the region `roi` of `image`.
    ///
    /// If the aspect ratio of `roi` does not match the aspect ratio of the network's input, it is
    /// enlarged to match first. The landmarks of the returned [`Estimate`] are in `image`
    /// coordinates.
    pub fn estimate(&mut self, image: &Image, roi: Rect) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();

        let rect = roi.grow_to_fit_aspect(input_res.aspect_ratio().unwrap_or(AspectRatio::SQUARE));
        let outputs = self.t_infer.time(|| cnn.estimate(image, rect))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate));

        self.filter.filter(self.estimate.landmarks_mut());

        map_to_image(self.estimate.landmarks_mut(), input_res, rect);

        Ok(&mut self.estimate)
    }
}

/// Maps landmark positions from network input coordinates to the coordinates of the image that
/// `rect` was sampled from.
///
/// Z is scaled like X, since the networks report it in the same unit.
fn map_to_image(landmarks: &mut Landmarks, input_res: Resolution, rect: Rect) {
    let scale = rect.width() / input_res.width() as f32;
    landmarks.map_positions(|[x, y, z]| [x * scale + rect.x(), y * scale + rect.y(), z * scale]);
}

/// Tracks a region of interest (RoI) across subsequent frames by following the estimated
/// landmarks.
///
/// Once seeded with a region of interest, the tracker will adjust its RoI based on the bounding
/// rectangle of the estimated landmarks. When the estimate's [`Confidence`] drops below the loss
/// threshold, the RoI is cleared and the tracker has to be re-seeded.
pub struct LandmarkTracker<E: Estimate + Confidence> {
    estimator: Estimator<E>,
    roi: Option<Rect>,
    loss_thresh: f32,
}

impl<E: Estimate + Confidence> LandmarkTracker<E> {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    /// Relative padding added to every side of the landmarks' bounding rectangle to form the
    /// next RoI.
    pub const ROI_PADDING: f32 = 0.3;

    pub fn new(estimator: Estimator<E>) -> Self {
        Self {
            estimator,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
        }
    }

    pub fn estimator(&self) -> &Estimator<E> {
        &self.estimator
    }

    /// Returns profiling timers of the internal [`Estimator`].
    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.estimator.timers()
    }

    /// Sets the tracking loss threshold.
    ///
    /// If the confidence of the predicted landmarks falls below this value, tracking is
    /// considered lost.
    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_thresh = threshold;
    }

    /// Returns the current region of interest, or [`None`] if nothing is being tracked.
    pub fn roi(&self) -> Option<Rect> {
        self.roi
    }

    /// Seeds the tracker with a region of interest. The rectangle is used as-is.
    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = Some(roi);
    }

    /// Performs landmark tracking on `image`.
    ///
    /// Returns `Ok(None)` if no RoI is set, or if tracking was lost during this call. The landmarks
    /// of the returned estimate are in `image` coordinates.
    ///
    /// `track` always has to be called on images of the same size, otherwise the tracking window
    /// won't match between frames.
    pub fn track(&mut self, image: &Image) -> anyhow::Result<Option<&E>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };

        let estimate = self.estimator.estimate(image, roi)?;
        if estimate.confidence() < self.loss_thresh {
            log::trace!(
                "LandmarkTracker: confidence {}, loss threshold {} -> LOST",
                estimate.confidence(),
                self.loss_thresh,
            );

            self.roi = None;
            self.estimator.reset_filter();
            return Ok(None);
        }

        self.roi = next_roi(estimate.landmarks(), Self::ROI_PADDING);
        Ok(Some(&self.estimator.estimate))
    }
}

fn next_roi(landmarks: &Landmarks, padding: f32) -> Option<Rect> {
    landmarks
        .bounding_rect()
        .map(|rect| rect.grow_rel(padding).grow_to_fit_aspect(AspectRatio::SQUARE))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn landmarks_get_set() {
        let mut lms = Landmarks::new(3);
        assert_eq!(lms.len(), 3);
        assert_eq!(lms.get(2).position(), [0.0; 3]);

        lms.set(1, Landmark::new([1.0, 2.0, 3.0]).with_visibility(0.75));
        let lm = lms.get(1);
        assert_eq!(lm.position(), [1.0, 2.0, 3.0]);
        assert_eq!(lm.visibility(), Some(0.75));
        assert_eq!(lm.presence(), None);
    }

    #[test]
    fn normalized() {
        let lm = Landmark::new([320.0, 120.0, -5.0]).with_presence(1.0);
        let n = lm.normalized(Resolution::VGA);
        assert_eq!(n.position(), [0.5, 0.25, -5.0]);
        assert_eq!(n.presence(), Some(1.0));
    }

    #[test]
    fn map_landmarks_to_image() {
        let mut lms: Landmarks = [
            Landmark::new([0.0, 0.0, 0.0]),
            Landmark::new([256.0, 128.0, 10.0]),
        ]
        .into_iter()
        .collect();

        // A 512x512 region at (100, 50) fed into a 256x256 network.
        map_to_image(
            &mut lms,
            Resolution::new(256, 256),
            Rect::from_top_left(100.0, 50.0, 512.0, 512.0),
        );
        assert_eq!(lms.get(0).position(), [100.0, 50.0, 0.0]);
        assert_eq!(lms.get(1).position(), [612.0, 306.0, 20.0]);
    }

    #[test]
    fn next_roi_is_padded_square() {
        let lms: Landmarks = [
            Landmark::new([10.0, 10.0, 0.0]),
            Landmark::new([20.0, 50.0, 0.0]),
        ]
        .into_iter()
        .collect();

        let roi = next_roi(&lms, 0.25).unwrap();
        assert_relative_eq!(roi.width(), roi.height());
        assert_relative_eq!(roi.height(), 60.0);
        assert_eq!(roi.center(), [15.0, 30.0]);

        assert_eq!(next_roi(&Landmarks::new(0), 0.25), None);
    }

    #[test]
    fn filter_smooths_and_resets() {
        let mut filter = LandmarkFilter::ema(0.5);
        let mut lms = Landmarks::new(1);
        filter.filter(&mut lms);

        lms.set(0, Landmark::new([2.0, 4.0, 6.0]));
        filter.filter(&mut lms);
        assert_eq!(lms.get(0).position(), [1.0, 2.0, 3.0]);

        filter.reset();
        lms.set(0, Landmark::new([2.0, 4.0, 6.0]));
        filter.filter(&mut lms);
        assert_eq!(lms.get(0).position(), [2.0, 4.0, 6.0]);
    }

    #[test]
    fn default_filter_does_nothing() {
        let mut filter = LandmarkFilter::default();
        let mut lms = Landmarks::new(2);
        lms.set(0, Landmark::new([fastrand::f32(), 1.0, 2.0]));
        let before = lms.clone();
        filter.filter(&mut lms);
        assert_eq!(lms, before);
    }
}
