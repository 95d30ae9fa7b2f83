//! The combined body pose, hand and face pipeline.

use crate::body::{self, PoseLandmark};
use crate::config::Settings;
use crate::detection::{Detection, Detector};
use crate::face;
use crate::hand;
use crate::image::{Image, Rect, Resolution};
use crate::landmark::{
    Confidence, Estimate, Estimator, Landmark, LandmarkFilter, LandmarkTracker, Landmarks,
};
use crate::num::TotalF32;
use crate::timer::Timer;

/// Smoothing factor of the EMA applied to pose landmarks.
const POSE_FILTER_ALPHA: f32 = 0.6;

/// Minimum visibility of a pose wrist before a hand is estimated there.
const MIN_WRIST_VISIBILITY: f32 = 0.5;

/// Landmarks found in a single frame.
///
/// All positions are in pixels of the processed frame. Every part is optional: hands and face can
/// only be present when the pose is.
#[derive(Debug, Clone)]
pub struct HolisticResult {
    pub resolution: Resolution,
    /// The 33 body landmarks (see [`PoseLandmark`]).
    pub pose: Option<Landmarks>,
    /// The 468 face mesh landmarks.
    pub face: Option<Landmarks>,
    /// The 21 landmarks of the person's left hand.
    pub left_hand: Option<Landmarks>,
    /// The 21 landmarks of the person's right hand.
    pub right_hand: Option<Landmarks>,
}

impl HolisticResult {
    /// Creates a result without any landmarks.
    pub fn empty(resolution: Resolution) -> Self {
        Self {
            resolution,
            pose: None,
            face: None,
            left_hand: None,
            right_hand: None,
        }
    }

    pub fn has_pose(&self) -> bool {
        self.pose.is_some()
    }

    /// Returns a pose landmark with X and Y divided by the frame width and height, so that the
    /// frame spans `0.0..=1.0` on both axes.
    pub fn pose_normalized(&self, lm: PoseLandmark) -> Option<Landmark> {
        let pose = self.pose.as_ref()?;
        Some(pose.get(lm as usize).normalized(self.resolution))
    }
}

/// Anything that turns a frame into a [`HolisticResult`].
///
/// Implemented by [`Holistic`]; tests substitute canned results.
pub trait Process {
    fn process(&mut self, frame: &Image) -> anyhow::Result<HolisticResult>;
}

/// The holistic landmark pipeline.
///
/// The body pose is tracked across frames and only re-detected once tracking is lost. Hands and
/// the face are estimated from scratch in every frame, in regions derived from the pose.
pub struct Holistic {
    pose_detector: Detector,
    pose_tracker: LandmarkTracker<body::landmark::LandmarkResult>,
    hand: Option<Estimator<hand::landmark::LandmarkResult>>,
    face: Option<Estimator<face::landmark::LandmarkResult>>,
    min_tracking_confidence: f32,
    t_total: Timer,
}

impl Holistic {
    /// Loads all networks enabled in `settings`.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut pose_detector = Detector::new(body::detection::PoseNetwork::load(
            &settings.pose_detection_model(),
        )?);
        pose_detector.set_threshold(settings.min_detection_confidence);

        let mut pose_estimator = Estimator::new(body::landmark::PoseLandmarkNetwork::load(
            &settings.pose_landmark_model(),
        )?);
        pose_estimator.set_filter(LandmarkFilter::ema(POSE_FILTER_ALPHA));
        let mut pose_tracker = LandmarkTracker::new(pose_estimator);
        pose_tracker.set_loss_threshold(settings.min_tracking_confidence);

        let hand = if settings.enable_hands {
            Some(Estimator::new(hand::landmark::HandLandmarkNetwork::load(
                &settings.hand_landmark_model(),
            )?))
        } else {
            None
        };
        let face = if settings.enable_face {
            Some(Estimator::new(face::landmark::FaceMeshNetwork::load(
                &settings.face_landmark_model(),
            )?))
        } else {
            None
        };

        log::info!(
            "loaded networks from {} (hands: {}, face: {})",
            settings.model_dir.display(),
            hand.is_some(),
            face.is_some(),
        );

        Ok(Self {
            pose_detector,
            pose_tracker,
            hand,
            face,
            min_tracking_confidence: settings.min_tracking_confidence,
            t_total: Timer::new("holistic"),
        })
    }

    /// Returns the profiling timers of all stages.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        std::iter::once(&self.t_total)
            .chain(self.pose_detector.timers())
            .chain(self.pose_tracker.timers())
    }
}

/// A part of the body that is estimated in a region derived from the pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    LeftHand,
    RightHand,
    Face,
}

impl Part {
    const ALL: [Part; 3] = [Part::LeftHand, Part::RightHand, Part::Face];

    /// Computes the region to run this part's network on, or `None` if the pose doesn't locate it.
    fn roi(self, pose: &Landmarks) -> Option<Rect> {
        match self {
            Part::LeftHand => hand_roi(
                pose,
                [
                    PoseLandmark::LeftWrist,
                    PoseLandmark::LeftIndex,
                    PoseLandmark::LeftPinky,
                ],
            ),
            Part::RightHand => hand_roi(
                pose,
                [
                    PoseLandmark::RightWrist,
                    PoseLandmark::RightIndex,
                    PoseLandmark::RightPinky,
                ],
            ),
            Part::Face => face::roi_from_pose(
                (PoseLandmark::Nose as usize..=PoseLandmark::MouthRight as usize)
                    .map(|i| pose.get(i)),
            ),
        }
    }
}

/// Hand region around the pose's knuckles; `None` while the wrist isn't visible enough.
fn hand_roi(pose: &Landmarks, [wrist, index, pinky]: [PoseLandmark; 3]) -> Option<Rect> {
    let wrist = pose.get(wrist as usize);
    if wrist.visibility().unwrap_or(0.0) < MIN_WRIST_VISIBILITY {
        return None;
    }
    hand::roi_from_pose(wrist, pose.get(index as usize), pose.get(pinky as usize))
}

/// Region to restart pose tracking from: the one of the most confident detection.
fn seed_roi(detections: &[Detection]) -> Option<Rect> {
    detections
        .iter()
        .max_by_key(|det| TotalF32(det.confidence()))
        .and_then(body::detection::landmark_roi)
}

fn track_pose(
    detector: &mut Detector,
    tracker: &mut LandmarkTracker<body::landmark::LandmarkResult>,
    image: &Image,
) -> anyhow::Result<Option<Landmarks>> {
    if tracker.roi().is_none() {
        if let Some(roi) = seed_roi(detector.detect(image)?) {
            log::trace!("seeding pose tracker with {:?}", roi);
            tracker.set_roi(roi);
        }
    }

    Ok(tracker
        .track(image)?
        .map(|estimate| estimate.pose_landmarks()))
}

/// Builds the result for a frame from its pose.
///
/// `estimate` is called once for every part the pose locates, and never without a pose.
fn assemble<F>(
    resolution: Resolution,
    pose: Option<Landmarks>,
    mut estimate: F,
) -> anyhow::Result<HolisticResult>
where
    F: FnMut(Part, Rect) -> anyhow::Result<Option<Landmarks>>,
{
    let mut result = HolisticResult::empty(resolution);
    let Some(pose) = pose else {
        return Ok(result);
    };

    for part in Part::ALL {
        let Some(roi) = part.roi(&pose) else {
            continue;
        };
        let landmarks = estimate(part, roi)?;
        match part {
            Part::LeftHand => result.left_hand = landmarks,
            Part::RightHand => result.right_hand = landmarks,
            Part::Face => result.face = landmarks,
        }
    }
    result.pose = Some(pose);

    Ok(result)
}

fn estimate_part<E: Estimate + Confidence>(
    estimator: Option<&mut Estimator<E>>,
    image: &Image,
    roi: Rect,
    threshold: f32,
) -> anyhow::Result<Option<Landmarks>> {
    let Some(estimator) = estimator else {
        return Ok(None);
    };
    let estimate = estimator.estimate(image, roi)?;
    Ok(confident(&*estimate, threshold))
}

fn confident<E: Estimate + Confidence>(estimate: &E, threshold: f32) -> Option<Landmarks> {
    (estimate.confidence() >= threshold).then(|| estimate.landmarks().clone())
}

impl Process for Holistic {
    fn process(&mut self, frame: &Image) -> anyhow::Result<HolisticResult> {
        let Self {
            pose_detector,
            pose_tracker,
            hand,
            face,
            min_tracking_confidence,
            t_total,
        } = self;
        let _guard = t_total.start();
        let threshold = *min_tracking_confidence;

        let pose = track_pose(pose_detector, pose_tracker, frame)?;
        assemble(frame.resolution(), pose, |part, roi| match part {
            Part::LeftHand | Part::RightHand => {
                estimate_part(hand.as_mut(), frame, roi, threshold)
            }
            Part::Face => estimate_part(face.as_mut(), frame, roi, threshold),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Keypoint;

    /// A pose with the wrists, knuckles and head points spread over a 640x480 frame.
    fn pose(wrist_visibility: f32) -> Landmarks {
        let mut pose = Landmarks::new(PoseLandmark::COUNT);
        for i in PoseLandmark::Nose as usize..=PoseLandmark::MouthRight as usize {
            pose.set(
                i,
                Landmark::new([300.0 + i as f32 * 4.0, 80.0 + i as f32 * 2.0, 0.0])
                    .with_visibility(0.9),
            );
        }
        let mut put = |lm: PoseLandmark, x: f32, y: f32, vis: f32| {
            pose.set(lm as usize, Landmark::new([x, y, 0.0]).with_visibility(vis));
        };
        put(PoseLandmark::LeftWrist, 500.0, 300.0, wrist_visibility);
        put(PoseLandmark::LeftIndex, 490.0, 280.0, 0.9);
        put(PoseLandmark::LeftPinky, 510.0, 280.0, 0.9);
        put(PoseLandmark::RightWrist, 140.0, 300.0, wrist_visibility);
        put(PoseLandmark::RightIndex, 150.0, 280.0, 0.9);
        put(PoseLandmark::RightPinky, 130.0, 280.0, 0.9);
        pose
    }

    fn marker(value: f32) -> Option<Landmarks> {
        let mut lms = Landmarks::new(1);
        lms.set(0, Landmark::new([value, 0.0, 0.0]));
        Some(lms)
    }

    struct Scored {
        landmarks: Landmarks,
        score: f32,
    }

    impl Estimate for Scored {
        fn landmarks(&self) -> &Landmarks {
            &self.landmarks
        }

        fn landmarks_mut(&mut self) -> &mut Landmarks {
            &mut self.landmarks
        }
    }

    impl Confidence for Scored {
        fn confidence(&self) -> f32 {
            self.score
        }
    }

    #[test]
    fn normalized_pose() {
        let mut pose = Landmarks::new(PoseLandmark::COUNT);
        pose.set(
            PoseLandmark::RightWrist as usize,
            Landmark::new([320.0, 120.0, 5.0]),
        );
        let mut result = HolisticResult::empty(Resolution::new(640, 480));
        assert_eq!(result.pose_normalized(PoseLandmark::RightWrist), None);

        result.pose = Some(pose);
        let wrist = result.pose_normalized(PoseLandmark::RightWrist).unwrap();
        assert_eq!(wrist.x(), 0.5);
        assert_eq!(wrist.y(), 0.25);
        assert_eq!(wrist.z(), 5.0);
    }

    #[test]
    fn no_parts_without_pose() {
        let mut calls = 0;
        let result = assemble(Resolution::VGA, None, |_, _| {
            calls += 1;
            Ok(marker(1.0))
        })
        .unwrap();
        assert_eq!(calls, 0);
        assert!(!result.has_pose());
        assert!(result.face.is_none());
        assert!(result.left_hand.is_none());
        assert!(result.right_hand.is_none());
    }

    #[test]
    fn parts_go_to_their_slots() {
        let mut seen = Vec::new();
        let result = assemble(Resolution::VGA, Some(pose(0.9)), |part, roi| {
            seen.push(part);
            Ok(match part {
                Part::LeftHand => {
                    assert_eq!(roi.center(), [500.0, 280.0]);
                    marker(1.0)
                }
                Part::RightHand => {
                    assert_eq!(roi.center(), [140.0, 280.0]);
                    marker(2.0)
                }
                Part::Face => None,
            })
        })
        .unwrap();
        assert_eq!(seen, Part::ALL);
        assert!(result.has_pose());
        assert_eq!(result.left_hand.unwrap().get(0).x(), 1.0);
        assert_eq!(result.right_hand.unwrap().get(0).x(), 2.0);
        assert!(result.face.is_none());
    }

    #[test]
    fn hidden_wrists_skip_hands() {
        let mut seen = Vec::new();
        let result = assemble(Resolution::VGA, Some(pose(0.2)), |part, _| {
            seen.push(part);
            Ok(marker(3.0))
        })
        .unwrap();
        assert_eq!(seen, [Part::Face]);
        assert!(result.left_hand.is_none());
        assert!(result.right_hand.is_none());
        assert!(result.face.is_some());
    }

    #[test]
    fn wrist_visibility_gate() {
        let pose = pose(MIN_WRIST_VISIBILITY);
        let parts = [
            PoseLandmark::LeftWrist,
            PoseLandmark::LeftIndex,
            PoseLandmark::LeftPinky,
        ];
        assert!(hand_roi(&pose, parts).is_some());

        let mut hidden = pose.clone();
        hidden.set(
            PoseLandmark::LeftWrist as usize,
            Landmark::new([500.0, 300.0, 0.0]).with_visibility(0.49),
        );
        assert_eq!(hand_roi(&hidden, parts), None);

        // Landmarks without visibility count as invisible.
        let mut unknown = pose;
        unknown.set(
            PoseLandmark::LeftWrist as usize,
            Landmark::new([500.0, 300.0, 0.0]),
        );
        assert_eq!(hand_roi(&unknown, parts), None);
    }

    #[test]
    fn estimate_errors_propagate() {
        let err = assemble(Resolution::VGA, Some(pose(0.9)), |_, _| {
            anyhow::bail!("inference failed")
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "inference failed");
    }

    #[test]
    fn confidence_threshold_is_inclusive() {
        let est = Scored {
            landmarks: Landmarks::new(21),
            score: 0.5,
        };
        assert_eq!(confident(&est, 0.5).map(|lms| lms.len()), Some(21));
        assert_eq!(confident(&est, 0.51), None);
    }

    #[test]
    fn seeds_from_most_confident_detection() {
        let det = |conf: f32, x: f32| {
            Detection::with_keypoints(
                conf,
                Rect::from_center(x, 100.0, 50.0, 50.0),
                vec![Keypoint::new(x, 100.0), Keypoint::new(x, 60.0)],
            )
        };
        assert_eq!(seed_roi(&[]), None);

        let roi = seed_roi(&[det(0.6, 10.0), det(0.9, 300.0), det(0.7, 500.0)]).unwrap();
        assert_eq!(roi.center(), [300.0, 100.0]);
        assert_eq!(roi.width(), 100.0);

        let without_keypoints = Detection::new(0.99, Rect::from_center(0.0, 0.0, 9.0, 9.0));
        assert_eq!(seed_roi(&[without_keypoints, det(0.6, 10.0)]), None);
    }
}
