//! Labels simple poses from body landmark positions.

use std::fmt;

use crate::body::PoseLandmark;
use crate::holistic::HolisticResult;

/// How far (in normalized frame heights) a wrist has to be above its shoulder to count as raised.
const RAISE_MARGIN: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// No pose is available.
    #[default]
    None,
    Standing,
    RaisingRightHand,
    RaisingLeftHand,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::None => "None",
            Action::Standing => "Standing",
            Action::RaisingRightHand => "Raising Right Hand",
            Action::RaisingLeftHand => "Raising Left Hand",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies the pose in `result`.
///
/// Y grows downwards, so a raised wrist has a *smaller* Y than its shoulder. The right hand is
/// checked first.
pub fn classify(result: Option<&HolisticResult>) -> Action {
    let Some(result) = result else {
        return Action::None;
    };
    let y = |lm: PoseLandmark| result.pose_normalized(lm).map(|lm| lm.y());
    let raised = |wrist, shoulder| -> Option<bool> {
        Some(y(wrist)? < y(shoulder)? - RAISE_MARGIN)
    };

    let Some(right) = raised(PoseLandmark::RightWrist, PoseLandmark::RightShoulder) else {
        return Action::None;
    };
    if right {
        return Action::RaisingRightHand;
    }
    if raised(PoseLandmark::LeftWrist, PoseLandmark::LeftShoulder) == Some(true) {
        return Action::RaisingLeftHand;
    }
    Action::Standing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Resolution;
    use crate::landmark::{Landmark, Landmarks};

    /// Builds a 100x100 frame result with the given wrist and shoulder heights (in pixels).
    fn pose(right: (f32, f32), left: (f32, f32)) -> HolisticResult {
        let mut lms = Landmarks::new(PoseLandmark::COUNT);
        let mut set =
            |lm: PoseLandmark, y: f32| lms.set(lm as usize, Landmark::new([50.0, y, 0.0]));
        set(PoseLandmark::RightWrist, right.0);
        set(PoseLandmark::RightShoulder, right.1);
        set(PoseLandmark::LeftWrist, left.0);
        set(PoseLandmark::LeftShoulder, left.1);

        let mut result = HolisticResult::empty(Resolution::new(100, 100));
        result.pose = Some(lms);
        result
    }

    #[test]
    fn no_pose() {
        assert_eq!(classify(None), Action::None);
        let empty = HolisticResult::empty(Resolution::new(10, 10));
        assert_eq!(classify(Some(&empty)), Action::None);
    }

    #[test]
    fn raised_hands() {
        let r = pose((10.0, 40.0), (70.0, 40.0));
        assert_eq!(classify(Some(&r)), Action::RaisingRightHand);
        let r = pose((70.0, 40.0), (10.0, 40.0));
        assert_eq!(classify(Some(&r)), Action::RaisingLeftHand);
        // Right wins when both are raised.
        let r = pose((10.0, 40.0), (10.0, 40.0));
        assert_eq!(classify(Some(&r)), Action::RaisingRightHand);
    }

    #[test]
    fn small_raise_is_standing() {
        let r = pose((31.0, 50.0), (31.0, 50.0));
        assert_eq!(classify(Some(&r)), Action::Standing);
        let r = pose((29.0, 50.0), (70.0, 50.0));
        assert_eq!(classify(Some(&r)), Action::RaisingRightHand);
    }

    #[test]
    fn labels() {
        assert_eq!(Action::default().to_string(), "None");
        assert_eq!(Action::RaisingRightHand.to_string(), "Raising Right Hand");
        assert_eq!(Action::RaisingLeftHand.to_string(), "Raising Left Hand");
        assert_eq!(Action::Standing.to_string(), "Standing");
    }
}
