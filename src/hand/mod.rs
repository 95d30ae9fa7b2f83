//! Hand landmark estimation.
//!
//! Hands are not detected separately: their regions of interest are derived from the wrist, index
//! and pinky landmarks of the body pose (see [`roi_from_pose`]).

pub mod landmark;

use nalgebra::Vector2;

use crate::image::Rect;
use crate::landmark::Landmark;

/// Names for the hand landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    pub const COUNT: usize = 21;
}

/// Pairs of hand landmarks that are connected by a line when drawing the hand.
pub const HAND_CONNECTIONS: &[(HandLandmark, HandLandmark)] = {
    use HandLandmark::*;
    &[
        // Palm:
        (Wrist, ThumbCmc),
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (Wrist, PinkyMcp),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// Computes the region of interest of a hand from the body pose's wrist, index and pinky
/// landmarks (in image coordinates).
///
/// The knuckles are approximated as the midpoint of the index and pinky landmarks. The returned
/// square is centered at the knuckles and 4 times as large as the wrist-knuckle distance, which
/// covers outstretched fingers in any direction.
///
/// Returns `None` when the landmarks coincide and no size can be derived.
pub fn roi_from_pose(wrist: Landmark, index: Landmark, pinky: Landmark) -> Option<Rect> {
    let xy = |lm: Landmark| Vector2::new(lm.x(), lm.y());
    let wrist = xy(wrist);
    let knuckles = (xy(index) + xy(pinky)) / 2.0;

    let size = (knuckles - wrist).norm() * 4.0;
    if !(size > 0.0) {
        return None;
    }
    Some(Rect::from_center(knuckles.x, knuckles.y, size, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_centered_on_knuckles() {
        let roi = roi_from_pose(
            Landmark::new([100.0, 100.0, 0.0]),
            Landmark::new([90.0, 80.0, 0.0]),
            Landmark::new([110.0, 80.0, 0.0]),
        )
        .unwrap();
        assert_eq!(roi.center(), [100.0, 80.0]);
        assert_eq!(roi.width(), 80.0);
        assert_eq!(roi.height(), 80.0);
    }

    #[test]
    fn degenerate_roi() {
        let lm = Landmark::new([5.0, 5.0, 0.0]);
        assert_eq!(roi_from_pose(lm, lm, lm), None);
    }

    #[test]
    fn connections_are_in_range() {
        for &(a, b) in HAND_CONNECTIONS {
            assert!((a as usize) < HandLandmark::COUNT);
            assert!((b as usize) < HandLandmark::COUNT);
        }
        assert_eq!(HandLandmark::PinkyTip as usize + 1, HandLandmark::COUNT);
    }
}
