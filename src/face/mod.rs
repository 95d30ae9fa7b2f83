//! Face mesh estimation.
//!
//! Like hands, faces are located through the body pose: [`roi_from_pose`] derives the region the
//! [`landmark::FaceMeshNetwork`] runs on from the pose's head landmarks.

pub mod landmark;

use itertools::Itertools;
use once_cell::sync::Lazy;

use crate::image::Rect;
use crate::landmark::Landmark;

/// Number of landmarks in the face mesh.
pub const NUM_LANDMARKS: usize = 468;

const FACE_OVAL: &[usize] = &[
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109, 10,
];

const LIPS: &[&[usize]] = &[
    &[61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291],
    &[61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291],
    &[78, 191, 80, 81, 82, 13, 312, 311, 310, 415, 308],
    &[78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308],
];

const LEFT_EYE: &[&[usize]] = &[
    &[263, 249, 390, 373, 374, 380, 381, 382, 362],
    &[263, 466, 388, 387, 386, 385, 384, 398, 362],
];

const LEFT_EYEBROW: &[&[usize]] = &[&[276, 283, 282, 295, 285], &[300, 293, 334, 296, 336]];

const RIGHT_EYE: &[&[usize]] = &[
    &[33, 7, 163, 144, 145, 153, 154, 155, 133],
    &[33, 246, 161, 160, 159, 158, 157, 173, 133],
];

const RIGHT_EYEBROW: &[&[usize]] = &[&[46, 53, 52, 65, 55], &[70, 63, 105, 66, 107]];

/// Landmark index pairs outlining the lips, eyes, eyebrows and the face oval.
pub static FACEMESH_CONTOURS: Lazy<Vec<(usize, usize)>> = Lazy::new(|| {
    let polylines = [FACE_OVAL]
        .into_iter()
        .chain(LIPS.iter().copied())
        .chain(LEFT_EYE.iter().copied())
        .chain(LEFT_EYEBROW.iter().copied())
        .chain(RIGHT_EYE.iter().copied())
        .chain(RIGHT_EYEBROW.iter().copied());
    polylines
        .flat_map(|line| line.iter().copied().tuple_windows())
        .collect()
});

/// Computes the face region of interest from the head landmarks of a body pose (nose, eyes, ears
/// and mouth corners, in image coordinates).
///
/// The returned square is centered on the head landmarks and 1.5 times as large as their extent,
/// which is roughly the distance between the ears.
pub fn roi_from_pose(head: impl IntoIterator<Item = Landmark>) -> Option<Rect> {
    let rect = Rect::bounding(head.into_iter().map(|lm| [lm.x(), lm.y()]))?;
    let size = rect.width().max(rect.height()) * 1.5;
    if !(size > 0.0) {
        return None;
    }
    let [x, y] = rect.center();
    Some(Rect::from_center(x, y, size, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contours() {
        let oval = FACE_OVAL.len() - 1;
        let lips = LIPS.iter().map(|l| l.len() - 1).sum::<usize>();
        assert_eq!(oval, 36);
        assert_eq!(lips, 40);
        assert_eq!(FACEMESH_CONTOURS.len(), 124);
        assert!(FACEMESH_CONTOURS.contains(&(109, 10)));
        assert!(FACEMESH_CONTOURS
            .iter()
            .all(|&(a, b)| a < NUM_LANDMARKS && b < NUM_LANDMARKS));
    }

    #[test]
    fn roi() {
        let head = [[100.0, 50.0], [140.0, 50.0], [120.0, 60.0]]
            .map(|[x, y]| Landmark::new([x, y, 0.0]));
        let roi = roi_from_pose(head).unwrap();
        assert_eq!(roi.center(), [120.0, 55.0]);
        assert_eq!(roi.width(), 60.0);
        assert_eq!(roi.height(), 60.0);

        assert_eq!(roi_from_pose([]), None);
    }
}
