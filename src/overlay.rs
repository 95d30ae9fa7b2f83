//! Draws holistic landmarks on top of a frame.

use crate::body::POSE_CONNECTIONS;
use crate::face::FACEMESH_CONTOURS;
use crate::hand::HAND_CONNECTIONS;
use crate::holistic::HolisticResult;
use crate::image::{draw, Color, Image};
use crate::landmark::{Landmark, Landmarks};

/// Landmarks whose visibility or presence is below this are not drawn.
const MIN_DRAW_PROBABILITY: f32 = 0.5;

/// How landmarks or their connections are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawingSpec {
    pub color: Color,
    /// Stroke width of connection lines.
    pub thickness: u32,
    /// Radius of landmark circles.
    pub circle_radius: u32,
}

impl DrawingSpec {
    pub const FACE_LANDMARKS: Self = Self::new(Color::from_bgr8(80, 110, 10), 1, 1);
    pub const FACE_CONNECTIONS: Self = Self::new(Color::from_bgr8(80, 255, 121), 1, 1);
    pub const RIGHT_HAND_LANDMARKS: Self = Self::new(Color::from_bgr8(80, 22, 10), 2, 4);
    pub const RIGHT_HAND_CONNECTIONS: Self = Self::new(Color::from_bgr8(80, 44, 121), 2, 2);
    pub const LEFT_HAND_LANDMARKS: Self = Self::new(Color::from_bgr8(121, 22, 76), 2, 4);
    pub const LEFT_HAND_CONNECTIONS: Self = Self::new(Color::from_bgr8(121, 44, 250), 2, 2);
    pub const POSE_LANDMARKS: Self = Self::new(Color::from_bgr8(245, 117, 66), 2, 4);
    pub const POSE_CONNECTIONS: Self = Self::new(Color::from_bgr8(245, 66, 230), 2, 2);

    pub const fn new(color: Color, thickness: u32, circle_radius: u32) -> Self {
        Self {
            color,
            thickness,
            circle_radius,
        }
    }
}

fn is_drawn(lm: &Landmark) -> bool {
    let ok = |p: Option<f32>| p.map_or(true, |p| p >= MIN_DRAW_PROBABILITY);
    ok(lm.visibility()) && ok(lm.presence())
}

/// Draws `landmarks` and the lines between the landmark index pairs in `connections`.
///
/// All lines are drawn before the landmark circles, so that the circles stay on top. Landmarks
/// that the network considers invisible or absent are skipped, together with their connections.
pub fn draw_landmarks<C>(
    image: &mut Image,
    landmarks: &Landmarks,
    connections: C,
    landmark_spec: DrawingSpec,
    connection_spec: DrawingSpec,
) where
    C: IntoIterator<Item = (usize, usize)>,
{
    let point = |lm: Landmark| (lm.x().round() as i32, lm.y().round() as i32);

    for (a, b) in connections {
        if a >= landmarks.len() || b >= landmarks.len() {
            log::warn!("connection ({a}, {b}) out of range for {} landmarks", landmarks.len());
            continue;
        }
        let (a, b) = (landmarks.get(a), landmarks.get(b));
        if !is_drawn(&a) || !is_drawn(&b) {
            continue;
        }
        let ((ax, ay), (bx, by)) = (point(a), point(b));
        draw::line(image, ax, ay, bx, by)
            .color(connection_spec.color)
            .stroke_width(connection_spec.thickness);
    }

    for lm in landmarks.iter().filter(is_drawn) {
        let (x, y) = point(lm);
        draw::circle(image, x, y, landmark_spec.circle_radius * 2 + 1)
            .color(landmark_spec.color)
            .filled(true);
    }
}

/// Draws every part of `result` that is present: face, right hand, left hand, then the pose.
pub fn draw_result(image: &mut Image, result: &HolisticResult) {
    if let Some(face) = &result.face {
        draw_landmarks(
            image,
            face,
            FACEMESH_CONTOURS.iter().copied(),
            DrawingSpec::FACE_LANDMARKS,
            DrawingSpec::FACE_CONNECTIONS,
        );
    }
    let hand_connections = || HAND_CONNECTIONS.iter().map(|&(a, b)| (a as usize, b as usize));
    if let Some(hand) = &result.right_hand {
        draw_landmarks(
            image,
            hand,
            hand_connections(),
            DrawingSpec::RIGHT_HAND_LANDMARKS,
            DrawingSpec::RIGHT_HAND_CONNECTIONS,
        );
    }
    if let Some(hand) = &result.left_hand {
        draw_landmarks(
            image,
            hand,
            hand_connections(),
            DrawingSpec::LEFT_HAND_LANDMARKS,
            DrawingSpec::LEFT_HAND_CONNECTIONS,
        );
    }
    if let Some(pose) = &result.pose {
        draw_landmarks(
            image,
            pose,
            POSE_CONNECTIONS.iter().map(|&(a, b)| (a as usize, b as usize)),
            DrawingSpec::POSE_LANDMARKS,
            DrawingSpec::POSE_CONNECTIONS,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Resolution;

    fn two_points(b: Landmark) -> Landmarks {
        [Landmark::new([5.0, 10.0, 0.0]), b].into_iter().collect()
    }

    #[test]
    fn drawing_colors_are_rgb() {
        let c = DrawingSpec::POSE_LANDMARKS.color;
        assert_eq!((c.r(), c.g(), c.b()), (66, 117, 245));
        let c = DrawingSpec::FACE_CONNECTIONS.color;
        assert_eq!((c.r(), c.g(), c.b()), (121, 255, 80));
    }

    #[test]
    fn circles_drawn_over_lines() {
        let mut image = Image::filled(Resolution::new(40, 20), Color::BLACK);
        let lms = two_points(Landmark::new([35.0, 10.0, 0.0]));
        draw_landmarks(
            &mut image,
            &lms,
            [(0, 1)],
            DrawingSpec::POSE_LANDMARKS,
            DrawingSpec::POSE_CONNECTIONS,
        );
        assert_eq!(image.get(5, 10), DrawingSpec::POSE_LANDMARKS.color);
        assert_eq!(image.get(35, 10), DrawingSpec::POSE_LANDMARKS.color);
        assert_eq!(image.get(20, 10), DrawingSpec::POSE_CONNECTIONS.color);
        assert_eq!(image.get(20, 0), Color::BLACK);
    }

    #[test]
    fn invisible_landmarks_are_skipped() {
        let mut image = Image::filled(Resolution::new(40, 20), Color::BLACK);
        let lms = two_points(Landmark::new([35.0, 10.0, 0.0]).with_visibility(0.1));
        draw_landmarks(
            &mut image,
            &lms,
            [(0, 1), (0, 7)],
            DrawingSpec::POSE_LANDMARKS,
            DrawingSpec::POSE_CONNECTIONS,
        );
        assert_eq!(image.get(5, 10), DrawingSpec::POSE_LANDMARKS.color);
        assert_eq!(image.get(35, 10), Color::BLACK);
        assert_eq!(image.get(20, 10), Color::BLACK);
    }

    #[test]
    fn empty_result_draws_nothing() {
        let res = Resolution::new(8, 8);
        let mut image = Image::filled(res, Color::BLACK);
        draw_result(&mut image, &HolisticResult::empty(res));
        assert_eq!(image.data(), Image::filled(res, Color::BLACK).data());
    }
}
