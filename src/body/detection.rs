//! Human body detection.

use std::path::Path;

use nalgebra::Vector2;

use crate::detection::{
    ssd::{Anchor, Anchors, LayerInfo},
    Detection, Network,
};
use crate::image::{Rect, Resolution};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

/// Body pose detection network.
///
/// Use with [`Detector`](crate::detection::Detector).
///
/// This network detects human bodies and computes the keypoints documented in [`Keypoint`].
pub struct PoseNetwork {
    cnn: Cnn,
    anchors: Anchors,
}

impl PoseNetwork {
    const LAYERS: &'static [LayerInfo] = &[
        LayerInfo::new(2, 28, 28),
        LayerInfo::new(2, 14, 14),
        LayerInfo::new(6, 7, 7),
    ];

    /// Loads the detection network from an ONNX file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(-1.0..=1.0),
        )?;
        Ok(Self {
            cnn,
            anchors: Anchors::calculate(Self::LAYERS),
        })
    }
}

impl Network for PoseNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Vec<Detection>) {
        let num_anchors = self.anchors.anchor_count();
        let boxes = &outputs[0];
        let confidences = &outputs[1];

        assert_eq!(boxes.shape(), &[1, num_anchors, 12]);
        assert_eq!(confidences.shape(), &[1, num_anchors, 1]);

        let input_res = self.cnn.input_resolution();
        for (index, view) in confidences.index([0]).iter().enumerate() {
            let conf = sigmoid(view.as_slice()[0]);
            if conf < threshold {
                continue;
            }

            let box_params = boxes.index([0, index]).as_slice();
            detections.push(extract_detection(
                &self.anchors[index],
                input_res,
                box_params,
                conf,
            ));
        }
    }
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    assert_eq!(box_params.len(), 12);

    // Offsets are relative to the anchor center, in input pixels.
    let ax = anchor.x_center() * input_res.width() as f32;
    let ay = anchor.y_center() * input_res.height() as f32;

    let rect = Rect::from_center(
        box_params[0] + ax,
        box_params[1] + ay,
        box_params[2],
        box_params[3],
    );
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| crate::detection::Keypoint::new(xy[0] + ax, xy[1] + ay))
        .collect();

    Detection::with_keypoints(confidence, rect, keypoints)
}

/// Keypoints estimated by the detection network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    /// Center between the hips.
    Hips = 0,
    /// Point on a circle around the full body, centered at [`Keypoint::Hips`].
    FullBody = 1,
    /// Center between the shoulders.
    Shoulders = 2,
    /// Point on a circle around the upper body, centered at [`Keypoint::Shoulders`].
    UpperBody = 3,
}

/// Computes the region of interest to seed the landmark tracker with.
///
/// The region is a square centered at the hips, large enough to contain the circle around the
/// full body, enlarged by 25%.
///
/// Returns `None` if the detection lacks the required keypoints.
pub fn landmark_roi(detection: &Detection) -> Option<Rect> {
    let kp = |which: Keypoint| {
        detection
            .keypoints()
            .get(which as usize)
            .map(|kp| Vector2::new(kp.x(), kp.y()))
    };
    let hips = kp(Keypoint::Hips)?;
    let full_body = kp(Keypoint::FullBody)?;

    let size = (full_body - hips).norm() * 2.0 * 1.25;
    Some(Rect::from_center(hips.x, hips.y, size, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Keypoint as Kp;

    #[test]
    fn extract_offsets_by_anchor() {
        let anchors = Anchors::calculate(&[LayerInfo::new(1, 2, 2)]);
        let params = [
            1.0, -1.0, 10.0, 20.0, // box
            0.0, 0.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0, // keypoints
        ];
        let det = extract_detection(&anchors[0], Resolution::new(224, 224), &params, 0.9);
        assert_eq!(det.confidence(), 0.9);
        assert_eq!(det.bounding_rect().center(), [57.0, 55.0]);
        assert_eq!(det.bounding_rect().width(), 10.0);
        assert_eq!(det.keypoints().len(), 4);
        assert_eq!(det.keypoints()[1], Kp::new(59.0, 60.0));
    }

    #[test]
    fn roi_from_keypoints() {
        let det = Detection::with_keypoints(
            0.8,
            Rect::from_center(0.0, 0.0, 1.0, 1.0),
            vec![
                Kp::new(100.0, 200.0),
                Kp::new(100.0, 100.0),
                Kp::new(100.0, 120.0),
                Kp::new(100.0, 80.0),
            ],
        );
        let roi = landmark_roi(&det).unwrap();
        assert_eq!(roi.center(), [100.0, 200.0]);
        assert_eq!(roi.width(), 250.0);
        assert_eq!(roi.height(), 250.0);

        let no_keypoints = Detection::new(0.8, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        assert_eq!(landmark_roi(&no_keypoints), None);
    }
}
