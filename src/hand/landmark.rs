//! Hand landmark prediction.

use std::path::Path;

use crate::iter::zip_exact;
use crate::landmark::{Confidence, Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};

use super::HandLandmark;

/// Landmark results estimated by [`HandLandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        LandmarkResult {
            landmarks: Landmarks::new(HandLandmark::COUNT),
            presence: 0.0,
            raw_handedness: 0.0,
        }
    }
}

impl LandmarkResult {
    pub fn get(&self, lm: HandLandmark) -> Landmark {
        self.landmarks.get(lm as usize)
    }

    /// Returns the handedness the network assigned to the hand, assuming an unmirrored image.
    ///
    /// The holistic pipeline does not rely on this, since it knows which pose wrist a hand belongs
    /// to.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }
}

impl Confidence for LandmarkResult {
    #[inline]
    fn confidence(&self) -> f32 {
        self.presence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// The hand landmark network, in either its *lite* or *full* variant.
pub struct HandLandmarkNetwork {
    cnn: Cnn,
}

impl HandLandmarkNetwork {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for HandLandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) {
        extract(outputs, estimate);
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) {
    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];

    assert_eq!(screen_landmarks.shape(), &[1, HandLandmark::COUNT * 3]);
    assert_eq!(presence_flag.shape(), &[1, 1]);
    assert_eq!(handedness.shape(), &[1, 1]);

    estimate.presence = presence_flag.index([0, 0]).as_singular();
    estimate.raw_handedness = handedness.index([0, 0]).as_singular();

    let values = screen_landmarks.index([0]).as_slice();
    for (i, xyz) in zip_exact(0..HandLandmark::COUNT, values.chunks_exact(3)) {
        estimate
            .landmarks
            .set(i, Landmark::new([xyz[0], xyz[1], xyz[2]]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::tensor::Tensor;

    #[test]
    fn extract_hand_output() {
        let n = HandLandmark::COUNT * 3;
        let outputs: Outputs = [
            Tensor::from_iter(&[1, n], (0..n).map(|i| i as f32)),
            Tensor::from_iter(&[1, 1], [0.9]),
            Tensor::from_iter(&[1, 1], [0.2]),
            Tensor::from_iter(&[1, n], (0..n).map(|_| 0.0)),
        ]
        .into_iter()
        .collect();

        let mut result = LandmarkResult::default();
        extract(&outputs, &mut result);
        assert_eq!(result.confidence(), 0.9);
        assert_eq!(result.handedness(), Handedness::Left);
        assert_eq!(
            result.get(HandLandmark::ThumbCmc).position(),
            [3.0, 4.0, 5.0]
        );
    }
}
