//! Face mesh landmark prediction.

use std::path::Path;

use crate::iter::zip_exact;
use crate::landmark::{Confidence, Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

use super::NUM_LANDMARKS;

/// Landmark results estimated by [`FaceMeshNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    face_flag: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            face_flag: 0.0,
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
        self.face_flag
    }
}

/// The 468-point face mesh network.
pub struct FaceMeshNetwork {
    cnn: Cnn,
}

impl FaceMeshNetwork {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(-1.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for FaceMeshNetwork {
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
    let face_flag = &outputs[1];

    assert_eq!(screen_landmarks.shape(), &[1, 1, 1, NUM_LANDMARKS * 3]);
    assert_eq!(face_flag.shape(), &[1, 1, 1, 1]);

    estimate.face_flag = sigmoid(face_flag.index([0, 0, 0, 0]).as_singular());

    let values = screen_landmarks.index([0, 0, 0]).as_slice();
    for (i, xyz) in zip_exact(0..NUM_LANDMARKS, values.chunks_exact(3)) {
        estimate
            .landmarks
            .set(i, Landmark::new([xyz[0], xyz[1], xyz[2]]));
    }
}
