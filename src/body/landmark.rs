//! Body pose landmark prediction.

use std::path::Path;

use crate::landmark::{Confidence, Estimate, Landmark, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

use super::PoseLandmark;

/// Number of auxiliary landmarks the network outputs after the pose landmarks.
const NUM_AUX: usize = 6;

/// Landmark results estimated by [`PoseLandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    pose_presence: f32,
    landmarks: Landmarks,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            pose_presence: 0.0,
            landmarks: Landmarks::new(PoseLandmark::COUNT + NUM_AUX),
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
        self.pose_presence
    }
}

impl LandmarkResult {
    /// Returns the 33 body landmarks, without the auxiliary ones.
    pub fn pose_landmarks(&self) -> Landmarks {
        self.landmarks.iter().take(PoseLandmark::COUNT).collect()
    }

    pub fn get(&self, lm: PoseLandmark) -> Landmark {
        self.landmarks.get(lm as usize)
    }

    #[inline]
    pub fn presence(&self) -> f32 {
        self.pose_presence
    }
}

/// The body pose landmark network.
///
/// MediaPipe ships it in a *lite* and a *full* variant, which only differ in accuracy and speed;
/// both are loaded through this type.
pub struct PoseLandmarkNetwork {
    cnn: Cnn,
}

impl PoseLandmarkNetwork {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        // Segmentation mask, heatmap and world landmarks are not needed.
        let nn = NeuralNetwork::from_path(path)?
            .with_output_selection([0, 1])
            .load()?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self { cnn })
    }
}

impl Network for PoseLandmarkNetwork {
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
    let pose_flag = &outputs[1];

    // 33 pose landmarks, 6 auxiliary landmarks, 5 values each
    assert_eq!(
        screen_landmarks.shape(),
        &[1, (PoseLandmark::COUNT + NUM_AUX) * 5]
    );
    assert_eq!(pose_flag.shape(), &[1, 1]);

    estimate.pose_presence = pose_flag.index([0, 0]).as_singular();

    let values = screen_landmarks.index([0]).as_slice();
    for (i, lm) in values.chunks_exact(5).enumerate() {
        let &[x, y, z, visibility, presence] = lm else {
            unreachable!()
        };
        estimate.landmarks.set(
            i,
            Landmark::new([x, y, z])
                .with_visibility(sigmoid(visibility))
                .with_presence(sigmoid(presence)),
        );
    }
}
