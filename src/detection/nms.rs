//! Non-Maximum Suppression and Averaging.
//!
//! SSD networks produce many overlapping detections for a single object. Non-Maximum Suppression
//! (NMS) reduces each cluster of overlapping detections to one detection.
//!
//! [`SuppressionMode::Remove`] keeps only the most confident detection of every cluster, while
//! [`SuppressionMode::Average`] replaces the cluster by its confidence-weighted average, which
//! reduces jitter between frames and is the default.

use crate::{image::Rect, iter::zip_exact, num::TotalF32};

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm.
#[derive(Debug)]
pub struct NonMaxSuppression {
    iou_thresh: f32,
    mode: SuppressionMode,
    cluster: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a new non-maximum suppressor using [`SuppressionMode::Average`] and
    /// [`Self::DEFAULT_IOU_THRESH`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            mode: SuppressionMode::Average,
            cluster: Vec::new(),
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Performs non-maximum suppression on `detections`, in place.
    ///
    /// Afterwards, `detections` is sorted by descending confidence.
    pub fn process(&mut self, detections: &mut Vec<Detection>) {
        // Sort by ascending confidence, so that the most confident detection can be popped off the
        // end.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

        let mut out = Vec::with_capacity(detections.len());
        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            self.cluster.clear();
            detections.retain(|other| {
                if seed_rect.iou(&other.bounding_rect()) >= self.iou_thresh {
                    self.cluster.push(other.clone());
                    false
                } else {
                    true
                }
            });

            match self.mode {
                SuppressionMode::Remove => out.push(seed),
                SuppressionMode::Average => {
                    self.cluster.push(seed);
                    out.push(weighted_average(&self.cluster));
                }
            }
        }

        *detections = out;
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Describes how [`NonMaxSuppression`] should deal with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Remove overlapping detections, only retain the detection with highest confidence score.
    Remove,

    /// Compute a confidence-weighted average of overlapping detections.
    Average,
}

/// Averages a non-empty cluster; the result has the confidence of the last (seed) detection.
fn weighted_average(cluster: &[Detection]) -> Detection {
    let seed = &cluster[cluster.len() - 1];
    let total: f32 = cluster.iter().map(|det| det.confidence()).sum();

    let mut center = [0.0; 2];
    let mut size = [0.0; 2];
    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    for det in cluster {
        let weight = det.confidence() / total;
        let rect = det.bounding_rect();
        let [xc, yc] = rect.center();
        center[0] += xc * weight;
        center[1] += yc * weight;
        size[0] += rect.width() * weight;
        size[1] += rect.height() * weight;

        for (acc, kp) in zip_exact(&mut keypoints, det.keypoints()) {
            acc.x += kp.x * weight;
            acc.y += kp.y * weight;
        }
    }

    Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(center[0], center[1], size[0], size[1]),
        keypoints,
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let mut detections = vec![
            Detection::new(0.55, Rect::from_center(0.0, 0.0, 1.5, 1.5)),
            Detection::new(0.6, rect),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.6);
        assert_eq!(detections[0].bounding_rect(), rect);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let mut detections = vec![
            Detection::new(0.7, Rect::from_center(0.0, 0.0, 1.0, 1.0)),
            Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0)),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 0.9);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();
        nms.set_iou_thresh(0.0);

        let mut detections = vec![
            Detection::with_keypoints(
                1.0,
                Rect::from_center(-1.0, 3.0, 1.0, 1.0),
                vec![Keypoint::new(0.0, 0.0)],
            ),
            Detection::with_keypoints(
                0.5,
                Rect::from_center(-1.0, 3.0, 4.0, 4.0),
                vec![Keypoint::new(3.0, 6.0)],
            ),
        ];
        nms.process(&mut detections);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_relative_eq!(rect.center()[0], -1.0);
        assert_relative_eq!(rect.center()[1], 3.0);
        assert_relative_eq!(rect.width(), 2.0);
        assert_relative_eq!(rect.height(), 2.0);
        assert_relative_eq!(d.keypoints()[0].x(), 1.0);
        assert_relative_eq!(d.keypoints()[0].y(), 2.0);
    }
}
