//! Anchor generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Only what the pose detection network needs is supported: square anchors whose centers are laid
//! out on a regular grid per output layer. Anchor sizes are fixed, so only centers are stored.

use std::ops::Index;

use crate::image::Resolution;

/// An anchor of an SSD network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    // values range from 0 to 1
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Must be non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a new SSD layer description.
    ///
    /// # Parameters
    ///
    /// - `boxes_per_cell`: the number of anchors sharing each cell of this feature map.
    /// - `width`/`height`: size of this layer's feature map, in output cells.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The list of anchors of an SSD network, in network output order.
#[derive(Debug)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    /// Computes the anchors for a network with the given output layers.
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let anchors = layers
            .iter()
            .flat_map(|layer| {
                let (w, h) = (layer.resolution.width(), layer.resolution.height());
                (0..h).flat_map(move |y| {
                    (0..w).flat_map(move |x| {
                        let anchor = Anchor {
                            x_center: (x as f32 + 0.5) / w as f32,
                            y_center: (y as f32 + 0.5) / h as f32,
                        };
                        std::iter::repeat(anchor).take(layer.boxes_per_cell as usize)
                    })
                })
            })
            .collect();

        Self { anchors }
    }

    /// Returns the total number of SSD anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_detection_anchor_count() {
        let anchors = Anchors::calculate(&[
            LayerInfo::new(2, 28, 28),
            LayerInfo::new(2, 14, 14),
            LayerInfo::new(6, 7, 7),
        ]);
        assert_eq!(anchors.anchor_count(), 2254);
    }

    #[test]
    fn anchor_centers() {
        let anchors = Anchors::calculate(&[LayerInfo::new(2, 2, 1)]);
        assert_eq!(anchors.anchor_count(), 4);
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[0].x_center(), 0.25);
        assert_eq!(anchors[0].y_center(), 0.5);
        assert_eq!(anchors[3].x_center(), 0.75);
    }
}
