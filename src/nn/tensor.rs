//! Tensor API.
//!
//! Tensors are the inputs and outputs of the landmark and detection networks. All tensors here
//! are dense, row-major arrays of `f32` with an arbitrary number of dimensions.

use std::fmt;

/// An owned, dynamically shaped tensor.
///
/// Data is accessed by indexing a prefix of the dimensions with [`Tensor::index`], which yields a
/// [`TensorView`] of the remaining dimensions. One-dimensional data is then read with
/// [`TensorView::as_slice`], and single elements with [`TensorView::as_singular`].
#[derive(Clone, PartialEq)]
pub struct Tensor {
    shape: Box<[usize]>,
    data: Box<[f32]>,
}

/// A borrowed view into a suffix of a [`Tensor`]'s dimensions.
#[derive(Clone, Copy)]
pub struct TensorView<'a> {
    shape: &'a [usize],
    data: &'a [f32],
}

impl Tensor {
    /// Creates a tensor of the given shape by calling `f` with the index of every element, in
    /// row-major order (`[0, .., 0]`, `[0, .., 1]`, ...).
    pub fn from_shape_fn<F: FnMut(&[usize]) -> f32>(shape: &[usize], mut f: F) -> Self {
        let len = shape.iter().product::<usize>();
        let mut index = vec![0; shape.len()];
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(f(&index));

            // Increment the index like an odometer.
            for (digit, &size) in index.iter_mut().zip(shape).rev() {
                *digit += 1;
                if *digit < size {
                    break;
                }
                *digit = 0;
            }
        }

        Self {
            shape: shape.into(),
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape from an iterator yielding the elements in row-major
    /// order.
    ///
    /// # Panics
    ///
    /// `iter` must yield exactly as many elements as `shape` describes, otherwise this method
    /// will panic.
    #[track_caller]
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let data: Box<[f32]> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            shape.iter().product::<usize>(),
            "element count does not match tensor shape {shape:?}"
        );
        Self {
            shape: shape.into(),
            data,
        }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        Ok(Self::from_iter(
            tract.shape(),
            tract.as_slice::<f32>()?.iter().copied(),
        ))
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        tract_onnx::prelude::Tensor::from_shape(&self.shape, &self.data)
    }

    /// Returns the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    fn as_view(&self) -> TensorView<'_> {
        TensorView {
            shape: &self.shape,
            data: &self.data,
        }
    }

    /// Indexes a prefix of the tensor's dimensions with `indices`.
    ///
    /// Indexing a tensor of shape `[1, 39, 5]` with `[0, 7]` yields a view of shape `[5]`, indexing
    /// it with `[]` yields a view of the whole tensor.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.as_view().index(indices)
    }

    /// Returns the values stored in a 1-dimensional tensor.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        self.as_view().as_slice()
    }

    /// Returns the value stored in a 0-dimensional tensor.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        self.as_view().as_singular()
    }

    /// Returns all elements in row-major order, regardless of shape.
    pub fn as_raw_data(&self) -> &[f32] {
        &self.data
    }
}

impl From<f32> for Tensor {
    fn from(value: f32) -> Self {
        Self::from_iter(&[], [value])
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Self::from_iter(&[N], arr)
    }
}

impl<'a> TensorView<'a> {
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Indexes a prefix of the view's dimensions with `indices`.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'a> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape,
            indices
        );

        let mut data = self.data;
        for (dim, &index) in indices.iter().enumerate() {
            assert!(
                index < self.shape[dim],
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape,
                indices
            );
            let stride = self.shape[dim + 1..].iter().product::<usize>();
            data = &data[index * stride..(index + 1) * stride];
        }

        TensorView {
            shape: &self.shape[N..],
            data,
        }
    }

    /// Iterates over the outermost dimension of this view.
    ///
    /// # Panics
    ///
    /// `self` must have at least one dimension, otherwise this method will panic.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'a>> + '_ {
        assert!(
            self.rank() > 0,
            "attempted to iterate over 0-dimensional tensor"
        );
        (0..self.shape[0]).map(|i| self.index([i]))
    }

    /// Returns the values stored in a 1-dimensional view.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &'a [f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as slice",
            self.shape
        );
        self.data
    }

    /// Returns the value stored in a 0-dimensional view.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor of shape {:?} as singular element",
            self.shape,
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .finish()
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_fn_visits_in_row_major_order() {
        let mut visited = Vec::new();
        let tensor = Tensor::from_shape_fn(&[1, 2, 3], |index| {
            visited.push(index.to_vec());
            visited.len() as f32
        });
        assert_eq!(tensor.shape(), &[1, 2, 3]);
        assert_eq!(
            visited,
            [
                [0, 0, 0],
                [0, 0, 1],
                [0, 0, 2],
                [0, 1, 0],
                [0, 1, 1],
                [0, 1, 2],
            ]
        );
        assert_eq!(tensor.index([0, 1, 0]).as_singular(), 4.0);
    }

    #[test]
    fn empty_dimension() {
        let tensor = Tensor::from_shape_fn(&[1, 0, 3], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.as_raw_data().len(), 0);
        assert_eq!(tensor.index([0]).iter().count(), 0);
    }

    #[test]
    fn singular() {
        let tensor = Tensor::from(1.5);
        assert_eq!(tensor.rank(), 0);
        assert_eq!(tensor.as_singular(), 1.5);
        assert_eq!(tensor.index([]).as_singular(), 1.5);
    }

    #[test]
    fn index_landmark_layout() {
        // Same layout as the pose network output: 39 landmarks with 5 values each.
        let tensor = Tensor::from_iter(&[1, 39 * 5], (0..39 * 5).map(|i| i as f32));
        let flat = tensor.index([0]).as_slice();
        assert_eq!(flat.len(), 195);
        assert_eq!(flat[5..10], [5.0, 6.0, 7.0, 8.0, 9.0]);

        let tensor = Tensor::from_iter(&[1, 39, 5], (0..39 * 5).map(|i| i as f32));
        let lm = tensor.index([0, 2]);
        assert_eq!(lm.shape(), &[5]);
        assert_eq!(lm.as_slice(), &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_eq!(tensor.index([0, 2, 4]).as_singular(), 14.0);
        assert_eq!(tensor.index([0]).iter().count(), 39);
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds() {
        Tensor::from([1.0, 2.0]).index([2]);
    }

    #[test]
    #[should_panic]
    fn from_iter_wrong_length() {
        Tensor::from_iter(&[2, 2], [1.0, 2.0, 3.0]);
    }
}
