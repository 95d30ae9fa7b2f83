//! Neural Network inference.
//!
//! Networks are loaded from ONNX files at runtime and executed on the CPU with `tract`.

pub mod tensor;

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use crate::image::{Color, Image, Rect, Resolution};
use tensor::Tensor;

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;
        Ok(Self {
            nn,
            shape,
            input_res,
            color_mapper,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        if nn.num_inputs() != 1 {
            bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let tensor_shape = nn.input_shape(0)?;
        let (w, h) = match (shape, tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => bail!(
                "invalid model input shape for {:?} CNN: {:?}",
                shape,
                tensor_shape,
            ),
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the area of `image` covered by `roi`, returning the estimated outputs.
    ///
    /// The region is sampled (nearest neighbor) to create the network's input tensor. Parts of
    /// `roi` that lie outside of `image` are read as black. If the aspect ratio of `roi` does not
    /// match the network's input, the image will be stretched.
    pub fn estimate(&self, image: &Image, roi: Rect) -> anyhow::Result<Outputs> {
        let tensor = self.sample(image, roi);
        self.nn.estimate(&Inputs::from(tensor))
    }

    fn sample(&self, image: &Image, roi: Rect) -> Tensor {
        let (w, h) = (
            self.input_res.width() as usize,
            self.input_res.height() as usize,
        );

        // Source coordinates only depend on the column or row, so compute them once.
        let xs = (0..w)
            .map(|x| (roi.x() + x as f32 * roi.width() / w as f32).round() as i64)
            .collect::<Vec<_>>();
        let ys = (0..h)
            .map(|y| (roi.y() + y as f32 * roi.height() / h as f32).round() as i64)
            .collect::<Vec<_>>();
        let pixel = |x: usize, y: usize| self.color_mapper.map(image.get_or_null(xs[x], ys[y]));

        match self.shape {
            CnnInputShape::NCHW => Tensor::from_shape_fn(&[1, 3, h, w], |idx| {
                pixel(idx[3], idx[2])[idx[1]]
            }),
            CnnInputShape::NHWC => {
                let data = ys
                    .iter()
                    .flat_map(|&y| xs.iter().map(move |&x| (x, y)))
                    .flat_map(|(x, y)| self.color_mapper.map(image.get_or_null(x, y)));
                Tensor::from_iter(&[1, h, w, 3], data)
            }
        }
    }
}

/// Maps 8-bit sRGB colors to the value range a network expects.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        [color.r(), color.g(), color.b()].map(|col| col as f32 * adjust_range + start)
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, always 1 here.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Neural network loader.
pub struct Loader {
    model_data: Vec<u8>,
    outputs: Option<Vec<usize>>,
}

impl Loader {
    /// Only compute the specified outputs during inference.
    ///
    /// This takes a list of network output indices. When called, the [`Outputs`] returned from
    /// [`NeuralNetwork::estimate`] will only contain the chosen output tensors, in the given
    /// order.
    pub fn with_output_selection<O>(mut self, outputs: O) -> Self
    where
        O: Into<Vec<usize>>,
    {
        self.outputs = Some(outputs.into());
        self
    }

    /// Loads and optimizes the network.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)?
            .into_optimized()?;
        let outputs = graph.output_outlets()?;
        let selected_outputs = match self.outputs {
            Some(indices) => indices
                .iter()
                .map(|&i| {
                    outputs.get(i).copied().with_context(|| {
                        format!("network has no output #{i} ({} outputs)", outputs.len())
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => outputs.to_vec(),
        };
        let model = SimplePlan::new_for_outputs(graph, &selected_outputs)?;

        Ok(NeuralNetwork(Arc::new(model)))
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Reads a pre-trained model from an ONNX file.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Loader> {
        let path = path.as_ref();
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)
            .with_context(|| format!("failed to read network '{}'", path.display()))?;
        Ok(Self::from_onnx(model_data))
    }

    /// Prepares loading a pre-trained model from an in-memory ONNX file.
    pub fn from_onnx(raw: impl Into<Vec<u8>>) -> Loader {
        Loader {
            model_data: raw.into(),
            outputs: None,
        }
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the concrete tensor shape of input `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<&[usize]> {
        let fact = self.0.model().input_fact(index)?;
        fact.shape
            .as_concrete()
            .context("network input has a symbolic shape")
    }

    /// Runs the network on a set of [`Inputs`], returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let inputs = inputs
            .inner
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        let outputs = self.0.run(inputs)?;
        let inner = outputs
            .iter()
            .map(|tract| Tensor::from_tract(tract))
            .collect::<anyhow::Result<_>>()?;
        Ok(Outputs { inner })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's (selected) output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the output tensors.
    pub fn iter(&self) -> std::slice::Iter<'_, Tensor> {
        self.inner.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// List of input tensors for neural network inference.
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<Tensor>,
}

impl Inputs {
    /// Returns the number of input tensors stored in `self`.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: tvec![t] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::NULL), [0.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic]
    fn color_mapper_empty_range() {
        ColorMapper::linear(1.0..=1.0);
    }

    #[test]
    fn rejects_wrong_extension() {
        let err = NeuralNetwork::from_path("pose_landmark_full.tflite")
            .err()
            .unwrap();
        assert!(err.to_string().contains(".onnx"));
    }

    #[test]
    fn missing_file_names_path() {
        let err = NeuralNetwork::from_path("does/not/exist.onnx").err().unwrap();
        assert!(format!("{err:#}").contains("does/not/exist.onnx"));
    }

    #[test]
    fn garbage_model_fails_to_load() {
        assert!(NeuralNetwork::from_onnx(b"not a model".to_vec())
            .load()
            .is_err());
    }
}
