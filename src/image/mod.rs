//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image.
//! - A variety of [`draw`] functions to visualize landmarks and lay out the user interface.
//! - [`Rect`], a floating-point rectangle representing parts of an image.
//! - [`Resolution`] and [`AspectRatio`].

pub mod draw;
mod jpeg;
mod rect;
mod resolution;

#[cfg(test)]
mod tests;

use std::{fmt, ops::Index, path::Path};

use anyhow::Context;
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageBuffer, Rgba, RgbaImage,
};

pub use rect::*;
pub use resolution::*;

#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => anyhow::bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            ),
        }
    }
}

/// Default quality used when saving JPEG files with [`Image::save`].
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // Internal representation is meant to be compatible with wgpu's texture formats for easy GPU
    // uploading.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        let path = path.as_ref();
        Self::load_impl(path).with_context(|| format!("failed to load '{}'", path.display()))
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        match ImageFormat::from_path(path)? {
            ImageFormat::Jpeg => {
                let data = std::fs::read(path)?;
                Self::decode_jpeg(&data)
            }
            ImageFormat::Png => {
                let data = std::fs::read(path)?;
                let buf =
                    image::load_from_memory_with_format(&data, image::ImageFormat::Png)?.to_rgba8();
                Ok(Self { buf })
            }
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data)
    }

    /// Encodes this image as a baseline JPEG with the given `quality` (1-100).
    ///
    /// The alpha channel is discarded.
    pub fn encode_jpeg(&self, quality: u8) -> anyhow::Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.buf.clone()).to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode_image(&rgb)?;
        Ok(out)
    }

    /// Creates an image from raw RGBA8 pixel data.
    ///
    /// # Panics
    ///
    /// This will panic if the length of `buf` does not match `res`.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected_size = res.width() as usize * res.height() as usize * 4;
        assert_eq!(
            expected_size,
            buf.len(),
            "incorrect buffer size {} for {} image (expected {} bytes)",
            buf.len(),
            res,
            expected_size,
        );

        Self {
            buf: ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
                .expect("buffer size does not match image resolution"),
        }
    }

    /// Saves an image to the file system.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`). JPEG files are
    /// written with [`DEFAULT_JPEG_QUALITY`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        self.save_with_quality(path, DEFAULT_JPEG_QUALITY)
    }

    /// Saves an image to the file system, using `quality` if the file is a JPEG.
    pub fn save_with_quality<P: AsRef<Path>>(&self, path: P, quality: u8) -> anyhow::Result<()> {
        let path = path.as_ref();
        self.save_impl(path, quality)
            .with_context(|| format!("failed to save '{}'", path.display()))
    }

    fn save_impl(&self, path: &Path, quality: u8) -> anyhow::Result<()> {
        match ImageFormat::from_path(path)? {
            ImageFormat::Jpeg => {
                let data = self.encode_jpeg(quality)?;
                std::fs::write(path, data)?;
                Ok(())
            }
            ImageFormat::Png => Ok(self.buf.save_with_format(path, image::ImageFormat::Png)?),
        }
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image of a specified size, filled with `color`.
    pub fn filled(res: Resolution, color: Color) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(res.width(), res.height(), Rgba(color.0)),
        }
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] covering this image.
    ///
    /// The rectangle will be positioned at `(0, 0)` and have the width and height of the image.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.resolution().rect()
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Gets the image color at the given signed coordinates, or [`Color::NULL`] if they are out
    /// of bounds.
    #[inline]
    pub fn get_or_null(&self, x: i64, y: i64) -> Color {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return Color::NULL;
        }
        Color(self.buf[(x as u32, y as u32)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Returns a resized copy of this image, using a Lanczos3 filter.
    ///
    /// The aspect ratio is not preserved.
    pub fn resize(&self, res: Resolution) -> Image {
        if res == self.resolution() {
            return self.clone();
        }
        Image {
            buf: image::imageops::resize(&self.buf, res.width(), res.height(), FilterType::Lanczos3),
        }
    }

    /// Copies all pixels of `src` into `self`, with the top left corner of `src` placed at
    /// `(x, y)`.
    ///
    /// Parts of `src` that fall outside of `self` are ignored.
    pub fn blit(&mut self, src: &Image, x: i64, y: i64) {
        image::imageops::replace(&mut self.buf, &src.buf, x, y);
    }

    /// Overwrites every pixel in `self` with `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }

    /// Returns the raw RGBA8 pixel data of this image.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image @ {}x{}", self.width(), self.height())
    }
}

/// An 8-bit RGBA color.
///
/// Colors are always in the sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const GRAY: Self = Self([128, 128, 128, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);
    pub const ORANGE: Self = Self([255, 165, 0, 255]);
    pub const MAGENTA: Self = Self([255, 0, 255, 255]);
    pub const CYAN: Self = Self([0, 255, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// Creates an opaque color from components in blue-green-red order.
    #[inline]
    pub const fn from_bgr8(b: u8, g: u8, r: u8) -> Self {
        Self::from_rgb8(r, g, b)
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}
