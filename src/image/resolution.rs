//! Types for representing image resolutions.

use std::fmt;

use super::Rect;

/// Resolution (`width x height`) of an image, window, or camera.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// VGA resolution: `640x480`, the size of the video area in the window.
    pub const VGA: Self = Self {
        width: 640,
        height: 480,
    };

    /// 720p resolution: `1280x720`
    pub const RES_720P: Self = Self {
        width: 1280,
        height: 720,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Computes the [`AspectRatio`] of this [`Resolution`].
    ///
    /// If `self` has a width or height of 0, `None` is returned.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }

    /// Returns a [`Rect`] covering the whole resolution, positioned at the origin.
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width as f32, self.height as f32)
    }

    /// Computes a centered, maximally sized [`Rect`] that lies inside of `self` and has the given
    /// aspect ratio.
    pub fn fit_aspect_ratio(&self, ratio: AspectRatio) -> Rect {
        let Some(own) = self.aspect_ratio() else {
            return self.rect();
        };

        let (w, h) = (self.width as f32, self.height as f32);
        if ratio.as_f32() > own.as_f32() {
            // Letterboxing.
            let fit_h = w / ratio.as_f32();
            Rect::from_top_left(0.0, (h - fit_h) / 2.0, w, fit_h)
        } else {
            // Pillarboxing.
            let fit_w = h * ratio.as_f32();
            Rect::from_top_left((w - fit_w) / 2.0, 0.0, fit_w, h)
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ratio of a width to a height.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: both are nonzero and coprime.
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1 aspect ratio, used by all landmark networks.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the aspect ratio representing `width:height`.
    ///
    /// If either `width` or `height` is `0`, returns `None`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }

    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_is_reduced() {
        let a = AspectRatio::new(1920, 1080).unwrap();
        let b = AspectRatio::new(1280, 720).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "16:9");
        assert_eq!(AspectRatio::new(0, 5), None);
    }

    #[test]
    fn fit_aspect_ratio() {
        assert_eq!(
            Resolution::new(16, 16).fit_aspect_ratio(AspectRatio::new(16, 8).unwrap()),
            Rect::from_top_left(0.0, 4.0, 16.0, 8.0)
        );
        assert_eq!(
            Resolution::new(16, 16).fit_aspect_ratio(AspectRatio::new(8, 16).unwrap()),
            Rect::from_top_left(4.0, 0.0, 8.0, 16.0)
        );
        assert_eq!(
            Resolution::VGA.fit_aspect_ratio(AspectRatio::new(4, 3).unwrap()),
            Resolution::VGA.rect()
        );
    }
}
