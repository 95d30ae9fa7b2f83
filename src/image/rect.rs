use super::AspectRatio;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Used for regions of interest fed to the networks, for detection boxes, and for UI layout.
/// Rectangles are allowed to have zero height and/or width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(
            x_center - width / 2.0,
            y_center - height / 2.0,
            width,
            height,
        )
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        assert!(
            width >= 0.0 && height >= 0.0,
            "invalid rectangle size {width}x{height}"
        );
        Self {
            x,
            y,
            w: width,
            h: height,
        }
    }

    /// Computes the bounding rectangle that encompasses `points`.
    ///
    /// Returns `None` if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let [x, y] = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);
        for [x, y] in iter {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        Some(Self::from_top_left(
            x_min,
            y_min,
            x_max - x_min,
            y_max - y_min,
        ))
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    #[inline]
    pub fn x_max(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn y_max(&self) -> f32 {
        self.y + self.h
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn center(&self) -> [f32; 2] {
        [self.x + self.w / 2.0, self.y + self.h / 2.0]
    }

    /// Grows every side of the rectangle by `amount` times its width or height.
    ///
    /// An `amount` of `0.1` adds 10% of the width to the left and to the right side, and 10% of
    /// the height to the top and to the bottom.
    pub fn grow_rel(&self, amount: f32) -> Self {
        let [cx, cy] = self.center();
        let scale = 1.0 + 2.0 * amount;
        Self::from_center(cx, cy, self.w * scale, self.h * scale)
    }

    /// Symmetrically extends one dimension of `self` so that the result has the given aspect
    /// ratio.
    pub fn grow_to_fit_aspect(&self, target: AspectRatio) -> Self {
        let [cx, cy] = self.center();
        let target = target.as_f32();
        if self.h == 0.0 || self.w / self.h < target {
            Self::from_center(cx, cy, self.h * target, self.h)
        } else {
            Self::from_center(cx, cy, self.w, self.w / target)
        }
    }

    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Scales position and size by `factor`, relative to the coordinate origin.
    pub fn scale(&self, factor: f32) -> Self {
        Self::from_top_left(
            self.x * factor,
            self.y * factor,
            self.w * factor,
            self.h * factor,
        )
    }

    /// Returns whether the point `(x, y)` lies inside of `self`.
    ///
    /// The left and top edges are inclusive, the right and bottom edges exclusive.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && y >= self.y && x < self.x_max() && y < self.y_max()
    }

    /// Computes the intersection of `self` and `other`, or `None` if they don't overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x.max(other.x);
        let y_min = self.y.max(other.y);
        let x_max = self.x_max().min(other.x_max());
        let y_max = self.y_max().min(other.y_max());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Self::from_top_left(
            x_min,
            y_min,
            x_max - x_min,
            y_max - y_min,
        ))
    }

    /// Computes the intersection-over-union of two rectangles (in range `0.0..=1.0`).
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection(other).map_or(0.0, |r| r.area());
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}
