use crate::error::DensityError;

/// Generic bounding box for N-dimensional space.
///
/// Every node of a [`DensityTree`](crate::DensityTree) owns one of these as its cell.
/// Both faces are inclusive when testing containment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Self { min, max }
    }

    /// Builds a box from runtime slices, checking their length and ordering.
    pub fn from_slices(lower: &[f64], upper: &[f64]) -> Result<Self, DensityError> {
        if lower.len() != D {
            return Err(DensityError::DimensionMismatch { expected: D, got: lower.len() });
        }
        if upper.len() != D {
            return Err(DensityError::DimensionMismatch { expected: D, got: upper.len() });
        }
        let mut min = [0.0; D];
        let mut max = [0.0; D];
        min.copy_from_slice(lower);
        max.copy_from_slice(upper);
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Checks that the box is non-degenerate: `min < max` on every axis, all finite.
    pub fn validate(&self) -> Result<(), DensityError> {
        if D == 0 {
            return Err(DensityError::ZeroDimensions);
        }
        for axis in 0..D {
            let (lower, upper) = (self.min[axis], self.max[axis]);
            if !lower.is_finite() || !upper.is_finite() || lower >= upper {
                return Err(DensityError::InvalidBounds { axis, lower, upper });
            }
        }
        Ok(())
    }

    /// Side lengths along each axis.
    pub fn widths(&self) -> [f64; D] {
        let mut widths = [0.0; D];
        for i in 0..D {
            widths[i] = self.max[i] - self.min[i];
        }
        widths
    }

    /// Product of the side lengths.
    pub fn volume(&self) -> f64 {
        self.widths().iter().product()
    }

    pub fn center(&self) -> [f64; D] {
        let mut c = [0.0; D];
        for i in 0..D {
            c[i] = 0.5 * (self.min[i] + self.max[i]);
        }
        c
    }

    /// Index of the widest axis. Ties resolve to the lowest index.
    pub fn widest_axis(&self) -> usize {
        let widths = self.widths();
        let mut best = 0;
        for i in 1..D {
            if widths[i] > widths[best] {
                best = i;
            }
        }
        best
    }

    pub fn contains(&self, point: &[f64; D]) -> bool {
        (0..D).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    /// Projects a point onto the box.
    pub fn clamp(&self, point: &[f64; D]) -> [f64; D] {
        let mut p = *point;
        for i in 0..D {
            p[i] = p[i].clamp(self.min[i], self.max[i]);
        }
        p
    }

    /// Cuts the box in two at coordinate `at` along `axis`.
    ///
    /// The first half keeps `min` and the second keeps `max`; only the split axis changes,
    /// so the halves tile the box without gaps or overlap.
    pub fn split(&self, axis: usize, at: f64) -> (Self, Self) {
        let mut low = *self;
        let mut high = *self;
        low.max[axis] = at;
        high.min[axis] = at;
        (low, high)
    }
}
