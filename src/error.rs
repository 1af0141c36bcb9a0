//! Error type shared by the whole crate.

/// Errors reported by tree construction, sample validation and the kernel estimator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DensityError {
    #[error("the domain must have at least one dimension")]
    ZeroDimensions,

    #[error("invalid bounds on axis {axis}: lower {lower} must be finite and strictly below upper {upper}")]
    InvalidBounds { axis: usize, lower: f64, upper: f64 },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("unsupported branching factor {0}: only binary splits are implemented")]
    UnsupportedBranching(usize),

    #[error("invalid growth base {0}: must be finite and at least 1")]
    InvalidGrowthBase(f64),

    #[error("invalid random split range [{low}, {high}]: need 0 < low <= high < 1")]
    InvalidSplitRange { low: f64, high: f64 },

    #[error("invalid bandwidth {0}: must be finite and positive")]
    InvalidBandwidth(f64),

    #[error("sample coordinate {value} on axis {axis} lies outside [{lower}, {upper}]")]
    OutOfDomain { axis: usize, value: f64, lower: f64, upper: f64 },

    #[error("sample coordinate on axis {axis} is not finite")]
    NonFiniteSample { axis: usize },

    #[error("batch of {len} values is not a multiple of the dimension {dimensions}")]
    MisalignedBatch { len: usize, dimensions: usize },

    #[error("not enough points to hold out a validation set for the bandwidth search")]
    EmptyHoldout,
}
