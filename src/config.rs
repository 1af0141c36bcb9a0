//! Tree configuration.
//!
//! Every behavioral switch of the estimator is a field here and is resolved once,
//! when the tree is built.

use crate::error::DensityError;

/// Fixed seed used when none is given. Keeps runs reproducible by default.
pub const DEFAULT_SEED: u64 = 123456789;

/// Where a node cuts its cell along the splitting axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplitPolicy {
    /// Exact bisection.
    Midpoint,
    /// `phi * upper + (1 - phi) * lower` with `phi` drawn uniformly from `[low, high]`.
    Random { low: f64, high: f64 },
}

impl SplitPolicy {
    /// The randomized policy with the usual `[0.1, 0.9]` range.
    pub fn random() -> Self {
        SplitPolicy::Random { low: 0.1, high: 0.9 }
    }
}

/// Local density model of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafModel {
    /// Uniform over the cell.
    Uniform,
    /// Uniform blended with an online Gaussian estimate, mixed by its own posterior weight.
    UniformGaussian,
}

/// How the uniform-vs-delegate posterior weight is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightTracking {
    /// `w` is multiplied in place.
    Linear,
    /// `w` is re-derived from an accumulated log ratio, avoiding repeated multiplicative underflow.
    Log,
}

/// What to do with samples outside the outer bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainPolicy {
    Reject,
    Clamp,
}

/// Configuration of a [`DensityTree`](crate::DensityTree).
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    /// Branching factor. Only 2 is supported.
    pub n_branches: usize,
    /// Maximum node depth; 0 means unbounded.
    pub max_depth: usize,
    /// A node at depth `d` may only grow children once it has seen more than `growth_base^d` points.
    pub growth_base: f64,
    pub split_policy: SplitPolicy,
    pub leaf_model: LeafModel,
    pub weight_tracking: WeightTracking,
    pub domain_policy: DomainPolicy,
    /// Seed of the tree's own random generator.
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            n_branches: 2,
            max_depth: 0,
            growth_base: 1.1,
            split_policy: SplitPolicy::Midpoint,
            leaf_model: LeafModel::Uniform,
            weight_tracking: WeightTracking::Linear,
            domain_policy: DomainPolicy::Reject,
            seed: DEFAULT_SEED,
        }
    }
}

impl TreeConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_growth_base(mut self, growth_base: f64) -> Self {
        self.growth_base = growth_base;
        self
    }

    pub fn with_split_policy(mut self, split_policy: SplitPolicy) -> Self {
        self.split_policy = split_policy;
        self
    }

    pub fn with_leaf_model(mut self, leaf_model: LeafModel) -> Self {
        self.leaf_model = leaf_model;
        self
    }

    pub fn with_weight_tracking(mut self, weight_tracking: WeightTracking) -> Self {
        self.weight_tracking = weight_tracking;
        self
    }

    pub fn with_domain_policy(mut self, domain_policy: DomainPolicy) -> Self {
        self.domain_policy = domain_policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), DensityError> {
        if self.n_branches != 2 {
            return Err(DensityError::UnsupportedBranching(self.n_branches));
        }
        if !self.growth_base.is_finite() || self.growth_base < 1.0 {
            return Err(DensityError::InvalidGrowthBase(self.growth_base));
        }
        if let SplitPolicy::Random { low, high } = self.split_policy {
            if !(low > 0.0 && low <= high && high < 1.0) {
                return Err(DensityError::InvalidSplitRange { low, high });
            }
        }
        Ok(())
    }

    /// Evidence a node at `depth` must exceed before it may grow.
    pub fn growth_threshold(&self, depth: usize) -> f64 {
        self.growth_base.powi(depth as i32)
    }

    /// Whether the depth limit still allows a node at `depth` to have children.
    pub fn allows_children(&self, depth: usize) -> bool {
        self.max_depth == 0 || depth < self.max_depth
    }
}
