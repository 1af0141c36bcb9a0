use crate::bounds::BoundingBox;
use crate::config::{LeafModel, SplitPolicy, TreeConfig};
use crate::error::DensityError;
use crate::gaussian::GaussianLeaf;
use rand::Rng;
use std::fmt;

/// Handle of a node inside a [`DensityTree`](crate::DensityTree) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One cell of the partition.
///
/// A node models the points that reach it as a mixture of a density local to its cell
/// and a finer model delegated to its two halves. `w` is the posterior probability of
/// the local model.
#[derive(Clone, Debug)]
pub struct Node<const D: usize> {
    pub(crate) bounds: BoundingBox<D>,
    pub(crate) splitting_dimension: usize,
    pub(crate) mid_point: f64,
    pub(crate) volume: f64,
    pub(crate) depth: usize,
    pub(crate) alpha: [u64; 2],
    pub(crate) total: u64,
    pub(crate) w: f64,
    pub(crate) log_w: f64,
    pub(crate) log_w_prior: f64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: [Option<NodeId>; 2],
    pub(crate) gaussian: Option<GaussianLeaf<D>>,
    pub(crate) w_gaussian: f64,
}

impl<const D: usize> Node<D> {
    /// Creates the root node covering `bounds`.
    pub(crate) fn root<R: Rng + ?Sized>(
        bounds: BoundingBox<D>,
        config: &TreeConfig,
        rng: &mut R,
    ) -> Result<Self, DensityError> {
        let gaussian = match config.leaf_model {
            LeafModel::Uniform => None,
            LeafModel::UniformGaussian => Some(GaussianLeaf::for_cell(&bounds)),
        };
        Self::build(bounds, 0, None, gaussian, config, rng)
    }

    /// Creates a child of `parent` covering `bounds`, one of the parent's halves.
    ///
    /// The weight restarts from the prior instead of copying the parent's.
    pub(crate) fn new_child<R: Rng + ?Sized>(
        parent_id: NodeId,
        parent: &Node<D>,
        bounds: BoundingBox<D>,
        config: &TreeConfig,
        rng: &mut R,
    ) -> Result<Self, DensityError> {
        let gaussian = parent.gaussian.as_ref().map(|g| GaussianLeaf::child_of(g, &bounds));
        Self::build(bounds, parent.depth + 1, Some(parent_id), gaussian, config, rng)
    }

    fn build<R: Rng + ?Sized>(
        bounds: BoundingBox<D>,
        depth: usize,
        parent: Option<NodeId>,
        gaussian: Option<GaussianLeaf<D>>,
        config: &TreeConfig,
        rng: &mut R,
    ) -> Result<Self, DensityError> {
        bounds.validate()?;
        let splitting_dimension = bounds.widest_axis();
        let lower = bounds.min[splitting_dimension];
        let upper = bounds.max[splitting_dimension];
        let mid_point = match config.split_policy {
            SplitPolicy::Midpoint => 0.5 * (lower + upper),
            SplitPolicy::Random { low, high } => {
                let phi = if low < high { rng.gen_range(low..=high) } else { low };
                phi * upper + (1.0 - phi) * lower
            }
        };
        let volume = bounds.volume();
        if !(volume > 0.0) || !volume.is_finite() {
            return Err(DensityError::InvalidBounds { axis: splitting_dimension, lower, upper });
        }
        let log_w_prior = -std::f64::consts::LN_2;

        Ok(Self {
            bounds,
            splitting_dimension,
            mid_point,
            volume,
            depth,
            alpha: [0, 0],
            total: 0,
            w: log_w_prior.exp(),
            log_w: 0.0,
            log_w_prior,
            parent,
            children: [None, None],
            gaussian,
            w_gaussian: 0.5,
        })
    }

    /// The half of the cell that `x` falls in: 0 below the split point, 1 otherwise.
    pub fn branch(&self, x: &[f64; D]) -> usize {
        if x[self.splitting_dimension] < self.mid_point { 0 } else { 1 }
    }

    /// Whether the split point lies strictly inside the cell, so both halves are smaller than it.
    ///
    /// Fails once the cell is a few ulps wide and the split point rounds onto a face.
    pub(crate) fn can_split(&self) -> bool {
        let axis = self.splitting_dimension;
        self.mid_point > self.bounds.min[axis] && self.mid_point < self.bounds.max[axis]
    }

    /// Bounds of half `k`, cut at the split point along the splitting axis.
    pub(crate) fn half(&self, k: usize) -> BoundingBox<D> {
        let (low, high) = self.bounds.split(self.splitting_dimension, self.mid_point);
        if k == 0 { low } else { high }
    }

    /// Resets the posterior weight to its prior.
    pub(crate) fn reset_weight(&mut self) {
        self.w = self.log_w_prior.exp();
        self.log_w = 0.0;
    }

    pub fn bounds(&self) -> &BoundingBox<D> {
        &self.bounds
    }

    pub fn splitting_dimension(&self) -> usize {
        self.splitting_dimension
    }

    pub fn mid_point(&self) -> f64 {
        self.mid_point
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of observations routed to the low (0) or high (1) half.
    pub fn count(&self, k: usize) -> u64 {
        self.alpha[k]
    }

    /// Total number of observations that reached this node.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Posterior weight of the local model.
    pub fn weight(&self) -> f64 {
        self.w
    }

    pub fn log_weight_prior(&self) -> f64 {
        self.log_w_prior
    }

    /// Mixing weight of the Gaussian component inside the local model, if it has one.
    pub fn gaussian_weight(&self) -> Option<f64> {
        self.gaussian.as_ref().map(|_| self.w_gaussian)
    }

    pub fn gaussian(&self) -> Option<&GaussianLeaf<D>> {
        self.gaussian.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child(&self, k: usize) -> Option<NodeId> {
        self.children.get(k).copied().flatten()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}
