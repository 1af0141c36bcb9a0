//! The context-tree density estimator.

pub mod node;
pub(crate) mod step;

use crate::bounds::BoundingBox;
use crate::config::{DomainPolicy, TreeConfig};
use crate::error::DensityError;
use crate::loss::LogLoss;
use node::{Node, NodeId};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use step::{Mode, Next, Step};
use std::fmt;
use tracing::{debug, trace};

/// Online Bayesian density estimator over a bounded box in `D` dimensions.
///
/// The tree is a lazily grown kd partition. Every node mixes a density local to its cell
/// with the density delegated to the half of the cell a point falls in, and moves the mixing
/// weight to its posterior after each observation. The nodes live in an arena; the root is
/// [`NodeId::ROOT`].
///
/// `observe` needs `&mut self` and `pdf` only `&self`, so a tree shared between threads
/// behind an `RwLock` gets single-writer, many-reader access for free.
#[derive(Clone, Debug)]
pub struct DensityTree<const D: usize> {
    config: TreeConfig,
    bounds: BoundingBox<D>,
    nodes: Vec<Node<D>>,
    rng: StdRng,
}

impl<const D: usize> DensityTree<D> {
    /// Creates a tree over `bounds`, seeding its random generator from `config.seed`.
    pub fn new(config: TreeConfig, bounds: BoundingBox<D>) -> Result<Self, DensityError> {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::with_rng(config, bounds, rng)
    }

    /// Creates a tree that draws randomized split points from `rng`.
    pub fn with_rng(config: TreeConfig, bounds: BoundingBox<D>, mut rng: StdRng) -> Result<Self, DensityError> {
        config.validate()?;
        bounds.validate()?;
        let root = Node::root(bounds, &config, &mut rng)?;
        Ok(Self { config, bounds, nodes: vec![root], rng })
    }

    /// Creates a tree from a branching factor, a depth limit (0 for none) and runtime bound slices.
    pub fn from_slices(n_branches: usize, max_depth: usize, lower: &[f64], upper: &[f64]) -> Result<Self, DensityError> {
        let bounds = BoundingBox::from_slices(lower, upper)?;
        let config = TreeConfig { n_branches, max_depth, ..TreeConfig::default() };
        Self::new(config, bounds)
    }

    /// Observes `x` and returns its one-step-ahead predictive density.
    ///
    /// The density is what the model assigned to `x` given everything seen before it;
    /// all nodes on the path from the root to `x`'s leaf are updated, and at most one
    /// new node is created per level.
    pub fn observe(&mut self, x: &[f64; D]) -> Result<f64, DensityError> {
        let x = self.admit(x)?;
        let mut path: Vec<(NodeId, Step)> = Vec::new();
        let mut id = NodeId::ROOT;

        loop {
            let step = step::plan(&self.nodes[id.index()], &x, Mode::Observe, &self.config);
            let node = &mut self.nodes[id.index()];
            node.alpha[step.branch] += 1;
            node.total += 1;
            step::absorb_local(node, &step, &x);

            let next = match step.next {
                Next::Descend(child) => Some(child),
                Next::Create => self.grow(id, step.branch),
                Next::Stop => None,
            };
            path.push((id, step));
            match next {
                Some(child) => id = child,
                None => break,
            }
        }

        let tracking = self.config.weight_tracking;
        let mut below: Option<f64> = None;
        for (id, step) in path.iter().rev() {
            let p_recursive = match below {
                Some(p) => step.p_branch * p,
                None => step.p_local,
            };
            let total = step::settle(&mut self.nodes[id.index()], step, p_recursive, tracking);
            below = Some(total);
        }
        let density = below.unwrap_or(0.0);
        trace!(density, depth = path.len() - 1, "observed sample");
        Ok(density)
    }

    /// Density of the current model at `x`. Does not change the tree.
    pub fn pdf(&self, x: &[f64; D]) -> Result<f64, DensityError> {
        let x = self.admit(x)?;
        Ok(self.evaluate(&x))
    }

    pub fn log_pdf(&self, x: &[f64; D]) -> Result<f64, DensityError> {
        self.pdf(x).map(f64::ln)
    }

    /// Evaluates the density at a flat list of points (`D` values per point) in parallel.
    pub fn pdf_batch(&self, points: &[f64]) -> Result<Vec<f64>, DensityError> {
        if points.len() % D != 0 {
            return Err(DensityError::MisalignedBatch { len: points.len(), dimensions: D });
        }
        points
            .par_chunks(D)
            .map(|chunk| {
                let mut x = [0.0; D];
                x.copy_from_slice(chunk);
                self.pdf(&x)
            })
            .collect()
    }

    /// Observes a flat list of points (`D` values per point) in order and returns their log-loss.
    pub fn observe_all(&mut self, points: &[f64]) -> Result<LogLoss, DensityError> {
        if points.len() % D != 0 {
            return Err(DensityError::MisalignedBatch { len: points.len(), dimensions: D });
        }
        let mut loss = LogLoss::new();
        for chunk in points.chunks(D) {
            let mut x = [0.0; D];
            x.copy_from_slice(chunk);
            loss.record(self.observe(&x)?);
        }
        Ok(loss)
    }

    /// Number of nodes below the root.
    pub fn n_children(&self) -> usize {
        self.descendants(NodeId::ROOT)
    }

    /// Number of nodes below `id`, not counting `id` itself.
    pub fn descendants(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for child in self.nodes[current.index()].children.iter().flatten() {
                count += 1;
                stack.push(*child);
            }
        }
        count
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest node.
    pub fn max_depth_reached(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn root(&self) -> &Node<D> {
        &self.nodes[NodeId::ROOT.index()]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<D>> {
        self.nodes.get(id.index())
    }

    /// Child `k` of node `id`, if it has been created.
    pub fn child(&self, id: NodeId, k: usize) -> Option<NodeId> {
        self.node(id).and_then(|n| n.child(k))
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node<D>)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn bounds(&self) -> &BoundingBox<D> {
        &self.bounds
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Prints every node (`depth weight volume`, depth first) and the number of contexts.
    pub fn show(&self) {
        print!("{}", self);
    }

    /// Validates `x` against the outer box and applies the domain policy.
    fn admit(&self, x: &[f64; D]) -> Result<[f64; D], DensityError> {
        if let Some(axis) = (0..D).find(|&i| !x[i].is_finite()) {
            return Err(DensityError::NonFiniteSample { axis });
        }
        if self.bounds.contains(x) {
            return Ok(*x);
        }
        match self.config.domain_policy {
            DomainPolicy::Clamp => {
                debug!(?x, "clamping sample into the domain");
                Ok(self.bounds.clamp(x))
            }
            DomainPolicy::Reject => {
                let axis = (0..D)
                    .find(|&i| x[i] < self.bounds.min[i] || x[i] > self.bounds.max[i])
                    .unwrap_or(0);
                Err(DensityError::OutOfDomain {
                    axis,
                    value: x[axis],
                    lower: self.bounds.min[axis],
                    upper: self.bounds.max[axis],
                })
            }
        }
    }

    /// Read-only descent followed by the mixture unwind.
    fn evaluate(&self, x: &[f64; D]) -> f64 {
        let mut path: Vec<(NodeId, Step)> = Vec::new();
        let mut id = NodeId::ROOT;
        loop {
            let step = step::plan(&self.nodes[id.index()], x, Mode::Evaluate, &self.config);
            path.push((id, step));
            match step.next {
                Next::Descend(child) => id = child,
                Next::Create | Next::Stop => break,
            }
        }

        let tracking = self.config.weight_tracking;
        let mut below: Option<f64> = None;
        for (id, step) in path.iter().rev() {
            let p_recursive = match below {
                Some(p) => step.p_branch * p,
                None => step.p_local,
            };
            below = Some(step::evaluate(&self.nodes[id.index()], step, p_recursive, tracking));
        }
        below.unwrap_or(0.0)
    }

    /// Materializes child `k` of `parent`. Returns `None` when the cell is too small to split.
    fn grow(&mut self, parent: NodeId, k: usize) -> Option<NodeId> {
        let node = &self.nodes[parent.index()];
        if !node.can_split() {
            trace!(parent = %parent, depth = node.depth, "cell too narrow to split");
            return None;
        }
        let child = match Node::new_child(parent, node, node.half(k), &self.config, &mut self.rng) {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(%err, depth = node.depth, "cell cannot be split further");
                return None;
            }
        };
        let id = NodeId(self.nodes.len() as u32);
        debug!(parent = %parent, child = %id, branch = k, depth = child.depth, volume = child.volume, "new context");
        self.nodes.push(child);
        self.nodes[parent.index()].children[k] = Some(id);
        Some(id)
    }
}

impl<const D: usize> fmt::Display for DensityTree<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            let w = step::current_weight(node, self.config.weight_tracking);
            writeln!(f, "{} {:.6} {:.6}", node.depth, w, node.volume)?;
            for child in node.children.iter().rev().flatten() {
                stack.push(*child);
            }
        }
        writeln!(f, "Total contexts: {}", self.n_children())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LeafModel, SplitPolicy, WeightTracking};

    fn unit_interval(max_depth: usize) -> DensityTree<1> {
        let config = TreeConfig::default().with_max_depth(max_depth);
        DensityTree::new(config, BoundingBox::new([0.0], [1.0])).unwrap()
    }

    #[test]
    fn test_fresh_tree_is_uniform() {
        let tree = DensityTree::new(TreeConfig::default(), BoundingBox::new([0.0, 0.0], [2.0, 4.0])).unwrap();
        assert_eq!(tree.n_children(), 0);
        assert!((tree.pdf(&[1.0, 1.0]).unwrap() - 0.125).abs() < 1e-15);
    }

    #[test]
    fn test_first_observation_is_uniform() {
        let mut tree = unit_interval(0);
        let p = tree.observe(&[0.3]).unwrap();
        assert!((p - 1.0).abs() < 1e-15);
        assert_eq!(tree.n_children(), 0);
        assert_eq!(tree.root().total(), 1);
        assert_eq!(tree.root().count(0), 1);
        // The uniform model explained the sample exactly as well as the fallback.
        assert!((tree.root().weight() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_second_observation_grows_and_matches_hand_computation() {
        let mut tree = unit_interval(0);
        tree.observe(&[0.3]).unwrap();
        let p = tree.observe(&[0.2]).unwrap();

        // Root: P_local = 1, P_branch = (1 + 1) / (2 + 1) = 2/3, and the new child at depth 1
        // falls back to its own uniform density 2 (S = 1 does not exceed 1.1).
        let p_recursive = 2.0 / 3.0 * 2.0;
        let expected = 0.5 * 1.0 + 0.5 * p_recursive;
        assert!((p - expected).abs() < 1e-12, "got {}, expected {}", p, expected);

        assert_eq!(tree.n_children(), 1);
        let child = tree.child(NodeId::ROOT, 0).unwrap();
        assert_eq!(tree.node(child).unwrap().bounds().max, [0.5]);
        assert!((tree.root().weight() - 0.5 / expected).abs() < 1e-12);
    }

    #[test]
    fn test_depth_limit_respected() {
        let mut tree = unit_interval(3);
        for i in 0..500 {
            tree.observe(&[(i as f64 * 0.618).fract()]).unwrap();
        }
        assert!(tree.max_depth_reached() <= 3);
        assert!(tree.n_children() <= 2 + 4 + 8);
        assert_eq!(tree.n_children(), tree.node_count() - 1);
    }

    #[test]
    fn test_repeated_point_stops_at_float_resolution() {
        let config = TreeConfig::default().with_growth_base(1.0);
        let mut tree = DensityTree::new(config, BoundingBox::new([0.0], [1.0])).unwrap();
        for _ in 0..1200 {
            let p = tree.observe(&[0.3]).unwrap();
            assert!(p.is_finite() && p > 0.0);
        }
        // Bisecting [0, 1] reaches the spacing of f64 near 0.3 after about 54 levels.
        assert!(tree.max_depth_reached() < 64, "depth {}", tree.max_depth_reached());
        assert_eq!(tree.node_count(), tree.max_depth_reached() + 1);
        let leaf = tree.nodes().last().map(|(_, n)| n.volume()).unwrap();
        assert!(leaf > 0.0);
    }

    #[test]
    fn test_domain_policies() {
        let mut tree = unit_interval(0);
        assert_eq!(
            tree.observe(&[1.5]),
            Err(DensityError::OutOfDomain { axis: 0, value: 1.5, lower: 0.0, upper: 1.0 })
        );
        assert_eq!(tree.pdf(&[f64::NAN]), Err(DensityError::NonFiniteSample { axis: 0 }));
        assert_eq!(tree.root().total(), 0);
        // Both faces are inside.
        assert!(tree.observe(&[1.0]).is_ok());
        assert!(tree.observe(&[0.0]).is_ok());

        let config = TreeConfig::default().with_domain_policy(DomainPolicy::Clamp);
        let mut clamped = DensityTree::new(config, BoundingBox::new([0.0], [1.0])).unwrap();
        clamped.observe(&[7.0]).unwrap();
        assert_eq!(clamped.root().count(1), 1);
        assert!((clamped.pdf(&[-3.0]).unwrap() - clamped.pdf(&[0.0]).unwrap()).abs() < 1e-15);
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(
            DensityTree::<2>::from_slices(3, 0, &[0.0, 0.0], &[1.0, 1.0]).unwrap_err(),
            DensityError::UnsupportedBranching(3)
        );
        assert_eq!(
            DensityTree::<2>::from_slices(2, 0, &[0.0, 2.0], &[1.0, 1.0]).unwrap_err(),
            DensityError::InvalidBounds { axis: 1, lower: 2.0, upper: 1.0 }
        );
        assert_eq!(
            DensityTree::<2>::from_slices(2, 0, &[0.0], &[1.0]).unwrap_err(),
            DensityError::DimensionMismatch { expected: 2, got: 1 }
        );
        assert!(DensityTree::<2>::from_slices(2, 4, &[0.0, 0.0], &[1.0, 1.0]).is_ok());
    }

    #[test]
    fn test_batches() {
        let mut tree = DensityTree::new(TreeConfig::default(), BoundingBox::new([0.0, 0.0], [1.0, 1.0])).unwrap();
        let points: Vec<f64> = (0..400).map(|i| ((i * 37 % 101) as f64) / 101.0).collect();
        let loss = tree.observe_all(&points).unwrap();
        assert_eq!(loss.count(), 200);

        let batch = tree.pdf_batch(&points).unwrap();
        for (chunk, p) in points.chunks(2).zip(&batch) {
            assert_eq!(tree.pdf(&[chunk[0], chunk[1]]).unwrap(), *p);
        }
        assert_eq!(
            tree.pdf_batch(&[0.5, 0.5, 0.5]),
            Err(DensityError::MisalignedBatch { len: 3, dimensions: 2 })
        );
    }

    #[test]
    fn test_log_tracking_matches_linear() {
        let bounds = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
        let mut linear = DensityTree::new(TreeConfig::default().with_max_depth(8), bounds).unwrap();
        let mut log = DensityTree::new(
            TreeConfig::default().with_max_depth(8).with_weight_tracking(WeightTracking::Log),
            bounds,
        )
        .unwrap();
        for i in 0..2000 {
            let x = [(i as f64 * 0.7548776662).fract(), (i as f64 * 0.5698402910).fract().powi(2)];
            let a = linear.observe(&x).unwrap();
            let b = log.observe(&x).unwrap();
            assert!((a - b).abs() <= 1e-9 * a.max(1.0), "step {}: {} vs {}", i, a, b);
        }
        assert_eq!(linear.node_count(), log.node_count());
        let probe = [0.3, 0.1];
        assert!((linear.pdf(&probe).unwrap() - log.pdf(&probe).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_random_splits_are_reproducible() {
        let bounds = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
        let config = TreeConfig::default().with_split_policy(SplitPolicy::random()).with_seed(42);
        let mut a = DensityTree::new(config.clone(), bounds).unwrap();
        let mut b = DensityTree::new(config, bounds).unwrap();
        for i in 0..300 {
            let x = [(i as f64 * 0.31).fract(), (i as f64 * 0.77).fract()];
            assert_eq!(a.observe(&x).unwrap(), b.observe(&x).unwrap());
        }
        for ((_, na), (_, nb)) in a.nodes().zip(b.nodes()) {
            assert_eq!(na.mid_point(), nb.mid_point());
        }
    }

    #[test]
    fn test_gaussian_leaf_weights_stay_bounded() {
        let config = TreeConfig::default().with_max_depth(6).with_leaf_model(LeafModel::UniformGaussian);
        let mut tree = DensityTree::new(config, BoundingBox::new([-10.0], [10.0])).unwrap();
        for i in 0..1000 {
            let x = [((i as f64 * 0.618).fract() - 0.5) * 4.0];
            let p = tree.observe(&x).unwrap();
            assert!(p.is_finite() && p > 0.0);
        }
        for (_, node) in tree.nodes() {
            assert!((0.0..=1.0).contains(&node.weight()));
            let wg = node.gaussian_weight().unwrap();
            assert!((0.0..=1.0).contains(&wg));
        }
        assert!(tree.pdf(&[0.0]).unwrap() > tree.pdf(&[8.0]).unwrap());
    }

    #[test]
    fn test_display_lists_every_node() {
        let mut tree = unit_interval(0);
        for x in [0.1, 0.2, 0.7, 0.8, 0.15] {
            tree.observe(&[x]).unwrap();
        }
        let dump = tree.to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), tree.node_count() + 1);
        assert!(lines[0].starts_with("0 "));
        assert_eq!(lines.last().copied(), Some(format!("Total contexts: {}", tree.n_children()).as_str()));
    }
}
