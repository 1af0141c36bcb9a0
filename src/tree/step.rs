//! The per-node recursion step, shared by `observe` and `pdf`.
//!
//! [`plan`] never mutates: it reads a node and returns the quantities the mixture needs
//! plus an instruction for where the descent goes next. The caller decides whether to
//! apply the counts, the child creation and the weight update.

use super::node::{Node, NodeId};
use crate::config::{TreeConfig, WeightTracking};
use tracing::warn;

/// Slack allowed on the [0, 1] weight range before an update counts as degenerate.
const WEIGHT_SLACK: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    /// The step runs as part of an update: counts include the current sample.
    Observe,
    /// Read-only evaluation of the current state.
    Evaluate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Next {
    Descend(NodeId),
    /// The growth criterion holds but the child does not exist yet.
    Create,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Step {
    pub branch: usize,
    pub p_uniform: f64,
    pub p_gaussian: Option<f64>,
    /// Density of the local model: uniform, or uniform blended with the Gaussian.
    pub p_local: f64,
    /// Add-one estimate of the probability of `branch`, from the counts before this sample.
    pub p_branch: f64,
    pub next: Next,
}

pub(crate) fn plan<const D: usize>(node: &Node<D>, x: &[f64; D], mode: Mode, config: &TreeConfig) -> Step {
    let branch = node.branch(x);
    let p_uniform = 1.0 / node.volume;
    let (p_local, p_gaussian) = match &node.gaussian {
        Some(g) => {
            let p_gaussian = g.predictive(x);
            let wg = node.w_gaussian;
            (wg * p_gaussian + (1.0 - wg) * p_uniform, Some(p_gaussian))
        }
        None => (p_uniform, None),
    };
    let p_branch = (1.0 + node.alpha[branch] as f64) / (2.0 + node.total as f64);

    let threshold = config.growth_threshold(node.depth);
    let next = match mode {
        Mode::Observe => {
            let seen = (node.total + 1) as f64;
            if config.allows_children(node.depth) && seen > threshold {
                node.children[branch].map_or(Next::Create, Next::Descend)
            } else {
                Next::Stop
            }
        }
        Mode::Evaluate => {
            if node.total as f64 > threshold {
                node.children[branch].map_or(Next::Stop, Next::Descend)
            } else {
                Next::Stop
            }
        }
    };

    Step { branch, p_uniform, p_gaussian, p_local, p_branch, next }
}

/// The node's current weight of the local model.
pub(crate) fn current_weight<const D: usize>(node: &Node<D>, tracking: WeightTracking) -> f64 {
    match tracking {
        WeightTracking::Linear => node.w,
        WeightTracking::Log => (node.log_w_prior + node.log_w).exp().clamp(0.0, 1.0),
    }
}

/// `w * p_local + (1 - w) * p_recursive`.
pub(crate) fn mix(w: f64, p_local: f64, p_recursive: f64) -> f64 {
    p_local * w + (1.0 - w) * p_recursive
}

/// Maps NaN to zero and infinities to the largest finite density, so a parent never mixes in garbage.
pub(crate) fn sanitize(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else if p.is_infinite() {
        if p > 0.0 { f64::MAX } else { 0.0 }
    } else {
        p.max(0.0)
    }
}

/// The mixture density at a node, without touching it.
pub(crate) fn evaluate<const D: usize>(node: &Node<D>, step: &Step, p_recursive: f64, tracking: WeightTracking) -> f64 {
    let w = current_weight(node, tracking);
    sanitize(mix(w, step.p_local, p_recursive))
}

/// Applies the local model update: the Gaussian posterior and its mixing weight absorb `x`.
pub(crate) fn absorb_local<const D: usize>(node: &mut Node<D>, step: &Step, x: &[f64; D]) {
    let Some(p_gaussian) = step.p_gaussian else {
        return;
    };
    if step.p_local > 0.0 && step.p_local.is_finite() {
        node.w_gaussian = (node.w_gaussian * p_gaussian / step.p_local).clamp(0.0, 1.0);
    } else {
        warn!(depth = node.depth, p_local = step.p_local, "degenerate local density, resetting gaussian weight");
        node.w_gaussian = 0.5;
    }
    if let Some(g) = node.gaussian.as_mut() {
        g.update(x);
    }
}

/// Mixes the local and recursive densities and moves the weight to its posterior.
///
/// Returns the node's predictive density. A degenerate mixture resets the weight to the
/// prior and reports the local density instead.
pub(crate) fn settle<const D: usize>(node: &mut Node<D>, step: &Step, p_recursive: f64, tracking: WeightTracking) -> f64 {
    let w = current_weight(node, tracking);
    let total = mix(w, step.p_local, p_recursive);

    if !total.is_finite() || total <= 0.0 {
        warn!(depth = node.depth, total, "degenerate mixture, resetting node weight");
        node.reset_weight();
        return sanitize(step.p_local);
    }

    let posterior = w * step.p_local / total;
    if !posterior.is_finite() || posterior < -WEIGHT_SLACK || posterior > 1.0 + WEIGHT_SLACK {
        warn!(depth = node.depth, posterior, "posterior weight left [0, 1], resetting node weight");
        node.reset_weight();
        return total;
    }
    let posterior = posterior.clamp(0.0, 1.0);

    match tracking {
        WeightTracking::Linear => node.w = posterior,
        WeightTracking::Log => {
            node.log_w = posterior.ln() - node.log_w_prior;
            node.w = posterior;
        }
    }
    debug_assert!((0.0..=1.0).contains(&node.w), "weight {} out of range", node.w);

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingBox;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn unit_node(config: &TreeConfig) -> Node<1> {
        let mut rng = StdRng::seed_from_u64(7);
        Node::root(BoundingBox::new([0.0], [2.0]), config, &mut rng).unwrap()
    }

    #[test]
    fn test_plan_is_pure_and_matches_between_modes() {
        let config = TreeConfig::default();
        let mut node = unit_node(&config);
        node.alpha = [3, 1];
        node.total = 4;

        let before = node.clone();
        let observe = plan(&node, &[0.2], Mode::Observe, &config);
        let evaluate = plan(&node, &[0.2], Mode::Evaluate, &config);
        assert_eq!(node.alpha, before.alpha);
        assert_eq!(node.total, before.total);

        assert_eq!(observe.branch, 0);
        assert_eq!(observe.p_local, evaluate.p_local);
        assert_eq!(observe.p_branch, evaluate.p_branch);
        assert!((observe.p_local - 0.5).abs() < 1e-15);
        assert!((observe.p_branch - 4.0 / 6.0).abs() < 1e-15);

        // Growth is warranted but the child is missing: observe creates, evaluate stops.
        assert_eq!(observe.next, Next::Create);
        assert_eq!(evaluate.next, Next::Stop);
    }

    #[test]
    fn test_first_observation_does_not_grow() {
        let config = TreeConfig::default();
        let node = unit_node(&config);
        // One sample makes S = 1, which does not exceed 1.1^0 = 1.
        assert_eq!(plan(&node, &[1.5], Mode::Observe, &config).next, Next::Stop);
    }

    #[test]
    fn test_depth_limit_stops_growth() {
        let config = TreeConfig::default().with_max_depth(1);
        let mut node = unit_node(&config);
        node.depth = 1;
        node.total = 100;
        assert_eq!(plan(&node, &[1.5], Mode::Observe, &config).next, Next::Stop);
    }

    #[test]
    fn test_settle_keeps_weight_in_range() {
        let config = TreeConfig::default();
        for &p_recursive in &[0.0, 1e-300, 0.5, 3.0, 1e300] {
            let mut node = unit_node(&config);
            let step = plan(&node, &[0.5], Mode::Observe, &config);
            let total = settle(&mut node, &step, p_recursive, WeightTracking::Linear);
            assert!(total.is_finite() && total > 0.0);
            assert!((0.0..=1.0).contains(&node.weight()));
        }
    }

    #[test]
    fn test_degenerate_mixture_resets_weight() {
        let config = TreeConfig::default();
        let mut node = unit_node(&config);
        node.w = 0.2;
        let step = plan(&node, &[0.5], Mode::Observe, &config);
        let total = settle(&mut node, &step, f64::NAN, WeightTracking::Linear);
        assert_eq!(total, step.p_local);
        assert!((node.weight() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_log_and_linear_tracking_agree() {
        let config = TreeConfig::default();
        let mut linear = unit_node(&config);
        let mut log = unit_node(&config);
        for i in 0..50 {
            let p_recursive = 0.1 + (i % 7) as f64 * 0.3;
            let step = plan(&linear, &[0.5], Mode::Observe, &config);
            let a = settle(&mut linear, &step, p_recursive, WeightTracking::Linear);
            let b = settle(&mut log, &step, p_recursive, WeightTracking::Log);
            assert!((a - b).abs() < 1e-9);
        }
        let w_log = current_weight(&log, WeightTracking::Log);
        assert!((linear.weight() - w_log).abs() < 1e-9);
    }
}
