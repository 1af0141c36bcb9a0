//! Double-kernel conditional density estimation.
//!
//! `p(y | x)` is estimated from stored pairs `(x_i, y_i)` as a Gaussian kernel density
//! over `y`, where each pair is weighted by a Gaussian kernel on the distance between
//! `x` and `x_i`. The bandwidths are fitted by held-out likelihood.

use crate::error::DensityError;
use crate::special::{log_sum_exp, square_norm};
use rand::Rng;
use tracing::{debug, info};

/// Fraction of the stored pairs held out when scoring bandwidths.
const HOLDOUT_FRACTION: f64 = 0.1;

/// Strategy for [`DoubleKernelCde::bootstrap_bandwidth`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BandwidthSearch {
    /// Halve both bandwidths while the held-out likelihood improves, then double from the
    /// best while it improves.
    Deterministic { max_evaluations: usize },
    /// Log-space random walk around the best candidate found so far.
    Stochastic { max_evaluations: usize, step: f64 },
}

impl Default for BandwidthSearch {
    fn default() -> Self {
        BandwidthSearch::Deterministic { max_evaluations: 64 }
    }
}

#[derive(Clone, Debug)]
struct PointPair<const X: usize, const Y: usize> {
    x: [f64; X],
    y: [f64; Y],
}

/// Kernel estimate of the density of `y` given `x`.
#[derive(Clone, Debug)]
pub struct DoubleKernelCde<const X: usize, const Y: usize> {
    b_x: f64,
    b_y: f64,
    points: Vec<PointPair<X, Y>>,
}

impl<const X: usize, const Y: usize> DoubleKernelCde<X, Y> {
    pub fn new(initial_bandwidth: f64) -> Result<Self, DensityError> {
        Self::with_bandwidths(initial_bandwidth, initial_bandwidth)
    }

    pub fn with_bandwidths(b_x: f64, b_y: f64) -> Result<Self, DensityError> {
        for b in [b_x, b_y] {
            if !b.is_finite() || b <= 0.0 {
                return Err(DensityError::InvalidBandwidth(b));
            }
        }
        Ok(Self { b_x, b_y, points: Vec::new() })
    }

    pub fn bandwidths(&self) -> (f64, f64) {
        (self.b_x, self.b_y)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn add_point(&mut self, x: &[f64; X], y: &[f64; Y]) {
        self.points.push(PointPair { x: *x, y: *y });
    }

    /// Returns the density of `y` given `x` under the current data, then stores the pair.
    pub fn observe(&mut self, x: &[f64; X], y: &[f64; Y]) -> f64 {
        let p = self.pdf(x, y);
        self.add_point(x, y);
        p
    }

    pub fn pdf(&self, x: &[f64; X], y: &[f64; Y]) -> f64 {
        self.log_pdf(x, y).exp()
    }

    /// Log conditional density. With no data, `y` is scored under a standard normal.
    pub fn log_pdf(&self, x: &[f64; X], y: &[f64; Y]) -> f64 {
        Self::log_pdf_with(&self.points, self.b_x, self.b_y, x, y)
    }

    fn log_pdf_with(points: &[PointPair<X, Y>], b_x: f64, b_y: f64, x: &[f64; X], y: &[f64; Y]) -> f64 {
        let c = -0.5 * (Y as f64) * (2.0 * std::f64::consts::PI).ln();
        if points.is_empty() {
            return c - 0.5 * square_norm(y, &[0.0; Y]);
        }

        let inv_bx2 = 1.0 / (b_x * b_x);
        let inv_by2 = 1.0 / (b_y * b_y);
        let log_norm_y = c - (Y as f64) * b_y.ln();
        let mut log_z = f64::NEG_INFINITY;
        let mut log_p = f64::NEG_INFINITY;
        for pair in points {
            let log_p_c = -0.5 * square_norm(x, &pair.x) * inv_bx2;
            let log_p_i = log_norm_y - 0.5 * square_norm(y, &pair.y) * inv_by2;
            log_p = log_sum_exp(log_p, log_p_c + log_p_i);
            log_z = log_sum_exp(log_z, log_p_c);
        }
        log_p - log_z
    }

    /// Fits both bandwidths by maximizing the log-likelihood of a random held-out tenth of the data.
    ///
    /// The search evaluates at most `max_evaluations` candidates and always terminates.
    /// Returns the held-out log-likelihood of the chosen bandwidths.
    pub fn bootstrap_bandwidth<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        search: BandwidthSearch,
    ) -> Result<f64, DensityError> {
        let mut train = Vec::with_capacity(self.points.len());
        let mut test = Vec::new();
        for pair in &self.points {
            if rng.gen_range(0.0..1.0) < HOLDOUT_FRACTION {
                test.push(pair.clone());
            } else {
                train.push(pair.clone());
            }
        }
        if test.is_empty() || train.is_empty() {
            return Err(DensityError::EmptyHoldout);
        }

        let score = |b_x: f64, b_y: f64| -> f64 {
            test.iter()
                .map(|p| Self::log_pdf_with(&train, b_x, b_y, &p.x, &p.y))
                .sum()
        };

        let mut best = (self.b_x, self.b_y);
        let mut best_score = score(best.0, best.1);
        let mut evaluations = 1;

        match search {
            BandwidthSearch::Deterministic { max_evaluations } => {
                for factor in [0.5, 2.0] {
                    loop {
                        if evaluations >= max_evaluations {
                            break;
                        }
                        let candidate = (best.0 * factor, best.1 * factor);
                        let s = score(candidate.0, candidate.1);
                        evaluations += 1;
                        if s > best_score {
                            debug!(b_x = candidate.0, b_y = candidate.1, score = s, "bandwidth improved");
                            best = candidate;
                            best_score = s;
                        } else {
                            break;
                        }
                    }
                }
            }
            BandwidthSearch::Stochastic { max_evaluations, step } => {
                while evaluations < max_evaluations {
                    let candidate = (
                        best.0 * (step * rng.gen_range(-1.0..1.0)).exp(),
                        best.1 * (step * rng.gen_range(-1.0..1.0)).exp(),
                    );
                    let s = score(candidate.0, candidate.1);
                    evaluations += 1;
                    if s > best_score {
                        debug!(b_x = candidate.0, b_y = candidate.1, score = s, "bandwidth improved");
                        best = candidate;
                        best_score = s;
                    }
                }
            }
        }

        info!(b_x = best.0, b_y = best.1, score = best_score, evaluations, "bandwidth search finished");
        self.b_x = best.0;
        self.b_y = best.1;
        Ok(best_score)
    }
}
