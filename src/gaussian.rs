//! Online Gaussian component for the optional blended leaf model.
//!
//! Each axis carries an independent Normal-Gamma posterior over mean and precision,
//! so the predictive density is a product of Student-t densities. The component is
//! updated in closed form, one sample at a time.

use crate::bounds::BoundingBox;
use crate::special::ln_gamma;

#[derive(Clone, Debug)]
pub struct GaussianLeaf<const D: usize> {
    mu: [f64; D],
    kappa: f64,
    alpha: f64,
    beta: [f64; D],
}

impl<const D: usize> GaussianLeaf<D> {
    /// Prior centred at `mu` with per-axis variance scale `scale2`.
    pub fn new(mu: [f64; D], scale2: [f64; D]) -> Self {
        Self { mu, kappa: 1.0, alpha: 1.0, beta: scale2 }
    }

    /// Prior for a root cell: centred in the box, spread over half its width.
    pub fn for_cell(bounds: &BoundingBox<D>) -> Self {
        let widths = bounds.widths();
        let mut scale2 = [0.0; D];
        for i in 0..D {
            scale2[i] = 0.25 * widths[i] * widths[i];
        }
        Self::new(bounds.center(), scale2)
    }

    /// Prior for a child cell: centred in the child, with the parent's current variance estimate.
    pub fn child_of(parent: &GaussianLeaf<D>, bounds: &BoundingBox<D>) -> Self {
        Self::new(bounds.center(), parent.variance())
    }

    pub fn mean(&self) -> [f64; D] {
        self.mu
    }

    /// Posterior expected variance per axis.
    pub fn variance(&self) -> [f64; D] {
        let mut v = [0.0; D];
        for i in 0..D {
            v[i] = self.beta[i] / self.alpha;
        }
        v
    }

    /// Log of the posterior predictive density at `x`.
    pub fn log_predictive(&self, x: &[f64; D]) -> f64 {
        let nu = 2.0 * self.alpha;
        let norm = ln_gamma(0.5 * (nu + 1.0)) - ln_gamma(0.5 * nu) - 0.5 * (nu * std::f64::consts::PI).ln();
        let mut log_p = 0.0;
        for i in 0..D {
            let scale2 = self.beta[i] * (self.kappa + 1.0) / (self.alpha * self.kappa);
            let z2 = (x[i] - self.mu[i]).powi(2) / scale2;
            log_p += norm - 0.5 * scale2.ln() - 0.5 * (nu + 1.0) * (z2 / nu).ln_1p();
        }
        log_p
    }

    pub fn predictive(&self, x: &[f64; D]) -> f64 {
        self.log_predictive(x).exp()
    }

    /// Absorb one sample into the posterior.
    pub fn update(&mut self, x: &[f64; D]) {
        let kappa = self.kappa;
        for i in 0..D {
            let d = x[i] - self.mu[i];
            self.beta[i] += kappa * d * d / (2.0 * (kappa + 1.0));
            self.mu[i] = (kappa * self.mu[i] + x[i]) / (kappa + 1.0);
        }
        self.kappa += 1.0;
        self.alpha += 0.5;
    }
}
