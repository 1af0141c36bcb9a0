/// Running summary of the online log-loss `-ln p` of a sequence of predictive densities.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LogLoss {
    count: usize,
    total: f64,
}

impl LogLoss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one predictive density.
    pub fn record(&mut self, density: f64) {
        self.count += 1;
        self.total -= density.ln();
    }

    /// Combines two summaries, e.g. consecutive blocks of one stream.
    pub fn merge(&mut self, other: &LogLoss) {
        self.count += other.count;
        self.total += other.total;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Accumulated loss in nats.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Average loss per observation in nats; zero for an empty sequence.
    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.total / self.count as f64 }
    }

    pub fn mean_bits(&self) -> f64 {
        self.mean() / std::f64::consts::LN_2
    }

    /// Average log-density, the negated mean loss.
    pub fn mean_log_density(&self) -> f64 {
        -self.mean()
    }
}
