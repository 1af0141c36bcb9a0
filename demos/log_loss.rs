use densitree::{BandwidthSearch, BoundingBox, DensityTree, DoubleKernelCde, LogLoss, TreeConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Usage: log_loss [T] [max_depth] [sigma_a] [sigma_b]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let steps: usize = args.get(1).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(10_000);
    let max_depth: usize = args.get(2).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(10);
    let sigma_a: f64 = args.get(3).map(|s| s.parse::<f64>()).transpose()?.unwrap_or(1.0);
    let sigma_b: f64 = args.get(4).map(|s| s.parse::<f64>()).transpose()?.unwrap_or(1.0);

    let a = Normal::new(0.0, sigma_a)?;
    let b = Normal::new(0.0, sigma_b)?;
    let mut rng = StdRng::seed_from_u64(densitree::DEFAULT_SEED);

    let bounds = BoundingBox::new([-100.0, -100.0], [100.0, 100.0]);
    let mut joint = DensityTree::new(TreeConfig::default().with_max_depth(max_depth), bounds)?;
    let mut conditional = DoubleKernelCde::<1, 1>::new(1.0)?;

    let mut joint_loss = LogLoss::new();
    let mut conditional_loss = LogLoss::new();
    let mut window = LogLoss::new();

    // A point drifting around a circle of radius 5 with correlated noise
    for t in 0..steps {
        let (a, b) = (a.sample(&mut rng), b.sample(&mut rng));
        let phase = 0.1 * t as f64;
        let z = [5.0 * phase.sin() + a + 0.5 * b, 5.0 * phase.cos() + b - 0.2 * a];

        let p = joint.observe(&z)?;
        joint_loss.record(p);
        window.record(p);
        conditional_loss.record(conditional.observe(&[z[0]], &[z[1]]));

        if (t + 1) % 1000 == 0 {
            println!("t = {:6}: window log-loss {:.4} nats, contexts {}", t + 1, window.mean(), joint.n_children());
            window = LogLoss::new();
            if conditional.len() >= 20 {
                conditional.bootstrap_bandwidth(&mut rng, BandwidthSearch::default())?;
            }
        }
    }

    let (b_x, b_y) = conditional.bandwidths();
    println!("Joint tree:        mean log-loss {:.4} nats ({:.4} bits)", joint_loss.mean(), joint_loss.mean_bits());
    println!("Kernel p(z1 | z0): mean log-loss {:.4} nats, bandwidths ({:.4}, {:.4})", conditional_loss.mean(), b_x, b_y);
    println!("Deepest context:   {}", joint.max_depth_reached());

    println!("PDF model");
    joint.show();
    Ok(())
}
