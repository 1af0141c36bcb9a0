use densitree::{BoundingBox, DensityTree, TreeConfig};
use plotters::prelude::*;
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

const RESOLUTION: usize = 200;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filename = "density.svg";
    let root = SVGBackend::new(filename, (1024, 1024)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Context tree density", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(0.0..100.0, 0.0..100.0)?;
    chart.configure_mesh().disable_mesh().draw()?;

    // A noisy ring plus a dense blob
    let bounds = BoundingBox::new([0.0, 0.0], [100.0, 100.0]);
    let mut tree = DensityTree::new(TreeConfig::default().with_max_depth(16), bounds)?;
    let mut rng = StdRng::seed_from_u64(7);
    let mut samples = Vec::with_capacity(20_000 * 2);
    for _ in 0..20_000 {
        if rng.gen_bool(0.8) {
            let t: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            let r = 30.0 + rng.gen_range(-4.0..4.0);
            samples.push(50.0 + r * t.cos());
            samples.push(50.0 + r * t.sin());
        } else {
            samples.push(rng.gen_range(45.0..55.0));
            samples.push(rng.gen_range(45.0..55.0));
        }
    }
    let loss = tree.observe_all(&samples)?;
    println!("Observed {} points, mean log-loss {:.4} nats, {} contexts", loss.count(), loss.mean(), tree.n_children());

    let step = 100.0 / RESOLUTION as f64;
    let mut raster = Vec::with_capacity(RESOLUTION * RESOLUTION * 2);
    for j in 0..RESOLUTION {
        for i in 0..RESOLUTION {
            raster.push((i as f64 + 0.5) * step);
            raster.push((j as f64 + 0.5) * step);
        }
    }
    let densities = tree.pdf_batch(&raster)?;
    let peak = densities.iter().cloned().fold(f64::MIN_POSITIVE, f64::max);

    chart.draw_series(raster.chunks(2).zip(densities.iter()).map(|(c, &p)| {
        let level = (p / peak).sqrt();
        let color = HSLColor(0.66 - 0.66 * level, 0.9, 0.15 + 0.6 * level);
        Rectangle::new([(c[0] - step / 2.0, c[1] - step / 2.0), (c[0] + step / 2.0, c[1] + step / 2.0)], color.filled())
    }))?;

    root.present()?;
    println!("Output saved to {}", filename);
    Ok(())
}
