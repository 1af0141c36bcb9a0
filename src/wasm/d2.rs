use crate::bounds::BoundingBox;
use crate::config::TreeConfig;
use crate::tree::DensityTree;
use crate::wasm::{seed, to_js};
use wasm_bindgen::prelude::*;

/// Density tree over a rectangle.
#[wasm_bindgen(js_name = DensityTree2D)]
pub struct DensityTree2D {
    inner: DensityTree<2>,
}

#[wasm_bindgen(js_class = DensityTree2D)]
impl DensityTree2D {
    #[wasm_bindgen(constructor)]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, max_depth: usize) -> Result<DensityTree2D, JsError> {
        let config = TreeConfig::default().with_max_depth(max_depth).with_seed(seed());
        let bounds = BoundingBox::new([min_x, min_y], [max_x, max_y]);
        let inner = DensityTree::new(config, bounds).map_err(to_js)?;
        Ok(DensityTree2D { inner })
    }

    pub fn observe(&mut self, x: f64, y: f64) -> Result<f64, JsError> {
        self.inner.observe(&[x, y]).map_err(to_js)
    }

    pub fn pdf(&self, x: f64, y: f64) -> Result<f64, JsError> {
        self.inner.pdf(&[x, y]).map_err(to_js)
    }

    /// Evaluates a flat `[x, y, x, y, ...]` array.
    #[wasm_bindgen(js_name = pdfBatch)]
    pub fn pdf_batch(&self, points: &[f64]) -> Result<Vec<f64>, JsError> {
        self.inner.pdf_batch(points).map_err(to_js)
    }

    /// Evaluates the density on the centres of an `nx` by `ny` raster over the domain, row by row.
    #[wasm_bindgen(js_name = pdfRaster)]
    pub fn pdf_raster(&self, nx: usize, ny: usize) -> Result<Vec<f64>, JsError> {
        let b = self.inner.bounds();
        let dx = (b.max[0] - b.min[0]) / nx as f64;
        let dy = (b.max[1] - b.min[1]) / ny as f64;
        let mut points = Vec::with_capacity(nx * ny * 2);
        for j in 0..ny {
            for i in 0..nx {
                points.push(b.min[0] + (i as f64 + 0.5) * dx);
                points.push(b.min[1] + (j as f64 + 0.5) * dy);
            }
        }
        self.pdf_batch(&points)
    }

    #[wasm_bindgen(js_name = observeAll)]
    pub fn observe_all(&mut self, points: &[f64]) -> Result<f64, JsError> {
        self.inner.observe_all(points).map(|loss| loss.mean()).map_err(to_js)
    }

    #[wasm_bindgen(getter, js_name = nChildren)]
    pub fn n_children(&self) -> usize {
        self.inner.n_children()
    }

    pub fn show(&self) -> String {
        self.inner.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_covers_domain() {
        let mut tree = DensityTree2D::new(0.0, 0.0, 10.0, 10.0, 8).unwrap_or_else(|_| panic!("valid bounds"));
        for i in 0..200 {
            let t = i as f64 * 0.01;
            tree.observe(2.0 + t, 3.0 + t).unwrap_or_else(|_| panic!("in domain"));
        }
        let raster = tree.pdf_raster(20, 20).unwrap_or_else(|_| panic!("aligned batch"));
        assert_eq!(raster.len(), 400);
        // Pixel (6, 8) is centred on (3.25, 4.25), on the observed segment; pixel (19, 0) is a far corner.
        let on_data = raster[8 * 20 + 6];
        let corner = raster[19];
        assert!(on_data > 10.0 * corner, "{} vs {}", on_data, corner);
        assert!((on_data - tree.pdf(3.25, 4.25).unwrap_or_else(|_| panic!("in domain"))).abs() < 1e-12);
    }
}
