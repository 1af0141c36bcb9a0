use crate::bounds::BoundingBox;
use crate::config::TreeConfig;
use crate::tree::DensityTree;
use crate::wasm::{seed, to_js};
use wasm_bindgen::prelude::*;

/// Density tree over an interval.
#[wasm_bindgen(js_name = DensityTree1D)]
pub struct DensityTree1D {
    inner: DensityTree<1>,
}

#[wasm_bindgen(js_class = DensityTree1D)]
impl DensityTree1D {
    #[wasm_bindgen(constructor)]
    pub fn new(lower: f64, upper: f64, max_depth: usize) -> Result<DensityTree1D, JsError> {
        let config = TreeConfig::default().with_max_depth(max_depth).with_seed(seed());
        let inner = DensityTree::new(config, BoundingBox::new([lower], [upper])).map_err(to_js)?;
        Ok(DensityTree1D { inner })
    }

    pub fn observe(&mut self, x: f64) -> Result<f64, JsError> {
        self.inner.observe(&[x]).map_err(to_js)
    }

    pub fn pdf(&self, x: f64) -> Result<f64, JsError> {
        self.inner.pdf(&[x]).map_err(to_js)
    }

    #[wasm_bindgen(js_name = pdfBatch)]
    pub fn pdf_batch(&self, points: &[f64]) -> Result<Vec<f64>, JsError> {
        self.inner.pdf_batch(points).map_err(to_js)
    }

    /// Observes all points in order and returns their mean log-loss in nats.
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
    fn test_wrapper_round_trip() {
        let mut tree = DensityTree1D::new(0.0, 4.0, 5).unwrap_or_else(|_| panic!("valid bounds"));
        for i in 0..100 {
            let p = tree.observe(((i % 10) as f64) * 0.1).unwrap_or_else(|_| panic!("in domain"));
            assert!(p > 0.0);
        }
        assert!(tree.n_children() > 0);
        let near = tree.pdf(0.45).unwrap_or_else(|_| panic!("in domain"));
        let far = tree.pdf(3.5).unwrap_or_else(|_| panic!("in domain"));
        assert!(near > far);
        assert!(tree.show().ends_with(&format!("Total contexts: {}\n", tree.n_children())));
    }
}
