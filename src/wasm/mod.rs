//! `wasm-bindgen` bindings for one- and two-dimensional trees.

pub mod d1;
pub mod d2;

use crate::config::DEFAULT_SEED;
use crate::error::DensityError;
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_rayon::init_thread_pool;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn init_threads(n: usize) -> js_sys::Promise {
    init_thread_pool(n)
}

/// Seed for trees built from JavaScript: random in the browser, fixed natively.
pub(crate) fn seed() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        (js_sys::Math::random() * 4294967296.0) as u64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        DEFAULT_SEED
    }
}

pub(crate) fn to_js(err: DensityError) -> JsError {
    JsError::new(&err.to_string())
}
