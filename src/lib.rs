//! # densitree
//!
//! `densitree` is a Rust library for online density estimation with context trees, designed to
//! be used in Rust as well as compiled to WebAssembly (WASM). A [`DensityTree`] recursively
//! bisects a bounded domain and mixes, at every cell, a local density with the density implied
//! by its children. Each observation returns its sequential predictive density before updating
//! the model, so the sum of `-ln p` is the online log-loss.
//!
//! ## Features
//!
//! - **Online**: `observe` predicts and updates in a single descent; `pdf` evaluates without mutating.
//! - **Const-generic dimensions**: trees over `[f64; D]` for any fixed `D`.
//! - **Configurable**: split placement, Gaussian leaves, log-space weights and out-of-domain policy via [`TreeConfig`].
//! - **Parallel queries**: batches of points are evaluated with `rayon`.
//! - **WASM-first**: 1-D and 2-D wrappers built with `wasm-bindgen`.
//!
//! A double-kernel conditional density estimator, [`DoubleKernelCde`], is included as a baseline.
//!
//! ## Example
//!
//! See the `demos/` directory for an SVG density plot and a log-loss run.
//!
//! ## Main Interface
//!
//! The primary entry point is the [`DensityTree`] struct.

mod bounds;
mod config;
mod error;
mod gaussian;
mod kernel;
mod loss;
mod special;
mod tree;
mod wasm;

pub use bounds::BoundingBox;
pub use config::DEFAULT_SEED;
pub use config::DomainPolicy;
pub use config::LeafModel;
pub use config::SplitPolicy;
pub use config::TreeConfig;
pub use config::WeightTracking;
pub use error::DensityError;
pub use gaussian::GaussianLeaf;
pub use kernel::BandwidthSearch;
pub use kernel::DoubleKernelCde;
pub use loss::LogLoss;
pub use tree::DensityTree;
pub use tree::node::Node;
pub use tree::node::NodeId;
pub use wasm::d1::DensityTree1D;
pub use wasm::d2::DensityTree2D;
#[cfg(target_arch = "wasm32")]
pub use wasm::init_threads;
