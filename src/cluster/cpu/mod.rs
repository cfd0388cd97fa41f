//! CPU implementation of clustering algorithms.
//!
//! This module implements the clustering algorithm traits for CPU
//! by delegating to the generic implementations in `impl_generic/`.

mod kmeans;
mod spectral;
