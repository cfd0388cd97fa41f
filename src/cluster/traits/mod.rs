//! Clustering algorithm traits.

pub mod kmeans;
pub mod spectral;
