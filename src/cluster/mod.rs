//! Spectral clustering of weighted similarity graphs.
//!
//! The pipeline runs over a precomputed dense affinity matrix:
//! Laplacian ([`LaplacianType`]), smallest eigenpairs ([`EigenSolver`]),
//! optional eigengap estimate of the cluster count ([`ClusterCount`]),
//! spectral embedding, and K-Means over the embedded points. Each stage is
//! exposed on [`SpectralClusteringAlgorithms`] so it can be run on its own.

mod cpu;
pub mod impl_generic;
pub mod traits;
mod validation;

pub use impl_generic::estimate_cluster_count;
pub use traits::kmeans::{KMeansAlgorithms, KMeansInit, KMeansOptions, KMeansResult};
pub use traits::spectral::{
    ClusterCount, ClusteringOptions, EigenSolver, EigenSpectrum, GraphLaplacian, KMeansPartition,
    LaplacianType, SpectralClustering, SpectralClusteringAlgorithms, SpectralOptions,
    SubspaceOptions,
};
pub use validation::*;
