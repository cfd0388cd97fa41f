//! specclust - spectral embedding and clustering of weighted similarity graphs
//!
//! specclust partitions the nodes of a graph given as a dense symmetric
//! nonnegative affinity matrix. Built on numr's tensor primitives, the
//! algorithms are written once against numr's `Runtime` trait and
//! implemented for the CPU backend.
//!
//! # Pipeline
//!
//! ```text
//! affinity W [n, n]
//!     │  graph_laplacian        L = D - W, I - D^-½ W D^-½, or pencil (L, D)
//!     ▼
//! Laplacian
//!     │  laplacian_eigenpairs   m smallest eigenpairs (dense or subspace)
//!     ▼
//! eigenvalues [m], eigenvectors [n, m]
//!     │  estimate_cluster_count largest eigengap (optional)
//!     │  spectral_embedding     first k eigenvectors as rows
//!     ▼
//! embedding [k, n]
//!     │  cluster_embedding      K-Means over the n columns
//!     ▼
//! SpectralClustering
//! ```
//!
//! # Logging
//!
//! Stage boundaries are reported through the `log` facade: isolated nodes
//! at `warn`, the estimated cluster count at `info`, solver and K-Means
//! progress at `debug` and `trace`. No logger is installed by the library.
//!
//! # Example
//!
//! ```ignore
//! use specclust::cluster::{ClusterCount, SpectralClusteringAlgorithms, SpectralOptions};
//! use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
//! use numr::tensor::Tensor;
//!
//! let device = CpuDevice::new();
//! let client = CpuClient::new(device.clone());
//!
//! let affinities = Tensor::<CpuRuntime>::from_slice(&weights, &[n, n], &device);
//! let options = SpectralOptions {
//!     cluster_count: ClusterCount::Bounded { max_clusters: 8, estimate: true },
//!     ..Default::default()
//! };
//! let clustering = client.spectral_clustering(&affinities, &options)?;
//! for (cluster, points) in clustering.cluster_point_indices().iter().enumerate() {
//!     println!("cluster {cluster}: {points:?}");
//! }
//! ```

pub mod cluster;

// Re-export main types for convenience
pub use cluster::{
    ClusterCount, ClusteringOptions, EigenSolver, EigenSpectrum, GraphLaplacian, KMeansAlgorithms,
    KMeansInit, KMeansOptions, KMeansPartition, KMeansResult, LaplacianType, SpectralClustering,
    SpectralClusteringAlgorithms, SpectralOptions, SubspaceOptions, estimate_cluster_count,
};

// Re-export numr types that users will commonly need
pub use numr::dtype::DType;
pub use numr::error::{Error, Result};
pub use numr::runtime::{Runtime, RuntimeClient};
pub use numr::tensor::Tensor;
