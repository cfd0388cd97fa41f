//! Generic clustering algorithm implementations.

mod centroid_tree;
pub mod eigen;
pub mod embedding;
pub mod estimate;
mod helpers;
pub mod kmeans;
pub mod laplacian;
pub mod spectral;

pub use eigen::laplacian_eigenpairs_impl;
pub use embedding::spectral_embedding_impl;
pub use estimate::estimate_cluster_count;
pub use kmeans::kmeans_impl;
pub use laplacian::graph_laplacian_impl;
pub use spectral::{cluster_embedding_impl, spectral_clustering_impl};
