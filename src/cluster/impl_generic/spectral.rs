//! Generic spectral clustering implementation.
//!
//! 1. Graph Laplacian of the precomputed affinity matrix
//! 2. Smallest eigenpairs of the Laplacian (or of the pencil)
//! 3. Cluster count: fixed, or estimated from the largest eigengap
//! 4. Embedding from the leading eigenvectors
//! 5. K-Means over the embedded points

use crate::cluster::traits::kmeans::{KMeansInit, KMeansOptions};
use crate::cluster::traits::spectral::{
    ClusterCount, ClusteringOptions, KMeansPartition, SpectralClustering, SpectralOptions,
};
use crate::cluster::validation::{
    validate_affinity, validate_cluster_dtype, validate_labels, validate_n_clusters,
};
use log::{debug, info};
use numr::algorithm::linalg::LinearAlgebraAlgorithms;
use numr::error::{Error, Result};
use numr::ops::{
    CompareOps, ConditionalOps, CumulativeOps, DistanceOps, IndexingOps, LinalgOps, MatmulOps,
    RandomOps, ReduceOps, ScalarOps, ShapeOps, SortingOps, TensorOps, TypeConversionOps, UnaryOps,
    UtilityOps,
};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use super::eigen::laplacian_eigenpairs_impl;
use super::embedding::spectral_embedding_impl;
use super::estimate::estimate_cluster_count;
use super::helpers::{host_f64, machine_epsilon};
use super::kmeans::kmeans_impl;
use super::laplacian::graph_laplacian_impl;

/// Cluster count resolved against the graph size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedCount {
    /// Eigenpairs to compute.
    n_eigenpairs: usize,
    /// Fixed count, or the upper bound when estimating.
    n_clusters: usize,
    estimate: bool,
}

fn resolve_cluster_count(count: ClusterCount, n: usize) -> Result<ResolvedCount> {
    match count {
        ClusterCount::Fixed(k) => {
            validate_n_clusters(k, n, "spectral_clustering")?;
            Ok(ResolvedCount {
                n_eigenpairs: k,
                n_clusters: k,
                estimate: false,
            })
        }
        ClusterCount::Bounded {
            max_clusters,
            estimate,
        } => {
            let bound = if max_clusters == 0 || max_clusters > n {
                n
            } else {
                max_clusters
            };
            // One extra eigenvalue exposes the gap after the last candidate.
            let n_eigenpairs = if estimate { (bound + 1).min(n) } else { bound };
            Ok(ResolvedCount {
                n_eigenpairs,
                n_clusters: bound,
                estimate,
            })
        }
    }
}

/// Partition the columns of a [k, n] embedding into `n_clusters` groups.
pub fn cluster_embedding_impl<R, C>(
    client: &C,
    embedding: &Tensor<R>,
    n_clusters: usize,
    options: &ClusteringOptions,
) -> Result<KMeansPartition<R>>
where
    R: Runtime,
    C: DistanceOps<R>
        + IndexingOps<R>
        + LinalgOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + TensorOps<R>
        + TypeConversionOps<R>
        + UnaryOps<R>
        + CumulativeOps<R>
        + ConditionalOps<R>
        + CompareOps<R>
        + RandomOps<R>
        + SortingOps<R>
        + ShapeOps<R>
        + UtilityOps<R>
        + RuntimeClient<R>,
{
    validate_cluster_dtype(embedding.dtype(), "cluster_embedding")?;
    if embedding.shape().len() != 2 {
        return Err(Error::InvalidArgument {
            arg: "embedding",
            reason: format!(
                "cluster_embedding requires a 2D embedding [k, n], got {}-D",
                embedding.shape().len()
            ),
        });
    }

    // Points are the columns: [k, n] -> [n, k]
    let points = embedding.transpose(0, 1)?.contiguous();

    let km_opts = KMeansOptions {
        n_clusters,
        max_iter: options.max_iter,
        tol: options.tol,
        n_init: options.n_init,
        init: KMeansInit::KMeansPlusPlus,
        use_kd_tree: options.use_kd_tree,
    };
    let result = kmeans_impl(client, &points, &km_opts)?;
    validate_labels(result.labels.shape(), result.labels.dtype(), "cluster_embedding")?;

    Ok(KMeansPartition::from_result(result, n_clusters))
}

/// Generic spectral clustering implementation.
pub fn spectral_clustering_impl<R, C>(
    client: &C,
    affinities: &Tensor<R>,
    options: &SpectralOptions,
) -> Result<SpectralClustering<R>>
where
    R: Runtime,
    C: LinearAlgebraAlgorithms<R>
        + DistanceOps<R>
        + IndexingOps<R>
        + LinalgOps<R>
        + MatmulOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + TensorOps<R>
        + TypeConversionOps<R>
        + UnaryOps<R>
        + CumulativeOps<R>
        + ConditionalOps<R>
        + CompareOps<R>
        + RandomOps<R>
        + SortingOps<R>
        + ShapeOps<R>
        + UtilityOps<R>
        + RuntimeClient<R>,
{
    validate_cluster_dtype(affinities.dtype(), "spectral_clustering")?;
    validate_affinity(affinities.shape(), "spectral_clustering")?;

    let n = affinities.shape()[0];
    let resolved = resolve_cluster_count(options.cluster_count, n)?;
    debug!("spectral_clustering: n={n}, {resolved:?}");

    let laplacian = graph_laplacian_impl(client, affinities, options.laplacian)?;
    let spectrum = laplacian_eigenpairs_impl(
        client,
        &laplacian,
        resolved.n_eigenpairs,
        &options.eigen_solver,
    )?;

    let n_clusters = if resolved.estimate {
        let eigenvalues = host_f64(&spectrum.eigenvalues);
        let epsilon = machine_epsilon(affinities.dtype());
        let estimated = estimate_cluster_count(&eigenvalues, resolved.n_clusters, epsilon)
            .min(resolved.n_clusters);
        info!(
            "spectral_clustering: estimated {estimated} clusters (bound {})",
            resolved.n_clusters
        );
        estimated
    } else {
        resolved.n_clusters
    };

    let embedding = spectral_embedding_impl(client, &spectrum, n_clusters, options.laplacian)?;
    let clusterer = cluster_embedding_impl(client, &embedding, n_clusters, &options.clustering)?;

    Ok(SpectralClustering {
        embedding,
        eigenvalues: spectrum.eigenvalues,
        clusterer,
    })
}
