//! Generic K-Means clustering implementation.
//!
//! Lloyd iterations with two interchangeable assignment steps:
//! - brute force: pairwise distances [n, k] followed by `argmin`;
//! - KD-tree: a host tree over the k centroids answers one nearest query
//!   per point, avoiding the full distance matrix.
//!
//! Both assign every point to its exact nearest centroid with ties broken
//! toward the lower centroid index, so they yield identical partitions.

use crate::cluster::traits::kmeans::{KMeansInit, KMeansOptions, KMeansResult};
use crate::cluster::validation::{validate_cluster_dtype, validate_data_2d, validate_n_clusters};
use log::{debug, trace};
use numr::dtype::DType;
use numr::error::{Error, Result};
use numr::ops::{
    CompareOps, ConditionalOps, CumulativeOps, DistanceMetric, DistanceOps, IndexingOps, LinalgOps,
    RandomOps, ReduceOps, ScalarOps, ShapeOps, SortingOps, TensorOps, TypeConversionOps, UnaryOps,
    UtilityOps,
};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use super::centroid_tree::CentroidTree;
use super::helpers::host_f64;

/// K-Means++ initialization: pick centroids with probability proportional to D^2.
fn kmeans_plusplus_init<R, C>(client: &C, data: &Tensor<R>, k: usize) -> Result<Tensor<R>>
where
    R: Runtime,
    C: DistanceOps<R>
        + IndexingOps<R>
        + ReduceOps<R>
        + RandomOps<R>
        + ScalarOps<R>
        + TensorOps<R>
        + UnaryOps<R>
        + UtilityOps<R>
        + ShapeOps<R>
        + CompareOps<R>
        + CumulativeOps<R>
        + RuntimeClient<R>,
{
    let n = data.shape()[0];
    let device = data.device();
    let dtype = data.dtype();

    // First centroid uniformly at random
    let rand_val = client.rand(&[1], dtype)?;
    let first_idx_f = client.mul_scalar(&rand_val, n as f64)?;
    let first_idx_val: f64 = first_idx_f.item()?;
    let first_idx = (first_idx_val as usize).min(n - 1);

    let idx_tensor = Tensor::<R>::from_slice(&[first_idx as i64], &[1], device);
    let mut centroids = client.index_select(data, 0, &idx_tensor)?;

    for _ in 1..k {
        let dists = client.cdist(data, &centroids, DistanceMetric::SquaredEuclidean)?;
        let min_dists = client.min(&dists, &[1], false)?;
        // Weighted draw: first index whose cumulative weight reaches the threshold
        let cum_weights = client.cumsum(&min_dists, 0)?;
        let total = cum_weights.narrow(0, n - 1, 1)?;
        let rand_val = client.rand(&[1], dtype)?;
        let threshold = client.mul(&rand_val, &total)?;
        let ge_mask = client.ge(&cum_weights, &threshold.reshape(&[1])?)?;
        let next_idx = client.argmax(&ge_mask, 0, false)?.reshape(&[1])?;

        let next_centroid = client.index_select(data, 0, &next_idx)?;
        centroids = client.cat(&[&centroids, &next_centroid], 0)?;
    }

    Ok(centroids)
}

/// Random initialization: pick k distinct data points.
fn random_init<R, C>(client: &C, data: &Tensor<R>, k: usize) -> Result<Tensor<R>>
where
    R: Runtime,
    C: RandomOps<R> + SortingOps<R> + IndexingOps<R> + RuntimeClient<R>,
{
    let perm = client.randperm(data.shape()[0])?;
    let indices = perm.narrow(0, 0, k)?;
    client.index_select(data, 0, &indices)
}

/// Brute-force assignment. Returns (labels [n] I64, inertia scalar).
fn assign_brute_force<R, C>(
    client: &C,
    data: &Tensor<R>,
    centroids: &Tensor<R>,
) -> Result<(Tensor<R>, Tensor<R>)>
where
    R: Runtime,
    C: DistanceOps<R> + IndexingOps<R> + ReduceOps<R> + RuntimeClient<R>,
{
    let dists = client.cdist(data, centroids, DistanceMetric::SquaredEuclidean)?; // [n, k]
    let labels = client.argmin(&dists, 1, false)?; // [n] I64
    let min_dists = client.min(&dists, &[1], false)?; // [n]
    let inertia = client.sum(&min_dists, &[0], false)?;
    Ok((labels, inertia))
}

/// KD-tree assignment over host data [n, d]. Returns (labels [n] I64, inertia scalar).
fn assign_kd_tree<R: Runtime>(
    host_data: &[f64],
    d: usize,
    centroids: &Tensor<R>,
    dtype: DType,
) -> (Tensor<R>, Tensor<R>) {
    let device = centroids.device();
    let host_centroids = host_f64(centroids);
    let tree = CentroidTree::build(&host_centroids, d);

    let n = host_data.len() / d;
    let mut labels = Vec::with_capacity(n);
    let mut inertia = 0.0;
    for point in host_data.chunks(d) {
        let (idx, dist) = tree.nearest(point);
        labels.push(idx as i64);
        inertia += dist;
    }

    (
        Tensor::<R>::from_slice(&labels, &[n], device),
        Tensor::<R>::full_scalar(&[], dtype, inertia, device),
    )
}

/// Update step: each centroid becomes the mean of its points.
/// Empty clusters keep their previous centroid.
fn update_centroids<R, C>(
    client: &C,
    data: &Tensor<R>,
    centroids: &Tensor<R>,
    labels: &Tensor<R>,
) -> Result<Tensor<R>>
where
    R: Runtime,
    C: DistanceOps<R>
        + IndexingOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + TensorOps<R>
        + TypeConversionOps<R>
        + ConditionalOps<R>
        + CompareOps<R>
        + ShapeOps<R>
        + UtilityOps<R>
        + RuntimeClient<R>,
{
    let n = data.shape()[0];
    let k = centroids.shape()[0];
    let d = data.shape()[1];
    let dtype = data.dtype();
    let device = data.device();

    // Per-cluster sums via scatter over labels expanded to [n, d]
    let labels_expanded = labels.unsqueeze(1)?.broadcast_to(&[n, d])?;
    let dst = Tensor::<R>::zeros(&[k, d], dtype, device);
    let new_sums = client.scatter_reduce(
        &dst,
        0,
        &labels_expanded,
        data,
        numr::ops::ScatterReduceOp::Sum,
        false,
    )?;

    let counts = client.bincount(labels, None, k)?; // [k] I64
    let counts_f = client.cast(&counts, dtype)?;
    // Avoid division by zero: replace 0 counts with 1
    let zeros = Tensor::<R>::zeros(&[k], dtype, device);
    let ones_t = Tensor::<R>::ones(&[k], dtype, device);
    let is_zero = client.eq(&counts_f, &zeros)?;
    let safe_counts = client.where_cond(&is_zero, &ones_t, &counts_f)?;
    let safe_counts_expanded = safe_counts.unsqueeze(1)?.broadcast_to(&[k, d])?;
    let new_centroids = client.div(&new_sums, &safe_counts_expanded)?;

    let is_zero_expanded = is_zero.unsqueeze(1)?.broadcast_to(&[k, d])?;
    client.where_cond(&is_zero_expanded, centroids, &new_centroids)
}

/// Run a single K-Means trial (one initialization).
fn kmeans_single<R, C>(
    client: &C,
    data: &Tensor<R>,
    initial_centroids: &Tensor<R>,
    options: &KMeansOptions<R>,
) -> Result<KMeansResult<R>>
where
    R: Runtime,
    C: DistanceOps<R>
        + IndexingOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + TensorOps<R>
        + TypeConversionOps<R>
        + ConditionalOps<R>
        + CompareOps<R>
        + ShapeOps<R>
        + UtilityOps<R>
        + RuntimeClient<R>,
{
    let d = data.shape()[1];
    let host_data = options.use_kd_tree.then(|| host_f64(data));

    let mut centroids = initial_centroids.clone();
    let mut prev_inertia = f64::INFINITY;
    let mut labels = Tensor::<R>::zeros(&[data.shape()[0]], DType::I64, data.device());
    let mut inertia = Tensor::<R>::zeros(&[], data.dtype(), data.device());
    let mut n_iter = 0;

    for i in 0..options.max_iter {
        let (new_labels, new_inertia) = match &host_data {
            Some(host) => assign_kd_tree(host, d, &centroids, data.dtype()),
            None => assign_brute_force(client, data, &centroids)?,
        };
        centroids = update_centroids(client, data, &centroids, &new_labels)?;
        labels = new_labels;
        inertia = new_inertia;
        n_iter = i + 1;

        // Single scalar transfer per iteration
        let inertia_val: f64 = inertia.item()?;
        trace!("kmeans iteration {i}: inertia {inertia_val:.6e}");
        let delta = (prev_inertia - inertia_val).abs();
        if delta < options.tol {
            break;
        }
        prev_inertia = inertia_val;
    }

    Ok(KMeansResult {
        centroids,
        labels,
        inertia,
        n_iter,
    })
}

/// Generic K-Means implementation.
pub fn kmeans_impl<R, C>(
    client: &C,
    data: &Tensor<R>,
    options: &KMeansOptions<R>,
) -> Result<KMeansResult<R>>
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
    validate_cluster_dtype(data.dtype(), "kmeans")?;
    validate_data_2d(data.shape(), "kmeans")?;
    validate_n_clusters(options.n_clusters, data.shape()[0], "kmeans")?;
    if options.max_iter == 0 {
        return Err(Error::InvalidArgument {
            arg: "max_iter",
            reason: "kmeans: max_iter must be > 0".to_string(),
        });
    }

    let k = options.n_clusters;

    let n_init = match &options.init {
        KMeansInit::Points(_) => 1, // User-provided init, only run once
        _ => options.n_init,
    };

    let mut best_result: Option<KMeansResult<R>> = None;
    let mut best_inertia = f64::INFINITY;

    for run in 0..n_init {
        let initial_centroids = match &options.init {
            KMeansInit::KMeansPlusPlus => kmeans_plusplus_init(client, data, k)?,
            KMeansInit::Random => random_init(client, data, k)?,
            KMeansInit::Points(pts) => {
                if pts.shape() != [k, data.shape()[1]] {
                    return Err(Error::InvalidArgument {
                        arg: "init",
                        reason: format!(
                            "kmeans: initial points shape {:?} doesn't match [{}, {}]",
                            pts.shape(),
                            k,
                            data.shape()[1]
                        ),
                    });
                }
                pts.clone()
            }
        };

        let result = kmeans_single(client, data, &initial_centroids, options)?;
        let inertia_val: f64 = result.inertia.item()?;
        debug!(
            "kmeans run {run}: k={k}, {} iterations, inertia {inertia_val:.6e}",
            result.n_iter
        );

        if best_result.is_none() || inertia_val < best_inertia {
            best_inertia = inertia_val;
            best_result = Some(result);
        }
    }

    best_result.ok_or_else(|| Error::InvalidArgument {
        arg: "n_init",
        reason: "kmeans: n_init must be > 0".to_string(),
    })
}
