//! Eigengap estimate of the number of clusters.

use log::debug;

/// Estimate the cluster count from ascending eigenvalues `e_0..e_{m-1}`.
///
/// Returns `i + 1` for the first index `i` of the largest gap
/// `e_{i+1} - e_i`. A numerically flat spectrum (range below `epsilon`)
/// carries no gap signal, and `max_clusters` is returned unchanged.
pub fn estimate_cluster_count(eigenvalues: &[f64], max_clusters: usize, epsilon: f64) -> usize {
    if eigenvalues.len() < 2 {
        return max_clusters;
    }

    let (min_val, max_val) = eigenvalues
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if max_val - min_val < epsilon {
        debug!("estimate_cluster_count: flat spectrum, keeping bound {max_clusters}");
        return max_clusters;
    }

    let mut max_gap = f64::NEG_INFINITY;
    let mut max_ind = 0;
    for (i, pair) in eigenvalues.windows(2).enumerate() {
        let gap = pair[1] - pair[0];
        if gap > max_gap {
            max_gap = gap;
            max_ind = i;
        }
    }

    debug!("estimate_cluster_count: largest gap {max_gap:.6e} after index {max_ind}");
    max_ind + 1
}
