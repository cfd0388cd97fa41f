//! Spectral embedding from Laplacian eigenvectors.

use crate::cluster::traits::spectral::{EigenSpectrum, LaplacianType};
use crate::cluster::validation::validate_n_clusters;
use log::debug;
use numr::error::Result;
use numr::ops::{TensorOps, TypeConversionOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use super::helpers::{ensure_f64, host_f64};

/// Build the [k, n] embedding from the first `n_clusters` eigenvector columns.
///
/// Row r holds eigenvector r, so column c is the embedded coordinate of
/// point c. For `NormalizedSymmetric` every column is rescaled to unit
/// Euclidean norm; a column whose norm has no finite reciprocal is left unchanged.
pub fn spectral_embedding_impl<R, C>(
    client: &C,
    spectrum: &EigenSpectrum<R>,
    n_clusters: usize,
    laplacian: LaplacianType,
) -> Result<Tensor<R>>
where
    R: Runtime,
    C: TensorOps<R> + TypeConversionOps<R> + RuntimeClient<R>,
{
    let m = spectrum.eigenvectors.shape()[1];
    validate_n_clusters(n_clusters, m, "spectral_embedding")?;

    let n = spectrum.eigenvectors.shape()[0];
    let k = n_clusters;
    let vectors = ensure_f64(client, &spectrum.eigenvectors)?;

    // [n, m] -> [n, k] -> [k, n]
    let embedding = vectors.narrow(1, 0, k)?.transpose(0, 1)?.contiguous();

    if laplacian != LaplacianType::NormalizedSymmetric {
        return Ok(embedding);
    }

    let host = host_f64(&embedding);
    let norms: Vec<f64> = (0..n)
        .map(|c| (0..k).map(|r| host[r * n + c] * host[r * n + c]).sum::<f64>().sqrt())
        .collect();
    let scales: Vec<Option<f64>> = norms
        .iter()
        .map(|&norm| Some(1.0 / norm).filter(|s| s.is_finite()))
        .collect();

    let skipped = scales.iter().filter(|s| s.is_none()).count();
    debug!("spectral_embedding: normalized {n} columns, skipped {skipped} with vanishing norm");

    let scales: Vec<f64> = scales.into_iter().map(|s| s.unwrap_or(1.0)).collect();

    let scales =
        Tensor::<R>::from_slice(&scales, &[1, n], embedding.device()).broadcast_to(&[k, n])?;
    client.mul(&embedding, &scales)
}
