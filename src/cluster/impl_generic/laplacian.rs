//! Graph Laplacian construction from a dense affinity matrix.
//!
//! | Variant               | Operator                      | Eigenproblem    |
//! |-----------------------|-------------------------------|-----------------|
//! | Unnormalized          | L = D - W                     | L x = λ x       |
//! | NormalizedSymmetric   | L_sym = I - D^{-½} W D^{-½}   | L_sym x = λ x   |
//! | NormalizedRandomWalk  | pencil (L, D)                 | L x = λ D x     |
//!
//! The symmetric variant is formed as `S L S` with `S = diag(s)`, where
//! `s_i = d_i^{-½}` for connected nodes and `s_i = 0` for isolated ones.
//! For every node with positive degree this equals `I - D^{-½} W D^{-½}`;
//! an isolated node gets an all-zero row and column, i.e. its own component
//! with eigenvalue 0.

use crate::cluster::traits::spectral::{GraphLaplacian, LaplacianType};
use crate::cluster::validation::{validate_affinity, validate_cluster_dtype};
use log::{debug, warn};
use numr::error::Result;
use numr::ops::{
    CompareOps, ConditionalOps, LinalgOps, ReduceOps, ScalarOps, TensorOps, TypeConversionOps,
    UnaryOps,
};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use super::helpers::{ensure_f64, host_f64};

/// Build the requested Laplacian variant from an affinity matrix [n, n].
///
/// The affinity is read once and not retained. The result is always F64.
pub fn graph_laplacian_impl<R, C>(
    client: &C,
    affinities: &Tensor<R>,
    laplacian: LaplacianType,
) -> Result<GraphLaplacian<R>>
where
    R: Runtime,
    C: TensorOps<R>
        + ScalarOps<R>
        + ReduceOps<R>
        + UnaryOps<R>
        + CompareOps<R>
        + ConditionalOps<R>
        + LinalgOps<R>
        + TypeConversionOps<R>
        + RuntimeClient<R>,
{
    validate_cluster_dtype(affinities.dtype(), "graph_laplacian")?;
    validate_affinity(affinities.shape(), "graph_laplacian")?;

    let n = affinities.shape()[0];
    let affinities = ensure_f64(client, affinities)?;

    // Degree: d_i = sum_j W_ij
    let degrees = client.sum(&affinities, &[1], false)?; // [n]

    let isolated = host_f64(&degrees).iter().filter(|&&d| d <= 0.0).count();
    if isolated > 0 && laplacian != LaplacianType::Unnormalized {
        warn!(
            "graph_laplacian: {isolated} of {n} nodes have zero degree; \
             treating them as singleton components"
        );
    }

    // L = D - W
    let d_diag = LinalgOps::diagflat(client, &degrees)?; // [n, n]
    let combinatorial = client.sub(&d_diag, &affinities)?;

    debug!("graph_laplacian: {laplacian:?} over {n} nodes");

    match laplacian {
        LaplacianType::Unnormalized => Ok(GraphLaplacian::Standard {
            matrix: combinatorial,
            degrees,
            kind: laplacian,
        }),
        LaplacianType::NormalizedSymmetric => {
            let s = degree_inv_sqrt(client, &degrees, 0.0)?;
            let matrix = scale_symmetric(client, &combinatorial, &s)?;
            Ok(GraphLaplacian::Standard {
                matrix,
                degrees,
                kind: laplacian,
            })
        }
        LaplacianType::NormalizedRandomWalk => Ok(GraphLaplacian::Pencil {
            laplacian: combinatorial,
            degrees,
        }),
    }
}

/// Compute `d^{-1/2}` elementwise, substituting `fill` where `d <= 0`.
pub fn degree_inv_sqrt<R, C>(client: &C, degrees: &Tensor<R>, fill: f64) -> Result<Tensor<R>>
where
    R: Runtime,
    C: ScalarOps<R> + UnaryOps<R> + CompareOps<R> + ConditionalOps<R> + RuntimeClient<R>,
{
    let n = degrees.shape()[0];
    let dtype = degrees.dtype();
    let device = degrees.device();

    let inv_sqrt = client.pow_scalar(degrees, -0.5)?;
    let zero = Tensor::<R>::zeros(&[n], dtype, device);
    let fill = Tensor::<R>::full_scalar(&[n], dtype, fill, device);
    let not_positive = client.le(degrees, &zero)?;
    client.where_cond(&not_positive, &fill, &inv_sqrt)
}

/// Compute `diag(s) M diag(s)` for a square matrix `M` [n, n] and `s` [n].
pub fn scale_symmetric<R, C>(client: &C, matrix: &Tensor<R>, s: &Tensor<R>) -> Result<Tensor<R>>
where
    R: Runtime,
    C: TensorOps<R> + RuntimeClient<R>,
{
    let n = s.shape()[0];
    let s_row = s.unsqueeze(1)?.broadcast_to(&[n, n])?;
    let s_col = s.unsqueeze(0)?.broadcast_to(&[n, n])?;
    client.mul(&client.mul(&s_row, matrix)?, &s_col)
}
