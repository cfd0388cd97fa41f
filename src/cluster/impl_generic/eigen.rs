//! Smallest eigenpairs of a graph Laplacian.
//!
//! Standard Laplacians are decomposed directly. The random-walk pencil
//! `L x = λ D x` is reduced with the Cholesky factor of `D`, which for a
//! diagonal `D` is `D^{½}`: solve `D^{-½} L D^{-½} y = λ y`, then map back
//! with `x = D^{-½} y`. The recovered eigenvectors are `D`-orthonormal.
//! Isolated nodes use a zero forward scale and a unit back scale, so each
//! one yields eigenvalue 0 with its indicator vector.
//!
//! Two strategies share the post-processing contract (ascending eigenvalues,
//! negatives clamped to 0, eigenvector columns paired by index):
//! - dense: full symmetric decomposition, O(n^3);
//! - subspace: block subspace iteration on the shifted operator
//!   `σI - M` with Rayleigh-Ritz extraction, for large graphs where only a
//!   few eigenpairs are needed.

use crate::cluster::traits::spectral::{EigenSolver, EigenSpectrum, GraphLaplacian, SubspaceOptions};
use crate::cluster::validation::validate_n_eigenpairs;
use log::{debug, trace, warn};
use numr::algorithm::linalg::LinearAlgebraAlgorithms;
use numr::dtype::DType;
use numr::error::{Error, Result};
use numr::ops::{
    CompareOps, ConditionalOps, IndexingOps, LinalgOps, MatmulOps, ReduceOps, ScalarOps,
    TensorOps, TypeConversionOps, UnaryOps,
};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use super::helpers::{ascending_order, ensure_f64};
use super::laplacian::{degree_inv_sqrt, scale_symmetric};

/// Compute the `n_eigenpairs` smallest eigenpairs of `laplacian`.
pub fn laplacian_eigenpairs_impl<R, C>(
    client: &C,
    laplacian: &GraphLaplacian<R>,
    n_eigenpairs: usize,
    solver: &EigenSolver,
) -> Result<EigenSpectrum<R>>
where
    R: Runtime,
    C: LinearAlgebraAlgorithms<R>
        + TensorOps<R>
        + ScalarOps<R>
        + UnaryOps<R>
        + ReduceOps<R>
        + CompareOps<R>
        + ConditionalOps<R>
        + IndexingOps<R>
        + LinalgOps<R>
        + MatmulOps<R>
        + TypeConversionOps<R>
        + RuntimeClient<R>,
{
    let n = laplacian.num_nodes();
    validate_n_eigenpairs(n_eigenpairs, n, "laplacian_eigenpairs")?;

    // Reduce to a symmetric operator; keep the back-transform for pencils.
    let (operator, back_scale) = match laplacian {
        GraphLaplacian::Standard { matrix, .. } => (ensure_f64(client, matrix)?, None),
        GraphLaplacian::Pencil { laplacian, degrees } => {
            let laplacian = ensure_f64(client, laplacian)?;
            let degrees = ensure_f64(client, degrees)?;
            let forward = degree_inv_sqrt(client, &degrees, 0.0)?;
            let back = degree_inv_sqrt(client, &degrees, 1.0)?;
            (scale_symmetric(client, &laplacian, &forward)?, Some(back))
        }
    };

    let subspace = match solver {
        EigenSolver::Dense => None,
        EigenSolver::Subspace(options) => Some(options),
        EigenSolver::Auto {
            dense_max_nodes,
            subspace,
        } => (n > *dense_max_nodes).then_some(subspace),
    };

    let (values, vectors) = match subspace {
        None => {
            debug!("laplacian_eigenpairs: dense solve, n={n}, m={n_eigenpairs}");
            dense_eigenpairs(client, &operator, n_eigenpairs)?
        }
        Some(options) => {
            debug!("laplacian_eigenpairs: subspace solve, n={n}, m={n_eigenpairs}");
            subspace_eigenpairs(client, &operator, n_eigenpairs, options)?
        }
    };

    let eigenvectors = match back_scale {
        Some(back) => {
            let back = back.unsqueeze(1)?.broadcast_to(&[n, n_eigenpairs])?;
            client.mul(&back, &vectors)?
        }
        None => vectors,
    };

    let clamped = clamp_eigenvalues(&values);
    trace!("laplacian_eigenpairs: eigenvalues {clamped:?}");

    Ok(EigenSpectrum {
        eigenvalues: Tensor::<R>::from_slice(&clamped, &[n_eigenpairs], operator.device()),
        eigenvectors,
    })
}

/// Replace negative eigenvalues (round-off on a PSD operator) with 0.
pub fn clamp_eigenvalues(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v < 0.0 { 0.0 } else { v })
        .collect()
}

/// Dense decomposition; returns the `m` smallest eigenvalues ascending and
/// the matching eigenvector columns [n, m].
fn dense_eigenpairs<R, C>(
    client: &C,
    operator: &Tensor<R>,
    m: usize,
) -> Result<(Vec<f64>, Tensor<R>)>
where
    R: Runtime,
    C: LinearAlgebraAlgorithms<R> + IndexingOps<R> + RuntimeClient<R>,
{
    let eig = client.eig_decompose_symmetric(operator)?;
    let all_values: Vec<f64> = eig.eigenvalues.contiguous().to_vec();
    select_smallest(client, &all_values, &eig.eigenvectors, m)
}

/// Pick the `m` smallest eigenvalues and their columns, in ascending order.
///
/// Decomposition routines are free to return eigenpairs in any order.
fn select_smallest<R, C>(
    client: &C,
    values: &[f64],
    vectors: &Tensor<R>,
    m: usize,
) -> Result<(Vec<f64>, Tensor<R>)>
where
    R: Runtime,
    C: IndexingOps<R> + RuntimeClient<R>,
{
    let order = ascending_order(values);
    let selected: Vec<i64> = order.iter().take(m).map(|&i| i as i64).collect();
    let idx = Tensor::<R>::from_slice(&selected, &[m], vectors.device());
    let columns = client.index_select(vectors, 1, &idx)?.contiguous();
    let values = order.iter().take(m).map(|&i| values[i]).collect();
    Ok((values, columns))
}

/// Block subspace iteration for the `m` smallest eigenpairs of a symmetric
/// operator `M` [n, n].
///
/// Iterates `X <- orth((σI - M) X)` with `σ` a Gershgorin bound on the
/// spectral radius, so the wanted eigenpairs of `M` become the dominant
/// ones, and extracts Ritz pairs of `M` each sweep. Stops once every wanted
/// residual `||M x - θ x||` is below `tol * σ`.
fn subspace_eigenpairs<R, C>(
    client: &C,
    operator: &Tensor<R>,
    m: usize,
    options: &SubspaceOptions,
) -> Result<(Vec<f64>, Tensor<R>)>
where
    R: Runtime,
    C: LinearAlgebraAlgorithms<R>
        + TensorOps<R>
        + ScalarOps<R>
        + ReduceOps<R>
        + IndexingOps<R>
        + LinalgOps<R>
        + MatmulOps<R>
        + RuntimeClient<R>,
{
    if options.max_iter == 0 {
        return Err(Error::InvalidArgument {
            arg: "max_iter",
            reason: "laplacian_eigenpairs: subspace max_iter must be > 0".to_string(),
        });
    }
    if !(options.tol.is_finite() && options.tol > 0.0) {
        return Err(Error::InvalidArgument {
            arg: "tol",
            reason: format!(
                "laplacian_eigenpairs: subspace tol must be finite and > 0, got {}",
                options.tol
            ),
        });
    }

    let n = operator.shape()[0];
    let device = operator.device();
    let p = options.block_size.unwrap_or(2 * m).clamp(m, n);

    let host: Vec<f64> = operator.contiguous().to_vec();
    let sigma = host
        .chunks(n)
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max);

    if sigma == 0.0 {
        // Zero operator: every vector is an eigenvector with eigenvalue 0.
        let mut basis = vec![0.0; n * m];
        for j in 0..m {
            basis[j * m + j] = 1.0;
        }
        return Ok((vec![0.0; m], Tensor::<R>::from_slice(&basis, &[n, m], device)));
    }

    let eye = LinalgOps::diagflat(client, &Tensor::<R>::ones(&[n], DType::F64, device))?;
    let shifted = client.sub(&client.mul_scalar(&eye, sigma)?, operator)?;

    let mut basis = initial_basis(n, p);
    orthonormalize_columns(&mut basis, n, p);
    let mut x = Tensor::<R>::from_slice(&basis, &[n, p], device);
    let mut ritz_values = vec![0.0; p];

    for iter in 0..options.max_iter {
        let y = client.matmul(&shifted, &x)?;
        let mut y_host: Vec<f64> = y.contiguous().to_vec();
        orthonormalize_columns(&mut y_host, n, p);
        let q = Tensor::<R>::from_slice(&y_host, &[n, p], device);

        // Rayleigh-Ritz: H = Q^T M Q, symmetrized against round-off.
        let mq = client.matmul(operator, &q)?;
        let qt = q.transpose(0, 1)?.contiguous();
        let h = client.matmul(&qt, &mq)?;
        let ht = h.transpose(0, 1)?.contiguous();
        let h = client.mul_scalar(&client.add(&h, &ht)?, 0.5)?;

        let eig = client.eig_decompose_symmetric(&h)?;
        let theta: Vec<f64> = eig.eigenvalues.contiguous().to_vec();
        let (sorted, w) = select_smallest(client, &theta, &eig.eigenvectors, p)?;
        ritz_values = sorted;
        x = client.matmul(&q, &w)?;

        // Residual norms of the wanted Ritz pairs.
        let mx = client.matmul(operator, &x)?;
        let theta_row =
            Tensor::<R>::from_slice(&ritz_values, &[1, p], device).broadcast_to(&[n, p])?;
        let r = client.sub(&mx, &client.mul(&x, &theta_row)?)?;
        let r_sq = client.sum(&client.mul(&r, &r)?, &[0], false)?;
        let residuals: Vec<f64> = r_sq.contiguous().to_vec();

        let worst = residuals
            .iter()
            .take(m)
            .map(|r| r.sqrt())
            .fold(0.0, f64::max);
        trace!("subspace iteration {iter}: worst residual {worst:.3e}");

        if worst <= options.tol * sigma {
            debug!("subspace iteration converged after {} sweeps", iter + 1);
            let vectors = x.narrow(1, 0, m)?.contiguous();
            return Ok((ritz_values[..m].to_vec(), vectors));
        }
    }

    warn!(
        "subspace iteration did not converge in {} sweeps; returning current Ritz pairs",
        options.max_iter
    );
    let vectors = x.narrow(1, 0, m)?.contiguous();
    Ok((ritz_values[..m].to_vec(), vectors))
}

/// Multiplicative hash constants: Knuth's 32-bit golden-ratio multiplier for
/// rows and the MurmurHash2 mixing prime's low half for columns, so row and
/// column indices scatter independently.
const ROW_HASH: u64 = 2_654_435_761;
const COL_HASH: u64 = 40_503;
/// Prime modulus folding the hash into [0, 1).
const HASH_MODULUS: u64 = 10_007;

/// Deterministic, well-spread starting block [n, p] in row-major order.
fn initial_basis(n: usize, p: usize) -> Vec<f64> {
    let mut basis = vec![0.0; n * p];
    for i in 0..n {
        for j in 0..p {
            let h = (i as u64 + 1).wrapping_mul(ROW_HASH) ^ (j as u64 + 1).wrapping_mul(COL_HASH);
            basis[i * p + j] = (h % HASH_MODULUS) as f64 / HASH_MODULUS as f64 - 0.5;
        }
    }
    basis
}

/// Orthonormalize the columns of a row-major [n, p] block in place.
///
/// Modified Gram-Schmidt, two passes per column. A column that collapses
/// is replaced by the first unit vector that survives orthogonalization.
fn orthonormalize_columns(a: &mut [f64], n: usize, p: usize) {
    let column_norm = |a: &[f64], j: usize| -> f64 {
        (0..n).map(|i| a[i * p + j] * a[i * p + j]).sum::<f64>().sqrt()
    };
    let project_out = |a: &mut [f64], j: usize| {
        for _ in 0..2 {
            for k in 0..j {
                let dot: f64 = (0..n).map(|i| a[i * p + j] * a[i * p + k]).sum();
                for i in 0..n {
                    a[i * p + j] -= dot * a[i * p + k];
                }
            }
        }
    };

    for j in 0..p {
        let before = column_norm(a, j);
        project_out(a, j);
        let mut norm = column_norm(a, j);

        let mut candidate = 0;
        while norm <= 1e-10 * before.max(1.0) && candidate < n {
            for i in 0..n {
                a[i * p + j] = if i == candidate { 1.0 } else { 0.0 };
            }
            project_out(a, j);
            norm = column_norm(a, j);
            candidate += 1;
        }

        for i in 0..n {
            a[i * p + j] /= norm;
        }
    }
}
