//! Validation helpers for clustering algorithms.

use numr::dtype::DType;
use numr::error::{Error, Result};

/// Validate point set dtype (must be F32 or F64).
pub fn validate_cluster_dtype(dtype: DType, op: &'static str) -> Result<()> {
    match dtype {
        DType::F32 | DType::F64 => Ok(()),
        _ => Err(Error::UnsupportedDType { dtype, op }),
    }
}

/// Validate that data is 2D [n, d].
pub fn validate_data_2d(shape: &[usize], op: &'static str) -> Result<()> {
    if shape.len() != 2 {
        return Err(Error::InvalidArgument {
            arg: "data",
            reason: format!("{op} requires 2D data [n, d], got {}-D", shape.len()),
        });
    }
    if shape[0] == 0 {
        return Err(Error::InvalidArgument {
            arg: "data",
            reason: format!("{op} requires at least 1 data point"),
        });
    }
    Ok(())
}

/// Validate that an affinity matrix is square [n, n] with n > 0.
pub fn validate_affinity(shape: &[usize], op: &'static str) -> Result<()> {
    if shape.len() != 2 || shape[0] != shape[1] {
        return Err(Error::InvalidArgument {
            arg: "affinities",
            reason: format!("{op} requires a square affinity matrix [n, n], got {shape:?}"),
        });
    }
    if shape[0] == 0 {
        return Err(Error::InvalidArgument {
            arg: "affinities",
            reason: format!("{op} requires at least 1 node"),
        });
    }
    Ok(())
}

/// Validate n_clusters parameter.
pub fn validate_n_clusters(n_clusters: usize, n_points: usize, op: &'static str) -> Result<()> {
    if n_clusters == 0 {
        return Err(Error::InvalidArgument {
            arg: "n_clusters",
            reason: format!("{op} requires n_clusters > 0"),
        });
    }
    if n_clusters > n_points {
        return Err(Error::InvalidArgument {
            arg: "n_clusters",
            reason: format!("{op}: n_clusters={n_clusters} exceeds number of points {n_points}"),
        });
    }
    Ok(())
}

/// Validate the number of requested eigenpairs against the graph size.
pub fn validate_n_eigenpairs(n_eigenpairs: usize, n_nodes: usize, op: &'static str) -> Result<()> {
    if n_eigenpairs == 0 || n_eigenpairs > n_nodes {
        return Err(Error::InvalidArgument {
            arg: "n_eigenpairs",
            reason: format!("{op}: n_eigenpairs={n_eigenpairs} must be in [1, {n_nodes}]"),
        });
    }
    Ok(())
}

/// Validate labels tensor is 1D I64.
pub fn validate_labels(shape: &[usize], dtype: DType, op: &'static str) -> Result<()> {
    if shape.len() != 1 {
        return Err(Error::InvalidArgument {
            arg: "labels",
            reason: format!("{op} requires 1D labels, got {}-D", shape.len()),
        });
    }
    if dtype != DType::I64 {
        return Err(Error::InvalidArgument {
            arg: "labels",
            reason: format!("{op} requires I64 labels, got {dtype:?}"),
        });
    }
    Ok(())
}
