//! Shared helpers for clustering implementations.

use numr::dtype::DType;
use numr::error::Result;
use numr::ops::TypeConversionOps;
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Return `t` as an F64 tensor, casting only when needed.
///
/// The spectral stages run in F64 so that host-side steps (eigenpair
/// ordering, eigengap scan, Gram-Schmidt) read a single element type.
pub fn ensure_f64<R, C>(client: &C, t: &Tensor<R>) -> Result<Tensor<R>>
where
    R: Runtime,
    C: TypeConversionOps<R> + RuntimeClient<R>,
{
    if t.dtype() == DType::F64 {
        Ok(t.clone())
    } else {
        client.cast(t, DType::F64)
    }
}

/// Copy a floating-point tensor to the host as f64 values.
pub fn host_f64<R: Runtime>(t: &Tensor<R>) -> Vec<f64> {
    let t = t.contiguous();
    match t.dtype() {
        DType::F32 => t.to_vec::<f32>().into_iter().map(f64::from).collect(),
        _ => t.to_vec::<f64>(),
    }
}

/// Machine epsilon of the scalar type behind `dtype`.
pub fn machine_epsilon(dtype: DType) -> f64 {
    match dtype {
        DType::F32 => f64::from(f32::EPSILON),
        _ => f64::EPSILON,
    }
}

/// Indices that sort `values` ascending; equal values keep their order.
pub fn ascending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}
