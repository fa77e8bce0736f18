// src/linalg_backends.rs

use ndarray::{Array1, Array2};
use std::error::Error;
use std::marker::PhantomData;

/// A thread-safe boxed error, so backend failures can cross thread boundaries.
pub type ThreadSafeStdError = Box<dyn Error + Send + Sync + 'static>;

/// Output of a Singular Value Decomposition.
///
/// Singular values in `s` are non-negative and sorted in descending order.
/// `vt` holds the right singular vectors as rows.
#[derive(Debug)]
pub struct SVDOutput<F: 'static> {
    pub u: Option<Array2<F>>,
    pub s: Array1<F>,
    pub vt: Option<Array2<F>>,
}

/// Trait for Singular Value Decomposition.
pub trait BackendSVD<F: 'static + Copy + Send + Sync> {
    fn svd_into(
        &self,
        matrix: Array2<F>,
        compute_u: bool,
        compute_v: bool,
    ) -> Result<SVDOutput<F>, ThreadSafeStdError>;
}

/// SVD output for a matrix with a zero dimension. LAPACK rejects these, so
/// backends short-circuit with correctly shaped zero arrays.
fn empty_svd_output(nrows: usize, ncols: usize, compute_u: bool, compute_v: bool) -> SVDOutput<f64> {
    let k_dim = nrows.min(ncols);
    SVDOutput {
        u: if compute_u { Some(Array2::zeros((nrows, k_dim))) } else { None },
        s: Array1::zeros(k_dim),
        vt: if compute_v { Some(Array2::zeros((k_dim, ncols))) } else { None },
    }
}

// --- ndarray-linalg (LAPACK) backend ---
use ndarray_linalg::SVDInto as NdLinalgSVDInto;

#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

fn to_dyn_error<E: Error + Send + Sync + 'static>(e: E) -> ThreadSafeStdError {
    Box::new(e)
}

impl BackendSVD<f64> for NdarrayLinAlgBackend {
    fn svd_into(
        &self,
        matrix: Array2<f64>,
        compute_u: bool,
        compute_v: bool,
    ) -> Result<SVDOutput<f64>, ThreadSafeStdError> {
        let (nrows, ncols) = matrix.dim();
        if matrix.is_empty() {
            return Ok(empty_svd_output(nrows, ncols, compute_u, compute_v));
        }
        let (u, s, vt) = matrix.svd_into(compute_u, compute_v).map_err(to_dyn_error)?;
        Ok(SVDOutput { u, s, vt })
    }
}

// --- faer backend ---
#[cfg(feature = "backend_faer")]
mod faer_specific_code {
    use super::{empty_svd_output, BackendSVD, SVDOutput, ThreadSafeStdError};
    use bytemuck::Pod;
    use faer::linalg::solvers::Svd as FaerSolverSvd;
    use faer::traits::num_traits::Zero;
    use faer::traits::ComplexField;
    use faer::MatRef;
    use ndarray::{Array1, Array2, ShapeBuilder};

    fn to_dyn_error_faer(msg: String) -> ThreadSafeStdError {
        Box::new(std::io::Error::new(std::io::ErrorKind::Other, msg))
    }

    #[derive(Debug, Default, Copy, Clone)]
    pub struct FaerLinAlgBackend;

    pub(super) fn faer_mat_to_ndarray<F: ComplexField + Copy + Pod + Zero>(
        faer_mat: MatRef<'_, F>,
    ) -> Result<Array2<F>, ThreadSafeStdError> {
        let nrows = faer_mat.nrows();
        let ncols = faer_mat.ncols();
        let mut data_vec = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                data_vec.push(unsafe { *faer_mat.get_unchecked(i, j) });
            }
        }
        Array2::from_shape_vec((nrows, ncols).f(), data_vec).map_err(|e| {
            to_dyn_error_faer(format!(
                "Failed to build ndarray matrix ({}x{}) from faer output: {}",
                nrows, ncols, e
            ))
        })
    }

    fn faer_col_to_ndarray_vec<F: ComplexField + Copy + Pod + Zero>(faer_col: faer::ColRef<'_, F>) -> Array1<F> {
        Array1::from_iter((0..faer_col.nrows()).map(|i| unsafe { *faer_col.get_unchecked(i) }))
    }

    impl BackendSVD<f64> for FaerLinAlgBackend {
        fn svd_into(
            &self,
            matrix: Array2<f64>,
            compute_u: bool,
            compute_v: bool,
        ) -> Result<SVDOutput<f64>, ThreadSafeStdError> {
            let (nrows, ncols) = matrix.dim();
            if matrix.is_empty() {
                return Ok(empty_svd_output(nrows, ncols, compute_u, compute_v));
            }
            // faer needs a contiguous slice; centered tables come out of ndarray
            // arithmetic in standard layout, anything else is copied once.
            let matrix = if matrix.is_standard_layout() {
                matrix
            } else {
                matrix.as_standard_layout().into_owned()
            };
            let slice = matrix.as_slice_memory_order().ok_or_else(|| {
                to_dyn_error_faer(format!(
                    "Failed to get slice from row-major ndarray matrix ({}x{})",
                    nrows, ncols
                ))
            })?;
            let faer_mat_view = faer::MatRef::from_row_major_slice(slice, nrows, ncols);

            let svd_solver_instance = FaerSolverSvd::new_thin(faer_mat_view)
                .map_err(|e| to_dyn_error_faer(format!("Faer SVD computation failed: {:?}", e)))?;

            let s_ndarray = faer_col_to_ndarray_vec(svd_solver_instance.S().column_vector());

            let u_ndarray = if compute_u {
                Some(faer_mat_to_ndarray(svd_solver_instance.U().as_ref())?)
            } else {
                None
            };

            let vt_ndarray = if compute_v {
                let v_ndarray = faer_mat_to_ndarray(svd_solver_instance.V().as_ref())?;
                Some(v_ndarray.t().into_owned())
            } else {
                None
            };

            Ok(SVDOutput { u: u_ndarray, s: s_ndarray, vt: vt_ndarray })
        }
    }
}

#[cfg(feature = "backend_faer")]
pub use faer_specific_code::FaerLinAlgBackend;

// --- Compile-time dispatch ---

/// Dispatches to the linear algebra backend selected by Cargo features:
/// faer when `backend_faer` is enabled, ndarray-linalg otherwise.
#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider<F: 'static + Copy + Send + Sync> {
    _phantom: PhantomData<F>,
}

impl<F: 'static + Copy + Send + Sync> LinAlgBackendProvider<F> {
    pub fn new() -> Self {
        Self { _phantom: PhantomData }
    }
}

impl BackendSVD<f64> for LinAlgBackendProvider<f64> {
    fn svd_into(
        &self,
        matrix: Array2<f64>,
        compute_u: bool,
        compute_v: bool,
    ) -> Result<SVDOutput<f64>, ThreadSafeStdError> {
        #[cfg(feature = "backend_faer")]
        {
            faer_specific_code::FaerLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            NdarrayLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn singular_values_are_descending() {
        let matrix = array![[3.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]];
        let out = LinAlgBackendProvider::<f64>::new()
            .svd_into(matrix, false, true)
            .unwrap();
        assert_eq!(out.s.len(), 3);
        assert_abs_diff_eq!(out.s[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.s[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.s[2], 1.0, epsilon = 1e-12);
        assert!(out.u.is_none());
        let vt = out.vt.unwrap();
        assert_eq!(vt.ncols(), 3);
        assert_abs_diff_eq!(vt[[0, 1]].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_matrix_short_circuits() {
        let out = LinAlgBackendProvider::<f64>::new()
            .svd_into(Array2::<f64>::zeros((0, 4)), true, true)
            .unwrap();
        assert_eq!(out.s.len(), 0);
        assert_eq!(out.u.unwrap().dim(), (0, 0));
        assert_eq!(out.vt.unwrap().dim(), (0, 4));
    }
    #[cfg(feature = "backend_faer")]
    #[test]
    fn faer_factors_reconstruct_the_input() {
        let matrix = array![[2.0, -1.0, 0.5], [0.0, 3.0, 1.0], [4.0, 1.0, -2.0], [1.0, 1.0, 1.0]];
        let out = FaerLinAlgBackend.svd_into(matrix.clone(), true, true).unwrap();
        let u = out.u.unwrap();
        let vt = out.vt.unwrap();
        assert_eq!(u.dim(), (4, 3));
        assert_eq!(vt.dim(), (3, 3));
        for w in out.s.windows(2) {
            assert!(w[0] >= w[1]);
        }
        let rebuilt = (&u * &out.s).dot(&vt);
        for (a, b) in rebuilt.iter().zip(matrix.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[cfg(feature = "backend_faer")]
    #[test]
    fn faer_matrix_conversion_keeps_entries_in_place() {
        let faer_mat = faer::Mat::<f64>::from_fn(2, 3, |i, j| (10 * i + j) as f64);
        let converted = faer_specific_code::faer_mat_to_ndarray(faer_mat.as_ref()).unwrap();
        assert_eq!(converted, array![[0.0, 1.0, 2.0], [10.0, 11.0, 12.0]]);
    }
}
