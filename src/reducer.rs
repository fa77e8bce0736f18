// src/reducer.rs

use crate::error::{ReduceError, TableRole};
use crate::linalg_backends::{BackendSVD, LinAlgBackendProvider};
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Parameters for the whitening reducer.
///
/// Missing fields fall back to [`ReducerConfig::default`] when deserialized,
/// so partial configs such as `{"canonicalize_signs": false}` are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerConfig {
    /// Relative floor for retained singular values. A component `i` is rejected
    /// with [`ReduceError::SingularValueUnderflow`] when `s_i <= rtol * s_0`.
    /// `None` uses `max(n_samples, n_features) * f64::EPSILON`.
    pub singular_value_rtol: Option<f64>,
    /// Flip each retained direction so its largest-magnitude loading is positive.
    pub canonicalize_signs: bool,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        ReducerConfig {
            singular_value_rtol: None,
            canonicalize_signs: true,
        }
    }
}

impl ReducerConfig {
    fn effective_rtol(&self, n_samples: usize, n_features: usize) -> f64 {
        self.singular_value_rtol
            .unwrap_or_else(|| n_samples.max(n_features) as f64 * f64::EPSILON)
    }
}

/// Runs whitened PCA reductions with a fixed configuration.
///
/// Holds no fitted state: every call to [`WhiteningReducer::reduce`] derives
/// its mean and projection from the training table it is given and drops them
/// before returning.
#[derive(Clone, Debug, Default)]
pub struct WhiteningReducer {
    config: ReducerConfig,
}

impl WhiteningReducer {
    pub fn new(config: ReducerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// See [`reduce`].
    pub fn reduce(
        &self,
        training: ArrayView2<f64>,
        test: ArrayView2<f64>,
        n_components: usize,
    ) -> Result<(Array2<f64>, Array2<f64>), ReduceError> {
        reduce_with_backend(
            &LinAlgBackendProvider::<f64>::new(),
            training,
            test,
            n_components,
            &self.config,
        )
    }
}

/// Reduces a training and a test table to `n_components` whitened principal
/// components fitted on the training table alone.
///
/// Both tables are centered with the column mean of `training`. The centered
/// training table is factored by SVD, the top `n_components` right singular
/// vectors form the projection, and each projected column is rescaled by
/// `sqrt(n_samples) / s_i` so the reduced training columns have unit
/// (population) variance.
///
/// * `training` - shape (n_samples, n_features), n_samples >= 1, n_features >= 1.
/// * `test` - shape (m_samples, n_features); `m_samples` may be zero.
/// * `n_components` - between 1 and `min(n_samples, n_features)` inclusive.
///
/// Returns `(reduced_training, reduced_test)` with shapes
/// `(n_samples, n_components)` and `(m_samples, n_components)`.
///
/// # Errors
///
/// - [`ReduceError::EmptyInput`] if `training` has no rows or no columns.
/// - [`ReduceError::ShapeMismatch`] if the column counts differ.
/// - [`ReduceError::InvalidRank`] if `n_components` is out of range.
/// - [`ReduceError::NonFiniteInput`] if either table holds NaN or infinity.
/// - [`ReduceError::SingularValueUnderflow`] if a retained singular value is
///   zero or negligible relative to the largest one (rank-deficient data).
/// - [`ReduceError::Factorization`] if the SVD backend fails.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use whitened_pca::reduce;
///
/// let training = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]];
/// let test = array![[2.0, 3.0]];
///
/// let (z_train, z_test) = reduce(training.view(), test.view(), 1).unwrap();
/// assert_eq!(z_train.dim(), (4, 1));
/// assert_eq!(z_test.dim(), (1, 1));
/// ```
pub fn reduce(
    training: ArrayView2<f64>,
    test: ArrayView2<f64>,
    n_components: usize,
) -> Result<(Array2<f64>, Array2<f64>), ReduceError> {
    reduce_with_config(training, test, n_components, &ReducerConfig::default())
}

/// [`reduce`] with explicit configuration.
pub fn reduce_with_config(
    training: ArrayView2<f64>,
    test: ArrayView2<f64>,
    n_components: usize,
    config: &ReducerConfig,
) -> Result<(Array2<f64>, Array2<f64>), ReduceError> {
    reduce_with_backend(
        &LinAlgBackendProvider::<f64>::new(),
        training,
        test,
        n_components,
        config,
    )
}

/// Mean and whitening projection derived from one training table.
/// Exists only inside a single reduction call.
pub(crate) struct WhiteningProjection {
    pub(crate) mean: Array1<f64>,
    /// Shape: (n_features, n_components)
    pub(crate) matrix: Array2<f64>,
}

impl WhiteningProjection {
    fn apply(&self, table: ArrayView2<f64>) -> Array2<f64> {
        center(table, &self.mean).dot(&self.matrix)
    }
}

pub(crate) fn reduce_with_backend<B: BackendSVD<f64>>(
    backend: &B,
    training: ArrayView2<f64>,
    test: ArrayView2<f64>,
    n_components: usize,
    config: &ReducerConfig,
) -> Result<(Array2<f64>, Array2<f64>), ReduceError> {
    let (n_samples, n_features) = training.dim();
    validate_inputs(training, test, n_components)?;

    info!(
        "Starting whitened PCA reduction. Training={}x{}, Test={}x{}, Components={}",
        n_samples,
        n_features,
        test.nrows(),
        test.ncols(),
        n_components
    );
    let start_time = Instant::now();

    let projection = fit_projection(backend, training, n_components, config)?;
    let reduced_training = projection.apply(training);
    let reduced_test = projection.apply(test);

    info!("Finished whitened PCA reduction in {:?}", start_time.elapsed());
    Ok((reduced_training, reduced_test))
}

fn validate_inputs(
    training: ArrayView2<f64>,
    test: ArrayView2<f64>,
    n_components: usize,
) -> Result<(), ReduceError> {
    let (n_samples, n_features) = training.dim();
    if n_samples == 0 || n_features == 0 {
        return Err(ReduceError::EmptyInput { rows: n_samples, cols: n_features });
    }
    if test.ncols() != n_features {
        return Err(ReduceError::ShapeMismatch {
            training_cols: n_features,
            test_cols: test.ncols(),
        });
    }
    let max_rank = n_samples.min(n_features);
    if n_components == 0 || n_components > max_rank {
        return Err(ReduceError::InvalidRank { requested: n_components, max: max_rank });
    }
    if let Some((row, col)) = first_non_finite(training) {
        return Err(ReduceError::NonFiniteInput { table: TableRole::Training, row, col });
    }
    if let Some((row, col)) = first_non_finite(test) {
        return Err(ReduceError::NonFiniteInput { table: TableRole::Test, row, col });
    }
    Ok(())
}

fn first_non_finite(table: ArrayView2<f64>) -> Option<(usize, usize)> {
    table
        .indexed_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(index, _)| index)
}

/// Column means of the training table. The only mean ever used for centering.
pub(crate) fn training_mean(training: ArrayView2<f64>) -> Result<Array1<f64>, ReduceError> {
    training.mean_axis(Axis(0)).ok_or(ReduceError::EmptyInput {
        rows: training.nrows(),
        cols: training.ncols(),
    })
}

pub(crate) fn center(table: ArrayView2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    &table - mean
}

/// Builds the (n_features x n_components) projection: top right singular
/// vectors of the centered training table, column `i` scaled by
/// `sqrt(n_samples) / s_i`.
pub(crate) fn fit_projection<B: BackendSVD<f64>>(
    backend: &B,
    training: ArrayView2<f64>,
    n_components: usize,
    config: &ReducerConfig,
) -> Result<WhiteningProjection, ReduceError> {
    let (n_samples, n_features) = training.dim();

    let mean = training_mean(training)?;
    let centered_training = center(training, &mean);
    debug!("Computed training column mean over {} features.", n_features);

    let svd = backend.svd_into(centered_training, false, true)?;
    let vt = svd
        .vt
        .ok_or_else(|| ReduceError::Factorization("SVD backend returned no right singular vectors.".into()))?;
    if svd.s.len() < n_components || vt.nrows() < n_components {
        return Err(ReduceError::Factorization(
            format!(
                "SVD backend returned {} singular values and {} right singular vectors; {} required.",
                svd.s.len(),
                vt.nrows(),
                n_components
            )
            .into(),
        ));
    }

    let singular_values = svd.s.slice(s![..n_components]).to_owned();
    debug!("Retained singular values: {:?}", singular_values);
    check_singular_values(
        &singular_values,
        svd.s[0],
        config.effective_rtol(n_samples, n_features),
    )?;

    let mut directions = vt.slice(s![..n_components, ..]).to_owned();
    if config.canonicalize_signs {
        canonicalize_row_signs(&mut directions);
    }

    let sqrt_n = (n_samples as f64).sqrt();
    let scale = singular_values.mapv(|sv| sqrt_n / sv);
    if let Some(component) = scale.iter().position(|factor| !factor.is_finite()) {
        warn!(
            "Whitening factor for component {} is not finite (singular value {:e}).",
            component, singular_values[component]
        );
        return Err(ReduceError::SingularValueUnderflow {
            component,
            singular_value: singular_values[component],
            floor: 0.0,
        });
    }

    let mut matrix = directions.reversed_axes();
    matrix *= &scale;

    Ok(WhiteningProjection { mean, matrix })
}

/// Rejects the first retained singular value that is non-finite or at or
/// below `rtol * largest`. A zero largest singular value rejects component 0.
fn check_singular_values(
    retained: &Array1<f64>,
    largest: f64,
    rtol: f64,
) -> Result<(), ReduceError> {
    let floor = rtol * largest;
    for (component, &singular_value) in retained.iter().enumerate() {
        if !singular_value.is_finite() || singular_value <= floor {
            warn!(
                "Singular value {:e} of component {} is at or below floor {:e}; refusing to whiten.",
                singular_value, component, floor
            );
            return Err(ReduceError::SingularValueUnderflow { component, singular_value, floor });
        }
    }
    Ok(())
}

/// Negates each row whose largest-magnitude entry is negative.
/// Ties resolve to the earliest index.
pub(crate) fn canonicalize_row_signs(directions: &mut Array2<f64>) {
    for (row_idx, mut row) in directions.rows_mut().into_iter().enumerate() {
        let mut pivot = 0.0_f64;
        for &value in row.iter() {
            if value.abs() > pivot.abs() {
                pivot = value;
            }
        }
        if pivot < 0.0 {
            row.mapv_inplace(|x| -x);
            debug!("Flipped sign of principal direction {}.", row_idx);
        }
    }
}
