//! Projection of embedding vectors into three dimensions for display.
//!
//! Reducers are fitted on exactly the batch they receive and keep no state between calls. The
//! output has one point per input vector, in input order.

use super::types::ReductionError;
use nalgebra::{DMatrix, SVD};

/// Number of projected components.
pub const COMPONENTS: usize = 3;

/// Strategy that maps `N` vectors of dimension `D` to `N` points in 3D.
pub trait DimensionReducer: Send + Sync {
    /// Project every vector, preserving order.
    fn reduce(&self, vectors: &[Vec<f32>]) -> Result<Vec<[f32; 3]>, ReductionError>;
}

/// Confirm that `vectors` form a rectangular matrix and return its column count.
///
/// An empty batch has dimension zero.
pub fn validate_matrix(vectors: &[Vec<f32>]) -> Result<usize, ReductionError> {
    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let expected = first.len();
    match vectors
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != expected)
    {
        Some((index, vector)) => Err(ReductionError::InconsistentDimension {
            index,
            expected,
            actual: vector.len(),
        }),
        None => Ok(expected),
    }
}

/// Principal component analysis via singular value decomposition.
///
/// Columns are mean-centered, then each row is projected onto the three right-singular vectors
/// with the largest singular values. Component signs are fixed so the largest absolute loading
/// is positive. When `D < 3` the missing components are zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcaReducer;

impl PcaReducer {
    /// Construct a new reducer.
    pub const fn new() -> Self {
        Self
    }
}

impl DimensionReducer for PcaReducer {
    fn reduce(&self, vectors: &[Vec<f32>]) -> Result<Vec<[f32; 3]>, ReductionError> {
        let samples = vectors.len();
        if samples < COMPONENTS {
            return Err(ReductionError::InsufficientData {
                required: COMPONENTS,
                actual: samples,
            });
        }
        let dimension = validate_matrix(vectors)?;
        if dimension == 0 {
            return Ok(vec![[0.0; 3]; samples]);
        }

        let mut matrix = DMatrix::<f64>::from_fn(samples, dimension, |row, column| {
            f64::from(vectors[row][column])
        });
        for mut column in matrix.column_iter_mut() {
            let mean = column.mean();
            column.add_scalar_mut(-mean);
        }

        let svd = SVD::try_new(matrix.clone(), false, true, f64::EPSILON, 0)
            .ok_or(ReductionError::DecompositionFailed)?;
        let v_t = svd.v_t.ok_or(ReductionError::DecompositionFailed)?;

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|left, right| {
            svd.singular_values[*right].total_cmp(&svd.singular_values[*left])
        });

        let mut points = vec![[0.0_f32; 3]; samples];
        for (component, &row) in order.iter().take(COMPONENTS).enumerate() {
            let mut axis = v_t.row(row).transpose();
            let dominant = axis
                .iter()
                .copied()
                .max_by(|left, right| left.abs().total_cmp(&right.abs()))
                .unwrap_or(0.0);
            if dominant < 0.0 {
                axis.neg_mut();
            }
            let projected = &matrix * axis;
            for (point, value) in points.iter_mut().zip(projected.iter()) {
                point[component] = *value as f32;
            }
        }

        tracing::debug!(samples, dimension, "Projected embeddings to 3D");
        Ok(points)
    }
}
