//! Back-projection with artifact components removed.
//!
//! A pure transformation: the flagged rows are zeroed in a copy of the
//! component array and the copy is projected through the mixing matrix.
//! The caller's `components` are never mutated, so one decomposition can be
//! reconstructed with several different index sets.

use ndarray::Array2;

use crate::error::{DenoiseError, Result};

/// Zero the rows of `components` listed in `artifact_indices` and project
/// the remainder back into channel space: `mixing · components_zeroed`.
///
/// Output shape is always `[C, T]` (channels from `mixing`, time from
/// `components`).  An empty index set reproduces the decomposed signal up
/// to floating-point round-trip error.
///
/// # Errors
///
/// `InvalidInput` when `mixing` is not square, its size does not match the
/// component count, or any index is outside `[0, component_count)`.
pub fn denoise_components(
    mixing: &Array2<f64>,
    components: &Array2<f64>,
    artifact_indices: &[usize],
) -> Result<Array2<f64>> {
    let (m_rows, m_cols) = mixing.dim();
    let (n_comp, _n_t) = components.dim();
    if m_rows != m_cols || m_cols != n_comp {
        return Err(DenoiseError::InvalidInput(format!(
            "mixing is {m_rows} x {m_cols} but there are {n_comp} components"
        )));
    }
    if let Some(&bad) = artifact_indices.iter().find(|&&i| i >= n_comp) {
        return Err(DenoiseError::InvalidInput(format!(
            "artifact index {bad} out of range for {n_comp} components"
        )));
    }

    let mut zeroed = components.to_owned();
    for &i in artifact_indices {
        zeroed.row_mut(i).fill(0.0);
    }
    Ok(mixing.dot(&zeroed))
}
