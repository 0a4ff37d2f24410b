//! # Hamming Distance Kernels
//!
//! Distance between observed and simulated genotypes, pairwise and
//! row-wise against a whole sample matrix.

use crate::data::matrix::GenotypeMatrix;

/// Hamming distance between two genotype vectors of equal length.
#[inline]
pub fn hamming_distance(x: &[bool], y: &[bool]) -> u32 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).filter(|(a, b)| a != b).count() as u32
}

/// Row-wise Hamming distance between each row of `x` and the vector `y`.
pub fn hamming_rows(x: &GenotypeMatrix, y: &[bool]) -> Vec<u32> {
    debug_assert_eq!(x.n_cols(), y.len());
    (0..x.n_rows())
        .map(|i| {
            (0..x.n_cols())
                .filter(|&j| x.get(i, j) != y[j])
                .count() as u32
        })
        .collect()
}
