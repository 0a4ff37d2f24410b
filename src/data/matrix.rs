//! # Dense Matrix Storage
//!
//! Row-major storage for genotype observations (bit-packed booleans) and
//! real-valued per-event statistics.

use bitvec::prelude::*;

/// Dense bit-packed boolean matrix, row-major.
///
/// Rows are observations or simulated samples; columns are events. One bit
/// per entry, packed into `u64` words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenotypeMatrix {
    bits: BitVec<u64, Lsb0>,
    n_rows: usize,
    n_cols: usize,
}

impl GenotypeMatrix {
    /// Create an all-false matrix
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; n_rows * n_cols],
            n_rows,
            n_cols,
        }
    }

    /// Create from a slice of equally sized rows
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.len());
        let mut m = Self::new(n_rows, n_cols);
        for (i, row) in rows.iter().enumerate() {
            debug_assert_eq!(row.len(), n_cols);
            for (j, &v) in row.iter().enumerate() {
                m.set(i, j, v);
            }
        }
        m
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Get entry (i, j)
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.bits[i * self.n_cols + j]
    }

    /// Set entry (i, j)
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: bool) {
        self.bits.set(i * self.n_cols + j, value);
    }

    /// Copy row `i` into an owned vector
    pub fn row(&self, i: usize) -> Vec<bool> {
        (0..self.n_cols).map(|j| self.get(i, j)).collect()
    }

    /// Iterate over rows as owned vectors
    pub fn rows(&self) -> impl Iterator<Item = Vec<bool>> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// Approximate memory usage in bytes
    pub fn size_bytes(&self) -> usize {
        self.bits.as_raw_slice().len() * std::mem::size_of::<u64>() + std::mem::size_of::<Self>()
    }
}

/// Dense row-major `f64` matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct RealMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl RealMatrix {
    /// Create an all-zero matrix
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            data: vec![0.0; n_rows * n_cols],
            n_rows,
            n_cols,
        }
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Get entry (i, j)
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_cols + j]
    }

    /// Set entry (i, j)
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n_cols + j] = value;
    }

    /// Borrow row `i`
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// Mutably borrow row `i`
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// Sum of each column, weighted per row.
    ///
    /// `weights` must have one entry per row.
    pub fn weighted_column_sums(&self, weights: &[f64]) -> Vec<f64> {
        debug_assert_eq!(weights.len(), self.n_rows);
        let mut sums = vec![0.0; self.n_cols];
        for (i, &w) in weights.iter().enumerate() {
            for (j, s) in sums.iter_mut().enumerate() {
                *s += w * self.get(i, j);
            }
        }
        sums
    }
}
