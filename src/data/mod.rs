//! # Data Module
//!
//! In-memory representations of observations and the event poset.
//!
//! ## Design Philosophy
//! - **Bit-packed genotypes:** observed and simulated genotypes are boolean
//!   matrices stored in packed bit vectors for cache-friendly scans.
//! - **Index-based graphs:** the poset is a pair of vertex-indexed adjacency
//!   lists; no pointer-chasing graph structures.
//!
//! ## Sub-modules
//! - `matrix`: Dense boolean and real matrix storage
//! - `poset`: Cover-relation DAG with topological ordering

pub mod matrix;
pub mod poset;

pub use matrix::{GenotypeMatrix, RealMatrix};
pub use poset::Poset;
