//! # Utilities Module
//!
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `rng`: Seeded root stream and per-worker stream spawning
//! - `hamming`: Hamming distance kernels

pub mod hamming;
pub mod rng;

pub use hamming::{hamming_distance, hamming_rows};
pub use rng::Context;
