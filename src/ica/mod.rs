//! Independent Component Analysis: whitening plus a fixed-point unmixing
//! estimator with symmetric and deflationary orthogonalisation schemes.

pub mod fastica;
pub mod whiten;

pub use fastica::{decompose, pinv, Decomposition};
pub use whiten::{whiten, Whitened};
