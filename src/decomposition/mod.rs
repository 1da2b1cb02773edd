//! Dimensionality reduction transformers

pub mod pca;
pub use pca::Pca;
