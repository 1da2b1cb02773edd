//! Data preprocessing module
//!
//! Feature scaling transformers usable as pipeline steps:
//! - Standard scaling (z-score)
//! - Min-max scaling
//! - Robust scaling (median / IQR)
//! - Max-absolute scaling

mod scaler;

pub use scaler::{Scaler, ScalerType};
