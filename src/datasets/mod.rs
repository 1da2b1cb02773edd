//! Datasets: the bundled Iris data and CSV loading

mod iris;
mod loader;

pub use iris::load_iris;

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use std::cmp::Ordering;

/// Feature matrix with optional labels and metadata
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Samples in rows, features in columns
    pub data: Array2<f64>,
    pub target: Option<Array1<f64>>,
    pub feature_names: Vec<String>,
    /// Class names indexed by label value, when labels are class indices
    pub target_names: Vec<String>,
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// `(n_samples, n_features)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn target(&self) -> Result<&Array1<f64>> {
        self.target
            .as_ref()
            .ok_or_else(|| PipelineError::InvalidInput("dataset has no target column".to_string()))
    }

    /// Split into features and labels
    pub fn into_xy(self) -> Result<(Array2<f64>, Array1<f64>)> {
        match self.target {
            Some(target) => Ok((self.data, target)),
            None => Err(PipelineError::InvalidInput("dataset has no target column".to_string())),
        }
    }

    /// Sample count per distinct label, labels ascending
    pub fn class_counts(&self) -> Result<Vec<(f64, usize)>> {
        let mut labels: Vec<f64> = self.target()?.to_vec();
        labels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let mut counts: Vec<(f64, usize)> = Vec::new();
        for label in labels {
            match counts.last_mut() {
                Some((last, n)) if *last == label => *n += 1,
                _ => counts.push((label, 1)),
            }
        }
        Ok(counts)
    }

    /// Display name for a label value
    pub fn label_name(&self, label: f64) -> String {
        let idx = label as usize;
        if label >= 0.0 && label.fract() == 0.0 && idx < self.target_names.len() {
            self.target_names[idx].clone()
        } else {
            label.to_string()
        }
    }
}
