//! Classification metrics

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use std::cmp::Ordering;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::shape(
            format!("{} predictions", y_true.len()),
            format!("{} predictions", y_pred.len()),
        ));
    }
    if y_true.is_empty() {
        return Err(PipelineError::InvalidInput(
            "cannot score an empty label vector".to_string(),
        ));
    }
    Ok(())
}

/// Fraction of predictions that exactly match the true labels
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Confusion matrix over the union of labels in `y_true` and `y_pred`.
///
/// Returns the sorted labels and a matrix where entry `[i, j]` counts
/// samples with true label `labels[i]` predicted as `labels[j]`.
pub fn confusion_matrix(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<(Vec<f64>, Array2<usize>)> {
    check_lengths(y_true, y_pred)?;

    let mut labels: Vec<f64> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    labels.dedup();

    let position = |v: &f64| {
        labels
            .binary_search_by(|l| l.partial_cmp(v).unwrap_or(Ordering::Equal))
            .unwrap_or(0)
    };

    let mut matrix = Array2::zeros((labels.len(), labels.len()));
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        matrix[[position(t), position(p)]] += 1;
    }
    Ok((labels, matrix))
}
