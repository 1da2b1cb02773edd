//! Cross-validation splitters and scoring

use crate::error::{PipelineError, Result};
use crate::estimator::{check_xy, Estimator};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
    /// Leave-one-out cross-validation
    LeaveOneOut,
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone, Default)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Plain k-fold without shuffling
    pub fn k_fold(n_splits: usize) -> Self {
        Self::new(CVStrategy::KFold { n_splits, shuffle: false })
    }

    /// Stratified k-fold without shuffling
    pub fn stratified(n_splits: usize) -> Self {
        Self::new(CVStrategy::StratifiedKFold { n_splits, shuffle: false })
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate train/test splits. Stratified splitting requires `y`.
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, *n_splits, *shuffle)
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    PipelineError::InvalidInput("StratifiedKFold requires target array".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(PipelineError::shape(
                        format!("{} labels", n_samples),
                        format!("{} labels", y.len()),
                    ));
                }
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
            CVStrategy::LeaveOneOut => self.leave_one_out_split(n_samples),
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn check_n_splits(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(PipelineError::invalid_param("n_splits", n_splits, "must be at least 2"));
        }
        if n_samples < n_splits {
            return Err(PipelineError::InvalidInput(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_n_splits(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_n_splits(y.len(), n_splits)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidInput(
                "labels contain NaN or infinite values".to_string(),
            ));
        }

        // Group samples by class, classes in ascending order
        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();

        let mut class_indices: Vec<Vec<usize>> = classes
            .iter()
            .map(|c| {
                y.iter()
                    .enumerate()
                    .filter(|(_, v)| *v == c)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        for (class, indices) in classes.iter().zip(class_indices.iter()) {
            if indices.len() < n_splits {
                warn!(
                    class = *class,
                    members = indices.len(),
                    n_splits,
                    "Least populated class has fewer members than n_splits"
                );
            }
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.iter_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal samples round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in &class_indices {
            for &idx in indices {
                folds[offset % n_splits].push(idx);
                offset += 1;
            }
        }
        if offset != y.len() {
            return Err(PipelineError::InvalidInput(format!(
                "stratified folds cover {} of {} samples",
                offset,
                y.len()
            )));
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }

    fn leave_one_out_split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        if n_samples < 2 {
            return Err(PipelineError::InvalidInput(
                "LeaveOneOut requires at least 2 samples".to_string(),
            ));
        }

        let splits = (0..n_samples)
            .map(|i| CVSplit {
                train_indices: (0..n_samples).filter(|&j| j != i).collect(),
                test_indices: vec![i],
                fold_idx: i,
            })
            .collect();

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: 0.0,
                std_score: 0.0,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Fit a fresh clone of `estimator` on the split's training rows and score
/// it on the held-out rows
pub fn fit_and_score<E: Estimator + Clone>(
    estimator: &E,
    x: &Array2<f64>,
    y: &Array1<f64>,
    split: &CVSplit,
) -> Result<f64> {
    let x_train = x.select(Axis(0), &split.train_indices);
    let y_train = y.select(Axis(0), &split.train_indices);
    let x_test = x.select(Axis(0), &split.test_indices);
    let y_test = y.select(Axis(0), &split.test_indices);

    let mut model = estimator.clone();
    model.fit(&x_train, &y_train)?;
    model.score(&x_test, &y_test)
}

/// Score `estimator` on every fold produced by `cv`. The estimator itself is
/// left untouched.
pub fn cross_val_score<E: Estimator + Clone>(
    estimator: &E,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<CVResults> {
    check_xy(x, y)?;
    let splits = cv.split(x.nrows(), Some(y))?;

    let scores = splits
        .iter()
        .map(|split| fit_and_score(estimator, x, y, split))
        .collect::<Result<Vec<f64>>>()?;

    let results = CVResults::from_scores(scores);
    debug!(
        estimator = estimator.kind(),
        n_folds = results.n_folds,
        mean_score = results.mean_score,
        "Cross-validation finished"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::DecisionTreeClassifier;
    use ndarray::array;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::k_fold(5);
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        // All indices should be covered exactly once in test sets
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let splits = CrossValidator::k_fold(3).split(10, None).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_shuffled_k_fold_is_seeded() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: true }).with_random_state(42);
        let a = cv.split(40, None).unwrap();
        let b = cv.split(40, None).unwrap();
        assert_eq!(a[0].test_indices, b[0].test_indices);
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, // 5 samples of class 0
            1.0, 1.0, 1.0, 1.0, 1.0, // 5 samples of class 1
        ]);

        let cv = CrossValidator::stratified(5);
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        // Each fold should have 1 sample from each class
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(ones, 1);
        }
    }

    #[test]
    fn test_stratified_balances_fold_sizes() {
        // Three classes of 3 samples into 2 folds: sizes must differ by at most one
        let y = array![2.0, 0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0];
        let splits = CrossValidator::stratified(2).split(9, Some(&y)).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![5, 4]);
    }

    #[test]
    fn test_stratified_test_folds_cover_every_sample() {
        let y = array![0.0, 1.0, 2.0, 0.0, 1.0, 0.0, 2.0, 1.0];
        let splits = CrossValidator::stratified(2).split(8, Some(&y)).unwrap();
        let mut covered: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_rejects_nan_labels() {
        let y = array![0.0, 1.0, f64::NAN, 0.0, 1.0, f64::NAN];
        let err = CrossValidator::stratified(2).split(6, Some(&y)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));

        let tree = DecisionTreeClassifier::new();
        let x = Array2::from_shape_fn((6, 1), |(i, _)| i as f64);
        assert!(matches!(
            cross_val_score(&tree, &x, &y, &CrossValidator::stratified(2)),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stratified_requires_labels() {
        let cv = CrossValidator::stratified(3);
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_leave_one_out() {
        let cv = CrossValidator::new(CVStrategy::LeaveOneOut);
        let splits = cv.split(10, None).unwrap();

        assert_eq!(splits.len(), 10);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 1);
            assert_eq!(split.train_indices.len(), 9);
        }
    }

    #[test]
    fn test_invalid_n_splits() {
        assert!(CrossValidator::k_fold(1).split(10, None).is_err());
        assert!(CrossValidator::k_fold(11).split(10, None).is_err());
    }

    #[test]
    fn test_cv_results_stats() {
        let results = CVResults::from_scores(vec![1.0, 0.5, 0.75, 0.75]);
        assert_eq!(results.n_folds, 4);
        assert!((results.mean_score - 0.75).abs() < 1e-12);
        assert!((results.std_score - (0.03125f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_cross_val_score_tree() {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [1.0, 1.1],
            [1.2, 1.0],
            [1.1, 1.3],
            [1.3, 1.2]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let tree = DecisionTreeClassifier::new();
        let results = cross_val_score(&tree, &x, &y, &CrossValidator::stratified(4)).unwrap();
        assert_eq!(results.n_folds, 4);
        assert_eq!(results.mean_score, 1.0);
        // Original estimator is not fitted by cross-validation
        assert!(!tree.is_fitted());
    }
}
