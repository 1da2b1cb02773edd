//! Decision tree classifier (CART)

use crate::error::{PipelineError, Result};
use crate::estimator::{check_n_features, check_xy, Estimator};
use crate::params::{unknown_param, ParamValue, Params};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::str::FromStr;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the class distribution of its training samples
    Leaf {
        class_counts: Vec<usize>,
        n_samples: usize,
    },
    /// Internal node with split `x[feature_idx] <= threshold` going left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy
    Entropy,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        }
    }

    fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.log2()
                })
                .sum::<f64>(),
        }
    }
}

impl FromStr for Criterion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            _ => Err(PipelineError::invalid_param(
                "criterion",
                s,
                "expected gini or entropy",
            )),
        }
    }
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth (root is depth 0)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Number of features seen during fit
    n_features: usize,
    /// Sorted class labels
    classes: Vec<f64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeClassifier {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
            n_features: 0,
            classes: Vec::new(),
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Class labels seen during fit, ascending
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Get tree depth (a single leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map_or(0, count)
    }

    fn validate_params(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(PipelineError::invalid_param(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf < 1 {
            return Err(PipelineError::invalid_param(
                "min_samples_leaf",
                self.min_samples_leaf,
                "must be at least 1",
            ));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::invalid_param("max_depth", 0, "must be at least 1"));
        }
        Ok(())
    }

    fn class_counts(&self, y_idx: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in indices {
            counts[y_idx[i]] += 1;
        }
        counts
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y_idx: &[usize],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(y_idx, indices);
        let impurity = self.criterion.impurity(&counts, n_samples);

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || counts.iter().filter(|&&c| c > 0).count() <= 1;

        if should_stop {
            return TreeNode::Leaf { class_counts: counts, n_samples };
        }

        let Some(best) = self.find_best_split(x, y_idx, indices, impurity) else {
            return TreeNode::Leaf { class_counts: counts, n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);
        if left_indices.is_empty() || right_indices.is_empty() {
            return TreeNode::Leaf { class_counts: counts, n_samples };
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        // Build children recursively
        let left = Box::new(self.build_tree(x, y_idx, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_tree(x, y_idx, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Scan every feature for the split with the largest impurity decrease.
    /// Ties keep the lower feature index and the lower threshold.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y_idx: &[usize],
        indices: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let n_classes = self.classes.len();

        // Parallelize feature scanning: each feature independently finds its best split
        let feature_results: Vec<Option<SplitCandidate>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut order: Vec<(f64, usize)> = indices
                    .iter()
                    .map(|&i| (x[[i, feature_idx]], y_idx[i]))
                    .collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left_counts = vec![0usize; n_classes];
                let mut right_counts = vec![0usize; n_classes];
                for &(_, class) in &order {
                    right_counts[class] += 1;
                }

                let mut best: Option<SplitCandidate> = None;
                for pos in 0..n - 1 {
                    let class = order[pos].1;
                    left_counts[class] += 1;
                    right_counts[class] -= 1;

                    let (value, next_value) = (order[pos].0, order[pos + 1].0);
                    if value >= next_value {
                        continue;
                    }
                    let left_count = pos + 1;
                    let right_count = n - left_count;
                    if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left_count as f64
                        * self.criterion.impurity(&left_counts, left_count)
                        + right_count as f64 * self.criterion.impurity(&right_counts, right_count))
                        / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        let mut threshold = (value + next_value) / 2.0;
                        if threshold >= next_value {
                            threshold = value;
                        }
                        best = Some(SplitCandidate { feature_idx, threshold, gain });
                    }
                }
                best
            })
            .collect();

        // Find best across all features (collect preserves feature order)
        feature_results
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, cand| match best {
                Some(b) if b.gain >= cand.gain => Some(b),
                _ => Some(cand),
            })
    }

    fn leaf_for(&self, sample: ArrayView1<f64>) -> Option<&[usize]> {
        let mut node = self.root.as_ref()?;
        loop {
            match node {
                TreeNode::Leaf { class_counts, .. } => return Some(class_counts.as_slice()),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }

    fn check_predict_input(&self, x: &Array2<f64>) -> Result<()> {
        if self.root.is_none() {
            return Err(PipelineError::NotFitted("DecisionTreeClassifier".to_string()));
        }
        check_n_features(x, self.n_features)
    }
}

/// Index of the largest count; the lowest index wins ties
fn argmax(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, 0usize), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
        .0
}

impl Estimator for DecisionTreeClassifier {
    fn kind(&self) -> &'static str {
        "decisiontreeclassifier"
    }

    /// Fit the tree to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.validate_params()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 {
            return Err(PipelineError::InvalidInput(
                "DecisionTreeClassifier requires at least 1 sample".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidInput(
                "labels contain NaN or infinite values".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidInput(
                "features contain NaN or infinite values".to_string(),
            ));
        }

        // Get unique classes
        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        self.classes = classes;
        self.n_features = n_features;

        let y_idx: Vec<usize> = y
            .iter()
            .map(|v| {
                self.classes
                    .binary_search_by(|c| c.partial_cmp(v).unwrap_or(std::cmp::Ordering::Equal))
                    .unwrap_or(0)
            })
            .collect();

        // Build tree recursively
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &y_idx, &indices, 0, &mut importances);
        self.root = Some(root);

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        tracing::debug!(
            depth = self.get_depth(),
            leaves = self.get_n_leaves(),
            classes = self.classes.len(),
            "Decision tree fitted"
        );
        Ok(())
    }

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_predict_input(x)?;
        let predictions = x
            .rows()
            .into_iter()
            .map(|sample| {
                self.leaf_for(sample)
                    .map_or(0.0, |counts| self.classes[argmax(counts)])
            })
            .collect();
        Ok(predictions)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_predict_input(x)?;
        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((x.nrows(), n_classes));
        for (i, sample) in x.rows().into_iter().enumerate() {
            if let Some(counts) = self.leaf_for(sample) {
                let total = counts.iter().sum::<usize>().max(1) as f64;
                for (j, &c) in counts.iter().enumerate() {
                    proba[[i, j]] = c as f64 / total;
                }
            }
        }
        Ok(proba)
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("criterion".to_string(), ParamValue::from(self.criterion.as_str()));
        params.insert("max_depth".to_string(), ParamValue::from(self.max_depth));
        params.insert("min_samples_split".to_string(), ParamValue::from(self.min_samples_split));
        params.insert("min_samples_leaf".to_string(), ParamValue::from(self.min_samples_leaf));
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "criterion" => self.criterion = value.to_str(name)?.parse()?,
            "max_depth" => self.max_depth = value.to_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.to_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.to_usize(name)?,
            _ => return Err(unknown_param("DecisionTreeClassifier", name, &value)),
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
        assert_eq!(tree.score(&x, &y).unwrap(), 1.0);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_xor_needs_depth_two() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];

        // first split has zero gain on XOR, so a greedy tree stays a leaf
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.get_depth(), 0);
        // ties resolve to the lowest class
        assert!(tree.predict(&x).unwrap().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_multiclass_labels_preserved() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [20.0], [21.0]];
        let y = array![5.0, 5.0, 5.0, 7.0, 7.0, 9.0, 9.0];

        let mut tree = DecisionTreeClassifier::new().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.classes(), &[5.0, 7.0, 9.0]);
        assert_eq!(tree.predict(&array![[0.0], [10.5], [30.0]]).unwrap(), array![5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 1.0], [6.0, 0.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTreeClassifier::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTreeClassifier::new().with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();
        fn min_leaf(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { n_samples, .. } => *n_samples,
                TreeNode::Split { left, right, .. } => min_leaf(left).min(min_leaf(right)),
            }
        }
        assert!(min_leaf(tree.root().unwrap()) >= 2);
    }

    #[test]
    fn test_predict_proba() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();
        let proba = tree.predict_proba(&array![[1.5], [3.5]]).unwrap();
        assert_eq!(proba, array![[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        // Second feature is constant and never used
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTreeClassifier::new();
        let err = tree.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted(_)));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut tree = DecisionTreeClassifier::new();
        let err = tree.fit(&array![[1.0], [2.0]], &array![0.0]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));
    }

    #[test]
    fn test_params() {
        let mut tree = DecisionTreeClassifier::new();
        tree.set_param("max_depth", ParamValue::Int(3)).unwrap();
        tree.set_param("criterion", ParamValue::from("entropy")).unwrap();
        assert_eq!(tree.max_depth, Some(3));
        assert_eq!(tree.criterion, Criterion::Entropy);

        tree.set_param("max_depth", ParamValue::None).unwrap();
        assert_eq!(tree.get_params()["max_depth"], ParamValue::None);

        assert!(tree.set_param("criterion", ParamValue::from("mse")).is_err());
        assert!(tree.set_param("n_estimators", ParamValue::Int(3)).is_err());
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let mut x = Array2::from_shape_fn((200, 1), |(i, _)| i as f64);
        for i in (0..200).step_by(7) {
            x[[i, 0]] = f64::NAN;
        }
        let y = Array1::from_shape_fn(200, |i| (i % 2) as f64);

        let mut tree = DecisionTreeClassifier::new();
        let err = tree.fit(&x, &y).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(!tree.is_fitted());

        let inf = array![[1.0], [f64::INFINITY], [3.0]];
        assert!(matches!(
            tree.fit(&inf, &array![0.0, 1.0, 0.0]),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
