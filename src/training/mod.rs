//! Model training module
//!
//! Estimators that can sit at the end of a pipeline:
//! - Decision tree classifier (CART, gini / entropy)

pub mod decision_tree;

pub use decision_tree::{Criterion, DecisionTreeClassifier, TreeNode};
