//! Model selection: hold-out splits, cross-validation and grid search

mod cross_validation;
mod grid;
mod grid_search;
mod split;

pub use cross_validation::{cross_val_score, fit_and_score, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use grid::ParameterGrid;
pub use grid_search::{format_params, CandidateResult, GridSearchCV};
pub use split::{train_test_split, TrainTestSplit};
