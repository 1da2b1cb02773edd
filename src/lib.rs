//! Kolosal Pipeline - composable ML pipelines with grid search
//!
//! This crate chains preprocessing steps and a final classifier into a single
//! [`Pipeline`](pipeline::Pipeline) with unified `fit` / `predict` / `score`,
//! and tunes whole pipelines with cross-validated
//! [`GridSearchCV`](model_selection::GridSearchCV). Step parameters are
//! addressed as `<step>__<param>`.
//!
//! # Modules
//!
//! ## Core
//! - [`estimator`] - `Transformer` / `Estimator` step traits
//! - [`pipeline`] - Named-step pipelines and `make_pipeline`
//! - [`params`] - Hyperparameter values and qualified names
//!
//! ## Steps
//! - [`preprocessing`] - Feature scaling
//! - [`decomposition`] - PCA
//! - [`training`] - Decision tree classifier
//!
//! ## Evaluation
//! - [`model_selection`] - Train/test split, cross-validation, grid search
//! - [`metrics`] - Accuracy and confusion matrix
//! - [`datasets`] - Bundled Iris data and CSV loading
//!
//! ## Front end
//! - [`config`] - JSON experiment configuration
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use kolosal_pipeline::prelude::*;
//!
//! # fn main() -> kolosal_pipeline::Result<()> {
//! let (x, y) = load_iris().into_xy()?;
//! let (x_train, x_test, y_train, y_test) = train_test_split(&x, &y, 0.2, Some(42))?;
//!
//! let mut pipe = Pipeline::new(vec![
//!     Step::transformer("scaler", Scaler::standard()),
//!     Step::transformer("pca", Pca::new(2)),
//!     Step::estimator("tree", DecisionTreeClassifier::new()),
//! ])?;
//! pipe.fit(&x_train, &y_train)?;
//! println!("accuracy = {:.3}", pipe.score(&x_test, &y_test)?);
//!
//! let grid = ParameterGrid::new().add("tree__max_depth", vec![2, 3, 4]);
//! let mut search = GridSearchCV::new(pipe, grid);
//! search.fit(&x_train, &y_train)?;
//! println!("best = {:?}", search.best_params());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Core abstractions
pub mod estimator;
pub mod params;
pub mod pipeline;

// Steps
pub mod decomposition;
pub mod preprocessing;
pub mod training;

// Evaluation
pub mod datasets;
pub mod metrics;
pub mod model_selection;

// Front end
pub mod cli;
pub mod config;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Core
    pub use crate::estimator::{Estimator, Transformer};
    pub use crate::params::{ParamValue, Params};
    pub use crate::pipeline::{make_pipeline, Component, Pipeline, Step};

    // Steps
    pub use crate::decomposition::Pca;
    pub use crate::preprocessing::{Scaler, ScalerType};
    pub use crate::training::{Criterion, DecisionTreeClassifier};

    // Evaluation
    pub use crate::datasets::{load_iris, Dataset};
    pub use crate::metrics::{accuracy_score, confusion_matrix};
    pub use crate::model_selection::{
        cross_val_score, train_test_split, CVStrategy, CrossValidator, GridSearchCV, ParameterGrid,
    };

    // Configuration
    pub use crate::config::{ExperimentConfig, SearchConfig};
}
