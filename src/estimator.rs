//! Core step traits
//!
//! A pipeline is an ordered list of steps. Every step but the last must be a
//! [`Transformer`]; the last is usually an [`Estimator`]. Both traits expose
//! their hyperparameters by name so that search utilities can reach into a
//! pipeline without knowing the concrete step types.

use crate::error::{PipelineError, Result};
use crate::metrics::accuracy_score;
use crate::params::{ParamValue, Params};
use ndarray::{Array1, Array2};
use std::any::Any;
use std::fmt::Debug;

/// Trait for feature transformers (scalers, decompositions, ...)
pub trait Transformer: Send + Sync + Debug {
    /// Short lowercase name of the transformer kind, used for auto-naming steps
    fn kind(&self) -> &'static str;

    /// Learn transformation parameters. Labels are optional and most
    /// transformers ignore them.
    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<()>;

    /// Apply the learned transformation
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        self.fit(x, y)?;
        self.transform(x)
    }

    fn is_fitted(&self) -> bool;

    /// Current hyperparameters, keyed by unqualified name
    fn get_params(&self) -> Params;

    /// Set one hyperparameter by name
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()>;

    /// Set several hyperparameters, stopping at the first failure
    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value.clone())?;
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Transformer>;

    fn as_any(&self) -> &dyn Any;
}

/// Trait for predictors that sit at the end of a pipeline
pub trait Estimator: Send + Sync + Debug {
    /// Short lowercase name of the estimator kind, used for auto-naming steps
    fn kind(&self) -> &'static str;

    /// Fit the estimator to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class probabilities, one column per class
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array2<f64>> {
        Err(PipelineError::UnsupportedOperation(format!(
            "{} does not support predict_proba",
            self.kind()
        )))
    }

    /// Mean accuracy on the given data
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let predictions = self.predict(x)?;
        accuracy_score(y, &predictions)
    }

    fn is_fitted(&self) -> bool;

    /// Current hyperparameters, keyed by (possibly qualified) name
    fn get_params(&self) -> Params;

    /// Set one hyperparameter by name
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()>;

    /// Set several hyperparameters, stopping at the first failure
    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value.clone())?;
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Estimator>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Transformer> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl Clone for Box<dyn Estimator> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Fail with `ShapeError` unless `x` and `y` have the same number of rows
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::shape(
            format!("y length = {}", x.nrows()),
            format!("y length = {}", y.len()),
        ));
    }
    Ok(())
}

/// Fail with `ShapeError` unless `x` has `expected` columns
pub(crate) fn check_n_features(x: &Array2<f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(PipelineError::shape(
            format!("{} features", expected),
            format!("{} features", x.ncols()),
        ));
    }
    Ok(())
}
