//! Exhaustive cross-validated hyperparameter search

use super::cross_validation::{fit_and_score, CVResults, CVSplit, CrossValidator};
use super::grid::ParameterGrid;
use crate::config::SearchConfig;
use crate::error::{PipelineError, Result};
use crate::estimator::{check_xy, Estimator};
use crate::params::Params;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Cross-validation outcome of one parameter combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: Params,
    pub fold_scores: Vec<f64>,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    /// 1 is best; equal mean scores share a rank
    pub rank: usize,
    /// Wall time spent fitting and scoring all folds
    pub fit_time_secs: f64,
}

#[derive(Debug, Clone)]
struct SearchState<E> {
    results: Vec<CandidateResult>,
    best_index: usize,
    best_estimator: Option<E>,
}

/// Grid search over an estimator's parameters with cross-validation.
///
/// Every candidate is scored on the same folds. The best candidate is the
/// one with the highest mean fold score; ties go to the earliest candidate
/// in grid order.
#[derive(Debug, Clone)]
pub struct GridSearchCV<E: Estimator + Clone> {
    estimator: E,
    param_grid: ParameterGrid,
    cv: CrossValidator,
    /// Worker threads for candidate evaluation: 1 runs sequentially, 0 uses
    /// every available core
    n_jobs: usize,
    refit: bool,
    state: Option<SearchState<E>>,
}

impl<E: Estimator + Clone> GridSearchCV<E> {
    /// Search with 5-fold stratified CV, sequential evaluation and refit
    pub fn new(estimator: E, param_grid: ParameterGrid) -> Self {
        Self::from_config(estimator, param_grid, &SearchConfig::default())
    }

    pub fn from_config(estimator: E, param_grid: ParameterGrid, config: &SearchConfig) -> Self {
        Self {
            estimator,
            param_grid,
            cv: config.cross_validator(),
            n_jobs: config.n_jobs,
            refit: config.refit,
            state: None,
        }
    }

    pub fn with_cv(mut self, cv: CrossValidator) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_refit(mut self, refit: bool) -> Self {
        self.refit = refit;
        self
    }

    /// The unfitted template estimator
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn param_grid(&self) -> &ParameterGrid {
        &self.param_grid
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Evaluate every candidate, pick the best and optionally refit it on
    /// all of `x`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let candidates = self.param_grid.candidates()?;
        let splits = self.cv.split(x.nrows(), Some(y))?;
        self.state = None;

        info!(
            candidates = candidates.len(),
            folds = splits.len(),
            fits = candidates.len() * splits.len(),
            n_jobs = self.n_jobs,
            "Starting grid search"
        );
        let start = Instant::now();

        let cv_results = if self.n_jobs == 1 {
            candidates
                .iter()
                .map(|params| self.evaluate(params, x, y, &splits))
                .collect::<Result<Vec<_>>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.n_jobs)
                .build()
                .map_err(|e| PipelineError::InvalidInput(format!("failed to build thread pool: {}", e)))?;
            pool.install(|| {
                candidates
                    .par_iter()
                    .map(|params| self.evaluate(params, x, y, &splits))
                    .collect::<Result<Vec<_>>>()
            })?
        };

        let mut results: Vec<CandidateResult> = candidates
            .into_iter()
            .zip(cv_results)
            .map(|(params, (cv, fit_time_secs))| CandidateResult {
                params,
                fold_scores: cv.scores,
                mean_test_score: cv.mean_score,
                std_test_score: cv.std_score,
                rank: 0,
                fit_time_secs,
            })
            .collect();
        assign_ranks(&mut results);

        let best_index = results
            .iter()
            .position(|r| r.rank == 1)
            .ok_or_else(|| PipelineError::InvalidInput("grid search produced no candidates".to_string()))?;
        let best = &results[best_index];
        info!(
            best_score = best.mean_test_score,
            best_params = %format_params(&best.params),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Grid search finished"
        );

        let best_estimator = if self.refit {
            let mut estimator = self.estimator.clone();
            estimator.set_params(&best.params)?;
            estimator.fit(x, y)?;
            Some(estimator)
        } else {
            None
        };

        self.state = Some(SearchState {
            results,
            best_index,
            best_estimator,
        });
        Ok(self)
    }

    fn evaluate(
        &self,
        params: &Params,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
    ) -> Result<(CVResults, f64)> {
        let start = Instant::now();
        let mut estimator = self.estimator.clone();
        estimator.set_params(params)?;

        let scores = splits
            .iter()
            .map(|split| fit_and_score(&estimator, x, y, split))
            .collect::<Result<Vec<f64>>>()?;
        let cv = CVResults::from_scores(scores);

        debug!(
            params = %format_params(params),
            mean_score = cv.mean_score,
            "Candidate evaluated"
        );
        Ok((cv, start.elapsed().as_secs_f64()))
    }

    fn state(&self) -> Result<&SearchState<E>> {
        self.state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("GridSearchCV".to_string()))
    }

    /// Per-candidate results in grid order
    pub fn cv_results(&self) -> Option<&[CandidateResult]> {
        self.state.as_ref().map(|s| s.results.as_slice())
    }

    pub fn best_index(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.best_index)
    }

    pub fn best_params(&self) -> Option<&Params> {
        self.state.as_ref().map(|s| &s.results[s.best_index].params)
    }

    /// Mean cross-validated score of the best candidate
    pub fn best_score(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.results[s.best_index].mean_test_score)
    }

    /// The best candidate refitted on the full training data
    pub fn best_estimator(&self) -> Option<&E> {
        self.state.as_ref().and_then(|s| s.best_estimator.as_ref())
    }

    fn refitted(&self) -> Result<&E> {
        self.state()?.best_estimator.as_ref().ok_or_else(|| {
            PipelineError::UnsupportedOperation(
                "GridSearchCV was fitted with refit disabled; no best estimator is available".to_string(),
            )
        })
    }

    /// Predict with the refitted best estimator
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.refitted()?.predict(x)
    }

    /// Score the refitted best estimator
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        self.refitted()?.score(x, y)
    }
}

/// Rank by descending mean score; equal means share the better rank
fn assign_ranks(results: &mut [CandidateResult]) {
    let means: Vec<f64> = results.iter().map(|r| r.mean_test_score).collect();
    for result in results.iter_mut() {
        let better = means.iter().filter(|&&m| m > result.mean_test_score).count();
        result.rank = better + 1;
    }
}

/// `name=value` pairs joined by commas, for logs and reports
pub fn format_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
