//! PCA - Principal Component Analysis
//!
//! Linear dimensionality reduction. Computes the top-k eigenvectors of the
//! covariance matrix using power iteration with deflation, then projects the
//! centered data onto them.

use crate::error::{PipelineError, Result};
use crate::estimator::{check_n_features, Transformer};
use crate::params::{unknown_param, ParamValue, Params};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// State learned by [`Pca::fit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedPca {
    mean: Array1<f64>,
    /// n_components x n_features, rows are unit eigenvectors
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

/// PCA dimensionality reduction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    /// Number of output dimensions; `None` keeps min(n_samples, n_features)
    n_components: Option<usize>,
    /// Scale projected components to unit variance
    whiten: bool,
    /// Random seed for power iteration initialization
    random_state: u64,
    max_iter: usize,
    tol: f64,
    fitted: Option<FittedPca>,
}

impl Default for Pca {
    fn default() -> Self {
        Self {
            n_components: None,
            whiten: false,
            random_state: 42,
            max_iter: 1000,
            tol: 1e-12,
            fitted: None,
        }
    }
}

impl Pca {
    /// Create a PCA keeping `n_components` dimensions
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components: Some(n_components),
            ..Default::default()
        }
    }

    pub fn with_whiten(mut self, whiten: bool) -> Self {
        self.whiten = whiten;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_components(&self) -> Option<usize> {
        self.n_components
    }

    /// Principal axes (n_components x n_features)
    pub fn components(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().map(|f| &f.components)
    }

    /// Per-feature mean learned during fit
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.mean)
    }

    /// Variance explained by each component
    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.explained_variance)
    }

    /// Fraction of the total variance explained by each component
    pub fn explained_variance_ratio(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.explained_variance_ratio)
    }

    /// Map projected data back into the original feature space
    pub fn inverse_transform(&self, z: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        check_n_features(z, fitted.components.nrows())?;

        let mut z = z.to_owned();
        if self.whiten {
            for (mut column, ev) in z.axis_iter_mut(Axis(1)).zip(fitted.explained_variance.iter()) {
                let scale = ev.sqrt();
                column.mapv_inplace(|v| v * scale);
            }
        }
        Ok(z.dot(&fitted.components) + &fitted.mean)
    }

    fn fitted(&self) -> Result<&FittedPca> {
        self.fitted
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("PCA".to_string()))
    }

    /// Power iteration with deflation to extract top-k eigenvectors.
    fn power_iteration(&self, cov: &Array2<f64>, k: usize) -> (Vec<f64>, Vec<Array1<f64>>) {
        let d = cov.nrows();
        let mut eigenvalues = Vec::with_capacity(k);
        let mut eigenvectors: Vec<Array1<f64>> = Vec::with_capacity(k);

        // Work on a copy so we can deflate
        let mut work = cov.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        for _component in 0..k {
            // Initialize random unit vector orthogonal to the components found so far
            let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            orthogonalize(&mut v, &eigenvectors);
            normalize(&mut v);

            for _iter in 0..self.max_iter {
                // w = A * v
                let mut w = work.dot(&v);
                orthogonalize(&mut w, &eigenvectors);

                let w_norm = w.dot(&w).sqrt();
                if w_norm < 1e-12 {
                    // remaining spectrum is zero; any orthogonal direction will do
                    break;
                }
                let new_v = w / w_norm;

                let diff = (&new_v - &v).mapv(|x| x * x).sum().sqrt();
                v = new_v;
                if diff < self.tol {
                    break;
                }
            }

            // Deterministic sign: the largest-magnitude loading is positive
            let pivot = v
                .iter()
                .enumerate()
                .fold((0, 0.0f64), |best, (i, &x)| if x.abs() > best.1 { (i, x.abs()) } else { best })
                .0;
            if v[pivot] < 0.0 {
                v.mapv_inplace(|x| -x);
            }

            let eigenvalue = v.dot(&work.dot(&v)).max(0.0);
            eigenvalues.push(eigenvalue);

            // Deflate: A = A - eigenvalue * v * v^T
            for i in 0..d {
                for j in 0..d {
                    work[[i, j]] -= eigenvalue * v[i] * v[j];
                }
            }
            eigenvectors.push(v);
        }

        (eigenvalues, eigenvectors)
    }
}

fn orthogonalize(v: &mut Array1<f64>, basis: &[Array1<f64>]) {
    for b in basis {
        let proj = v.dot(b);
        v.scaled_add(-proj, b);
    }
}

fn normalize(v: &mut Array1<f64>) {
    let norm = v.dot(v).sqrt().max(1e-12);
    v.mapv_inplace(|x| x / norm);
}

impl Transformer for Pca {
    fn kind(&self) -> &'static str {
        "pca"
    }

    fn fit(&mut self, x: &Array2<f64>, _y: Option<&Array1<f64>>) -> Result<()> {
        let n = x.nrows();
        let d = x.ncols();
        if n < 2 {
            return Err(PipelineError::InvalidInput(
                "PCA requires at least 2 samples".to_string(),
            ));
        }
        if d < 1 {
            return Err(PipelineError::InvalidInput(
                "PCA requires at least 1 feature".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidInput(
                "input contains NaN or infinite values".to_string(),
            ));
        }

        let max_components = n.min(d);
        let n_components = match self.n_components {
            Some(0) => {
                return Err(PipelineError::invalid_param("n_components", 0, "must be at least 1"));
            }
            Some(k) if k > max_components => {
                return Err(PipelineError::invalid_param(
                    "n_components",
                    k,
                    format!("must be <= min(n_samples, n_features) = {}", max_components),
                ));
            }
            Some(k) => k,
            None => max_components,
        };

        // Step 1: Center the data
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::InvalidInput("empty input".to_string()))?;
        let centered = x - &mean;

        // Step 2: Covariance matrix (d x d)
        let cov = centered.t().dot(&centered) / (n - 1) as f64;
        let total_variance: f64 = cov.diag().sum();

        // Step 3: Top-k eigenvectors
        let (eigenvalues, eigenvectors) = self.power_iteration(&cov, n_components);

        let mut components = Array2::zeros((n_components, d));
        for (mut row, v) in components.axis_iter_mut(Axis(0)).zip(eigenvectors.iter()) {
            row.assign(v);
        }
        let explained_variance = Array1::from_vec(eigenvalues);
        let explained_variance_ratio = if total_variance > 0.0 {
            explained_variance.mapv(|ev| ev / total_variance)
        } else {
            Array1::zeros(n_components)
        };

        tracing::debug!(
            n_components,
            explained = explained_variance_ratio.sum(),
            "PCA fitted"
        );

        self.fitted = Some(FittedPca {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        });
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        check_n_features(x, fitted.mean.len())?;

        let mut projected = (x - &fitted.mean).dot(&fitted.components.t());
        if self.whiten {
            for (mut column, ev) in projected
                .axis_iter_mut(Axis(1))
                .zip(fitted.explained_variance.iter())
            {
                let scale = ev.sqrt().max(1e-12);
                column.mapv_inplace(|v| v / scale);
            }
        }
        Ok(projected)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("n_components".to_string(), ParamValue::from(self.n_components));
        params.insert("whiten".to_string(), ParamValue::Bool(self.whiten));
        params.insert("random_state".to_string(), ParamValue::from(self.random_state as i64));
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "n_components" => self.n_components = value.to_opt_usize(name)?,
            "whiten" => self.whiten = value.to_bool(name)?,
            "random_state" => self.random_state = value.to_u64(name)?,
            _ => return Err(unknown_param("PCA", name, &value)),
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
