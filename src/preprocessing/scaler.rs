//! Feature scaling implementations

use crate::error::{PipelineError, Result};
use crate::estimator::{check_n_features, Transformer};
use crate::params::{unknown_param, ParamValue, Params};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
    /// No scaling
    None,
}

impl ScalerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalerType::Standard => "standard",
            ScalerType::MinMax => "minmax",
            ScalerType::Robust => "robust",
            ScalerType::MaxAbs => "maxabs",
            ScalerType::None => "none",
        }
    }
}

impl FromStr for ScalerType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(ScalerType::Standard),
            "minmax" => Ok(ScalerType::MinMax),
            "robust" => Ok(ScalerType::Robust),
            "maxabs" => Ok(ScalerType::MaxAbs),
            "none" => Ok(ScalerType::None),
            _ => Err(PipelineError::invalid_param(
                "kind",
                s,
                "expected one of standard, minmax, robust, maxabs, none",
            )),
        }
    }
}

/// Learned per-feature parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,    // mean, min, or median
    scale: f64,     // std, range, or IQR
}

/// Column-wise feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    /// Subtract the mean before scaling (standard scaling only)
    with_mean: bool,
    /// Divide by the standard deviation (standard scaling only)
    with_std: bool,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Default for Scaler {
    fn default() -> Self {
        Self::standard()
    }
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            with_mean: true,
            with_std: true,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Z-score scaler
    pub fn standard() -> Self {
        Self::new(ScalerType::Standard)
    }

    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    pub fn with_std(mut self, with_std: bool) -> Self {
        self.with_std = with_std;
        self
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Learned centers (one per feature)
    pub fn centers(&self) -> Option<Array1<f64>> {
        self.is_fitted
            .then(|| self.params.iter().map(|p| p.center).collect())
    }

    /// Learned scales (one per feature)
    pub fn scales(&self) -> Option<Array1<f64>> {
        self.is_fitted
            .then(|| self.params.iter().map(|p| p.scale).collect())
    }

    /// Undo the scaling
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("Scaler".to_string()));
        }
        check_n_features(x, self.params.len())?;

        let mut result = x.to_owned();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            column.mapv_inplace(|v| v * params.scale + params.center);
        }
        Ok(result)
    }

    fn compute_params(&self, column: &[f64]) -> ScalerParams {
        let n = column.len() as f64;

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = column.iter().sum::<f64>() / n;
                // population std, matching the common z-score definition
                let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
                ScalerParams {
                    center: if self.with_mean { mean } else { 0.0 },
                    scale: if !self.with_std || std == 0.0 { 1.0 } else { std },
                }
            }
            ScalerType::MinMax => {
                let min = column.iter().copied().fold(f64::INFINITY, f64::min);
                let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                }
            }
            ScalerType::Robust => {
                let mut sorted = column.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let median = quantile(&sorted, 0.5);
                let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                ScalerParams {
                    center: median,
                    scale: if iqr == 0.0 { 1.0 } else { iqr },
                }
            }
            ScalerType::MaxAbs => {
                let max_abs = column.iter().map(|v| v.abs()).fold(0.0f64, f64::max);
                ScalerParams {
                    center: 0.0,
                    scale: if max_abs == 0.0 { 1.0 } else { max_abs },
                }
            }
            ScalerType::None => ScalerParams {
                center: 0.0,
                scale: 1.0,
            },
        }
    }
}

/// Linear-interpolated quantile of already sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

impl Transformer for Scaler {
    fn kind(&self) -> &'static str {
        "scaler"
    }

    fn fit(&mut self, x: &Array2<f64>, _y: Option<&Array1<f64>>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(PipelineError::InvalidInput(
                "Scaler requires at least 1 sample".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidInput(
                "Scaler input contains NaN or infinite values".to_string(),
            ));
        }

        self.params = x
            .axis_iter(Axis(1))
            .map(|column| {
                let values: Vec<f64> = column.iter().copied().collect();
                self.compute_params(&values)
            })
            .collect();
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("Scaler".to_string()));
        }
        check_n_features(x, self.params.len())?;

        let mut result = x.to_owned();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            column.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(result)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("kind".to_string(), ParamValue::from(self.scaler_type.as_str()));
        params.insert("with_mean".to_string(), ParamValue::Bool(self.with_mean));
        params.insert("with_std".to_string(), ParamValue::Bool(self.with_std));
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "kind" => self.scaler_type = value.to_str(name)?.parse()?,
            "with_mean" => self.with_mean = value.to_bool(name)?,
            "with_std" => self.with_std = value.to_bool(name)?,
            _ => return Err(unknown_param("Scaler", name, &value)),
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
