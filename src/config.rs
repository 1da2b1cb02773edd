//! Experiment and search configuration

use crate::datasets::{load_iris, Dataset};
use crate::decomposition::Pca;
use crate::error::{PipelineError, Result};
use crate::model_selection::{CVStrategy, CrossValidator, ParameterGrid};
use crate::pipeline::{Pipeline, Step};
use crate::preprocessing::{Scaler, ScalerType};
use crate::training::{Criterion, DecisionTreeClassifier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cross-validation and execution settings for a grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of cross-validation folds
    pub cv_folds: usize,

    /// Shuffle samples before assigning folds
    pub shuffle: bool,

    /// Keep class proportions in every fold
    pub stratified: bool,

    /// Seed for fold shuffling
    pub random_state: Option<u64>,

    /// Worker threads for candidate evaluation (1 = sequential, 0 = all cores)
    pub n_jobs: usize,

    /// Refit the best candidate on the full training data
    pub refit: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            shuffle: false,
            stratified: true,
            random_state: None,
            n_jobs: 1,
            refit: true,
        }
    }
}

impl SearchConfig {
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
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

    /// Splitter described by these settings
    pub fn cross_validator(&self) -> CrossValidator {
        let strategy = if self.stratified {
            CVStrategy::StratifiedKFold {
                n_splits: self.cv_folds,
                shuffle: self.shuffle,
            }
        } else {
            CVStrategy::KFold {
                n_splits: self.cv_folds,
                shuffle: self.shuffle,
            }
        };
        let cv = CrossValidator::new(strategy);
        match self.random_state {
            Some(seed) => cv.with_random_state(seed),
            None => cv,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(PipelineError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        Ok(())
    }
}

/// Where an experiment's data comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatasetSource {
    /// The bundled Iris dataset
    #[default]
    Iris,
    /// A headed CSV file with a label column
    Csv { path: PathBuf, target: String },
}

impl DatasetSource {
    pub fn load(&self) -> Result<Dataset> {
        match self {
            DatasetSource::Iris => Ok(load_iris()),
            DatasetSource::Csv { path, target } => Dataset::from_csv(path, Some(target.as_str())),
        }
    }
}

/// Shape of the scaler -> PCA -> decision tree pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSpec {
    pub scaler: ScalerType,

    /// Principal components to keep; `None` replaces PCA with passthrough
    pub pca_components: Option<usize>,

    pub max_depth: Option<usize>,

    pub criterion: Criterion,

    /// Log per-step fit times at info level
    pub verbose: bool,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            scaler: ScalerType::Standard,
            pca_components: Some(2),
            max_depth: None,
            criterion: Criterion::Gini,
            verbose: false,
        }
    }
}

impl PipelineSpec {
    /// Steps are named `scaler`, `pca` and `tree`
    pub fn build(&self) -> Result<Pipeline> {
        let pca = match self.pca_components {
            Some(k) => Step::transformer("pca", Pca::new(k)),
            None => Step::passthrough("pca"),
        };

        let mut tree = DecisionTreeClassifier::new().with_criterion(self.criterion);
        tree.max_depth = self.max_depth;

        Ok(Pipeline::new(vec![
            Step::transformer("scaler", Scaler::new(self.scaler)),
            pca,
            Step::estimator("tree", tree),
        ])?
        .with_verbose(self.verbose))
    }
}

/// A full experiment: data, hold-out split, pipeline and search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub dataset: DatasetSource,

    /// Fraction of samples held out for the final score
    pub test_size: f64,

    /// Seed for the train/test split
    pub random_state: Option<u64>,

    pub pipeline: PipelineSpec,

    /// Grid over `<step>__<param>` names; no grid skips the search
    pub param_grid: Option<ParameterGrid>,

    pub search: SearchConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetSource::Iris,
            test_size: 0.2,
            random_state: Some(42),
            pipeline: PipelineSpec::default(),
            param_grid: None,
            search: SearchConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a JSON config
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn with_param_grid(mut self, grid: ParameterGrid) -> Self {
        self.param_grid = Some(grid);
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.pipeline.pca_components == Some(0) {
            return Err(PipelineError::ConfigError(
                "pca_components must be at least 1".to_string(),
            ));
        }
        if let Some(grid) = &self.param_grid {
            grid.validate()
                .map_err(|e| PipelineError::ConfigError(format!("param_grid: {}", e)))?;
        }
        self.search.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn test_defaults() {
        let config = ExperimentConfig::default();
        assert_eq!(config.dataset, DatasetSource::Iris);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.search.cv_folds, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{
                "dataset": {"type": "csv", "path": "data.csv", "target": "label"},
                "pipeline": {"scaler": "minmax", "pca_components": null},
                "param_grid": {"tree__max_depth": [2, 3]}
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.dataset,
            DatasetSource::Csv {
                path: PathBuf::from("data.csv"),
                target: "label".to_string()
            }
        );
        assert_eq!(config.pipeline.scaler, ScalerType::MinMax);
        assert_eq!(config.pipeline.pca_components, None);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.param_grid.unwrap().len(), 2);
    }

    #[test]
    fn test_validation() {
        assert!(ExperimentConfig::default().with_test_size(1.5).validate().is_err());

        let mut config = ExperimentConfig::default();
        config.search.cv_folds = 1;
        assert!(matches!(config.validate(), Err(PipelineError::ConfigError(_))));

        let grid = ParameterGrid::new().add("tree__max_depth", Vec::<i64>::new());
        assert!(ExperimentConfig::default().with_param_grid(grid).validate().is_err());
    }

    #[test]
    fn test_build_pipeline() {
        let spec = PipelineSpec {
            max_depth: Some(3),
            ..PipelineSpec::default()
        };
        let pipe = spec.build().unwrap();
        assert_eq!(pipe.step_names(), vec!["scaler", "pca", "tree"]);
        let params = pipe.get_params();
        assert_eq!(params["tree__max_depth"], ParamValue::Int(3));
        assert_eq!(params["pca__n_components"], ParamValue::Int(2));

        let no_pca = PipelineSpec {
            pca_components: None,
            ..PipelineSpec::default()
        };
        assert_eq!(no_pca.build().unwrap().named_step("pca").unwrap().kind(), "passthrough");
    }

    #[test]
    fn test_cross_validator() {
        let cv = SearchConfig::default().with_stratified(false).with_cv_folds(3).cross_validator();
        assert_eq!(cv.strategy(), &CVStrategy::KFold { n_splits: 3, shuffle: false });
    }
}
