//! Pipeline of named transformer steps ending in an estimator
//!
//! A [`Pipeline`] fits each transformer on the output of the previous one and
//! hands the final matrix to the last step. At prediction time the learned
//! transformations are replayed in order without refitting.
//!
//! Step parameters are reachable from outside as `<step>__<param>`, which is
//! what lets [`GridSearchCV`](crate::model_selection::GridSearchCV) tune a whole
//! pipeline as a single estimator.

mod step;

pub use step::{Component, Step, PASSTHROUGH};

use crate::error::{PipelineError, Result};
use crate::estimator::{check_n_features, check_xy, Estimator, Transformer};
use crate::params::{qualify, split_qualified, unknown_param, ParamValue, Params, PARAM_SEPARATOR};
use ndarray::{Array1, Array2};
use std::any::Any;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Parameter names owned by the pipeline itself
const RESERVED_NAMES: [&str; 2] = ["verbose", "steps"];

/// Ordered sequence of named steps
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Step>,
    verbose: bool,
    is_fitted: bool,
    n_features_in: Option<usize>,
}

impl Pipeline {
    /// Build a pipeline, validating step names and step kinds
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(PipelineError::InvalidPipeline(
                "pipeline must contain at least one step".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            validate_name(&step.name)?;
            if !seen.insert(step.name.as_str()) {
                return Err(PipelineError::InvalidPipeline(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }

        for step in &steps[..steps.len() - 1] {
            if !step.component.is_transformer() {
                return Err(PipelineError::InvalidPipeline(format!(
                    "step '{}' ({}) is not a transformer; only the final step may be an estimator",
                    step.name,
                    step.component.kind()
                )));
            }
        }

        Ok(Self {
            steps,
            verbose: false,
            is_fitted: false,
            n_features_in: None,
        })
    }

    /// Log each step's fit time at info level instead of debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn kind(&self) -> &'static str {
        "pipeline"
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Number of input features seen during the last fit
    pub fn n_features_in(&self) -> Option<usize> {
        self.n_features_in
    }

    /// Look up a step's component by name
    pub fn named_step(&self, name: &str) -> Option<&Component> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.component)
    }

    /// Look up a step and downcast it to its concrete type
    pub fn named_step_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.named_step(name)?.as_any()?.downcast_ref::<T>()
    }

    /// Fit every step in order. The final step must be an estimator.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        self.final_estimator()?;
        self.is_fitted = false;

        let start = Instant::now();
        let xt = self.fit_transformers(x, Some(y))?;

        let verbose = self.verbose;
        let last = self.last_step_mut()?;
        let step_start = Instant::now();
        match &mut last.component {
            Component::Estimator(est) => est.fit(&xt, y)?,
            _ => return Err(not_an_estimator(last)),
        }
        log_step(verbose, &last.name, step_start.elapsed());

        self.n_features_in = Some(x.ncols());
        self.is_fitted = true;
        debug!(
            steps = self.steps.len(),
            n_samples = x.nrows(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Pipeline fitted"
        );
        Ok(self)
    }

    /// Transform through the fitted steps and predict with the final estimator
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let estimator = self.final_estimator()?;
        let xt = self.transform_through(x)?;
        estimator.predict(&xt)
    }

    /// Class probabilities from the final estimator
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let estimator = self.final_estimator()?;
        let xt = self.transform_through(x)?;
        estimator.predict_proba(&xt)
    }

    /// Score of the final estimator on transformed data
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        check_xy(x, y)?;
        let estimator = self.final_estimator()?;
        let xt = self.transform_through(x)?;
        estimator.score(&xt, y)
    }

    /// Fit, then predict on the same data
    pub fn fit_predict(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
        self.fit(x, y)?;
        self.predict(x)
    }

    /// Fit every step and return the output of the last one. Every step,
    /// including the last, must be a transformer.
    pub fn fit_transform(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        if let Some(y) = y {
            check_xy(x, y)?;
        }
        self.check_final_transformer()?;
        self.is_fitted = false;

        let xt = self.fit_transformers(x, y)?;

        let verbose = self.verbose;
        let last = self.last_step_mut()?;
        let step_start = Instant::now();
        let output = match &mut last.component {
            Component::Transformer(t) => t.fit_transform(&xt, y)?,
            Component::Passthrough => xt.into_owned(),
            Component::Estimator(_) => return Err(not_a_transformer(last)),
        };
        log_step(verbose, &last.name, step_start.elapsed());

        self.n_features_in = Some(x.ncols());
        self.is_fitted = true;
        Ok(output)
    }

    /// Apply every fitted step. Every step, including the last, must be a
    /// transformer.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_final_transformer()?;
        let xt = self.transform_through(x)?;
        match self.steps.last().map(|s| &s.component) {
            Some(Component::Transformer(t)) => t.transform(&xt),
            _ => Ok(xt.into_owned()),
        }
    }

    /// Set a parameter by qualified name.
    ///
    /// `<step>__<param>` is forwarded to the step, `<step>` set to
    /// `"passthrough"` replaces the step with the identity transform, and
    /// `verbose` toggles step timing logs.
    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        if let Some((step_name, rest)) = split_qualified(name) {
            let step = self
                .steps
                .iter_mut()
                .find(|s| s.name == step_name)
                .ok_or_else(|| unknown_param("Pipeline", name, &value))?;
            return step.component.set_param(rest, value).map_err(|e| match e {
                PipelineError::InvalidParameter { value, reason, .. } => PipelineError::InvalidParameter {
                    name: name.to_string(),
                    value,
                    reason,
                },
                other => other,
            });
        }

        if name == "verbose" {
            self.verbose = value.to_bool(name)?;
            return Ok(());
        }

        let Some(index) = self.steps.iter().position(|s| s.name == name) else {
            return Err(unknown_param("Pipeline", name, &value));
        };
        if value.as_str() != Some(PASSTHROUGH) {
            return Err(PipelineError::invalid_param(
                name,
                &value,
                format!("a step can only be replaced with \"{}\"", PASSTHROUGH),
            ));
        }
        self.steps[index].component = Component::Passthrough;
        self.is_fitted = false;
        Ok(())
    }

    /// Set several parameters, stopping at the first failure
    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value.clone())?;
        }
        Ok(())
    }

    /// Every step parameter under its qualified name, plus `verbose`
    pub fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("verbose".to_string(), ParamValue::Bool(self.verbose));
        for step in &self.steps {
            for (name, value) in step.component.get_params() {
                params.insert(qualify(&step.name, &name), value);
            }
        }
        params
    }

    fn last_step_mut(&mut self) -> Result<&mut Step> {
        self.steps
            .last_mut()
            .ok_or_else(|| PipelineError::InvalidPipeline("pipeline has no steps".to_string()))
    }

    fn final_estimator(&self) -> Result<&dyn Estimator> {
        match self.steps.last() {
            Some(Step {
                component: Component::Estimator(est),
                ..
            }) => Ok(est.as_ref()),
            Some(step) => Err(not_an_estimator(step)),
            None => Err(PipelineError::InvalidPipeline("pipeline has no steps".to_string())),
        }
    }

    fn check_final_transformer(&self) -> Result<()> {
        match self.steps.last() {
            Some(step) if !step.component.is_transformer() => Err(not_a_transformer(step)),
            _ => Ok(()),
        }
    }

    /// Fit all steps before the last, returning the matrix the last step sees
    fn fit_transformers<'a>(
        &mut self,
        x: &'a Array2<f64>,
        y: Option<&Array1<f64>>,
    ) -> Result<Cow<'a, Array2<f64>>> {
        let verbose = self.verbose;
        let n_steps = self.steps.len();
        let mut current = Cow::Borrowed(x);

        for step in &mut self.steps[..n_steps.saturating_sub(1)] {
            let step_start = Instant::now();
            match &mut step.component {
                Component::Transformer(t) => {
                    current = Cow::Owned(t.fit_transform(&current, y)?);
                }
                Component::Passthrough => {}
                Component::Estimator(_) => return Err(not_a_transformer(step)),
            }
            log_step(verbose, &step.name, step_start.elapsed());
        }
        Ok(current)
    }

    /// Replay the fitted steps before the last
    fn transform_through<'a>(&self, x: &'a Array2<f64>) -> Result<Cow<'a, Array2<f64>>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("Pipeline".to_string()));
        }
        if let Some(n_features) = self.n_features_in {
            check_n_features(x, n_features)?;
        }

        let mut current = Cow::Borrowed(x);
        for step in &self.steps[..self.steps.len().saturating_sub(1)] {
            match &step.component {
                Component::Transformer(t) => current = Cow::Owned(t.transform(&current)?),
                Component::Passthrough => {}
                Component::Estimator(_) => return Err(not_a_transformer(step)),
            }
        }
        Ok(current)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PipelineError::InvalidPipeline("step names must not be empty".to_string()));
    }
    if name.contains(PARAM_SEPARATOR) {
        return Err(PipelineError::InvalidPipeline(format!(
            "step name '{}' must not contain '{}'",
            name, PARAM_SEPARATOR
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(PipelineError::InvalidPipeline(format!(
            "step name '{}' conflicts with a pipeline parameter",
            name
        )));
    }
    Ok(())
}

fn not_an_estimator(step: &Step) -> PipelineError {
    PipelineError::InvalidPipeline(format!(
        "final step '{}' ({}) is not an estimator",
        step.name,
        step.component.kind()
    ))
}

fn not_a_transformer(step: &Step) -> PipelineError {
    PipelineError::InvalidPipeline(format!(
        "step '{}' ({}) is not a transformer",
        step.name,
        step.component.kind()
    ))
}

fn log_step(verbose: bool, step: &str, elapsed: Duration) {
    let elapsed_secs = elapsed.as_secs_f64();
    if verbose {
        info!(step, elapsed_secs, "Pipeline step fitted");
    } else {
        debug!(step, elapsed_secs, "Pipeline step fitted");
    }
}

/// Build a pipeline whose step names are derived from the component kinds.
///
/// Repeated kinds get `-1`, `-2`, ... suffixes in order of appearance.
pub fn make_pipeline(components: Vec<Component>) -> Result<Pipeline> {
    let mut totals: HashMap<&'static str, usize> = HashMap::new();
    for component in &components {
        *totals.entry(component.kind()).or_default() += 1;
    }

    let mut seen: HashMap<&'static str, usize> = HashMap::new();
    let steps = components
        .into_iter()
        .map(|component| {
            let kind = component.kind();
            let name = if totals[&kind] > 1 {
                let n = seen.entry(kind).or_default();
                *n += 1;
                format!("{}-{}", kind, n)
            } else {
                kind.to_string()
            };
            Step::new(name, component)
        })
        .collect();

    Pipeline::new(steps)
}

impl Estimator for Pipeline {
    fn kind(&self) -> &'static str {
        Pipeline::kind(self)
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        Pipeline::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Pipeline::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Pipeline::predict_proba(self, x)
    }

    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        Pipeline::score(self, x, y)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn get_params(&self) -> Params {
        Pipeline::get_params(self)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        Pipeline::set_param(self, name, value)
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Transformer for Pipeline {
    fn kind(&self) -> &'static str {
        Pipeline::kind(self)
    }

    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<()> {
        Pipeline::fit_transform(self, x, y).map(|_| ())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Pipeline::transform(self, x)
    }

    fn fit_transform(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        Pipeline::fit_transform(self, x, y)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn get_params(&self) -> Params {
        Pipeline::get_params(self)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        Pipeline::set_param(self, name, value)
    }

    fn box_clone(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
