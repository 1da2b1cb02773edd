//! Named pipeline steps

use crate::error::Result;
use crate::estimator::{Estimator, Transformer};
use crate::params::{unknown_param, ParamValue, Params};
use std::any::Any;

/// Value that replaces a step with the identity transform via `set_param`
pub const PASSTHROUGH: &str = "passthrough";

/// The object behind a step
#[derive(Debug, Clone)]
pub enum Component {
    Transformer(Box<dyn Transformer>),
    Estimator(Box<dyn Estimator>),
    /// Identity transform
    Passthrough,
}

impl Component {
    pub fn transformer(t: impl Transformer + 'static) -> Self {
        Component::Transformer(Box::new(t))
    }

    pub fn estimator(e: impl Estimator + 'static) -> Self {
        Component::Estimator(Box::new(e))
    }

    /// Kind name used for auto-naming and logging
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Transformer(t) => t.kind(),
            Component::Estimator(e) => e.kind(),
            Component::Passthrough => PASSTHROUGH,
        }
    }

    /// True for anything that can sit before the final step
    pub fn is_transformer(&self) -> bool {
        !matches!(self, Component::Estimator(_))
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Component::Transformer(t) => t.is_fitted(),
            Component::Estimator(e) => e.is_fitted(),
            Component::Passthrough => true,
        }
    }

    pub fn get_params(&self) -> Params {
        match self {
            Component::Transformer(t) => t.get_params(),
            Component::Estimator(e) => e.get_params(),
            Component::Passthrough => Params::new(),
        }
    }

    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match self {
            Component::Transformer(t) => t.set_param(name, value),
            Component::Estimator(e) => e.set_param(name, value),
            Component::Passthrough => Err(unknown_param(PASSTHROUGH, name, &value)),
        }
    }

    pub fn as_any(&self) -> Option<&dyn Any> {
        match self {
            Component::Transformer(t) => Some(t.as_any()),
            Component::Estimator(e) => Some(e.as_any()),
            Component::Passthrough => None,
        }
    }
}

/// A named component of a pipeline
#[derive(Debug, Clone)]
pub struct Step {
    pub(crate) name: String,
    pub(crate) component: Component,
}

impl Step {
    pub fn new(name: impl Into<String>, component: Component) -> Self {
        Self {
            name: name.into(),
            component,
        }
    }

    pub fn transformer(name: impl Into<String>, t: impl Transformer + 'static) -> Self {
        Self::new(name, Component::transformer(t))
    }

    pub fn estimator(name: impl Into<String>, e: impl Estimator + 'static) -> Self {
        Self::new(name, Component::estimator(e))
    }

    pub fn passthrough(name: impl Into<String>) -> Self {
        Self::new(name, Component::Passthrough)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}
