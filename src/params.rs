//! Hyperparameter values and qualified parameter names
//!
//! Step parameters are addressed from outside a pipeline as
//! `<step>__<param>`. Nested pipelines keep the same convention, so
//! `outer__inner__param` reaches `param` on step `inner` of step `outer`.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between a step name and the parameter it owns
pub const PARAM_SEPARATOR: &str = "__";

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Unset / unlimited (e.g. `max_depth = None`)
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Parameters keyed by (possibly qualified) name, in lexical order
pub type Params = BTreeMap<String, ParamValue>;

impl ParamValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }

    /// Non-negative integer, or an `InvalidParameter` error naming `name`
    pub fn to_usize(&self, name: &str) -> Result<usize> {
        self.as_int()
            .filter(|v| *v >= 0)
            .map(|v| v as usize)
            .ok_or_else(|| PipelineError::invalid_param(name, self, "expected a non-negative integer"))
    }

    /// Like [`to_usize`](Self::to_usize) but `None` maps to `Option::None`
    pub fn to_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        if self.is_none() {
            Ok(None)
        } else {
            self.to_usize(name).map(Some)
        }
    }

    pub fn to_u64(&self, name: &str) -> Result<u64> {
        self.to_usize(name).map(|v| v as u64)
    }

    pub fn to_bool(&self, name: &str) -> Result<bool> {
        self.as_bool()
            .ok_or_else(|| PipelineError::invalid_param(name, self, "expected a boolean"))
    }

    pub fn to_f64(&self, name: &str) -> Result<f64> {
        self.as_float()
            .ok_or_else(|| PipelineError::invalid_param(name, self, "expected a number"))
    }

    pub fn to_str(&self, name: &str) -> Result<&str> {
        self.as_str()
            .ok_or_else(|| PipelineError::invalid_param(name, self, "expected a string"))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::None => write!(f, "None"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::None, Into::into)
    }
}

/// Split `step__param` into `("step", "param")`. Only the first separator
/// splits, so the remainder may itself be qualified.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once(PARAM_SEPARATOR)
        .filter(|(step, rest)| !step.is_empty() && !rest.is_empty())
}

/// Join a step name and a parameter name
pub fn qualify(step: &str, param: &str) -> String {
    format!("{}{}{}", step, PARAM_SEPARATOR, param)
}

/// Error for a parameter name a step does not own
pub fn unknown_param(owner: &str, name: &str, value: &ParamValue) -> PipelineError {
    PipelineError::invalid_param(name, value, format!("unknown parameter for {}", owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("pca__n_components"), Some(("pca", "n_components")));
        assert_eq!(
            split_qualified("outer__inner__max_depth"),
            Some(("outer", "inner__max_depth"))
        );
        assert_eq!(split_qualified("max_depth"), None);
        assert_eq!(split_qualified("__x"), None);
        assert_eq!(split_qualified("x__"), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(ParamValue::Int(3).to_usize("k").unwrap(), 3);
        assert_eq!(ParamValue::Float(2.0).to_usize("k").unwrap(), 2);
        assert!(ParamValue::Float(2.5).to_usize("k").is_err());
        assert!(ParamValue::Int(-1).to_usize("k").is_err());
        assert_eq!(ParamValue::None.to_opt_usize("k").unwrap(), None);
        assert_eq!(ParamValue::Int(4).to_opt_usize("k").unwrap(), Some(4));
        assert!(ParamValue::Str("gini".into()).to_bool("k").is_err());
    }

    #[test]
    fn test_untagged_json() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[null, true, 3, 0.5, "gini"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::None,
                ParamValue::Bool(true),
                ParamValue::Int(3),
                ParamValue::Float(0.5),
                ParamValue::Str("gini".to_string()),
            ]
        );
    }

    #[test]
    fn test_from_option() {
        assert_eq!(ParamValue::from(Some(3usize)), ParamValue::Int(3));
        assert_eq!(ParamValue::from(None::<usize>), ParamValue::None);
    }
}
