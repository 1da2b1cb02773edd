//! Parameter grids for exhaustive search

use crate::error::{PipelineError, Result};
use crate::params::{ParamValue, Params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candidate values per qualified parameter name.
///
/// Keys iterate in lexical order and the last key varies fastest, so the
/// candidate order is fully determined by the grid's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the candidate values for one parameter
    pub fn add<V: Into<ParamValue>>(mut self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.params
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Parameter names in iteration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn values(&self, name: &str) -> Option<&[ParamValue]> {
        self.params.get(name).map(Vec::as_slice)
    }

    /// Number of candidate combinations (1 for an empty grid)
    pub fn len(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject parameters without candidate values
    pub fn validate(&self) -> Result<()> {
        for (name, values) in &self.params {
            if values.is_empty() {
                return Err(PipelineError::invalid_param(
                    name,
                    "[]",
                    "parameter grid entries need at least one candidate value",
                ));
            }
        }
        Ok(())
    }

    /// Every combination, last key varying fastest
    pub fn candidates(&self) -> Result<Vec<Params>> {
        self.validate()?;

        let mut candidates = vec![Params::new()];
        for (name, values) in &self.params {
            candidates = candidates
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(candidates)
    }
}
