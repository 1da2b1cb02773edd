//! CSV loading via polars

use super::Dataset;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::{CsvReadOptions, DataFrame, DataType, SerReader};
use std::collections::BTreeSet;
use std::path::Path;

impl Dataset {
    /// Load a headed CSV file. Every column other than `target` becomes a
    /// feature and must be numeric. A string target is label-encoded in
    /// sorted order; a numeric target is used as-is.
    pub fn from_csv(path: impl AsRef<Path>, target: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        if let Some(name) = target {
            if !columns.iter().any(|c| c == name) {
                return Err(PipelineError::DataError(format!(
                    "target column '{}' not found in {}",
                    name,
                    path.display()
                )));
            }
        }

        let feature_names: Vec<String> = columns
            .into_iter()
            .filter(|c| Some(c.as_str()) != target)
            .collect();
        if feature_names.is_empty() {
            return Err(PipelineError::DataError(format!(
                "{} has no feature columns",
                path.display()
            )));
        }

        let data = columns_to_array2(&df, &feature_names)?;
        let (target, target_names) = match target {
            Some(name) => {
                let (values, names) = encode_target(&df, name)?;
                (Some(values), names)
            }
            None => (None, Vec::new()),
        };

        tracing::debug!(
            path = %path.display(),
            rows = data.nrows(),
            features = data.ncols(),
            "Loaded CSV dataset"
        );

        Ok(Dataset {
            data,
            target,
            feature_names,
            target_names,
        })
    }
}

/// Extract named columns from a DataFrame into a row-major Array2<f64>
fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| numeric_column(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PipelineError::DataError(format!(
                    "column '{}' has a missing or non-numeric value at row {}",
                    name, row
                ))
            })
        })
        .collect()
}

/// Labels as f64 plus class names. Strings map to their index in sorted order.
fn encode_target(df: &DataFrame, name: &str) -> Result<(Array1<f64>, Vec<String>)> {
    let column = df.column(name)?;
    if column.dtype() != &DataType::String {
        let values = numeric_column(df, name)?;
        return Ok((Array1::from_vec(values), Vec::new()));
    }

    let labels: Vec<&str> = column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PipelineError::DataError(format!("target column '{}' is missing a value at row {}", name, row))
            })
        })
        .collect::<Result<Vec<&str>>>()?;

    let classes: Vec<String> = labels
        .iter()
        .map(|s| s.to_string())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    let values = labels
        .iter()
        .map(|label| {
            classes
                .binary_search_by(|c| c.as_str().cmp(label))
                .map(|idx| idx as f64)
                .map_err(|_| PipelineError::DataError(format!("unknown label '{}'", label)))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok((Array1::from_vec(values), classes))
}
