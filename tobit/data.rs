//! # Data Loading and Validation Module
//!
//! Reads tab-separated files with a header row and turns them into the
//! `ndarray` structures the estimator works on.
//!
//! - Training files carry a response column and a censoring column (integer
//!   codes `-1`, `0`, `1`). Every other column is a feature, kept in file order.
//! - Prediction files only need the feature columns a fitted model names; the
//!   response is read as well when the caller asks for it (scoring).
//! - Failures are assumed to be user-input errors. The `DataError` enum is
//!   designed to say which column is at fault and why.

use crate::partition::{CensoringCode, PartitionError};
use ndarray::{Array1, Array2, ShapeBuilder};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Validated training data.
#[derive(Debug)]
pub struct TobitData {
    pub response_name: String,
    /// Feature column names in file order.
    pub feature_names: Vec<String>,
    /// Raw features, shape `[n_samples, feature_names.len()]`. No intercept column.
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub censoring: Vec<CensoringCode>,
}

/// Validated data for prediction or scoring.
#[derive(Debug)]
pub struct PredictionData {
    /// Features in the order the model was trained on.
    pub x: Array2<f64>,
    /// Present only when a response column was requested.
    pub y: Option<Array1<f64>>,
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("Invalid censoring value {value} in column '{column_name}' at data row {row}: {source}")]
    InvalidCensoringCode {
        column_name: String,
        row: usize,
        value: f64,
        #[source]
        source: PartitionError,
    },
    #[error("The input file has no data rows.")]
    EmptyFile,
    #[error(
        "No feature columns were found. Every column other than '{response}' and '{censoring}' is treated as a feature."
    )]
    NoFeatureColumns { response: String, censoring: String },
}

/// Loads and validates a training file.
pub fn load_training_data(
    path: &str,
    response_column: &str,
    censoring_column: &str,
) -> Result<TobitData, DataError> {
    let df = internal::read_tsv(path)?;
    let columns = internal::column_names(&df);

    for required in [response_column, censoring_column] {
        if !columns.iter().any(|c| c == required) {
            return Err(DataError::ColumnNotFound(required.to_string()));
        }
    }

    let feature_names: Vec<String> = columns
        .into_iter()
        .filter(|c| c != response_column && c != censoring_column)
        .collect();
    if feature_names.is_empty() {
        return Err(DataError::NoFeatureColumns {
            response: response_column.to_string(),
            censoring: censoring_column.to_string(),
        });
    }

    let y = Array1::from_vec(internal::extract_numeric_column(&df, response_column)?);
    let censoring = internal::extract_censoring_column(&df, censoring_column)?;
    let x = internal::extract_feature_matrix(&df, &feature_names)?;

    log::info!(
        "Loaded {} observations with {} features from '{}'.",
        y.len(),
        feature_names.len(),
        path
    );

    Ok(TobitData {
        response_name: response_column.to_string(),
        feature_names,
        x,
        y,
        censoring,
    })
}

/// Loads the named feature columns (and optionally a response) for prediction.
///
/// Columns not named are ignored, so a training file can be scored directly.
pub fn load_prediction_data(
    path: &str,
    feature_names: &[String],
    response_column: Option<&str>,
) -> Result<PredictionData, DataError> {
    let df = internal::read_tsv(path)?;
    let columns = internal::column_names(&df);

    let required = feature_names.iter().map(String::as_str).chain(response_column);
    for name in required {
        if !columns.iter().any(|c| c == name) {
            return Err(DataError::ColumnNotFound(name.to_string()));
        }
    }

    let x = internal::extract_feature_matrix(&df, feature_names)?;
    let y = response_column
        .map(|name| internal::extract_numeric_column(&df, name).map(Array1::from_vec))
        .transpose()?;

    log::info!("Loaded {} rows for prediction from '{}'.", x.nrows(), path);
    Ok(PredictionData { x, y })
}

/// Internal module for shared data loading logic.
mod internal {
    use super::*;

    pub(super) fn read_tsv(path: &str) -> Result<DataFrame, DataError> {
        log::debug!("Reading '{path}'");
        let df = CsvReader::new(File::open(Path::new(path))?)
            .with_options(
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
            )
            .finish()?;
        if df.height() == 0 {
            return Err(DataError::EmptyFile);
        }
        Ok(df)
    }

    pub(super) fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|c| c.to_string()).collect()
    }

    pub(super) fn extract_numeric_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<f64>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let wrong_type = || DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        };
        if matches!(series.dtype(), DataType::String) {
            return Err(wrong_type());
        }
        let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
        if casted.null_count() > 0 {
            return Err(wrong_type());
        }

        let values: Vec<f64> = casted.f64()?.rechunk().into_no_null_iter().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(values)
    }

    pub(super) fn extract_censoring_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<CensoringCode>, DataError> {
        extract_numeric_column(df, column_name)?
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                // Fractional values are mapped to a code no observation can carry.
                let integral = if value.fract() == 0.0 { value as i64 } else { i64::MIN };
                CensoringCode::try_from(integral).map_err(|source| DataError::InvalidCensoringCode {
                    column_name: column_name.to_string(),
                    row: i + 1,
                    value,
                    source,
                })
            })
            .collect()
    }

    pub(super) fn extract_feature_matrix(
        df: &DataFrame,
        names: &[String],
    ) -> Result<Array2<f64>, DataError> {
        let n = df.height();
        let mut buffer = Vec::with_capacity(n * names.len());
        for name in names {
            buffer.extend(extract_numeric_column(df, name)?);
        }
        // Columns were appended one after another, so the buffer is column-major.
        Array2::from_shape_vec((n, names.len()).f(), buffer).map_err(|e| {
            DataError::PolarsError(PolarsError::ShapeMismatch(e.to_string().into()))
        })
    }
}
