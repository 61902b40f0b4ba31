use crate::data::TobitData;
use crate::estimate::{EstimationError, OptimizerDiagnostics, WarmStart, estimate};
use crate::inference::{INTERCEPT_TERM, InferenceError, InferenceSummary, SCALE_TERM, summarize};
use crate::partition::{CensoringCode, ObservationCounts};
use crate::report::TobitReport;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the human-readable format of a fitted model when it is
// serialized to a TOML file.

/// Settings that control a fit. Missing keys in a TOML file take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Prepend a constant column to the design and report its coefficient as the intercept.
    pub fit_intercept: bool,
    /// BFGS stops once the gradient norm falls below this value.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Central-difference step for the observed information, measured as the
    /// shift it causes in the standardized residuals. Values above 0.25 are capped.
    pub hessian_step: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            fit_intercept: true,
            tolerance: 1e-6,
            max_iterations: 200,
            hessian_step: 1e-5,
        }
    }
}

impl FitConfig {
    /// Reads a configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        Ok(toml::from_str(&toml_string)?)
    }
}

/// Custom error type for model loading, saving, prediction and scoring.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Prediction data has {found} feature columns, but the model was trained on {expected}.")]
    MismatchedFeatureCount { found: usize, expected: usize },
    #[error("Scoring needs one response per row: {rows} rows but {responses} responses.")]
    MismatchedResponseLength { rows: usize, responses: usize },
    #[error("Cannot score a model on zero observations.")]
    EmptyScoringData,
}

/// An unfitted Tobit model: just its configuration.
#[derive(Debug, Clone, Default)]
pub struct TobitModel {
    pub config: FitConfig,
}

/// The result of a successful fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub config: FitConfig,
    pub response_name: String,
    /// Names of the raw feature columns, in design order (intercept excluded).
    pub feature_names: Vec<String>,
    /// Zero when the model was fitted without an intercept.
    pub intercept: f64,
    pub coefficients: Array1<f64>,
    pub sigma: f64,
    pub warm_start: WarmStart,
    pub counts: ObservationCounts,
    pub diagnostics: OptimizerDiagnostics,
}

/// Prepends a column of ones when `fit_intercept` is set.
pub fn design_matrix(features: ArrayView2<f64>, fit_intercept: bool) -> Array2<f64> {
    if !fit_intercept {
        return features.to_owned();
    }
    let mut design = Array2::<f64>::ones((features.nrows(), features.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(&features);
    design
}

/// Mean of `|y_true − y_pred|`.
pub fn mean_absolute_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    (&y_true - &y_pred).mapv(f64::abs).mean().unwrap_or(f64::NAN)
}

/// Mean of `(y_true − y_pred)²`.
pub fn mean_squared_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    (&y_true - &y_pred).mapv(|r| r * r).mean().unwrap_or(f64::NAN)
}

impl TobitModel {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Fits on raw features with generated names `x1, x2, ...` and response `y`.
    pub fn fit(
        &self,
        features: ArrayView2<f64>,
        response: ArrayView1<f64>,
        codes: &[CensoringCode],
    ) -> Result<FittedModel, EstimationError> {
        let names = (1..=features.ncols()).map(|j| format!("x{j}")).collect();
        self.fit_named(features, response, codes, "y", names)
    }

    /// Fits a dataset loaded from disk, keeping its column names.
    pub fn fit_dataset(&self, data: &TobitData) -> Result<FittedModel, EstimationError> {
        self.fit_named(
            data.x.view(),
            data.y.view(),
            &data.censoring,
            &data.response_name,
            data.feature_names.clone(),
        )
    }

    pub fn fit_named(
        &self,
        features: ArrayView2<f64>,
        response: ArrayView1<f64>,
        codes: &[CensoringCode],
        response_name: &str,
        feature_names: Vec<String>,
    ) -> Result<FittedModel, EstimationError> {
        if feature_names.len() != features.ncols() {
            return Err(EstimationError::FeatureNameMismatch {
                names: feature_names.len(),
                columns: features.ncols(),
            });
        }
        if let Some(name) = feature_names
            .iter()
            .find(|name| [INTERCEPT_TERM, SCALE_TERM].contains(&name.as_str()))
        {
            return Err(EstimationError::ReservedFeatureName(name.clone()));
        }

        let design = design_matrix(features, self.config.fit_intercept);
        let fit = estimate(design.view(), response, codes, &self.config)?;

        let p = design.ncols();
        let (intercept, coefficients) = if self.config.fit_intercept {
            (fit.params[0], fit.params.slice(s![1..p]).to_owned())
        } else {
            (0.0, fit.params.slice(s![..p]).to_owned())
        };
        let sigma = fit.params[p];

        log::info!(
            "Fitted '{}': intercept {:.4}, sigma {:.4}, converged: {}",
            response_name,
            intercept,
            sigma,
            fit.diagnostics.converged
        );

        Ok(FittedModel {
            config: self.config.clone(),
            response_name: response_name.to_string(),
            feature_names,
            intercept,
            coefficients,
            sigma,
            warm_start: fit.warm_start,
            counts: fit.counts,
            diagnostics: fit.diagnostics,
        })
    }
}

impl FittedModel {
    /// `intercept + features · coefficients` on raw (non-augmented) features.
    pub fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if features.ncols() != self.coefficients.len() {
            return Err(ModelError::MismatchedFeatureCount {
                found: features.ncols(),
                expected: self.coefficients.len(),
            });
        }
        Ok(features.dot(&self.coefficients) + self.intercept)
    }

    /// Mean absolute error of the predictions against `response`.
    pub fn score(&self, features: ArrayView2<f64>, response: ArrayView1<f64>) -> Result<f64, ModelError> {
        self.score_with(features, response, mean_absolute_error)
    }

    /// Scores the predictions with any `metric(y_true, y_pred)`.
    pub fn score_with<F>(
        &self,
        features: ArrayView2<f64>,
        response: ArrayView1<f64>,
        metric: F,
    ) -> Result<f64, ModelError>
    where
        F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> f64,
    {
        if features.nrows() != response.len() {
            return Err(ModelError::MismatchedResponseLength {
                rows: features.nrows(),
                responses: response.len(),
            });
        }
        if response.is_empty() {
            return Err(ModelError::EmptyScoringData);
        }
        let predictions = self.predict(features)?;
        Ok(metric(response, predictions.view()))
    }

    pub fn converged(&self) -> bool {
        self.diagnostics.converged
    }

    /// Log-likelihood at the reported optimum.
    pub fn log_likelihood(&self) -> f64 {
        -self.diagnostics.final_value
    }

    /// The full parameter vector `[β..., σ]`, ordered like the inverse-curvature matrix.
    pub fn parameters(&self) -> Array1<f64> {
        let mut params = Vec::with_capacity(self.coefficients.len() + 2);
        if self.config.fit_intercept {
            params.push(self.intercept);
        }
        params.extend(self.coefficients.iter().copied());
        params.push(self.sigma);
        Array1::from(params)
    }

    /// Labels of the coefficient rows: the intercept (when fitted) then the features.
    pub fn term_names(&self) -> Vec<String> {
        let intercept = self
            .config
            .fit_intercept
            .then(|| INTERCEPT_TERM.to_string());
        intercept
            .into_iter()
            .chain(self.feature_names.iter().cloned())
            .collect()
    }

    /// OLS coefficients of the warm start, split like the fitted ones.
    pub fn ols_coefficients(&self) -> ArrayView1<'_, f64> {
        let offset = usize::from(self.config.fit_intercept);
        self.warm_start.beta.slice(s![offset..])
    }

    pub fn inference(&self) -> Result<InferenceSummary, InferenceError> {
        summarize(
            &self.term_names(),
            self.parameters().view(),
            self.diagnostics.inverse_curvature.view(),
        )
    }

    pub fn report(&self) -> Result<TobitReport, InferenceError> {
        Ok(TobitReport::new(self, self.inference()?))
    }

    /// Saves the fitted model to a file in a human-readable TOML format.
    pub fn save(&self, path: &str) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads a fitted model from a TOML file.
    pub fn load(path: &str) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model = toml::from_str(&toml_string)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use tempfile::NamedTempFile;

    fn small_fit(config: FitConfig) -> FittedModel {
        // y* = 1 + 2x; the two lowest points are censored at 2.0.
        let x = array![[0.0], [0.5], [1.0], [1.5], [2.0], [2.5], [3.0], [3.5], [4.0], [4.5]];
        let y = array![2.0, 2.0, 3.1, 3.9, 5.2, 5.8, 7.1, 8.0, 8.9, 10.2];
        let mut codes = vec![CensoringCode::Uncensored; 10];
        codes[0] = CensoringCode::Left;
        codes[1] = CensoringCode::Left;
        TobitModel::new(config).fit(x.view(), y.view(), &codes).unwrap()
    }

    #[test]
    fn design_matrix_prepends_a_constant_column() {
        let features = array![[2.0, 3.0], [4.0, 5.0]];
        assert_eq!(
            design_matrix(features.view(), true),
            array![[1.0, 2.0, 3.0], [1.0, 4.0, 5.0]]
        );
        assert_eq!(design_matrix(features.view(), false), features);
    }

    #[test]
    fn metrics_match_hand_computation() {
        let truth = array![1.0, 2.0, 3.0];
        let pred = array![1.5, 2.0, 1.0];
        assert_relative_eq!(mean_absolute_error(truth.view(), pred.view()), 2.5 / 3.0);
        assert_relative_eq!(mean_squared_error(truth.view(), pred.view()), 4.25 / 3.0);
    }

    #[test]
    fn predict_includes_the_intercept() {
        let model = small_fit(FitConfig::default());
        let features = array![[0.0], [10.0]];
        let predictions = model.predict(features.view()).unwrap();
        assert_relative_eq!(predictions[0], model.intercept);
        assert_relative_eq!(predictions[1], model.intercept + 10.0 * model.coefficients[0]);
        assert!((model.coefficients[0] - 2.0).abs() < 0.3);
        assert!((model.intercept - 1.0).abs() < 0.5);
    }

    #[test]
    fn score_is_the_mean_absolute_error_of_predict() {
        let model = small_fit(FitConfig::default());
        let features = array![[1.0], [2.0], [3.0]];
        let response = array![3.0, 5.0, 7.5];
        let predictions = model.predict(features.view()).unwrap();
        let expected = mean_absolute_error(response.view(), predictions.view());

        assert_relative_eq!(model.score(features.view(), response.view()).unwrap(), expected);
        assert_relative_eq!(
            model
                .score_with(features.view(), response.view(), mean_squared_error)
                .unwrap(),
            mean_squared_error(response.view(), predictions.view())
        );
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let model = small_fit(FitConfig::default());
        let wide = array![[1.0, 2.0]];
        match model.predict(wide.view()) {
            Err(ModelError::MismatchedFeatureCount { found, expected }) => {
                assert_eq!((found, expected), (2, 1));
            }
            other => panic!("expected MismatchedFeatureCount, got {other:?}"),
        }
        assert!(matches!(
            model.score(array![[1.0], [2.0]].view(), array![1.0].view()),
            Err(ModelError::MismatchedResponseLength { rows: 2, responses: 1 })
        ));
    }

    #[test]
    fn no_intercept_fit_passes_through_the_origin() {
        let config = FitConfig {
            fit_intercept: false,
            ..FitConfig::default()
        };
        let model = small_fit(config);
        assert_eq!(model.intercept, 0.0);
        assert_eq!(model.parameters().len(), 2);
        assert_eq!(model.term_names(), vec!["x1".to_string()]);
        assert_eq!(model.ols_coefficients().len(), 1);
        let predictions = model.predict(array![[0.0]].view()).unwrap();
        assert_eq!(predictions[0], 0.0);
    }

    #[test]
    fn term_names_and_parameters_line_up() {
        let model = small_fit(FitConfig::default());
        assert_eq!(model.term_names(), vec!["const".to_string(), "x1".to_string()]);
        let params = model.parameters();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], model.intercept);
        assert_eq!(params[2], model.sigma);
        assert_eq!(model.ols_coefficients().len(), 1);

        let summary = model.inference().unwrap();
        assert_eq!(summary.terms().len(), 3);
        assert_eq!(summary.unavailable(), 0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let model = small_fit(FitConfig::default());
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        model.save(path).unwrap();
        let loaded = FittedModel::load(path).unwrap();

        assert_eq!(loaded.config, model.config);
        assert_eq!(loaded.feature_names, model.feature_names);
        assert_eq!(loaded.counts, model.counts);
        assert_relative_eq!(loaded.intercept, model.intercept);
        assert_relative_eq!(loaded.sigma, model.sigma);
        assert_eq!(loaded.coefficients, model.coefficients);
        assert_eq!(loaded.diagnostics.iterations, model.diagnostics.iterations);
        assert_eq!(
            loaded.diagnostics.inverse_curvature,
            model.diagnostics.inverse_curvature
        );

        let features = array![[1.25], [3.75]];
        assert_eq!(
            loaded.predict(features.view()).unwrap(),
            model.predict(features.view()).unwrap()
        );
    }

    #[test]
    fn partial_config_files_fall_back_to_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_iterations = 50\nfit_intercept = false").unwrap();
        let config = FitConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.max_iterations, 50);
        assert!(!config.fit_intercept);
        assert_eq!(config.tolerance, FitConfig::default().tolerance);
        assert_eq!(config.hessian_step, FitConfig::default().hessian_step);
    }

    #[test]
    fn feature_names_must_match_the_columns() {
        let err = TobitModel::default()
            .fit_named(
                array![[1.0, 2.0], [3.0, 4.0]].view(),
                array![1.0, 2.0].view(),
                &[CensoringCode::Uncensored; 2],
                "y",
                vec!["only_one".to_string()],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EstimationError::FeatureNameMismatch { names: 1, columns: 2 }
        ));
    }

    #[test]
    fn summary_labels_cannot_be_reused_as_feature_names() {
        for reserved in ["const", "sigma"] {
            let err = TobitModel::default()
                .fit_named(
                    array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]].view(),
                    array![1.0, 2.0, 4.0].view(),
                    &[CensoringCode::Uncensored; 3],
                    "y",
                    vec!["x".to_string(), reserved.to_string()],
                )
                .unwrap_err();
            match err {
                EstimationError::ReservedFeatureName(name) => assert_eq!(name, reserved),
                other => panic!("expected ReservedFeatureName, got {other:?}"),
            }
        }
    }
}
