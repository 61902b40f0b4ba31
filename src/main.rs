use clap::{Parser, Subcommand, ValueEnum};
use std::process;
use tobit::{
    FitConfig, FittedModel, TobitModel, load_prediction_data, load_training_data,
    mean_absolute_error, mean_squared_error,
};

#[derive(Parser)]
#[command(
    name = "tobit",
    about = "Fit and apply censored (Tobit) linear regression models",
    long_about = "Estimates a linear regression whose response is left- or right-censored for some \
                 observations, by maximum likelihood. Input files are tab-separated with a header row."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Metric {
    /// Mean absolute error
    Mae,
    /// Mean squared error
    Mse,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model, print the regression report and save the model
    #[command(about = "Fit a Tobit model (outputs: model.toml)")]
    Fit {
        /// Path to a TSV file with the response, censoring and feature columns
        data: String,

        /// Name of the response column
        #[arg(long, default_value = "y")]
        response: String,

        /// Name of the censoring column (-1 left, 0 none, 1 right)
        #[arg(long, default_value = "censoring")]
        censoring: String,

        /// Fit without an intercept term
        #[arg(long)]
        no_intercept: bool,

        /// Maximum number of BFGS iterations
        #[arg(long, value_name = "N")]
        max_iter: Option<usize>,

        /// Gradient-norm tolerance for BFGS
        #[arg(long)]
        tolerance: Option<f64>,

        /// TOML file with fit settings; the flags above override it
        #[arg(long)]
        config: Option<String>,

        /// Where to save the fitted model
        #[arg(long, default_value = "model.toml")]
        output: String,
    },

    /// Apply a fitted model to new data
    #[command(about = "Predict with a fitted model (outputs: predictions.tsv)")]
    Predict {
        /// Path to a TSV file containing the model's feature columns
        data: String,

        /// Path to a fitted model file (.toml)
        #[arg(long)]
        model: String,

        /// Where to write the predictions
        #[arg(long, default_value = "predictions.tsv")]
        output: String,
    },

    /// Score a fitted model against observed responses
    Score {
        /// Path to a TSV file containing the model's feature columns and the response
        data: String,

        /// Path to a fitted model file (.toml)
        #[arg(long)]
        model: String,

        /// Name of the response column (defaults to the one the model was fitted on)
        #[arg(long)]
        response: Option<String>,

        #[arg(long, value_enum, default_value_t = Metric::Mae)]
        metric: Metric,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fit {
            data,
            response,
            censoring,
            no_intercept,
            max_iter,
            tolerance,
            config,
            output,
        } => {
            let overrides = FitOverrides {
                no_intercept,
                max_iter,
                tolerance,
            };
            fit_command(&data, &response, &censoring, config.as_deref(), overrides, &output)
        }
        Commands::Predict {
            data,
            model,
            output,
        } => predict_command(&data, &model, &output),
        Commands::Score {
            data,
            model,
            response,
            metric,
        } => score_command(&data, &model, response.as_deref(), metric),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Command-line settings that take precedence over a config file.
struct FitOverrides {
    no_intercept: bool,
    max_iter: Option<usize>,
    tolerance: Option<f64>,
}

fn fit_config(path: Option<&str>, overrides: FitOverrides) -> Result<FitConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => FitConfig::load(path)?,
        None => FitConfig::default(),
    };
    if overrides.no_intercept {
        config.fit_intercept = false;
    }
    if let Some(max_iter) = overrides.max_iter {
        config.max_iterations = max_iter;
    }
    if let Some(tolerance) = overrides.tolerance {
        config.tolerance = tolerance;
    }
    Ok(config)
}

fn fit_command(
    data_path: &str,
    response: &str,
    censoring: &str,
    config_path: Option<&str>,
    overrides: FitOverrides,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = fit_config(config_path, overrides)?;
    let data = load_training_data(data_path, response, censoring)?;

    let model = TobitModel::new(config).fit_dataset(&data)?;
    println!("{}", model.report()?);

    model.save(output)?;
    log::info!("Model saved to: {output}");
    Ok(())
}

fn predict_command(data_path: &str, model_path: &str, output: &str) -> Result<(), Box<dyn std::error::Error>> {
    let model = FittedModel::load(model_path)?;
    let data = load_prediction_data(data_path, &model.feature_names, None)?;
    let predictions = model.predict(data.x.view())?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output)?;
    writer.write_record(["prediction"])?;
    for prediction in predictions.iter() {
        writer.write_record([prediction.to_string()])?;
    }
    writer.flush()?;

    log::info!("Wrote {} predictions to: {output}", predictions.len());
    Ok(())
}

fn score_command(
    data_path: &str,
    model_path: &str,
    response: Option<&str>,
    metric: Metric,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = FittedModel::load(model_path)?;
    let response = response.unwrap_or(&model.response_name);
    let data = load_prediction_data(data_path, &model.feature_names, Some(response))?;
    let y = data
        .y
        .ok_or_else(|| format!("response column '{response}' was not loaded"))?;

    let (label, value) = match metric {
        Metric::Mae => ("MAE", model.score_with(data.x.view(), y.view(), mean_absolute_error)?),
        Metric::Mse => ("MSE", model.score_with(data.x.view(), y.view(), mean_squared_error)?),
    };
    println!("{label}: {value:.6}");
    Ok(())
}
