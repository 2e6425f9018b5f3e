use clap::{Parser, Subcommand};
use crimesafe::{
    config::Config,
    data::{load_incident_file, CsvAggregationSource},
    ml::ArtifactMetadata,
    pipeline::Trainer,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crimesafe-train")]
#[command(about = "CrimeSafe offline training pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both models and write artifacts
    Train {
        /// Monthly aggregation table (CSV); overrides the configured path
        #[arg(long)]
        aggregations: Option<PathBuf>,

        /// Location metadata table (CSV); overrides the configured path
        #[arg(long)]
        locations: Option<PathBuf>,

        /// Raw incident file (CSV); overrides the configured path
        #[arg(long)]
        incidents: Option<PathBuf>,

        /// Output directory for artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Training years, comma separated (e.g. 2020,2021,2022,2023)
        #[arg(long, value_delimiter = ',')]
        train_years: Option<Vec<i32>>,

        /// Held-out test year
        #[arg(long)]
        test_year: Option<i32>,
    },

    /// Print the metadata of the last training run
    Inspect {
        /// Artifact output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crimesafe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Train {
            aggregations,
            locations,
            incidents,
            output,
            train_years,
            test_year,
        } => {
            if let Some(path) = aggregations {
                config.training.aggregations_path = path;
            }
            if let Some(path) = locations {
                config.training.locations_path = path;
            }
            if let Some(path) = incidents {
                config.training.incidents_path = path;
            }
            if let Some(years) = train_years {
                config.training.train_years = years;
            }
            if let Some(year) = test_year {
                config.training.test_year = year;
            }
            if let Some(dir) = output {
                config.model.artifact_path = dir.join("city_safety_model.bin");
                config.training.output_dir = dir;
            }

            let source = CsvAggregationSource::new(
                &config.training.aggregations_path,
                &config.training.locations_path,
            );
            let raw_incidents = load_incident_file(&config.training.incidents_path)?;

            let report = Trainer::new(config).run(&source, raw_incidents)?;

            println!("Training complete");
            println!(
                "  forecast rmse  train {:.3}  test {:.3}",
                report.forecast_metrics.train_rmse, report.forecast_metrics.test_rmse
            );
            println!(
                "  forecast mae   train {:.3}  test {:.3}",
                report.forecast_metrics.train_mae, report.forecast_metrics.test_mae
            );
            println!(
                "  zone accuracy  {:.3} over {} samples",
                report.zone_evaluation.accuracy, report.zone_evaluation.samples
            );
            println!("  top features:");
            for (name, importance) in report.feature_importance.iter().take(5) {
                println!("    {:<16} {:.4}", name, importance);
            }
            if let Some(attribution) = &report.attribution {
                println!(
                    "  attribution over {} rows, strongest: {}",
                    attribution.rows_evaluated,
                    attribution
                        .ranked()
                        .first()
                        .map(|(name, _)| name.as_str())
                        .unwrap_or("n/a")
                );
            }
            println!(
                "  safety model   {} groups across {} cities",
                report.safety_groups, report.cities
            );
            println!("  artifacts: {}", report.forecast_path.display());
            println!("             {}", report.safety_path.display());
        }

        Commands::Inspect { output } => {
            let dir = output.unwrap_or(config.training.output_dir);
            let artifact_path = dir.join(crimesafe::pipeline::FORECAST_ARTIFACT_FILE);
            let metadata = ArtifactMetadata::read_sidecar(&artifact_path)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}
