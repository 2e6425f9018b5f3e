use crimesafe::config::Config;
use crimesafe::data::{load_incident_file, CsvAggregationSource};
use crimesafe::ml::{load_artifact, ArtifactMetadata, ForecastArtifact, SafetyArtifact};
use crimesafe::pipeline::{load_forecast_artifact, Trainer};
use crimesafe::serving::PredictionService;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn base_config(dir: &Path) -> Config {
    let mut config: Config = config::Config::builder()
        .add_source(config::File::from_str(
            include_str!("../config/default.toml"),
            config::FileFormat::Toml,
        ))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();
    config.training.output_dir = dir.join("models");
    config.model.artifact_path = dir.join("models").join("city_safety_model.bin");
    config.model.forecast.n_estimators = 25;
    config.model.safety.n_estimators = 10;
    config
}

fn write_aggregations(path: &Path) {
    let mut file = File::create(path).unwrap();
    writeln!(
        file,
        "location_id,year,month,crime_count,male_victims,female_victims,avg_victim_age"
    )
    .unwrap();
    for (location, base) in [("DEL-01", 30u32), ("MUM-01", 60u32)] {
        for year in 2020..=2024 {
            for month in 1..=12u32 {
                let count = base + month * 2 + (year - 2020) as u32 * 3;
                writeln!(
                    file,
                    "{},{},{},{},{},{},{}",
                    location,
                    year,
                    month,
                    count,
                    count / 2,
                    count / 3,
                    30.0 + (month as f64) / 4.0
                )
                .unwrap();
            }
        }
    }
}

fn write_locations(path: &Path) {
    let mut file = File::create(path).unwrap();
    writeln!(file, "location_id,latitude,longitude,population").unwrap();
    writeln!(file, "DEL-01,28.61,77.21,19000000").unwrap();
    writeln!(file, "MUM-01,19.08,72.88,21000000").unwrap();
}

fn write_incidents(path: &Path) {
    let mut file = File::create(path).unwrap();
    writeln!(
        file,
        "Report Number,City,Victim Age,Victim Gender,Date of Occurrence,\
         Crime Description,Weapon Used,Crime Domain"
    )
    .unwrap();
    let mut report = 0;
    for (city, gender, age, per_year) in [
        ("Delhi", "M", 28, 6),
        ("Delhi", "F", 34, 9),
        ("Mumbai", "F", 41, 3),
        ("Mumbai", "M", 22, 5),
    ] {
        for year in 2020..=2023 {
            for k in 0..per_year {
                report += 1;
                writeln!(
                    file,
                    "{},{},{},{},{:02}-{:02}-{} 14:30,Robbery,Knife,Violent Crime",
                    report,
                    city,
                    age,
                    gender,
                    1 + (k % 28),
                    1 + (k % 12),
                    year
                )
                .unwrap();
            }
        }
    }
}

fn train_from_csv(dir: &Path) -> (Config, crimesafe::pipeline::TrainingReport) {
    let config = base_config(dir);
    let agg_path = dir.join("aggregations.csv");
    let loc_path = dir.join("locations.csv");
    let inc_path = dir.join("incidents.csv");
    write_aggregations(&agg_path);
    write_locations(&loc_path);
    write_incidents(&inc_path);

    let source = CsvAggregationSource::new(&agg_path, &loc_path);
    let incidents = load_incident_file(&inc_path).unwrap();
    let report = Trainer::new(config.clone()).run(&source, incidents).unwrap();
    (config, report)
}

#[test]
fn test_end_to_end_training_from_csv() {
    let dir = tempdir().unwrap();
    let (config, report) = train_from_csv(dir.path());

    assert!(report.forecast_path.exists());
    assert!(report.safety_path.exists());
    assert_eq!(report.cities, 2);
    assert!(report.safety_groups >= 4);

    // test year 2024 has 12 months per location, all with full lag history
    assert_eq!(report.zone_evaluation.samples, 24);
    assert!(report.forecast_metrics.test_rmse.is_finite());

    let forecast = load_forecast_artifact(&config.training.output_dir).unwrap();
    assert_eq!(forecast.feature_columns.len(), 16);
    assert_eq!(forecast.thresholds.amber, 20.0);
    assert_eq!(forecast.thresholds.red, 50.0);
}

#[test]
fn test_metadata_sidecar_describes_the_run() {
    let dir = tempdir().unwrap();
    let (_, report) = train_from_csv(dir.path());

    let metadata = ArtifactMetadata::read_sidecar(&report.forecast_path).unwrap();
    assert_eq!(metadata.train_years, vec![2020, 2021, 2022, 2023]);
    assert_eq!(metadata.test_year, 2024);
    assert_eq!(metadata.forecast_metrics.test_rmse, report.forecast_metrics.test_rmse);

    let importance_total: f64 = metadata.feature_importance.iter().map(|(_, v)| v).sum();
    assert!((importance_total - 1.0).abs() < 1e-9);
    assert!(metadata.attribution.is_some());
}

#[test]
fn test_reloaded_artifacts_predict_identically() {
    let dir = tempdir().unwrap();
    let (config, report) = train_from_csv(dir.path());

    let first: ForecastArtifact = load_artifact(&report.forecast_path).unwrap();
    let second: ForecastArtifact = load_artifact(&report.forecast_path).unwrap();
    let row = vec![0.1; 16];
    let scaled = first.scaler.transform_row(&row).unwrap();
    assert_eq!(
        first.model.predict_row(&scaled).unwrap(),
        second.model.predict_row(&scaled).unwrap()
    );

    let safety: SafetyArtifact = load_artifact(&config.model.artifact_path).unwrap();
    let service = PredictionService::from_artifact(safety);
    let a = service.predict(30, "F", 2024).unwrap();
    let b = service.predict(30, "F", 2024).unwrap();
    assert_eq!(a.predictions.len(), b.predictions.len());
    for (x, y) in a.predictions.iter().zip(&b.predictions) {
        assert_eq!(x.safety_score, y.safety_score);
        assert_eq!(x.city, y.city);
    }
}

#[test]
fn test_trained_safety_model_serves_rankings() {
    let dir = tempdir().unwrap();
    let (config, _) = train_from_csv(dir.path());

    let service = PredictionService::load(&config.model.artifact_path);
    assert!(service.is_ready());

    let cities = service.cities().unwrap();
    assert_eq!(cities, ["Delhi", "Mumbai"]);

    let ranking = service.predict(34, "F", 2024).unwrap();
    assert_eq!(ranking.predictions.len(), 2);
    assert_eq!(ranking.predictions[0].rank, 1);
    assert!(ranking.predictions[0].safety_score >= ranking.predictions[1].safety_score);
}

#[test]
fn test_missing_artifact_starts_degraded() {
    let dir = tempdir().unwrap();
    let service = PredictionService::load(&dir.path().join("absent.bin"));
    assert!(!service.is_ready());
    assert!(service.predict(30, "F", 2024).is_err());
}
