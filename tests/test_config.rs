//! Integration tests for JSON experiment configs and CSV datasets

use kolosal_pipeline::config::{DatasetSource, PipelineSpec};
use kolosal_pipeline::prelude::*;
use std::io::Write;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("experiment.json");

    let config = ExperimentConfig {
        pipeline: PipelineSpec {
            scaler: ScalerType::Robust,
            max_depth: Some(4),
            ..PipelineSpec::default()
        },
        search: SearchConfig::default().with_cv_folds(3),
        ..ExperimentConfig::default()
    }
    .with_param_grid(ParameterGrid::new().add("tree__criterion", vec!["gini", "entropy"]));
    config.save(&path).unwrap();

    let loaded = ExperimentConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"test_size": 2.0}"#).unwrap();
    assert!(matches!(
        ExperimentConfig::from_file(&path),
        Err(PipelineError::ConfigError(_))
    ));

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        ExperimentConfig::from_file(&path),
        Err(PipelineError::SerializationError(_))
    ));

    assert!(matches!(
        ExperimentConfig::from_file(dir.path().join("missing.json")),
        Err(PipelineError::IoError(_))
    ));
}

#[test]
fn test_csv_experiment() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("blobs.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "f1,f2,f3,label").unwrap();
    for i in 0..30 {
        let (offset, label) = match i % 3 {
            0 => (0.0, "alpha"),
            1 => (5.0, "beta"),
            _ => (10.0, "gamma"),
        };
        let jitter = (i / 3) as f64 * 0.1;
        writeln!(file, "{},{},{},{}", offset + jitter, offset - jitter, jitter, label).unwrap();
    }
    drop(file);

    let config = ExperimentConfig {
        dataset: DatasetSource::Csv {
            path: csv_path,
            target: "label".to_string(),
        },
        test_size: 0.3,
        ..ExperimentConfig::default()
    };

    let dataset = config.dataset.load().unwrap();
    assert_eq!(dataset.shape(), (30, 3));
    assert_eq!(dataset.target_names, vec!["alpha", "beta", "gamma"]);

    let (x, y) = dataset.into_xy().unwrap();
    let (x_train, x_test, y_train, y_test) =
        train_test_split(&x, &y, config.test_size, config.random_state).unwrap();
    assert_eq!(x_test.nrows(), 9);

    let mut pipe = config.pipeline.build().unwrap();
    pipe.fit(&x_train, &y_train).unwrap();
    assert_eq!(pipe.score(&x_test, &y_test).unwrap(), 1.0);
}
