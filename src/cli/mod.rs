//! Kolosal Pipeline CLI Module
//!
//! Command-line front end: the Iris walkthrough, config-driven experiments
//! and dataset summaries.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ExperimentConfig;
use crate::datasets::{load_iris, Dataset};
use crate::decomposition::Pca;
use crate::estimator::{Estimator, Transformer};
use crate::metrics::accuracy_score;
use crate::model_selection::{format_params, train_test_split, GridSearchCV, ParameterGrid};
use crate::params::ParamValue;
use crate::pipeline::{Pipeline, Step};
use crate::preprocessing::Scaler;
use crate::training::DecisionTreeClassifier;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn banner(subtitle: &str) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Kolosal Pipeline".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{} · {}", env!("CARGO_PKG_VERSION"), subtitle))));
    line_box_empty();
    line_box_bottom();
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-pipeline")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Composable ML pipelines with cross-validated grid search")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Iris walkthrough: manual steps, pipeline and grid search
    Demo {
        /// Fraction of samples held out for testing
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Seed for the train/test split
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Run an experiment described by a JSON config
    Run {
        /// Experiment config file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show dataset information (Iris when no file is given)
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Scaler -> PCA(2) -> decision tree, the walkthrough pipeline
pub fn iris_pipeline() -> crate::error::Result<Pipeline> {
    Pipeline::new(vec![
        Step::transformer("scaler", Scaler::standard()),
        Step::transformer("pca", Pca::new(2)),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
}

/// Grid explored by the walkthrough
pub fn iris_grid() -> ParameterGrid {
    ParameterGrid::new()
        .add("pca__n_components", vec![1, 2, 3])
        .add(
            "tree__max_depth",
            vec![ParamValue::None, ParamValue::Int(2), ParamValue::Int(3), ParamValue::Int(4)],
        )
        .add("tree__criterion", vec!["gini", "entropy"])
}

pub fn cmd_demo(test_size: f64, seed: u64) -> anyhow::Result<()> {
    banner("iris walkthrough");

    section("Data");
    step_run("Loading iris");
    let iris = load_iris();
    step_done(&format!("{} rows × {} cols", iris.n_samples(), iris.n_features()));
    let (x, y) = iris.into_xy()?;

    step_run("Splitting");
    let (x_train, x_test, y_train, y_test) = train_test_split(&x, &y, test_size, Some(seed))?;
    step_done(&format!("{} train / {} test", x_train.nrows(), x_test.nrows()));

    section("Manual steps");
    let start = Instant::now();
    let mut scaler = Scaler::standard();
    let mut pca = Pca::new(2);
    let mut tree = DecisionTreeClassifier::new();
    let train_scaled = scaler.fit_transform(&x_train, None)?;
    let train_reduced = pca.fit_transform(&train_scaled, None)?;
    tree.fit(&train_reduced, &y_train)?;
    let test_reduced = pca.transform(&scaler.transform(&x_test)?)?;
    let manual_accuracy = accuracy_score(&y_test, &tree.predict(&test_reduced)?)?;
    if let Some(ratio) = pca.explained_variance_ratio() {
        println!("  {:<24} {:.4}", muted("Explained variance"), ratio.sum());
    }
    println!("  {:<24} {:.4}", muted("Accuracy"), manual_accuracy);
    println!("  {:<24} {:.2?}", muted("Time"), start.elapsed());

    section("Pipeline");
    let start = Instant::now();
    let mut pipeline = iris_pipeline()?;
    pipeline.fit(&x_train, &y_train)?;
    let pipeline_accuracy = pipeline.score(&x_test, &y_test)?;
    println!("  {:<24} {}", muted("Steps"), pipeline.step_names().join(" → "));
    println!("  {:<24} {:.4}", muted("Accuracy"), pipeline_accuracy);
    println!("  {:<24} {:.2?}", muted("Time"), start.elapsed());
    if pipeline_accuracy == manual_accuracy {
        step_ok("pipeline matches manual step-by-step application");
    } else {
        println!("  {} pipeline and manual accuracy differ", "!".yellow());
    }

    section("Grid search");
    let grid = iris_grid();
    step_run(&format!("Searching {} candidates", grid.len()));
    let start = Instant::now();
    let mut search = GridSearchCV::new(iris_pipeline()?, grid);
    search.fit(&x_train, &y_train)?;
    step_done(&format!("{:.2?}", start.elapsed()));
    print_search(&search, &x_test, &y_test)?;

    println!();
    Ok(())
}

pub fn cmd_run(config_path: &Path) -> anyhow::Result<()> {
    let config = ExperimentConfig::from_file(config_path)?;
    banner(&config_path.display().to_string());

    section("Data");
    step_run("Loading dataset");
    let dataset = config.dataset.load()?;
    step_done(&format!("{} rows × {} cols", dataset.n_samples(), dataset.n_features()));
    let (x, y) = dataset.into_xy()?;

    step_run("Splitting");
    let (x_train, x_test, y_train, y_test) =
        train_test_split(&x, &y, config.test_size, config.random_state)?;
    step_done(&format!("{} train / {} test", x_train.nrows(), x_test.nrows()));

    section("Pipeline");
    let start = Instant::now();
    let mut pipeline = config.pipeline.build()?;
    pipeline.fit(&x_train, &y_train)?;
    println!("  {:<24} {}", muted("Steps"), pipeline.step_names().join(" → "));
    println!("  {:<24} {:.4}", muted("Accuracy"), pipeline.score(&x_test, &y_test)?);
    println!("  {:<24} {:.2?}", muted("Time"), start.elapsed());

    if let Some(grid) = config.param_grid.clone() {
        section("Grid search");
        step_run(&format!("Searching {} candidates", grid.len()));
        let start = Instant::now();
        let mut search = GridSearchCV::from_config(config.pipeline.build()?, grid, &config.search);
        search.fit(&x_train, &y_train)?;
        step_done(&format!("{:.2?}", start.elapsed()));
        print_search(&search, &x_test, &y_test)?;
    }

    println!();
    Ok(())
}

fn print_search(
    search: &GridSearchCV<Pipeline>,
    x_test: &ndarray::Array2<f64>,
    y_test: &ndarray::Array1<f64>,
) -> anyhow::Result<()> {
    let results = search.cv_results().unwrap_or_default();
    let mut ranked: Vec<_> = results.iter().collect();
    ranked.sort_by_key(|r| r.rank);

    println!();
    println!("  {:<6} {:>8} {:>8}  {}", muted("Rank"), muted("Mean"), muted("Std"), muted("Params"));
    println!("  {}", dim(&"─".repeat(56)));
    for result in ranked.iter().take(5) {
        println!(
            "  {:<6} {:>8.4} {:>8.4}  {}",
            result.rank,
            result.mean_test_score,
            result.std_test_score,
            dim(&format_params(&result.params))
        );
    }

    println!();
    if let (Some(params), Some(score)) = (search.best_params(), search.best_score()) {
        println!("  {:<24} {}", muted("Best params"), format_params(params).white().bold());
        println!("  {:<24} {:.4}", muted("Best CV score"), score);
    }
    if search.best_estimator().is_some() {
        println!("  {:<24} {:.4}", muted("Test accuracy"), search.score(x_test, y_test)?);
    }
    Ok(())
}

pub fn cmd_info(data_path: Option<&Path>, target: Option<&str>) -> anyhow::Result<()> {
    section("Data Info");

    let dataset = match data_path {
        Some(path) => Dataset::from_csv(path, target)?,
        None => load_iris(),
    };

    let source = data_path.map_or_else(|| "iris (bundled)".to_string(), |p| p.display().to_string());
    println!("  {:<12} {}", muted("Source"), source);
    println!("  {:<12} {}", muted("Rows"), dataset.n_samples());
    println!("  {:<12} {}", muted("Features"), dataset.n_features());
    println!("  {:<12} {}", muted("Columns"), dataset.feature_names.join(", "));

    if dataset.target.is_some() {
        println!();
        println!("  {:<20} {:>8} {:>8}", muted("Class"), muted("Count"), muted("Share"));
        println!("  {}", dim(&"─".repeat(38)));
        let n = dataset.n_samples().max(1) as f64;
        for (label, count) in dataset.class_counts()? {
            println!(
                "  {:<20} {:>8} {:>7.1}%",
                dataset.label_name(label),
                count,
                100.0 * count as f64 / n
            );
        }
    }

    println!();
    Ok(())
}
