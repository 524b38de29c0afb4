//! Grid-search tuning of a nearest-neighbour classifier.
//!
//! Walks through a complete tuning run:
//!
//! 1. simulate a two-class data set,
//! 2. split it into v folds,
//! 3. describe the model with `neighbors` and `weight_func` marked for tuning,
//! 4. build a regular grid over both parameters,
//! 5. register a worker pool and tune,
//! 6. inspect the best candidates and finalize the workflow.
//!
//! A final step swaps the engine for one that depends on `keras` to show the
//! gate falling back to sequential dispatch with a warning.
//!
//! Run with `RUST_LOG=info cargo run -p tg-tune --example grid_tutorial`.
//! Set `TUNEGATE_WORKERS` to change the pool size.

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tg_parallel::{BackendConfig, ParallelBackend};
use tg_tune::{
    ControlGrid, Evaluator, GridSearch, GridTuner, Metrics, ObjectiveDirection, ParallelOver,
    SearchSpace, TuneConfig,
};
use tg_types::{
    describe_params, EvaluationError, ModelMode, ModelSpec, Preprocessor, TuneArg, Workflow,
};

#[derive(Debug, Clone, Copy)]
struct Observation {
    x: [f64; 2],
    class: usize,
}

/// Indices of the analysis and assessment rows of one fold.
struct Fold {
    analysis: Vec<usize>,
    assessment: Vec<usize>,
}

/// Two overlapping Gaussian-ish clouds.
fn simulate(n: usize, rng: &mut ChaCha8Rng) -> Vec<Observation> {
    (0..n)
        .map(|i| {
            let class = i % 2;
            let centre = if class == 0 { -0.75 } else { 0.75 };
            let noise = |rng: &mut ChaCha8Rng| -> f64 {
                (0..4).map(|_| rng.gen_range(-1.0..1.0)).sum()
            };
            Observation {
                x: [centre + noise(rng), centre + noise(rng)],
                class,
            }
        })
        .collect()
}

fn vfold(n: usize, v: usize, rng: &mut ChaCha8Rng) -> Vec<Fold> {
    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(rng);
    (0..v)
        .map(|k| {
            let (held_out, kept): (Vec<_>, Vec<_>) =
                rows.iter().enumerate().partition(|(pos, _)| pos % v == k);
            Fold {
                analysis: kept.into_iter().map(|(_, &row)| row).collect(),
                assessment: held_out.into_iter().map(|(_, &row)| row).collect(),
            }
        })
        .collect()
}

/// Fits k-nearest-neighbours on the analysis rows and scores the assessment rows.
struct KnnEvaluator {
    data: Vec<Observation>,
}

impl KnnEvaluator {
    fn prob_class_one(&self, train: &[usize], point: [f64; 2], k: usize, triangular: bool) -> f64 {
        let mut dist: Vec<(f64, usize)> = train
            .iter()
            .map(|&row| {
                let obs = &self.data[row];
                let d = ((obs.x[0] - point[0]).powi(2) + (obs.x[1] - point[1]).powi(2)).sqrt();
                (d, obs.class)
            })
            .collect();
        dist.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let neighbours = &dist[..k.min(dist.len())];

        let max_d = neighbours.last().map_or(1.0, |n| n.0).max(f64::EPSILON);
        let (mut num, mut den) = (0.0, 0.0);
        for (d, class) in neighbours {
            let w = if triangular { 1.0 - d / (max_d * 1.0001) } else { 1.0 };
            num += w * *class as f64;
            den += w;
        }
        if den > 0.0 {
            num / den
        } else {
            0.5
        }
    }
}

impl Evaluator for KnnEvaluator {
    type Resample = Fold;

    fn evaluate(&self, workflow: &Workflow, fold: &Fold) -> Result<Metrics, EvaluationError> {
        let arg = |name: &str| match workflow.model.args.get(name) {
            Some(TuneArg::Fixed(value)) => Ok(value.clone()),
            _ => Err(EvaluationError::MetricFailed {
                metric: "accuracy".into(),
                message: format!("argument {name} is not set"),
            }),
        };
        let k = arg("neighbors")?.as_i64().unwrap_or(1).max(1) as usize;
        let triangular = arg("weight_func")?.as_str() == Some("triangular");

        let mut correct = 0usize;
        let mut brier = 0.0;
        for &row in &fold.assessment {
            let obs = self.data[row];
            let p = self.prob_class_one(&fold.analysis, obs.x, k, triangular);
            let predicted = usize::from(p >= 0.5);
            correct += usize::from(predicted == obs.class);
            brier += (p - obs.class as f64).powi(2);
        }

        let n = fold.assessment.len().max(1) as f64;
        let mut metrics = Metrics::new();
        metrics.insert("accuracy".into(), correct as f64 / n);
        metrics.insert("brier_class".into(), brier / n);
        Ok(metrics)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let data = simulate(400, &mut rng);
    let folds = vfold(data.len(), 5, &mut rng);
    let evaluator = KnnEvaluator { data };

    let model = ModelSpec::new("nearest_neighbor", "kknn")
        .with_mode(ModelMode::Classification)
        .with_tune("neighbors")
        .with_tune("weight_func");
    let workflow = Workflow::new("knn_two_class", model)
        .with_preprocessor(Preprocessor::new().add_step("normalize", ["recipes"]));

    let space = SearchSpace::new().add_int("neighbors", 1, 25).add_choice(
        "weight_func",
        vec![
            serde_json::json!("rectangular"),
            serde_json::json!("triangular"),
        ],
    );
    let config = TuneConfig::new("knn_grid")
        .with_objective("accuracy", ObjectiveDirection::Maximize)
        .with_grid_levels(5);
    let grid = GridSearch::new(&space, config.grid_levels)?;
    println!("Grid has {} candidates", grid.len());

    let backend = ParallelBackend::with_config(&BackendConfig::from_env()?)?;
    let control = ControlGrid::default()
        .with_parallel_over(ParallelOver::Everything)
        .with_extra_pkgs(["yardstick"]);
    let tuner = GridTuner::new(&backend, config).with_control(control.clone());

    let results = tuner.tune_grid(&workflow, &folds, grid.candidates(), &evaluator)?;
    println!(
        "Evaluated {} trials ({} dispatch), worker packages: {}",
        results.trials.len(),
        if results.parallel { "parallel" } else { "sequential" },
        results.worker_pkgs.join(", ")
    );

    println!("Top candidates by accuracy:");
    for summary in results.show_best(5)? {
        println!(
            "  {:<40} accuracy={:.3} (se {:.3})",
            describe_params(&summary.parameters),
            summary.mean["accuracy"],
            summary.std_err.get("accuracy").copied().unwrap_or(f64::NAN)
        );
    }

    println!("Top candidates by Brier score:");
    for summary in results.show_best_by("brier_class", ObjectiveDirection::Minimize, 3)? {
        println!(
            "  {:<40} brier={:.4}",
            describe_params(&summary.parameters),
            summary.mean["brier_class"]
        );
    }

    let best = results.select_best()?;
    let finalized = workflow.finalize(&best.parameters)?;
    println!("Finalized model arguments: {:?}", finalized.model.args);

    // An engine that depends on keras cannot run on parallel workers; the gate
    // warns and the same grid runs sequentially.
    let keras_model = ModelSpec::new("nearest_neighbor", "kknn")
        .with_mode(ModelMode::Classification)
        .with_tune("neighbors")
        .with_tune("weight_func")
        .with_packages(["kknn", "keras"]);
    let keras_workflow = Workflow::new("knn_keras", keras_model);
    let gated = GridTuner::new(&backend, TuneConfig::new("knn_keras"))
        .with_control(control)
        .tune_grid(&keras_workflow, &folds, grid.candidates(), &evaluator)?;
    println!(
        "keras-dependent run dispatched {}",
        if gated.parallel { "in parallel" } else { "sequentially" }
    );

    backend.stop();
    Ok(())
}
