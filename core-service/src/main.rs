//! PRATIRAKSHA-Lite - command line entry point
//!
//! `train`, `analyze`, `detect` and `simulate`; the dashboard lives in
//! `pratiraksha-server`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use pratiraksha_core::constants::{
    get_model_info_path, get_model_path, APP_VERSION, DEFAULT_DATASET_PATH, FALLBACK_DATASET_PATH,
};
use pratiraksha_core::logic::dataset::summary::{summarize, DEFAULT_Z_THRESHOLD};
use pratiraksha_core::logic::dataset::{load_with_fallback, DatasetWriter, LABEL_COLUMN};
use pratiraksha_core::logic::graph::{EdgeStrategy, DEFAULT_KNN_K, SYNTHETIC_EDGE_SEED};
use pratiraksha_core::logic::model::network::{DEFAULT_DROPOUT, DEFAULT_HIDDEN_DIM};
use pratiraksha_core::logic::model::{detect_or_fallback, ModelInfo, ThreatDetector};
use pratiraksha_core::logic::simulator::FlowSimulator;
use pratiraksha_core::logic::training::pipeline::{DEFAULT_MAX_SAMPLES, DEFAULT_NROWS};
use pratiraksha_core::logic::training::trainer::{DEFAULT_EPOCHS, DEFAULT_PATIENCE};
use pratiraksha_core::logic::training::{train_from_csv, TrainerConfig, TrainingConfig};
use pratiraksha_core::FlowRecord;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "pratiraksha", version, about = "PRATIRAKSHA-Lite GCN threat detector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EdgeKind {
    /// Sequential neighbours plus seeded random links
    Synthetic,
    /// k nearest neighbours in scaled feature space
    Knn,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the GCN and write checkpoint + model_info.json
    Train {
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,

        /// Used when --dataset does not exist
        #[arg(long, default_value = FALLBACK_DATASET_PATH)]
        fallback: PathBuf,

        #[arg(long, default_value = LABEL_COLUMN)]
        label: String,

        /// Rows read from the CSV (0 = all)
        #[arg(long, default_value_t = DEFAULT_NROWS)]
        nrows: usize,

        #[arg(long, default_value_t = DEFAULT_MAX_SAMPLES)]
        max_samples: usize,

        #[arg(long, default_value_t = DEFAULT_EPOCHS)]
        epochs: usize,

        #[arg(long, default_value_t = DEFAULT_PATIENCE)]
        patience: usize,

        #[arg(long, default_value_t = DEFAULT_HIDDEN_DIM)]
        hidden: usize,

        #[arg(long, default_value_t = DEFAULT_DROPOUT)]
        dropout: f32,

        #[arg(long)]
        lr: Option<f32>,

        #[arg(long, value_enum, default_value_t = EdgeKind::Synthetic)]
        edges: EdgeKind,

        /// Neighbours per node for --edges knn
        #[arg(long, default_value_t = DEFAULT_KNN_K)]
        k: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output directory
        #[arg(long, default_value = "models")]
        out: PathBuf,
    },
    /// Print a dataset health summary
    Analyze {
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,

        #[arg(long, default_value = LABEL_COLUMN)]
        label: String,

        /// Rows read from the CSV (0 = all)
        #[arg(long, default_value_t = 0)]
        nrows: usize,

        #[arg(long, default_value_t = DEFAULT_Z_THRESHOLD)]
        z_threshold: f32,
    },
    /// Score one flow given as JSON
    Detect {
        /// Flow record, e.g. '{"src_ip":"192.168.1.2",...}'
        flow: String,

        /// Checkpoint (defaults to MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,

        /// model_info.json (defaults to MODEL_INFO_PATH)
        #[arg(long)]
        info: Option<PathBuf>,
    },
    /// Generate labelled simulated flows
    Simulate {
        #[arg(long, default_value_t = 10)]
        count: usize,

        #[arg(long)]
        seed: Option<u64>,

        /// Write a training CSV instead of JSON lines
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Train {
            dataset,
            fallback,
            label,
            nrows,
            max_samples,
            epochs,
            patience,
            hidden,
            dropout,
            lr,
            edges,
            k,
            seed,
            out,
        } => {
            let edges = match edges {
                EdgeKind::Synthetic => EdgeStrategy::Synthetic { seed: SYNTHETIC_EDGE_SEED },
                EdgeKind::Knn => EdgeStrategy::Knn { k },
            };
            let defaults = TrainerConfig::default();
            let config = TrainingConfig {
                dataset,
                fallback_dataset: Some(fallback),
                label_column: label,
                nrows: (nrows > 0).then_some(nrows),
                max_samples,
                edges,
                hidden_dim: hidden,
                dropout,
                seed,
                trainer: TrainerConfig {
                    lr: lr.unwrap_or(defaults.lr),
                    epochs,
                    patience,
                    seed,
                    ..defaults
                },
                output_dir: out,
                ..TrainingConfig::default()
            };
            run_train(&config)
        }
        Commands::Analyze { dataset, label, nrows, z_threshold } => {
            run_analyze(dataset, &label, (nrows > 0).then_some(nrows), z_threshold)
        }
        Commands::Detect { flow, model, info } => run_detect(
            &flow,
            model.unwrap_or_else(get_model_path),
            info.unwrap_or_else(get_model_info_path),
        ),
        Commands::Simulate { count, seed, out } => run_simulate(count, seed, out),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_train(config: &TrainingConfig) -> CliResult {
    log::info!("PRATIRAKSHA-Lite v{} - training", APP_VERSION);
    let report = train_from_csv(config)?;

    println!("Checkpoint: {}", report.checkpoint_path.display());
    println!("Model info: {}", report.model_info_path.display());
    println!("SHA-256:    {}", report.checkpoint_sha256);
    println!(
        "Test accuracy {:.2}% after {} epochs{}",
        report.test_accuracy * 100.0,
        report.epochs_run,
        if report.stopped_early { " (early stop)" } else { "" }
    );
    Ok(())
}

fn run_analyze(dataset: PathBuf, label: &str, nrows: Option<usize>, z_threshold: f32) -> CliResult {
    let fallback = PathBuf::from(FALLBACK_DATASET_PATH);
    let table = load_with_fallback(&dataset, Some(&fallback), label, nrows)?;
    println!("{}", summarize(&table, label, z_threshold));
    Ok(())
}

fn run_detect(flow: &str, model: PathBuf, info: PathBuf) -> CliResult {
    let flow: FlowRecord = serde_json::from_str(flow)?;
    let info = ModelInfo::load_or_default(&info);

    let detector = match ThreatDetector::load(&model, Some(&info)) {
        Ok(detector) => Some(detector),
        Err(e) => {
            log::warn!("Model unavailable ({}), using heuristic", e);
            None
        }
    };

    let detection = detect_or_fallback(detector.as_ref(), &flow, None, &mut rand::thread_rng());
    println!("{}", serde_json::to_string_pretty(&detection)?);
    Ok(())
}

fn run_simulate(count: usize, seed: Option<u64>, out: Option<PathBuf>) -> CliResult {
    let simulator = match seed {
        Some(seed) => FlowSimulator::new(seed),
        None => FlowSimulator::from_entropy(),
    };

    match out {
        Some(path) => {
            let mut writer = DatasetWriter::create(&path)?;
            for (flow, label) in simulator.take(count) {
                writer.append(&flow, label)?;
            }
            let rows = writer.finish()?;
            log::info!("Wrote {} simulated flows to {}", rows, path.display());
        }
        None => {
            for (flow, label) in simulator.take(count) {
                let line = serde_json::json!({ "flow": flow, "label": label });
                println!("{}", line);
            }
        }
    }
    Ok(())
}
