//! CLI argument definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use relfold_train::structured_logging::LogFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relfold")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run k-fold cross-validation with the class-prior baseline
    Run {
        /// Run configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Split a corpus into folds and report their sizes
    Split {
        /// Corpus file (CSV)
        #[arg(short, long)]
        corpus: PathBuf,

        /// Number of folds (1 for a single holdout split)
        #[arg(short = 'k', long, default_value_t = 5)]
        folds: usize,

        /// Random seed
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Keep label proportions in every fold
        #[arg(long)]
        stratified: bool,

        /// Dev share of the corpus when --folds is 1
        #[arg(long, default_value_t = 0.2)]
        holdout_ratio: f64,

        /// Label map (built-in relation set if omitted)
        #[arg(short, long)]
        label_map: Option<PathBuf>,

        /// Write fold indices as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score a saved prediction file
    Score {
        /// Prediction file (JSON with `probabilities` and `labels`)
        #[arg(short, long)]
        predictions: PathBuf,

        /// Label map (built-in relation set if omitted)
        #[arg(short, long)]
        label_map: Option<PathBuf>,

        /// Also print the AUPRC of every class
        #[arg(long)]
        per_class: bool,
    },

    /// Write the built-in relation label map
    InitLabels {
        /// Destination file
        #[arg(short, long, default_value = "label_map.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Write a run configuration with every default filled in
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "run.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable multi-line output
    Pretty,
    /// One line per event
    Compact,
    /// JSON objects, one per line
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}
