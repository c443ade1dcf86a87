//! relfold CLI - k-fold relation-classification runs from the command line
//!
//! Runs cross-validation with the class-prior baseline, inspects fold
//! splits, scores saved predictions and writes starter label maps and
//! configurations.

mod cli;
mod output;

use anyhow::{bail, Context, Result};
use clap::Parser;
use relfold_train::structured_logging::{LogLevel, TracingLogger};
use relfold_train::{
    corpus_labels, load_corpus, FeatureEncoder, FoldOrchestrator, FoldPlan, LabelMap,
    PredictionBatch, PriorTrainerFactory, RelationMetrics, RunConfig, Tokenizer,
    WordLevelTokenizer,
};
use std::fs;
use std::path::{Path, PathBuf};

use cli::{Cli, Commands};
use output::{enable_colors, print_error, print_header, print_info, print_success};

/// Vocabulary written next to the checkpoints when none is configured.
const VOCAB_FILE: &str = "vocab.txt";

fn main() {
    if let Err(e) = run() {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    enable_colors(!cli.no_color);

    TracingLogger::builder()
        .with_format(cli.log_format.into())
        .with_level(LogLevel::from_verbosity(cli.verbose))
        .with_ansi(!cli.no_color)
        .build()
        .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            seed,
        } => run_command(&config, output_dir, seed),
        Commands::Split {
            corpus,
            folds,
            seed,
            stratified,
            holdout_ratio,
            label_map,
            output,
        } => split_command(
            &corpus,
            FoldPlan::new(folds, stratified, holdout_ratio, seed)
                .context("Invalid split parameters")?,
            label_map.as_deref(),
            output.as_deref(),
        ),
        Commands::Score {
            predictions,
            label_map,
            per_class,
        } => score_command(&predictions, label_map.as_deref(), per_class),
        Commands::InitLabels { output, force } => {
            refuse_overwrite(&output, force)?;
            LabelMap::klue()
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_success(&format!("Label map written to {}", output.display()));
            Ok(())
        }
        Commands::InitConfig { output, force } => {
            refuse_overwrite(&output, force)?;
            RunConfig::default()
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_success(&format!("Configuration written to {}", output.display()));
            Ok(())
        }
    }
}

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

fn load_labels(path: Option<&Path>) -> Result<LabelMap> {
    match path {
        Some(path) => LabelMap::load(path)
            .with_context(|| format!("Failed to load label map {}", path.display())),
        None => Ok(LabelMap::klue()),
    }
}

fn run_command(config_path: &Path, output_dir: Option<PathBuf>, seed: Option<u64>) -> Result<()> {
    let mut config = RunConfig::load(config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;
    // Relative paths in the file are relative to the file itself.
    config.resolve_paths(config_path.parent().unwrap_or_else(|| Path::new(".")));
    if let Some(dir) = output_dir {
        config.output.output_dir = dir;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    tracing::debug!(
        corpus = %config.data.corpus.display(),
        output_dir = %config.output.output_dir.display(),
        seed = config.seed,
        "Resolved run configuration"
    );

    let labels = load_labels(Some(&config.data.label_map))?;
    let examples = load_corpus(&config.data.corpus)
        .with_context(|| format!("Failed to load corpus {}", config.data.corpus.display()))?;

    let tokenizer = match &config.data.vocab {
        Some(path) => WordLevelTokenizer::load(path)
            .with_context(|| format!("Failed to load vocabulary {}", path.display()))?,
        None => {
            let tokenizer = WordLevelTokenizer::from_corpus(&examples);
            let path = config.output.output_dir.join(VOCAB_FILE);
            fs::create_dir_all(&config.output.output_dir).with_context(|| {
                format!("Failed to create {}", config.output.output_dir.display())
            })?;
            tokenizer
                .save(&path)
                .with_context(|| format!("Failed to write vocabulary {}", path.display()))?;
            print_info(&format!(
                "Built a {}-token vocabulary from the corpus ({})",
                tokenizer.vocab_size(),
                path.display()
            ));
            tokenizer
        }
    };
    let encoder = FeatureEncoder::new(tokenizer, config.data.max_length)
        .context("Invalid encoder settings")?;

    print_header(&format!(
        "Cross-validation: {} examples, {} folds, seed {}",
        examples.len(),
        config.cross_validation.n_folds,
        config.seed
    ));

    let mut orchestrator = FoldOrchestrator::from_config(&config, &encoder, &labels)
        .context("Failed to set up the run")?;
    let summary_path = orchestrator.layout().summary_path();
    let report = orchestrator
        .run(&examples, &mut PriorTrainerFactory::default())
        .context("Cross-validation failed")?;

    output::print_report(&report);
    print_success(&format!("Summary written to {}", summary_path.display()));
    Ok(())
}

fn split_command(
    corpus: &Path,
    plan: FoldPlan,
    label_map: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let labels = load_labels(label_map)?;
    let examples =
        load_corpus(corpus).with_context(|| format!("Failed to load corpus {}", corpus.display()))?;
    let gold = labels
        .encode(&corpus_labels(&examples))
        .context("Corpus contains labels outside the label map")?;
    let folds = plan.folds(&gold).context("Failed to split the corpus")?;

    print_header(&format!(
        "{} examples into {} fold(s)",
        examples.len(),
        folds.len()
    ));
    output::print_folds(&folds, &gold, labels.no_relation_index());

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&folds).context("Failed to serialize folds")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        print_success(&format!("Fold indices written to {}", path.display()));
    }
    Ok(())
}

fn score_command(predictions: &Path, label_map: Option<&Path>, per_class: bool) -> Result<()> {
    let labels = load_labels(label_map)?;
    let batch = PredictionBatch::load(predictions)
        .with_context(|| format!("Failed to load predictions {}", predictions.display()))?;
    let metrics = RelationMetrics::for_labels(&labels);
    let scores = metrics.score(&batch).context("Failed to score predictions")?;

    print_header(&format!("{} predictions", batch.len()));
    println!("  {}", output::format_scores(&scores));

    if per_class {
        let auprc = metrics
            .per_class_auprc(&batch)
            .context("Failed to compute per-class AUPRC")?;
        println!();
        output::print_class_auprc(&auprc, &labels);
    }
    Ok(())
}
