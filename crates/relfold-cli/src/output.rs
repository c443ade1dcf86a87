//! Colored output formatting for the relfold CLI

use colored::*;
use relfold_train::{ClassAuprc, CrossValidationReport, Fold, LabelMap, MetricScores};

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn print_header(title: &str) {
    println!("\n{}", title.cyan().bold());
    println!("{}", "=".repeat(title.chars().count()).cyan());
}

pub fn format_scores(scores: &MetricScores) -> String {
    format!(
        "micro F1 {}  AUPRC {}  accuracy {}",
        format!("{:.2}", scores.micro_f1).green(),
        format!("{:.2}", scores.auprc).cyan(),
        format!("{:.2}", scores.accuracy).yellow()
    )
}

pub fn print_report(report: &CrossValidationReport) {
    println!(
        "{:>6}  {:>10}  {:>10}  {:>10}  checkpoint",
        "fold", "micro F1", "AUPRC", "accuracy"
    );
    for fold in &report.folds {
        println!(
            "{:>6}  {:>10.2}  {:>10.2}  {:>10.2}  {}",
            fold.fold,
            fold.micro_f1,
            fold.auprc,
            fold.accuracy,
            fold.checkpoint_dir.display().to_string().dimmed()
        );
    }
    println!();
    for (name, summary) in report.summary() {
        println!(
            "  {:<16} {} ± {:.2}",
            name,
            format!("{:.2}", summary.mean).green().bold(),
            summary.std
        );
    }
}

pub fn print_folds(folds: &[Fold], labels: &[usize], no_relation: usize) {
    println!(
        "{:>6}  {:>8}  {:>8}  {:>12}",
        "fold", "train", "dev", "dev related"
    );
    for fold in folds {
        let related = fold
            .dev
            .iter()
            .filter(|&&i| labels[i] != no_relation)
            .count();
        println!(
            "{:>6}  {:>8}  {:>8}  {:>12}",
            fold.index,
            fold.train.len(),
            fold.dev.len(),
            related
        );
    }
}

pub fn print_class_auprc(auprc: &ClassAuprc, labels: &LabelMap) {
    for (index, area) in auprc.areas.iter().enumerate() {
        let name = labels.decode(index).unwrap_or("?");
        let degenerate = auprc.degenerate.iter().any(|d| d.class == index);
        let value = format!("{:>7.2}", area * 100.0);
        if degenerate {
            println!("  {:<40} {} {}", name, value.dimmed(), "(no positives)".dimmed());
        } else {
            println!("  {:<40} {}", name, value);
        }
    }
}

pub fn enable_colors(enabled: bool) {
    colored::control::set_override(enabled);
}
