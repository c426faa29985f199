use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{RatingIndex, Recommendation, UserId};
use orchestrator::{PipelineConfig, PipelineOutcome, RecommendationPipeline};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stages::{recommendations_agree, ReferenceRecommender};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Scores closer than this count as equal when verifying
const SCORE_TOLERANCE: f64 = 1e-9;

/// cooc-recs - Item co-occurrence recommendations as staged map/reduce jobs
#[derive(Parser)]
#[command(name = "cooc-recs")]
#[command(
    about = "Item-based collaborative filtering over a local dataset root",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage and write recommendations
    Run {
        /// Directory for intermediate and final datasets
        #[arg(long)]
        root: Option<PathBuf>,

        /// Raw ratings file (userId,itemId,score or MovieLens ratings.dat)
        #[arg(long)]
        ratings: Option<PathBuf>,

        /// Number of items to recommend per user
        #[arg(long, default_value = "10", conflicts_with = "config")]
        top_n: usize,

        /// Leave out items the user already rated
        #[arg(long, conflicts_with = "config")]
        exclude_rated: bool,

        /// Reduce partitions per stage
        #[arg(long, default_value = "4", conflicts_with = "config")]
        reduce_tasks: usize,

        /// Load every setting from a saved pipeline.json instead
        #[arg(long, conflicts_with_all = ["root", "ratings"])]
        config: Option<PathBuf>,
    },

    /// Print recommendations from a finished run
    Show {
        #[arg(long)]
        root: PathBuf,

        /// Only show this user
        #[arg(long)]
        user: Option<UserId>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a synthetic ratings file
    Generate {
        #[arg(long)]
        output: PathBuf,

        #[arg(long, default_value = "100")]
        users: u32,

        #[arg(long, default_value = "50")]
        items: u32,

        /// Ratings drawn per user (repeats collapse to one)
        #[arg(long, default_value = "10")]
        per_user: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Recompute recommendations in memory and compare with a finished run
    Verify {
        #[arg(long)]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            root,
            ratings,
            top_n,
            exclude_rated,
            reduce_tasks,
            config,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::from_json_file(&path)?,
                None => {
                    let root = root.ok_or_else(|| anyhow!("--root is required without --config"))?;
                    let ratings =
                        ratings.ok_or_else(|| anyhow!("--ratings is required without --config"))?;
                    PipelineConfig::new(root, ratings)
                        .with_top_n(top_n)
                        .with_exclude_rated(exclude_rated)
                        .with_reduce_tasks(reduce_tasks)
                }
            };
            handle_run(config).await?
        }
        Commands::Show { root, user, json } => handle_show(&root, user, json)?,
        Commands::Generate {
            output,
            users,
            items,
            per_user,
            seed,
        } => handle_generate(&output, users, items, per_user, seed)?,
        Commands::Verify { root } => handle_verify(&root)?,
    }

    Ok(())
}

/// Handle the 'run' command
async fn handle_run(config: PipelineConfig) -> Result<()> {
    println!(
        "Running pipeline on {} under {}...",
        config.ratings.display(),
        config.root.display()
    );
    let pipeline = RecommendationPipeline::new(config)?;

    match pipeline.run().await {
        Ok(outcome) => {
            print_reports(&outcome);
            println!("{} {}", "✓".green(), outcome.output.display());
            for part in &outcome.parts {
                println!("    {}", part.display());
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {:#}", "✗".red(), e);
            Err(e)
        }
    }
}

/// Handle the 'show' command
fn handle_show(root: &Path, user: Option<UserId>, json: bool) -> Result<()> {
    let pipeline = RecommendationPipeline::new(PipelineConfig::load_from_root(root)?)?;
    let mut recommendations = pipeline.read_recommendations()?;
    if let Some(user_id) = user {
        recommendations.retain(|rec| rec.user_id == user_id);
        if recommendations.is_empty() {
            bail!("No recommendations for user {}", user_id);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print_recommendations(&recommendations);
    }
    Ok(())
}

/// Handle the 'generate' command
fn handle_generate(
    output: &Path,
    users: u32,
    items: u32,
    per_user: usize,
    seed: u64,
) -> Result<()> {
    if users == 0 || items == 0 {
        bail!("--users and --items must be at least 1");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0usize;
    for user_id in 1..=users {
        for _ in 0..per_user {
            let item_id = rng.random_range(1..=items);
            let score = rng.random_range(1..=5u32);
            writeln!(writer, "{},{},{}", user_id, item_id, score)?;
            written += 1;
        }
    }
    writer.flush()?;

    println!(
        "{} Wrote {} ratings for {} users to {}",
        "✓".green(),
        written,
        users,
        output.display()
    );
    Ok(())
}

/// Handle the 'verify' command
fn handle_verify(root: &Path) -> Result<()> {
    let pipeline = RecommendationPipeline::new(PipelineConfig::load_from_root(root)?)?;
    let config = pipeline.config();
    let start = Instant::now();

    let index = RatingIndex::load_from_file(&config.ratings)
        .with_context(|| format!("Failed to load {}", config.ratings.display()))?;
    let (users, items, ratings) = index.counts();
    info!("Indexed {} ratings from {} users over {} items", ratings, users, items);

    let expected = ReferenceRecommender::new(config.top_n)
        .with_exclude_rated(config.exclude_rated)
        .recommend(&index);
    let actual = pipeline.read_recommendations()?;

    let mismatches = compare(&expected, &actual);
    println!(
        "Compared {} users against the in-memory reference in {:.2?}",
        expected.len(),
        start.elapsed()
    );
    if mismatches.is_empty() {
        println!("{} Pipeline output matches", "✓".green());
        return Ok(());
    }

    for user_id in mismatches.iter().take(20) {
        println!("  {} user {}", "✗".red(), user_id);
    }
    bail!("{} users differ from the reference", mismatches.len())
}

/// Users whose ranked lists differ between the two result sets
fn compare(expected: &[Recommendation], actual: &[Recommendation]) -> BTreeSet<UserId> {
    let mut mismatches = BTreeSet::new();
    let users: BTreeSet<UserId> = expected
        .iter()
        .chain(actual)
        .map(|rec| rec.user_id)
        .collect();

    for user_id in users {
        let want = expected.iter().find(|rec| rec.user_id == user_id);
        let got = actual.iter().find(|rec| rec.user_id == user_id);
        let same = match (want, got) {
            (Some(want), Some(got)) => recommendations_agree(want, got, SCORE_TOLERANCE),
            _ => false,
        };
        if !same {
            mismatches.insert(user_id);
        }
    }
    mismatches
}

/// Helper function to print the per-stage summary
fn print_reports(outcome: &PipelineOutcome) {
    println!("{}", "Stages:".bold().blue());
    println!(
        "  {:<22} {:>10} {:>12} {:>10} {:>10} {:>10}",
        "stage", "in", "map out", "groups", "out", "time"
    );
    for report in &outcome.stages {
        println!(
            "  {:<22} {:>10} {:>12} {:>10} {:>10} {:>10}",
            report.name,
            report.input_records,
            report.intermediate_records,
            report.groups,
            report.output_records,
            format!("{:.2?}", report.elapsed)
        );
    }
    println!("Total time: {:.2?}", outcome.elapsed);
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[Recommendation]) {
    println!("{}", "Recommendations:".bold().blue());
    for rec in recommendations {
        println!("{}", format!("User {}", rec.user_id).bold());
        for (rank, item) in rec.items.iter().enumerate() {
            println!(
                "  {}. item {} - Score: {:.4}",
                (rank + 1).to_string().green(),
                item.item_id,
                item.score
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_settings_conflict_with_config() {
        let flags: [&[&str]; 3] = [
            &["--top-n", "3"],
            &["--exclude-rated"],
            &["--reduce-tasks", "2"],
        ];
        for flag in flags {
            let mut args = vec!["cooc-recs", "run", "--config", "pipeline.json"];
            args.extend_from_slice(flag);
            assert!(Cli::try_parse_from(args).is_err(), "{flag:?}");
        }

        let cli = Cli::try_parse_from(["cooc-recs", "run", "--config", "pipeline.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { config: Some(_), .. }));
    }

    #[test]
    fn test_run_accepts_settings_without_config() {
        let cli = Cli::try_parse_from([
            "cooc-recs", "run", "--root", "out", "--ratings", "r.csv", "--top-n", "3",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Run { top_n: 3, .. }));
    }
}
